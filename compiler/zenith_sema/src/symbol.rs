//! Symbols, scopes and usage tracking

use crate::Type;
use bitflags::bitflags;
use hashbrown::HashMap;
use std::fmt;

/// Index of a symbol in the table's symbol arena
pub type SymbolId = u32;

/// Index of a scope in the table's scope arena
pub type ScopeId = u32;

bitflags! {
    /// How a variable is initialized and referenced. Multiple flags may be
    /// set on one symbol; targets use them as allocation hints.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Usage: u16 {
        const INIT_ARITHMETIC = 1 << 0;
        const INIT_CONSTANT   = 1 << 1;
        const INIT_POINTER    = 1 << 2;
        const INIT_COUNTER    = 1 << 3;
        const INIT_IO         = 1 << 4;
        const USED_ARITHMETIC = 1 << 5;
        const USED_COMPARISON = 1 << 6;
        const USED_COUNTER    = 1 << 7;
        const USED_POINTER    = 1 << 8;
        const USED_IO         = 1 << 9;
    }
}

/// What a name stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Type,
    /// Variables and parameters.
    Variable,
    Function,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Type => write!(f, "type"),
            SymbolKind::Variable => write!(f, "variable"),
            SymbolKind::Function => write!(f, "function"),
        }
    }
}

/// A named entity with its resolved type
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    /// Scope-path-dotted name, e.g. `reverse.i`.
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    pub usage: Usage,
    pub scope: ScopeId,
}

/// One lexical scope: a name map plus a parent link. Insertion order is
/// preserved for deterministic iteration.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Path segment contributed to qualified names; empty segments (the
    /// global scope, loop scopes) are skipped.
    pub name: String,
    pub parent: Option<ScopeId>,
    order: Vec<SymbolId>,
    by_name: HashMap<String, SymbolId>,
}

impl Scope {
    fn new(name: impl Into<String>, parent: Option<ScopeId>) -> Self {
        Self {
            name: name.into(),
            parent,
            order: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

/// Arena of symbols and scopes for one compilation unit
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub const GLOBAL: ScopeId = 0;

    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            scopes: vec![Scope::new("", None)],
        }
    }

    /// Create a child scope and return its id.
    pub fn push_scope(&mut self, name: impl Into<String>, parent: ScopeId) -> ScopeId {
        let id = self.scopes.len() as ScopeId;
        self.scopes.push(Scope::new(name, Some(parent)));
        id
    }

    /// Add a symbol to `scope`. Fails if the simple name already exists in
    /// that scope (shadowing an outer scope is allowed).
    pub fn add_local(
        &mut self,
        scope: ScopeId,
        name: impl Into<String>,
        kind: SymbolKind,
        ty: Type,
    ) -> Result<SymbolId, SymbolId> {
        let name = name.into();
        if let Some(&existing) = self.scopes[scope as usize].by_name.get(&name) {
            return Err(existing);
        }

        let qualified_name = self.qualify(scope, &name);
        let id = self.symbols.len() as SymbolId;
        self.symbols.push(Symbol {
            name: name.clone(),
            qualified_name,
            kind,
            ty,
            usage: Usage::empty(),
            scope,
        });

        let scope = &mut self.scopes[scope as usize];
        scope.order.push(id);
        scope.by_name.insert(name, id);
        Ok(id)
    }

    /// Look a name up through the scope chain.
    pub fn lookup(&self, mut scope: ScopeId, name: &str) -> Option<SymbolId> {
        loop {
            if let Some(&id) = self.scopes[scope as usize].by_name.get(name) {
                return Some(id);
            }
            scope = self.scopes[scope as usize].parent?;
        }
    }

    /// Look a name up in one scope only.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scopes[scope as usize].by_name.get(name).copied()
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id as usize]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id as usize]
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id as usize]
    }

    /// Symbols of one scope in insertion order.
    pub fn symbols_in(&self, scope: ScopeId) -> impl Iterator<Item = SymbolId> + '_ {
        self.scopes[scope as usize].order.iter().copied()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// All symbols in the table, in creation order.
    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate().map(|(i, s)| (i as SymbolId, s))
    }

    /// Whether `symbol`'s owning scope is reachable from `scope` by parent
    /// walks.
    pub fn is_reachable(&self, mut scope: ScopeId, symbol: SymbolId) -> bool {
        let owner = self.symbols[symbol as usize].scope;
        loop {
            if scope == owner {
                return true;
            }
            match self.scopes[scope as usize].parent {
                Some(parent) => scope = parent,
                None => return false,
            }
        }
    }

    fn qualify(&self, scope: ScopeId, name: &str) -> String {
        let mut segments = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id as usize];
            if !s.name.is_empty() {
                segments.push(s.name.as_str());
            }
            current = s.parent;
        }
        segments.reverse();
        segments.push(name);
        segments.join(".")
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrimitiveType;

    fn u8_ty() -> Type {
        Type::Primitive(PrimitiveType::U8)
    }

    #[test]
    fn lookup_walks_parent_scopes() {
        let mut table = SymbolTable::new();
        let global = SymbolTable::GLOBAL;
        let x = table.add_local(global, "x", SymbolKind::Variable, u8_ty()).unwrap();

        let func = table.push_scope("main", global);
        let local = table.add_local(func, "local", SymbolKind::Variable, u8_ty()).unwrap();

        assert_eq!(table.lookup(func, "x"), Some(x));
        assert_eq!(table.lookup(func, "local"), Some(local));
        assert_eq!(table.lookup(global, "local"), None);
        assert_eq!(table.lookup(func, "missing"), None);
    }

    #[test]
    fn add_local_rejects_duplicates_but_allows_shadowing() {
        let mut table = SymbolTable::new();
        let global = SymbolTable::GLOBAL;
        let first = table.add_local(global, "x", SymbolKind::Variable, u8_ty()).unwrap();
        assert_eq!(table.add_local(global, "x", SymbolKind::Variable, u8_ty()), Err(first));

        let inner = table.push_scope("f", global);
        let shadow = table.add_local(inner, "x", SymbolKind::Variable, u8_ty()).unwrap();
        assert_eq!(table.lookup(inner, "x"), Some(shadow));
    }

    #[test]
    fn qualified_names_are_scope_path_dotted() {
        let mut table = SymbolTable::new();
        let func = table.push_scope("reverse", SymbolTable::GLOBAL);
        let loop_scope = table.push_scope("", func);
        let i = table.add_local(loop_scope, "i", SymbolKind::Variable, u8_ty()).unwrap();
        assert_eq!(table.symbol(i).qualified_name, "reverse.i");

        let g = table.add_local(SymbolTable::GLOBAL, "g", SymbolKind::Variable, u8_ty()).unwrap();
        assert_eq!(table.symbol(g).qualified_name, "g");
    }

    #[test]
    fn usage_flags_accumulate() {
        let mut table = SymbolTable::new();
        let id = table
            .add_local(SymbolTable::GLOBAL, "i", SymbolKind::Variable, u8_ty())
            .unwrap();

        table.symbol_mut(id).usage |= Usage::INIT_COUNTER;
        table.symbol_mut(id).usage |= Usage::USED_COUNTER | Usage::USED_ARITHMETIC;

        let usage = table.symbol(id).usage;
        assert!(usage.contains(Usage::INIT_COUNTER | Usage::USED_COUNTER | Usage::USED_ARITHMETIC));
        assert!(!usage.contains(Usage::USED_IO));
    }

    #[test]
    fn symbols_in_preserves_insertion_order() {
        let mut table = SymbolTable::new();
        for name in ["c", "a", "b"] {
            table.add_local(SymbolTable::GLOBAL, name, SymbolKind::Variable, u8_ty()).unwrap();
        }
        let names: Vec<&str> = table
            .symbols_in(SymbolTable::GLOBAL)
            .map(|id| table.symbol(id).name.as_str())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
