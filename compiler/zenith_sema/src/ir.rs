//! Typed intermediate representation
//!
//! Each IR category is a tagged variant; expressions carry their resolved
//! type in a shared envelope. Symbols are referenced by arena id, never by
//! pointer.

use crate::{CallGraph, ScopeId, SymbolId, SymbolTable, Type};
use serde::{Deserialize, Serialize};

pub use zenith_parser::{BinaryOp, UnaryOp};

/// A fully analyzed compilation unit
#[derive(Debug, Clone)]
pub struct Unit {
    pub decls: Vec<Decl>,
    pub table: SymbolTable,
    pub call_graph: CallGraph,
}

impl Unit {
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Function(f) => Some(f),
            _ => None,
        })
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions().find(|f| f.name == name)
    }
}

/// Top-level declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    Variable {
        symbol: SymbolId,
        ty: Type,
        init: Option<Expr>,
    },
    Function(Function),
    Type {
        symbol: SymbolId,
    },
}

/// A typed function with its body and scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<SymbolId>,
    pub return_type: Option<Type>,
    pub body: Block,
    pub scope: ScopeId,
}

/// Statement sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

/// Statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    VarDecl {
        symbol: SymbolId,
        ty: Type,
        init: Option<Expr>,
    },
    /// The target is a full lvalue expression: symbol reference, subscript
    /// or member access.
    Assign {
        target: Expr,
        value: Expr,
    },
    If {
        condition: Expr,
        then_block: Block,
        elsif_clauses: Vec<ElsifClause>,
        else_block: Option<Block>,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Block,
        scope: ScopeId,
    },
    Select {
        scrutinee: Expr,
        cases: Vec<CaseClause>,
        else_block: Option<Block>,
    },
    Expr(Expr),
    Return(Option<Expr>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElsifClause {
    pub condition: Expr,
    pub block: Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseClause {
    pub value: Expr,
    pub block: Block,
}

/// Expression envelope: kind plus resolved type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Self { kind, ty }
    }

    pub fn error() -> Self {
        Self { kind: ExprKind::Constant(Value::Int(0)), ty: Type::Error }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    Constant(Value),
    Symbol(SymbolId),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        callee: SymbolId,
        args: Vec<Expr>,
    },
    Subscript {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        field: String,
    },
    StructInit {
        fields: Vec<(String, Expr)>,
    },
    ArrayInit(Vec<Expr>),
}

/// Compile-time constant values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
}

/// Collect every symbol referenced anywhere in an expression tree.
pub fn referenced_symbols(expr: &Expr, out: &mut Vec<SymbolId>) {
    match &expr.kind {
        ExprKind::Constant(_) => {}
        ExprKind::Symbol(id) => out.push(*id),
        ExprKind::Binary { left, right, .. } => {
            referenced_symbols(left, out);
            referenced_symbols(right, out);
        }
        ExprKind::Unary { operand, .. } => referenced_symbols(operand, out),
        ExprKind::Call { args, .. } => {
            for arg in args {
                referenced_symbols(arg, out);
            }
        }
        ExprKind::Subscript { array, index } => {
            referenced_symbols(array, out);
            referenced_symbols(index, out);
        }
        ExprKind::Member { object, .. } => referenced_symbols(object, out),
        ExprKind::StructInit { fields } => {
            for (_, value) in fields {
                referenced_symbols(value, out);
            }
        }
        ExprKind::ArrayInit(elements) => {
            for element in elements {
                referenced_symbols(element, out);
            }
        }
    }
}
