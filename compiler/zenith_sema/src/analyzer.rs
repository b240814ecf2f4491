//! Two-pass semantic analysis
//!
//! Pass 1 registers every top-level declaration so functions may mention
//! declarations that appear later in the unit. Pass 2 walks declarations in
//! source order and produces the typed IR.

use crate::ir::{self, Unit};
use crate::{
    referenced_symbols, CallGraph, PrimitiveType, ScopeId, SymbolId, SymbolKind, SymbolTable,
    Type, Usage,
};
use log::debug;
use zenith_common::{Diagnostics, Phase, Span};
use zenith_parser::ast;
use zenith_parser::{BinaryOp, UnaryOp};

/// Semantic analyzer context, threaded explicitly through the walks
pub struct Analyzer {
    table: SymbolTable,
    diagnostics: Diagnostics,
    call_graph: CallGraph,
    current_function: Option<String>,
    current_scope: ScopeId,
}

impl Analyzer {
    pub fn new() -> Self {
        let mut table = SymbolTable::new();
        for primitive in [
            PrimitiveType::U8,
            PrimitiveType::U16,
            PrimitiveType::I8,
            PrimitiveType::I16,
            PrimitiveType::Bool,
            PrimitiveType::D8,
            PrimitiveType::D16,
        ] {
            table
                .add_local(
                    SymbolTable::GLOBAL,
                    primitive.to_string(),
                    SymbolKind::Type,
                    Type::Primitive(primitive),
                )
                .expect("builtin type names are distinct");
        }

        Self {
            table,
            diagnostics: Diagnostics::new(),
            call_graph: CallGraph::new(),
            current_function: None,
            current_scope: SymbolTable::GLOBAL,
        }
    }

    /// Analyze a compilation unit. A non-empty error list means the returned
    /// unit is partial and later stages must not consume it.
    pub fn analyze(mut self, program: &ast::Program) -> (Unit, Diagnostics) {
        self.register_declarations(program);
        debug!(
            "semantic pass 1 registered {} symbols",
            self.table.symbol_count()
        );

        let mut decls = Vec::new();
        for decl in &program.decls {
            if let Some(ir_decl) = self.build_declaration(decl) {
                decls.push(ir_decl);
            }
        }
        debug!(
            "semantic pass 2 built {} declarations, {} call edges",
            decls.len(),
            self.call_graph.edges().len()
        );

        let unit = Unit {
            decls,
            table: self.table,
            call_graph: self.call_graph,
        };
        (unit, self.diagnostics)
    }

    // ------------------------------------------------------------------
    // Pass 1: declaration registration
    // ------------------------------------------------------------------

    fn register_declarations(&mut self, program: &ast::Program) {
        for decl in &program.decls {
            match &decl.kind {
                ast::DeclKind::Variable(var) => {
                    // Inferred declarations are registered in pass 2 once the
                    // initializer's type is known.
                    if let Some(ty_ref) = &var.ty {
                        let ty = self.resolve_type_ref(ty_ref, false);
                        self.declare(var.name.clone(), var.name_span, SymbolKind::Variable, ty);
                    }
                }
                ast::DeclKind::Function(func) => {
                    self.register_function(func);
                }
                ast::DeclKind::Struct(s) => {
                    let fields = s
                        .fields
                        .iter()
                        .map(|f| (f.name.clone(), self.resolve_type_ref(&f.ty, false)))
                        .collect();
                    let ty = Type::new_struct(s.name.clone(), fields);
                    self.declare(s.name.clone(), s.name_span, SymbolKind::Type, ty);
                }
            }
        }
    }

    fn register_function(&mut self, func: &ast::FunctionDecl) {
        let params: Vec<Type> = func
            .params
            .iter()
            .map(|p| self.resolve_type_ref(&p.ty, true))
            .collect();

        let return_type = func.return_type.as_ref().map(|ty_ref| {
            let ty = self.resolve_type_ref(ty_ref, true);
            if let Type::Struct { name, .. } = &ty {
                self.error(
                    ty_ref.span,
                    format!("cannot return struct type '{}' by value", name),
                );
            }
            ty
        });

        let ty = Type::Function {
            params,
            return_type: return_type.map(Box::new),
        };
        self.declare(func.name.clone(), func.name_span, SymbolKind::Function, ty);
    }

    fn declare(
        &mut self,
        name: String,
        span: Span,
        kind: SymbolKind,
        ty: Type,
    ) -> Option<SymbolId> {
        match self.table.add_local(self.current_scope, name.clone(), kind, ty) {
            Ok(id) => Some(id),
            Err(_) => {
                self.error(span, format!("duplicate declaration of '{}'", name));
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Pass 2: typed IR construction
    // ------------------------------------------------------------------

    fn build_declaration(&mut self, decl: &ast::Decl) -> Option<ir::Decl> {
        match &decl.kind {
            ast::DeclKind::Variable(var) => self.build_variable_decl(var).map(
                |(symbol, ty, init)| ir::Decl::Variable { symbol, ty, init },
            ),
            ast::DeclKind::Function(func) => self.build_function(func).map(ir::Decl::Function),
            ast::DeclKind::Struct(s) => {
                let symbol = self.table.lookup_local(SymbolTable::GLOBAL, &s.name)?;
                Some(ir::Decl::Type { symbol })
            }
        }
    }

    /// Shared by top-level and local variable declarations.
    fn build_variable_decl(
        &mut self,
        var: &ast::VariableDecl,
    ) -> Option<(SymbolId, Type, Option<ir::Expr>)> {
        let init = var.initializer.as_ref().map(|e| self.analyze_expr(e));

        let (symbol, ty) = if let Some(ty_ref) = &var.ty {
            // Globals were registered in pass 1; locals are added here, so
            // an existing local name is a duplicate.
            let registered = if self.current_scope == SymbolTable::GLOBAL {
                self.table.lookup_local(SymbolTable::GLOBAL, &var.name)
            } else {
                None
            };
            match registered {
                Some(id) => (id, self.table.symbol(id).ty.clone()),
                None => {
                    let ty = self.resolve_type_ref(ty_ref, false);
                    let id =
                        self.declare(var.name.clone(), var.name_span, SymbolKind::Variable, ty.clone())?;
                    (id, ty)
                }
            }
        } else {
            let init_expr = match &init {
                Some(e) => e,
                None => {
                    self.error(
                        var.name_span,
                        format!("declaration of '{}' requires an initializer", var.name),
                    );
                    return None;
                }
            };
            let ty = init_expr.ty.clone();
            let id = self.declare(var.name.clone(), var.name_span, SymbolKind::Variable, ty.clone())?;
            (id, ty)
        };

        if let Some(init_expr) = &init {
            let flag = init_usage_flag(init_expr);
            self.table.symbol_mut(symbol).usage |= flag;
        }

        Some((symbol, ty, init))
    }

    fn build_function(&mut self, func: &ast::FunctionDecl) -> Option<ir::Function> {
        let symbol = self.table.lookup_local(SymbolTable::GLOBAL, &func.name)?;
        let (param_types, return_type) = match &self.table.symbol(symbol).ty {
            Type::Function { params, return_type } => {
                (params.clone(), return_type.as_deref().cloned())
            }
            _ => return None,
        };

        let scope = self.table.push_scope(func.name.clone(), SymbolTable::GLOBAL);
        let previous_scope = std::mem::replace(&mut self.current_scope, scope);
        let previous_function =
            std::mem::replace(&mut self.current_function, Some(func.name.clone()));

        // Pass-1 diagnostics already cover unresolvable parameter types.
        for (param, ty) in func.params.iter().zip(param_types) {
            self.declare(param.name.clone(), param.span, SymbolKind::Variable, ty);
        }

        let body = self.analyze_block(&func.body);

        self.current_scope = previous_scope;
        self.current_function = previous_function;

        Some(ir::Function {
            name: func.name.clone(),
            params: func
                .params
                .iter()
                .filter_map(|p| self.table.lookup_local(scope, &p.name))
                .collect(),
            return_type,
            body,
            scope,
        })
    }

    fn analyze_block(&mut self, block: &ast::Block) -> ir::Block {
        let statements = block
            .statements
            .iter()
            .filter_map(|stmt| self.analyze_stmt(stmt))
            .collect();
        ir::Block { statements }
    }

    fn analyze_stmt(&mut self, stmt: &ast::Stmt) -> Option<ir::Stmt> {
        match &stmt.kind {
            ast::StmtKind::VariableDecl(var) => {
                let (symbol, ty, init) = self.build_variable_decl(var)?;
                Some(ir::Stmt::VarDecl { symbol, ty, init })
            }
            ast::StmtKind::Assignment { target, value } => {
                let target_ir = self.analyze_expr(target);
                if !matches!(
                    target_ir.kind,
                    ir::ExprKind::Symbol(_) | ir::ExprKind::Subscript { .. } | ir::ExprKind::Member { .. }
                ) {
                    self.error(target.span, "invalid assignment target".to_string());
                }
                let value_ir = self.analyze_expr(value);
                Some(ir::Stmt::Assign { target: target_ir, value: value_ir })
            }
            ast::StmtKind::If(if_stmt) => {
                let condition = self.analyze_expr(&if_stmt.condition);
                let then_block = self.analyze_block(&if_stmt.then_block);
                let elsif_clauses = if_stmt
                    .elsif_clauses
                    .iter()
                    .map(|clause| ir::ElsifClause {
                        condition: self.analyze_expr(&clause.condition),
                        block: self.analyze_block(&clause.block),
                    })
                    .collect();
                let else_block = if_stmt.else_block.as_ref().map(|b| self.analyze_block(b));
                Some(ir::Stmt::If { condition, then_block, elsif_clauses, else_block })
            }
            ast::StmtKind::For(for_stmt) => self.analyze_for(for_stmt),
            ast::StmtKind::Select(select) => {
                let scrutinee = self.analyze_expr(&select.scrutinee);
                let cases = select
                    .cases
                    .iter()
                    .map(|case| ir::CaseClause {
                        value: self.analyze_expr(&case.value),
                        block: self.analyze_block(&case.block),
                    })
                    .collect();
                let else_block = select.else_block.as_ref().map(|b| self.analyze_block(b));
                Some(ir::Stmt::Select { scrutinee, cases, else_block })
            }
            ast::StmtKind::Return(value) => {
                let value_ir = value.as_ref().map(|e| self.analyze_expr(e));
                Some(ir::Stmt::Return(value_ir))
            }
            ast::StmtKind::Expression(expr) => Some(ir::Stmt::Expr(self.analyze_expr(expr))),
        }
    }

    fn analyze_for(&mut self, for_stmt: &ast::ForStmt) -> Option<ir::Stmt> {
        // The loop scope owns the induction variable.
        let scope = self.table.push_scope("", self.current_scope);
        let previous_scope = std::mem::replace(&mut self.current_scope, scope);

        let init = for_stmt
            .init
            .as_ref()
            .and_then(|stmt| self.analyze_stmt(stmt))
            .map(Box::new);
        if let Some(init_stmt) = &init {
            if let ir::Stmt::VarDecl { symbol, .. } = init_stmt.as_ref() {
                self.table.symbol_mut(*symbol).usage |= Usage::INIT_COUNTER | Usage::USED_COUNTER;
            }
        }

        let condition = for_stmt.condition.as_ref().map(|e| self.analyze_expr(e));
        if let Some(cond) = &condition {
            self.mark_usage(cond, Usage::USED_COUNTER);
        }

        let increment = for_stmt.increment.as_ref().map(|e| self.analyze_expr(e));
        if let Some(inc) = &increment {
            self.mark_usage(inc, Usage::USED_COUNTER);
        }

        let body = self.analyze_block(&for_stmt.body);

        self.current_scope = previous_scope;
        Some(ir::Stmt::For { init, condition, increment, body, scope })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn analyze_expr(&mut self, expr: &ast::Expr) -> ir::Expr {
        match &expr.kind {
            ast::ExprKind::Literal(literal) => self.analyze_literal(literal, expr.span),
            ast::ExprKind::Identifier(name) => match self.table.lookup(self.current_scope, name) {
                Some(id) => {
                    let ty = self.table.symbol(id).ty.clone();
                    ir::Expr::new(ir::ExprKind::Symbol(id), ty)
                }
                None => {
                    self.error(expr.span, format!("undefined identifier '{}'", name));
                    ir::Expr::error()
                }
            },
            ast::ExprKind::Binary { op, left, right } => {
                self.analyze_binary(*op, left, right)
            }
            ast::ExprKind::Unary { op, operand } => self.analyze_unary(*op, operand, expr.span),
            ast::ExprKind::Call { callee, args } => self.analyze_call(callee, args, expr.span),
            ast::ExprKind::Subscript { array, index } => {
                let array_ir = self.analyze_expr(array);
                let index_ir = self.analyze_expr(index);
                let element_ty = match &array_ir.ty {
                    Type::Array { element, .. } => element.as_ref().clone(),
                    Type::Pointer(inner) => inner.as_ref().clone(),
                    Type::Error => Type::Error,
                    other => {
                        self.error(
                            array.span,
                            format!("cannot index value of type '{}'", other),
                        );
                        Type::Error
                    }
                };
                ir::Expr::new(
                    ir::ExprKind::Subscript {
                        array: Box::new(array_ir),
                        index: Box::new(index_ir),
                    },
                    element_ty,
                )
            }
            ast::ExprKind::Member { object, field } => self.analyze_member(object, field, expr.span),
            ast::ExprKind::StructInit { name, fields } => {
                self.analyze_struct_init(name, fields, expr.span)
            }
            ast::ExprKind::ArrayInit(elements) => {
                let elements_ir: Vec<ir::Expr> =
                    elements.iter().map(|e| self.analyze_expr(e)).collect();
                let element_ty = elements_ir
                    .first()
                    .map(|e| e.ty.clone())
                    .unwrap_or(Type::Primitive(PrimitiveType::U8));
                let len = elements_ir.len() as u16;
                ir::Expr::new(
                    ir::ExprKind::ArrayInit(elements_ir),
                    Type::Array { element: Box::new(element_ty), len: Some(len) },
                )
            }
        }
    }

    fn analyze_literal(&mut self, literal: &ast::Literal, span: Span) -> ir::Expr {
        match literal {
            ast::Literal::Integer(value) => {
                let ty = self.integer_literal_type(*value, span);
                ir::Expr::new(ir::ExprKind::Constant(ir::Value::Int(*value)), ty)
            }
            ast::Literal::Boolean(value) => ir::Expr::new(
                ir::ExprKind::Constant(ir::Value::Bool(*value)),
                Type::Primitive(PrimitiveType::Bool),
            ),
            ast::Literal::String { value, text } => {
                // Sized by the quoted source text, quotes included.
                let len = text.chars().count() as u16;
                ir::Expr::new(
                    ir::ExprKind::Constant(ir::Value::Str(value.clone())),
                    Type::Array {
                        element: Box::new(Type::Primitive(PrimitiveType::U8)),
                        len: Some(len),
                    },
                )
            }
        }
    }

    fn analyze_binary(&mut self, op: BinaryOp, left: &ast::Expr, right: &ast::Expr) -> ir::Expr {
        let left_ir = self.analyze_expr(left);
        let right_ir = self.analyze_expr(right);

        if op.is_arithmetic() || op.is_bitwise() {
            self.mark_usage(&left_ir, Usage::USED_ARITHMETIC);
            self.mark_usage(&right_ir, Usage::USED_ARITHMETIC);
        } else if op.is_comparison() {
            self.mark_usage(&left_ir, Usage::USED_COMPARISON);
            self.mark_usage(&right_ir, Usage::USED_COMPARISON);
        }

        let ty = crate::promote_binary(&left_ir.ty, &right_ir.ty);
        ir::Expr::new(
            ir::ExprKind::Binary {
                op,
                left: Box::new(left_ir),
                right: Box::new(right_ir),
            },
            ty,
        )
    }

    fn analyze_unary(&mut self, op: UnaryOp, operand: &ast::Expr, span: Span) -> ir::Expr {
        // Negated integer literals fold to a constant and re-run the range
        // rule on the negated value.
        if op == UnaryOp::Negate {
            if let ast::ExprKind::Literal(ast::Literal::Integer(value)) = &operand.kind {
                let folded = -*value;
                let ty = self.integer_literal_type(folded, span);
                return ir::Expr::new(ir::ExprKind::Constant(ir::Value::Int(folded)), ty);
            }
        }

        let operand_ir = self.analyze_expr(operand);
        let ty = operand_ir.ty.clone();
        ir::Expr::new(ir::ExprKind::Unary { op, operand: Box::new(operand_ir) }, ty)
    }

    fn analyze_call(&mut self, callee: &str, args: &[ast::Expr], span: Span) -> ir::Expr {
        let args_ir: Vec<ir::Expr> = args.iter().map(|a| self.analyze_expr(a)).collect();

        let symbol = match self.table.lookup(self.current_scope, callee) {
            Some(id) if self.table.symbol(id).kind == SymbolKind::Function => id,
            _ => {
                self.error(span, format!("undefined function '{}'", callee));
                return ir::Expr::error();
            }
        };

        let return_ty = match &self.table.symbol(symbol).ty {
            Type::Function { return_type, .. } => return_type
                .as_deref()
                .cloned()
                .unwrap_or(Type::Void),
            _ => Type::Error,
        };

        if let Some(caller) = &self.current_function {
            self.call_graph.add_edge(caller.clone(), callee);
        }

        ir::Expr::new(ir::ExprKind::Call { callee: symbol, args: args_ir }, return_ty)
    }

    fn analyze_member(&mut self, object: &ast::Expr, field: &str, span: Span) -> ir::Expr {
        let object_ir = self.analyze_expr(object);
        self.mark_usage(&object_ir, Usage::USED_POINTER);

        let field_ty = match &object_ir.ty {
            Type::Struct { name, .. } => match object_ir.ty.field(field) {
                Some(f) => f.ty.clone(),
                None => {
                    self.error(span, format!("unknown field '{}' on struct '{}'", field, name));
                    Type::Error
                }
            },
            // Arrays expose one built-in member.
            Type::Array { .. } if field == "length" => Type::Primitive(PrimitiveType::U16),
            Type::Error => Type::Error,
            _ => {
                self.error(span, "member access on non-struct value".to_string());
                Type::Error
            }
        };

        ir::Expr::new(
            ir::ExprKind::Member {
                object: Box::new(object_ir),
                field: field.to_string(),
            },
            field_ty,
        )
    }

    fn analyze_struct_init(
        &mut self,
        name: &str,
        fields: &[(String, ast::Expr)],
        span: Span,
    ) -> ir::Expr {
        let struct_ty = match self.table.lookup(self.current_scope, name) {
            Some(id)
                if self.table.symbol(id).kind == SymbolKind::Type
                    && self.table.symbol(id).ty.is_struct() =>
            {
                self.table.symbol(id).ty.clone()
            }
            _ => {
                self.error(span, format!("undefined type '{}'", name));
                Type::Error
            }
        };

        let mut fields_ir = Vec::with_capacity(fields.len());
        for (field_name, value) in fields {
            if !struct_ty.is_error() && struct_ty.field(field_name).is_none() {
                self.error(
                    span,
                    format!("unknown field '{}' on struct '{}'", field_name, name),
                );
            }
            fields_ir.push((field_name.clone(), self.analyze_expr(value)));
        }

        ir::Expr::new(ir::ExprKind::StructInit { fields: fields_ir }, struct_ty)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Resolve a syntactic type reference. `abi_boundary` distinguishes
    /// zero-length arrays in parameter or return position (unsized, a
    /// pointer at the ABI) from genuinely empty local arrays.
    fn resolve_type_ref(&mut self, ty_ref: &ast::TypeRef, abi_boundary: bool) -> Type {
        let base = match self.table.lookup(self.current_scope, &ty_ref.name) {
            Some(id) if self.table.symbol(id).kind == SymbolKind::Type => {
                self.table.symbol(id).ty.clone()
            }
            _ => {
                self.error(ty_ref.span, format!("undefined type '{}'", ty_ref.name));
                return Type::Error;
            }
        };

        let mut ty = base;
        match ty_ref.array {
            ast::ArraySpec::None => {}
            ast::ArraySpec::Unsized => {
                ty = Type::Array { element: Box::new(ty), len: None };
            }
            ast::ArraySpec::Sized(n) => {
                if n > u16::MAX as u64 {
                    self.error(ty_ref.span, format!("array length {} out of range", n));
                }
                let len = if n == 0 && abi_boundary { None } else { Some(n as u16) };
                ty = Type::Array { element: Box::new(ty), len };
            }
        }

        if ty_ref.pointer {
            ty = Type::Pointer(Box::new(ty));
        }

        ty
    }

    /// Integer literals take the smallest type whose range contains them.
    fn integer_literal_type(&mut self, value: i64, span: Span) -> Type {
        let primitive = if (0..=255).contains(&value) {
            PrimitiveType::U8
        } else if (256..=65535).contains(&value) {
            PrimitiveType::U16
        } else if (-128..=-1).contains(&value) {
            PrimitiveType::I8
        } else if value < -128 {
            if value < i16::MIN as i64 {
                self.error(span, format!("integer literal {} out of range", value));
            }
            PrimitiveType::I16
        } else {
            self.error(span, format!("integer literal {} out of range", value));
            PrimitiveType::U16
        };
        Type::Primitive(primitive)
    }

    /// OR `flag` into every variable symbol referenced by the expression.
    fn mark_usage(&mut self, expr: &ir::Expr, flag: Usage) {
        let mut symbols = Vec::new();
        referenced_symbols(expr, &mut symbols);
        for id in symbols {
            let symbol = self.table.symbol_mut(id);
            if symbol.kind == SymbolKind::Variable {
                symbol.usage |= flag;
            }
        }
    }

    fn error(&mut self, span: Span, message: String) {
        self.diagnostics.error(Phase::Semantic, message, span);
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// The `VarInit*` flag an initializer expression contributes.
fn init_usage_flag(init: &ir::Expr) -> Usage {
    match &init.kind {
        ir::ExprKind::Constant(ir::Value::Str(_)) => Usage::INIT_POINTER,
        ir::ExprKind::Constant(_) => Usage::INIT_CONSTANT,
        ir::ExprKind::Binary { op, .. } if op.is_arithmetic() || op.is_bitwise() => {
            Usage::INIT_ARITHMETIC
        }
        ir::ExprKind::Unary { .. } => Usage::INIT_ARITHMETIC,
        ir::ExprKind::StructInit { .. } | ir::ExprKind::ArrayInit(_) => Usage::INIT_POINTER,
        _ => Usage::empty(),
    }
}
