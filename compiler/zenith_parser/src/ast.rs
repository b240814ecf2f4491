//! Abstract syntax tree definitions for the Zenith language

use serde::{Deserialize, Serialize};
use std::fmt;
use zenith_common::Span;

/// Type alias for node IDs
pub type NodeId = u32;

/// A complete Zenith compilation unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub decls: Vec<Decl>,
    pub span: Span,
}

/// Top-level declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decl {
    pub kind: DeclKind,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeclKind {
    Variable(VariableDecl),
    Function(FunctionDecl),
    Struct(StructDecl),
}

/// Variable declaration: `name: T`, `name: T = expr` or `name := expr`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub name_span: Span,
    /// Absent for inferred declarations (`name := expr`).
    pub ty: Option<TypeRef>,
    pub initializer: Option<Expr>,
}

/// Function declaration: `name: (params) RetT? { body }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub name_span: Span,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeRef>,
    pub body: Block,
}

/// Function parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
    pub span: Span,
}

/// Struct declaration: `struct Name { f1: T, f2: T }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub name_span: Span,
    pub fields: Vec<FieldDecl>,
}

/// Struct field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub span: Span,
}

/// Array suffix on a type reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArraySpec {
    /// No `[...]` suffix.
    None,
    /// `[]`: length left open; unsized at ABI boundaries.
    Unsized,
    /// `[n]`: fixed length.
    Sized(u64),
}

/// A syntactic type reference: identifier with optional `[n?]` and `*` suffixes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    pub array: ArraySpec,
    pub pointer: bool,
    pub span: Span,
}

/// A brace-delimited statement sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    VariableDecl(VariableDecl),
    /// `target = value`; the target is a full lvalue expression
    /// (identifier, subscript or member access).
    Assignment { target: Expr, value: Expr },
    If(IfStmt),
    For(ForStmt),
    Select(SelectStmt),
    Return(Option<Expr>),
    Expression(Expr),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_block: Block,
    pub elsif_clauses: Vec<ElsifClause>,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElsifClause {
    pub condition: Expr,
    pub block: Block,
    pub span: Span,
}

/// `for init; cond; inc { body }`; all three clauses are optional
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub condition: Option<Expr>,
    pub increment: Option<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectStmt {
    pub scrutinee: Expr,
    pub cases: Vec<CaseClause>,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseClause {
    pub value: Expr,
    pub block: Block,
    pub span: Span,
}

/// Expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(String),
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
        callee: String,
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
        name: String,
        fields: Vec<(String, Expr)>,
    },
    ArrayInit(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    Integer(i64),
    Boolean(bool),
    /// The raw text keeps the surrounding quotes; string typing is based on
    /// the quoted source length.
    String { value: String, text: String },
}

/// Binary operator tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    Equal,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    NotEqual,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide)
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(self, BinaryOp::BitwiseAnd | BinaryOp::BitwiseOr | BinaryOp::BitwiseXor)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::Greater
                | BinaryOp::Less
                | BinaryOp::GreaterEqual
                | BinaryOp::LessEqual
                | BinaryOp::NotEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::LogicalAnd | BinaryOp::LogicalOr)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::BitwiseXor => "^",
            BinaryOp::Equal => "=",
            BinaryOp::Greater => ">",
            BinaryOp::Less => "<",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::LessEqual => "<=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::LogicalAnd => "and",
            BinaryOp::LogicalOr => "or",
        };
        write!(f, "{}", text)
    }
}

/// Unary operator tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Increment,
    Decrement,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnaryOp::Negate => "-",
            UnaryOp::Increment => "++",
            UnaryOp::Decrement => "--",
        };
        write!(f, "{}", text)
    }
}
