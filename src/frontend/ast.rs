// src/frontend/ast.rs
//
// The expression tree handed to semantic analysis. Everything here is plain
// data; the parser that produces it lives outside this crate.

use crate::frontend::Span;

/// A type annotation as written in source. Resolved against the registry
/// during lowering.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// A named struct type (including the builtins `Bool` and `Int`).
    Named(String),
    Pointer {
        mutable: bool,
        pointee: Box<TypeExpr>,
    },
    Tuple(Vec<TypeExpr>),
    Func {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
}

impl TypeExpr {
    /// The empty-tuple annotation, the language's unit type.
    pub fn unit() -> TypeExpr {
        TypeExpr::Tuple(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Statement sequence; the block's value is its last expression's value.
    Block(Vec<Expr>),
    If {
        cond: Box<Expr>,
        then_block: Box<Expr>,
        else_block: Option<Box<Expr>>,
    },
    Let {
        name: String,
        mutable: bool,
        annotation: Option<TypeExpr>,
        init: Option<Box<Expr>>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Field {
        base: Box<Expr>,
        name: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Name(String),
    Bool(bool),
    Int(i64),
    Tuple(Vec<Expr>),
    StructLiteral {
        name: String,
        fields: Vec<(String, Expr)>,
    },
    AddrOf {
        mutable: bool,
        operand: Box<Expr>,
    },
    Deref(Box<Expr>),
    /// Parenthesized sub-expression, transparent in both value and lvalue
    /// position. A non-path expression in lvalue position evaluates into a
    /// fresh register reused as the place.
    Group(Box<Expr>),
    Return(Option<Box<Expr>>),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<Param>,
    /// `None` means the function returns the empty tuple.
    pub return_type: Option<TypeExpr>,
    pub body: Expr,
    pub span: Span,
}
