// src/errors/sema.rs
//! Semantic analysis errors (E2xxx) and internal invariant reports (E9xxx).

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum SemaError {
    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(E2001))]
    IncompatibleMove {
        expected: String,
        found: String,
        #[label("incompatible move")]
        span: SourceSpan,
    },

    #[error("wrong return type: expected {expected}, found {found}")]
    #[diagnostic(code(E2001))]
    WrongReturnType {
        expected: String,
        found: String,
        #[label("returned here")]
        span: SourceSpan,
    },

    #[error("undeclared name '{name}'")]
    #[diagnostic(code(E2002))]
    Undeclared {
        name: String,
        #[label("not found in scope")]
        span: SourceSpan,
    },

    #[error("unknown type '{name}'")]
    #[diagnostic(code(E2003))]
    UnknownType {
        name: String,
        #[label("no such type")]
        span: SourceSpan,
    },

    #[error("unknown field '{name}'")]
    #[diagnostic(code(E2004))]
    UnknownField {
        name: String,
        #[label("no such field")]
        span: SourceSpan,
    },

    #[error("type '{ty}' has no fields")]
    #[diagnostic(code(E2005))]
    NotAStruct {
        ty: String,
        #[label("field access on non-struct value")]
        span: SourceSpan,
    },

    #[error("cannot write to immutable value")]
    #[diagnostic(
        code(E2006),
        help("declare the binding with 'let mut' or reach it through a mutable pointer")
    )]
    IncompatibleMutability {
        #[label("value is not mutable")]
        span: SourceSpan,
    },

    #[error("expected {expected} arguments, found {found}")]
    #[diagnostic(code(E2012))]
    WrongNumberOfArguments {
        expected: usize,
        found: usize,
        #[label("wrong number of arguments")]
        span: SourceSpan,
    },

    #[error("struct '{struct_name}' literal is missing field '{field}'")]
    #[diagnostic(code(E2013))]
    MissingField {
        struct_name: String,
        field: String,
        #[label("field not given")]
        span: SourceSpan,
    },

    #[error("cannot infer type of '{name}'")]
    #[diagnostic(code(E2043), help("add a type annotation"))]
    InferenceFailed {
        name: String,
        #[label("type cannot be inferred")]
        span: SourceSpan,
    },

    #[error("cannot call non-function type '{ty}'")]
    #[diagnostic(code(E2044))]
    UncallableType {
        ty: String,
        #[label("not a function")]
        span: SourceSpan,
    },

    #[error("cannot dereference non-pointer type '{ty}'")]
    #[diagnostic(code(E2045))]
    CannotDereferenceType {
        ty: String,
        #[label("not a pointer")]
        span: SourceSpan,
    },

    #[error("use of possibly uninitialized value")]
    #[diagnostic(code(E2050))]
    UninitializedUse {
        #[label("read before initialization")]
        span: SourceSpan,
    },

    #[error("function does not return a value on every path")]
    #[diagnostic(code(E2051))]
    MissingReturn {
        #[label("this path reaches the end without returning")]
        span: SourceSpan,
    },

    #[error("binding '{name}' does not need to be mutable")]
    #[diagnostic(code(W2052), severity(Warning))]
    UnusedMutability {
        name: String,
        #[label("written at most once")]
        span: SourceSpan,
    },

    #[error("internal invariant violated: {message}")]
    #[diagnostic(
        code(E9001),
        help("this is a bug in the compiler, not in the analyzed program")
    )]
    Internal {
        message: String,
        #[label("while analyzing this")]
        span: SourceSpan,
    },
}
