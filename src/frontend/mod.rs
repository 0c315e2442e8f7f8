// src/frontend/mod.rs
//! Interfaces to the parsing front end.
//!
//! The semantic core consumes an already-parsed, already-name-resolved
//! expression tree. This module defines that tree plus source spans;
//! producing it (lexing, parsing, `use` resolution) happens upstream.

pub mod ast;

pub use ast::{Expr, ExprKind, FuncDecl, Param, TypeExpr};

/// Byte range into the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both inputs.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    #[inline]
    pub fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.start as usize, span.len() as usize).into()
    }
}
