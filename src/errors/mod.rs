// src/errors/mod.rs
//! Structured diagnostics for the Tarn semantic core.
//!
//! Errors use miette for rendering; every variant carries a stable code and
//! one or more labeled source spans. Passes never fail fast: diagnostics are
//! appended to a [`Diagnostics`] sink and analysis continues.

pub mod report;
pub mod sema;

pub use report::{render_to_stderr, render_to_string};
pub use sema::SemaError;

use miette::{Diagnostic, Severity};

/// Append-only diagnostics sink.
///
/// Within one function's analysis, entries arrive in deterministic program
/// order. The sink itself carries no source text; callers attach it when
/// rendering.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<SemaError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SemaError) {
        tracing::debug!(%error, "diagnostic");
        self.entries.push(error);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemaError> {
        self.entries.iter()
    }

    /// True if any entry is an error (warnings alone don't count).
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|e| !matches!(e.severity(), Some(Severity::Warning)))
    }

    pub fn into_vec(self) -> Vec<SemaError> {
        self.entries
    }
}
