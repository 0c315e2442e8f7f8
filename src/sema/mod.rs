// src/sema/mod.rs
//! Semantic analysis for Tarn function bodies.
//!
//! The pipeline runs four passes per function, each feeding the next through
//! the lowered [`cfg::FuncBody`]:
//!
//! 1. [`builder`] lowers the expression tree to a control-flow graph of
//!    storage mutations over typed registers.
//! 2. [`infer`] runs unification sweeps over the graph until register types
//!    stop changing.
//! 3. [`check`] validates every storage mutation against the final types,
//!    without mutating them.
//! 4. [`init`] walks the graph flow-sensitively for definite initialization
//!    and mutability.
//!
//! Passes never abort on the first problem; they record diagnostics in a
//! shared [`Diagnostics`](crate::errors::Diagnostics) sink and keep going.

pub mod builder;
pub mod cfg;
pub mod check;
pub mod infer;
pub mod init;
pub mod registry;
pub mod types;

pub use cfg::{FuncBody, Place, RegisterId, SegmentId};
pub use registry::{FuncId, Registry, StructId};
pub use types::Type;

use crate::errors::Diagnostics;
use crate::frontend::FuncDecl;

/// Analyze one function body against an already-populated registry.
///
/// Always returns a body, even in the presence of errors; its types may
/// contain `Type::Error` where analysis gave up locally.
#[tracing::instrument(skip(registry, decl, diags), fields(func = %decl.name))]
pub fn analyze_function(
    registry: &Registry,
    decl: &FuncDecl,
    diags: &mut Diagnostics,
) -> FuncBody {
    let mut body = builder::lower_function(registry, decl, diags);
    infer::run(&mut body, registry);
    check::run(&body, registry, diags);
    init::run(&body, registry, diags);
    body
}

/// Register every declaration's signature, then analyze each body.
///
/// Signatures go in first so bodies can call functions declared later in the
/// program.
pub fn analyze_program(
    registry: &mut Registry,
    decls: &[FuncDecl],
    diags: &mut Diagnostics,
) -> Vec<FuncBody> {
    for decl in decls {
        registry.register_func(decl, diags);
    }
    decls
        .iter()
        .map(|decl| analyze_function(registry, decl, diags))
        .collect()
}
