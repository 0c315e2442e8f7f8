// src/lib.rs
pub mod errors;
pub mod frontend;
pub mod sema;
