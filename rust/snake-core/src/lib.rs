//! Snakescript Core
//!
//! Shared type tags, runtime values, and the instruction set used by the compiler and the VM.

pub mod lir;
pub mod types;
pub mod values;
