//! Snakescript VM: a stack-based virtual machine for compiled Snakescript.

pub mod vm;

pub use vm::{Step, VmError, VmOptions, VM};
