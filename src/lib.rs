//! NVRA - linear-scan register allocation for NVIDIA shader IR.
//!
//! Allocates physical registers for SSA-form shader functions on the NV50 and
//! NVC0 GPU generations: phis, copies and split/merge pseudo-ops are
//! coalesced into join classes, texture and store operands are bundled into
//! contiguous register ranges, and a linear scan assigns each class a
//! register without spilling.
//!
//! # Primary Usage
//!
//! ```ignore
//! use nvra::core::{RaOptions, TargetDesc};
//! use nvra::test_ir::parse_program;
//!
//! let mut program = parse_program(&text, TargetDesc::nvc0())?;
//! let stats = nvra::allocate_program(&mut program, RaOptions::default())?;
//! println!("{program}\n{stats}");
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - Shader IR: values, instructions, functions, CFG analyses
//! - [`core`] - Shared infrastructure (errors, target table, session)
//! - [`ra`] - Allocation passes and the per-program driver
//! - [`test_ir`] - Textual IR parser for tests and tools

pub mod core;
pub mod ir;
pub mod ra;
pub mod test_ir;

pub use core::{
    // Errors
    RaError, RaResult,
    // Configuration
    RaOptions, TargetDesc,
    // Session management
    CompilationSession, SessionStats,
};
pub use ir::{Function, Program};
pub use ra::{allocate_program, RegAlloc};
