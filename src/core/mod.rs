// This module gathers the infrastructure shared by every allocator pass: the error
// taxonomy (RaError/RaResult), the target description table that replaces chipset
// branching (file sizes, unit granularity, coalescing pass list, texture constraint
// strategy), the session that owns the scratch arena and statistics, and the small
// fixed-capacity bitset used for liveness sets.

//! Core allocator infrastructure.
//!
//! ## Errors (`error`)
//! - [`RaError`] variants for resource exhaustion and consistency failures
//!
//! ## Target (`target`)
//! - [`TargetDesc`] per-generation configuration
//! - [`RaOptions`] pass switches
//!
//! ## Session (`session`)
//! - Arena allocation using `bumpalo`
//! - [`SessionStats`] counters

pub mod bitset;
pub mod error;
pub mod session;
pub mod target;

pub use bitset::BitSet;
pub use error::{RaError, RaResult};
pub use session::{CompilationSession, SessionStats};
pub use target::{ConstraintStrategy, Family, JoinMask, RaOptions, TargetDesc};
