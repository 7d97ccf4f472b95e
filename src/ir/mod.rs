// This module hosts the IR consumed and rewritten by the register allocator: typed ids,
// the object pool, values with def/use tracking, instructions with positional operand
// slots, functions with their blocks and intrusive instruction lists, CFG analyses, the
// program container and a textual printer. Ids are plain u32 newtypes so that passes
// can size bitsets and side tables directly from pool capacities.

//! Shader IR data structures.
//!
//! # Overview
//!
//! - [`Function`] owns a [`Pool`] of [`Value`]s and one of [`Instruction`]s.
//! - Blocks keep their instruction order as a doubly-linked list threaded
//!   through the instruction records.
//! - All operand writes go through [`Function`] so that every value's def and
//!   use lists mirror the operand slots.
//! - [`cfg`] provides reverse post-order, edge classes, dominators and edge
//!   splitting.

pub mod cfg;
pub mod function;
pub mod instruction;
pub mod pool;
pub mod print;
pub mod program;
pub mod value;

pub use function::{BasicBlock, Clobber, Edge, EdgeKind, Function};
pub use instruction::{CondCode, FlowTarget, InstKind, Instruction, Op, Src, TexInfo, TexTarget};
pub use pool::Pool;
pub use program::Program;
pub use value::{
    DataType, Modifier, PerRegFile, RegFile, Use, UseSlot, Value, ValueData, NUM_REG_FILES,
};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Index of a value in its function's value pool.
    ValueId,
    "%"
);
define_id!(
    /// Index of an instruction in its function's instruction pool.
    InstId,
    "i"
);
define_id!(BlockId, "BB:");
define_id!(FuncId, "fn");
