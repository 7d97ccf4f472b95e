// This module provides the per-target configuration table consumed by the register
// allocator. Instead of branching on numeric chipset ids inside the passes, a TargetDesc
// carries everything that differs between GPU generations: register file sizes and
// allocation-unit granularity, the ordered list of coalescing passes with the
// instruction categories each one may join, and the strategy used to satisfy texture
// operand adjacency. It also answers the source-modifier support query used when
// folding modifiers into uses. RaOptions holds pass-level switches for verification
// and dumping.

//! Target description and allocator options.

use crate::core::error::{RaError, RaResult};
use crate::ir::{Modifier, Op, PerRegFile, RegFile};
use std::ops::BitOr;

/// GPU generation whose allocation rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Nv50,
    Nvc0,
}

/// How texture sources and results are made to occupy adjacent registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintStrategy {
    /// Copy every texture source into a private value and pad the definitions
    /// so each source shares a register with one result (NV50).
    PerSourceMove,
    /// Bundle consecutive sources through a `constraint` pseudo-op (NVC0).
    RangeConstraint,
}

/// Set of instruction categories a coalescing pass may join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JoinMask(u8);

impl JoinMask {
    pub const PHI: JoinMask = JoinMask(1 << 0);
    /// `union`, `split` and `merge` pseudo-ops.
    pub const UNION: JoinMask = JoinMask(1 << 1);
    pub const MOV: JoinMask = JoinMask(1 << 2);
    pub const TEX: JoinMask = JoinMask(1 << 3);
    pub const CONSTRAINT: JoinMask = JoinMask(1 << 4);

    pub fn contains(self, other: JoinMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for JoinMask {
    type Output = JoinMask;

    fn bitor(self, rhs: JoinMask) -> JoinMask {
        JoinMask(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDesc {
    pub chipset: u32,
    pub family: Family,
    /// Register file capacity in allocation units.
    file_size: PerRegFile<u32>,
    /// log2 of the allocation unit size in bytes.
    unit_log2: PerRegFile<u8>,
    /// Coalescing passes in the order they run.
    pub join_passes: Vec<JoinMask>,
    pub constraint_strategy: ConstraintStrategy,
}

impl TargetDesc {
    pub fn nv50() -> Self {
        Self {
            chipset: 0x50,
            family: Family::Nv50,
            file_size: PerRegFile::new_with(|f| match f {
                RegFile::Gpr => 128,
                RegFile::Predicate => 0,
                RegFile::Flags => 4,
                _ => 4,
            }),
            unit_log2: PerRegFile::new_with(Self::default_unit_log2),
            join_passes: vec![
                JoinMask::PHI,
                JoinMask::UNION | JoinMask::TEX,
                JoinMask::MOV,
            ],
            constraint_strategy: ConstraintStrategy::PerSourceMove,
        }
    }

    pub fn nvc0() -> Self {
        Self {
            chipset: 0xc0,
            family: Family::Nvc0,
            file_size: PerRegFile::new_with(|f| match f {
                RegFile::Gpr => 63,
                RegFile::Predicate => 7,
                RegFile::Flags => 1,
                _ => 1,
            }),
            unit_log2: PerRegFile::new_with(Self::default_unit_log2),
            join_passes: vec![
                JoinMask::PHI,
                JoinMask::UNION | JoinMask::CONSTRAINT,
                JoinMask::MOV,
            ],
            constraint_strategy: ConstraintStrategy::RangeConstraint,
        }
    }

    fn default_unit_log2(file: RegFile) -> u8 {
        match file {
            RegFile::Gpr | RegFile::Address => 2,
            _ => 0,
        }
    }

    /// Pick the rule set for a chipset id such as `0x84` or `0xc1`.
    pub fn from_chipset(chipset: u32) -> RaResult<Self> {
        let mut desc = match chipset {
            0x50..=0xaf => Self::nv50(),
            c if c >= 0xc0 => Self::nvc0(),
            _ => return Err(RaError::UnsupportedChipset { chipset }),
        };
        desc.chipset = chipset;
        Ok(desc)
    }

    /// Override a file's capacity, in units.
    pub fn with_file_size(mut self, file: RegFile, units: u32) -> Self {
        self.file_size[file] = units.min(256);
        self
    }

    pub fn file_size(&self, file: RegFile) -> u32 {
        if file.is_register() {
            self.file_size[file]
        } else {
            0
        }
    }

    pub fn unit_log2(&self, file: RegFile) -> u8 {
        if file.is_register() {
            self.unit_log2[file]
        } else {
            0
        }
    }

    /// Modifiers the hardware can apply to source `s` of `op`.
    pub fn supported_modifiers(&self, op: Op, s: usize) -> Modifier {
        let neg_abs = Modifier::NEG.union(Modifier::ABS);
        match op {
            Op::Add | Op::Sub | Op::Min | Op::Max | Op::Set if s < 2 => neg_abs,
            Op::Mul if s < 2 => Modifier::NEG,
            Op::Mad if s < 3 => Modifier::NEG,
            Op::Cvt if s == 0 => neg_abs.union(Modifier::SAT),
            Op::And | Op::Or | Op::Xor if s < 2 && self.family == Family::Nvc0 => Modifier::NOT,
            _ => Modifier::NONE,
        }
    }

    pub fn is_mod_supported(&self, op: Op, s: usize, modifier: Modifier) -> bool {
        self.supported_modifiers(op, s).contains(modifier)
    }
}

/// Pass-level switches for a register allocation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaOptions {
    /// Check for interference after allocation.
    pub verify: bool,
    /// Log the function and its live intervals at debug level.
    pub dump: bool,
}

impl Default for RaOptions {
    fn default() -> Self {
        Self {
            verify: cfg!(debug_assertions),
            dump: false,
        }
    }
}
