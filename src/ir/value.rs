// This module defines the storage-level vocabulary of the IR: register files,
// data types, source modifiers and the Value record itself. A Value is a typed
// storage location candidate. Register-file values (GPR, predicate, flags, address)
// receive a physical id from the allocator; immediates and memory symbols live in
// files that need no id. Each value keeps its defining instructions and the exact
// operand slots that read it, so passes can rewrite uses positionally.

//! Values, register files and data types.

use super::InstId;
use std::fmt;
use std::ops::{Index, IndexMut, Mul};

/// Storage class of a value.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegFile {
    /// General-purpose 32-bit registers.
    Gpr = 0,
    /// Predicate registers (1 bit per thread).
    Predicate = 1,
    /// Condition-code registers.
    Flags = 2,
    /// Address registers used for indirect addressing.
    Address = 3,
    Immediate = 4,
    MemConst = 5,
    MemShared = 6,
    MemGlobal = 7,
    MemLocal = 8,
    /// Shader output slots written by `export`.
    ShaderOut = 9,
}

/// Number of files that hold physically allocated registers.
pub const NUM_REG_FILES: usize = 4;

impl RegFile {
    pub const REGISTER_FILES: [RegFile; NUM_REG_FILES] = [
        RegFile::Gpr,
        RegFile::Predicate,
        RegFile::Flags,
        RegFile::Address,
    ];

    /// Whether values of this file are given a physical register id.
    pub fn is_register(self) -> bool {
        (self as u8) < NUM_REG_FILES as u8
    }

    pub fn is_memory(self) -> bool {
        matches!(
            self,
            RegFile::MemConst
                | RegFile::MemShared
                | RegFile::MemGlobal
                | RegFile::MemLocal
                | RegFile::ShaderOut
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            RegFile::Gpr => "gpr",
            RegFile::Predicate => "pred",
            RegFile::Flags => "flags",
            RegFile::Address => "addr",
            RegFile::Immediate => "imm",
            RegFile::MemConst => "c",
            RegFile::MemShared => "s",
            RegFile::MemGlobal => "g",
            RegFile::MemLocal => "l",
            RegFile::ShaderOut => "o",
        }
    }

    /// Register name prefix used when printing assigned ids.
    pub fn reg_prefix(self) -> &'static str {
        match self {
            RegFile::Gpr => "$r",
            RegFile::Predicate => "$p",
            RegFile::Flags => "$c",
            RegFile::Address => "$a",
            _ => "",
        }
    }
}

impl fmt::Display for RegFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-register-file storage, indexed by [`RegFile`].
///
/// Only the physically allocated files have a slot; indexing with a
/// non-register file is a programming error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerRegFile<T> {
    per_file: [T; NUM_REG_FILES],
}

impl<T> PerRegFile<T> {
    pub fn new_with<F: Fn(RegFile) -> T>(f: F) -> Self {
        PerRegFile {
            per_file: [
                f(RegFile::Gpr),
                f(RegFile::Predicate),
                f(RegFile::Flags),
                f(RegFile::Address),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegFile, &T)> + '_ {
        RegFile::REGISTER_FILES.iter().copied().zip(self.per_file.iter())
    }
}

impl<T: Default> Default for PerRegFile<T> {
    fn default() -> Self {
        PerRegFile {
            per_file: Default::default(),
        }
    }
}

impl<T> Index<RegFile> for PerRegFile<T> {
    type Output = T;

    fn index(&self, file: RegFile) -> &T {
        assert!(file.is_register(), "{file} has no register slot");
        &self.per_file[file as usize]
    }
}

impl<T> IndexMut<RegFile> for PerRegFile<T> {
    fn index_mut(&mut self, file: RegFile) -> &mut T {
        assert!(file.is_register(), "{file} has no register slot");
        &mut self.per_file[file as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    #[default]
    None,
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
    F32,
    U64,
    S64,
    F64,
    B96,
    B128,
}

impl DataType {
    /// Size in bytes; zero for `None`.
    pub fn size(self) -> u8 {
        match self {
            DataType::None => 0,
            DataType::U8 | DataType::S8 => 1,
            DataType::U16 | DataType::S16 => 2,
            DataType::U32 | DataType::S32 | DataType::F32 => 4,
            DataType::U64 | DataType::S64 | DataType::F64 => 8,
            DataType::B96 => 12,
            DataType::B128 => 16,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Unsigned/bit type of the given byte size.
    pub fn of_size(size: u8) -> DataType {
        match size {
            1 => DataType::U8,
            2 => DataType::U16,
            4 => DataType::U32,
            8 => DataType::U64,
            12 => DataType::B96,
            16 => DataType::B128,
            _ => DataType::None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::None => "",
            DataType::U8 => "u8",
            DataType::S8 => "s8",
            DataType::U16 => "u16",
            DataType::S16 => "s16",
            DataType::U32 => "u32",
            DataType::S32 => "s32",
            DataType::F32 => "f32",
            DataType::U64 => "u64",
            DataType::S64 => "s64",
            DataType::F64 => "f64",
            DataType::B96 => "b96",
            DataType::B128 => "b128",
        }
    }

    pub fn from_name(s: &str) -> Option<DataType> {
        Some(match s {
            "u8" => DataType::U8,
            "s8" => DataType::S8,
            "u16" => DataType::U16,
            "s16" => DataType::S16,
            "u32" => DataType::U32,
            "s32" => DataType::S32,
            "f32" => DataType::F32,
            "u64" => DataType::U64,
            "s64" => DataType::S64,
            "f64" => DataType::F64,
            "b96" => DataType::B96,
            "b128" => DataType::B128,
            _ => return None,
        })
    }
}

/// Unary source modifier bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifier(u8);

impl Modifier {
    pub const NONE: Modifier = Modifier(0);
    pub const ABS: Modifier = Modifier(1 << 0);
    pub const NEG: Modifier = Modifier(1 << 1);
    pub const SAT: Modifier = Modifier(1 << 2);
    pub const NOT: Modifier = Modifier(1 << 3);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Modifier) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: Modifier) -> Modifier {
        Modifier(self.0 | other.0)
    }
}

/// Composition of modifiers: `outer * inner` is the modifier equivalent to
/// applying `inner` first and then `outer`.
impl Mul for Modifier {
    type Output = Modifier;

    fn mul(self, inner: Modifier) -> Modifier {
        let mut b = inner.0;
        // |(-x)| == |x|
        if self.0 & Modifier::ABS.0 != 0 {
            b &= !Modifier::NEG.0;
        }
        let toggled = (self.0 ^ b) & (Modifier::NOT.0 | Modifier::NEG.0);
        let sticky = (self.0 | inner.0) & (Modifier::ABS.0 | Modifier::SAT.0);
        Modifier(toggled | sticky)
    }
}

/// Which operand slot of an instruction reads a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseSlot {
    Src(u8),
    /// Indirect address sub-operand `dim` of source `s`.
    Indirect(u8, u8),
    Pred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    pub inst: InstId,
    pub slot: UseSlot,
}

/// Payload of non-register values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ValueData {
    #[default]
    None,
    /// Immediate bit pattern.
    Imm(u64),
    /// Byte offset of a memory symbol.
    Offset(i32),
}

#[derive(Debug, Clone)]
pub struct Value {
    pub file: RegFile,
    /// Size in bytes.
    pub size: u8,
    pub ty: DataType,
    /// Physical register id in units of the file, `-1` while unassigned.
    pub reg: i32,
    pub data: ValueData,
    pub name: Option<String>,
    pub(crate) defs: Vec<InstId>,
    pub(crate) uses: Vec<Use>,
}

impl Value {
    pub fn new(file: RegFile, size: u8) -> Self {
        Self {
            file,
            size,
            ty: DataType::of_size(size),
            reg: -1,
            data: ValueData::None,
            name: None,
            defs: Vec::new(),
            uses: Vec::new(),
        }
    }

    pub fn immediate(bits: u64, ty: DataType) -> Self {
        let mut v = Self::new(RegFile::Immediate, ty.size().max(4));
        v.ty = ty;
        v.data = ValueData::Imm(bits);
        v
    }

    pub fn symbol(file: RegFile, offset: i32, ty: DataType) -> Self {
        debug_assert!(file.is_memory());
        let mut v = Self::new(file, ty.size().max(4));
        v.ty = ty;
        v.data = ValueData::Offset(offset);
        v
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether the value takes part in register allocation.
    pub fn is_lvalue(&self) -> bool {
        self.file.is_register()
    }

    pub fn is_assigned(&self) -> bool {
        self.reg >= 0
    }

    pub fn defs(&self) -> &[InstId] {
        &self.defs
    }

    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    pub fn ref_count(&self) -> usize {
        self.uses.len()
    }

    /// The defining instruction if the value is defined exactly once.
    pub fn unique_def(&self) -> Option<InstId> {
        match self.defs.as_slice() {
            [d] => Some(*d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_composition() {
        assert_eq!(Modifier::NEG * Modifier::NEG, Modifier::NONE);
        assert_eq!(Modifier::ABS * Modifier::NEG, Modifier::ABS);
        assert_eq!(Modifier::NEG * Modifier::ABS, Modifier::NEG.union(Modifier::ABS));
        assert_eq!(Modifier::NOT * Modifier::NOT, Modifier::NONE);
        assert_eq!(Modifier::SAT * Modifier::NONE, Modifier::SAT);
    }

    #[test]
    fn test_per_reg_file_indexing() {
        let mut sizes = PerRegFile::new_with(|f| f as u32);
        sizes[RegFile::Address] += 10;
        assert_eq!(sizes[RegFile::Gpr], 0);
        assert_eq!(sizes[RegFile::Address], 13);
        assert_eq!(sizes.iter().count(), NUM_REG_FILES);
    }

    #[test]
    #[should_panic]
    fn test_per_reg_file_rejects_memory() {
        let sizes: PerRegFile<u32> = PerRegFile::default();
        let _ = sizes[RegFile::MemConst];
    }

    #[test]
    fn test_value_kinds() {
        let v = Value::new(RegFile::Gpr, 8);
        assert!(v.is_lvalue());
        assert_eq!(v.ty, DataType::U64);
        assert!(!v.is_assigned());

        let imm = Value::immediate(1, DataType::F32);
        assert!(!imm.is_lvalue());
        assert_eq!(imm.data, ValueData::Imm(1));
    }
}
