// This module defines instructions: the opcode set, the closed InstKind sum type that
// carries per-kind payloads (texture parameters, branch/call targets, phi provenance),
// source operands with modifiers and indirect sub-operands, and the Instruction record.
// Definition and source lists are positional: removing an operand nulls its slot so
// that operand indices keep their meaning (operand 0 of a texture fetch is always the
// first coordinate). Instructions are linked into their block through prev/next ids.

//! Instructions and operands.

use super::value::{DataType, Modifier};
use super::{BlockId, FuncId, InstId, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Nop,
    Mov,
    Add,
    Sub,
    Mul,
    Mad,
    Min,
    Max,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Set,
    Cvt,
    Ld,
    St,
    Export,
    Tex,
    Txb,
    Txl,
    Txf,
    Txq,
    Txd,
    Txg,
    Phi,
    Union,
    Split,
    Merge,
    Constraint,
    Bra,
    Call,
    Ret,
    Exit,
}

impl Op {
    pub fn name(self) -> &'static str {
        match self {
            Op::Nop => "nop",
            Op::Mov => "mov",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Mad => "mad",
            Op::Min => "min",
            Op::Max => "max",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::Not => "not",
            Op::Shl => "shl",
            Op::Shr => "shr",
            Op::Set => "set",
            Op::Cvt => "cvt",
            Op::Ld => "ld",
            Op::St => "st",
            Op::Export => "export",
            Op::Tex => "tex",
            Op::Txb => "txb",
            Op::Txl => "txl",
            Op::Txf => "txf",
            Op::Txq => "txq",
            Op::Txd => "txd",
            Op::Txg => "txg",
            Op::Phi => "phi",
            Op::Union => "union",
            Op::Split => "split",
            Op::Merge => "merge",
            Op::Constraint => "constraint",
            Op::Bra => "bra",
            Op::Call => "call",
            Op::Ret => "ret",
            Op::Exit => "exit",
        }
    }

    pub fn from_name(s: &str) -> Option<Op> {
        Some(match s {
            "nop" => Op::Nop,
            "mov" => Op::Mov,
            "add" => Op::Add,
            "sub" => Op::Sub,
            "mul" => Op::Mul,
            "mad" => Op::Mad,
            "min" => Op::Min,
            "max" => Op::Max,
            "and" => Op::And,
            "or" => Op::Or,
            "xor" => Op::Xor,
            "not" => Op::Not,
            "shl" => Op::Shl,
            "shr" => Op::Shr,
            "set" => Op::Set,
            "cvt" => Op::Cvt,
            "ld" => Op::Ld,
            "st" => Op::St,
            "export" => Op::Export,
            "tex" => Op::Tex,
            "txb" => Op::Txb,
            "txl" => Op::Txl,
            "txf" => Op::Txf,
            "txq" => Op::Txq,
            "txd" => Op::Txd,
            "txg" => Op::Txg,
            "phi" => Op::Phi,
            "union" => Op::Union,
            "split" => Op::Split,
            "merge" => Op::Merge,
            "constraint" => Op::Constraint,
            "bra" | "br" => Op::Bra,
            "call" => Op::Call,
            "ret" => Op::Ret,
            "exit" => Op::Exit,
            _ => return None,
        })
    }

    pub fn is_tex(self) -> bool {
        matches!(
            self,
            Op::Tex | Op::Txb | Op::Txl | Op::Txf | Op::Txq | Op::Txd | Op::Txg
        )
    }

    pub fn is_flow(self) -> bool {
        matches!(self, Op::Bra | Op::Call | Op::Ret | Op::Exit)
    }

    /// Ops that end a basic block.
    pub fn is_terminator(self) -> bool {
        matches!(self, Op::Bra | Op::Ret | Op::Exit)
    }

    /// Bookkeeping ops that never reach the emitter as real code.
    pub fn is_pseudo(self) -> bool {
        matches!(
            self,
            Op::Phi | Op::Union | Op::Split | Op::Merge | Op::Constraint
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexTarget {
    Tex1D,
    Tex2D,
    Tex3D,
    Cube,
    Tex2DArray,
    Tex2DShadow,
}

impl TexTarget {
    /// Number of coordinate arguments the target consumes.
    pub fn arg_count(self) -> usize {
        match self {
            TexTarget::Tex1D => 1,
            TexTarget::Tex2D => 2,
            TexTarget::Tex3D | TexTarget::Cube => 3,
            TexTarget::Tex2DArray | TexTarget::Tex2DShadow => 3,
        }
    }

    pub fn is_array(self) -> bool {
        matches!(self, TexTarget::Tex2DArray)
    }

    pub fn name(self) -> &'static str {
        match self {
            TexTarget::Tex1D => "1d",
            TexTarget::Tex2D => "2d",
            TexTarget::Tex3D => "3d",
            TexTarget::Cube => "cube",
            TexTarget::Tex2DArray => "2d_array",
            TexTarget::Tex2DShadow => "shadow",
        }
    }

    pub fn from_name(s: &str) -> Option<TexTarget> {
        Some(match s {
            "1d" => TexTarget::Tex1D,
            "2d" => TexTarget::Tex2D,
            "3d" => TexTarget::Tex3D,
            "cube" => TexTarget::Cube,
            "2d_array" => TexTarget::Tex2DArray,
            "shadow" => TexTarget::Tex2DShadow,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexInfo {
    pub target: TexTarget,
    /// Component write mask; bit `c` set when component `c` is written.
    pub mask: u8,
    /// Source index of an indirect resource handle.
    pub r_indirect_src: Option<u8>,
    /// Source index of an indirect sampler handle.
    pub s_indirect_src: Option<u8>,
    pub use_offsets: bool,
}

impl TexInfo {
    pub fn new(target: TexTarget) -> Self {
        Self {
            target,
            mask: 0xf,
            r_indirect_src: None,
            s_indirect_src: None,
            use_offsets: false,
        }
    }
}

/// Comparison performed by `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CondCode {
    Lt,
    Le,
    #[default]
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CondCode {
    pub fn name(self) -> &'static str {
        match self {
            CondCode::Lt => "lt",
            CondCode::Le => "le",
            CondCode::Eq => "eq",
            CondCode::Ne => "ne",
            CondCode::Ge => "ge",
            CondCode::Gt => "gt",
        }
    }

    pub fn from_name(s: &str) -> Option<CondCode> {
        Some(match s {
            "lt" => CondCode::Lt,
            "le" => CondCode::Le,
            "eq" => CondCode::Eq,
            "ne" => CondCode::Ne,
            "ge" => CondCode::Ge,
            "gt" => CondCode::Gt,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowTarget {
    None,
    Block(BlockId),
    Func(FuncId),
}

/// Kind-specific payload of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    Plain,
    Tex(TexInfo),
    Flow(FlowTarget),
    Compare(CondCode),
    /// Predecessor block each phi source flows in from, parallel to the sources.
    Phi(Vec<BlockId>),
}

/// A source operand slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Src {
    pub value: Option<ValueId>,
    pub modifier: Modifier,
    pub indirect: [Option<ValueId>; 2],
}

impl Src {
    pub fn new(value: ValueId) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn with_modifier(value: ValueId, modifier: Modifier) -> Self {
        Self {
            value: Some(value),
            modifier,
            indirect: [None; 2],
        }
    }

    pub fn is_indirect(&self, dim: usize) -> bool {
        self.indirect[dim].is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub op: Op,
    /// Result type.
    pub ty: DataType,
    pub kind: InstKind,
    pub(crate) defs: Vec<Option<ValueId>>,
    pub(crate) srcs: Vec<Src>,
    pub(crate) pred: Option<ValueId>,
    /// Position in the function-wide instruction order, set by numbering.
    pub serial: u32,
    pub(crate) block: Option<BlockId>,
    pub(crate) prev: Option<InstId>,
    pub(crate) next: Option<InstId>,
}

impl Instruction {
    pub fn new(op: Op, ty: DataType) -> Self {
        let kind = match op {
            Op::Phi => InstKind::Phi(Vec::new()),
            Op::Set => InstKind::Compare(CondCode::default()),
            op if op.is_flow() => InstKind::Flow(FlowTarget::None),
            _ => InstKind::Plain,
        };
        Self {
            op,
            ty,
            kind,
            defs: Vec::new(),
            srcs: Vec::new(),
            pred: None,
            serial: 0,
            block: None,
            prev: None,
            next: None,
        }
    }

    pub fn new_tex(op: Op, ty: DataType, info: TexInfo) -> Self {
        debug_assert!(op.is_tex());
        let mut i = Self::new(op, ty);
        i.kind = InstKind::Tex(info);
        i
    }

    pub fn new_flow(op: Op, target: FlowTarget) -> Self {
        let mut i = Self::new(op, DataType::None);
        i.kind = InstKind::Flow(target);
        i
    }

    pub fn def(&self, d: usize) -> Option<ValueId> {
        self.defs.get(d).copied().flatten()
    }

    pub fn src(&self, s: usize) -> Option<ValueId> {
        self.srcs.get(s).and_then(|src| src.value)
    }

    pub fn src_ref(&self, s: usize) -> Option<&Src> {
        self.srcs.get(s)
    }

    pub fn def_exists(&self, d: usize) -> bool {
        self.def(d).is_some()
    }

    pub fn src_exists(&self, s: usize) -> bool {
        self.src(s).is_some()
    }

    /// Number of leading definitions that exist.
    pub fn def_count(&self) -> usize {
        self.defs.iter().take_while(|d| d.is_some()).count()
    }

    /// Number of leading sources that exist.
    pub fn src_count(&self) -> usize {
        self.srcs.iter().take_while(|s| s.value.is_some()).count()
    }

    /// All existing definitions in slot order.
    pub fn defs(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.defs.iter().filter_map(|d| *d)
    }

    /// All existing source values in slot order.
    pub fn srcs(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.srcs.iter().filter_map(|s| s.value)
    }

    /// Every value read by the instruction: sources, indirect addresses and
    /// the predicate.
    pub fn reads(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.srcs
            .iter()
            .flat_map(|s| std::iter::once(s.value).chain(s.indirect))
            .flatten()
            .chain(self.pred)
    }

    pub fn predicate(&self) -> Option<ValueId> {
        self.pred
    }

    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    pub fn next(&self) -> Option<InstId> {
        self.next
    }

    pub fn prev(&self) -> Option<InstId> {
        self.prev
    }

    /// Whether the instruction pins several results together.
    pub fn constrained_defs(&self) -> bool {
        self.def_exists(1) || self.op == Op::Union
    }

    /// Whether the results must sit in consecutive registers.
    pub fn vector_defs(&self) -> bool {
        self.def_count() >= 2 && (self.op == Op::Constraint || self.op.is_tex())
    }

    pub fn tex(&self) -> Option<&TexInfo> {
        match &self.kind {
            InstKind::Tex(info) => Some(info),
            _ => None,
        }
    }

    pub fn tex_mut(&mut self) -> Option<&mut TexInfo> {
        match &mut self.kind {
            InstKind::Tex(info) => Some(info),
            _ => None,
        }
    }

    pub fn cond(&self) -> Option<CondCode> {
        match self.kind {
            InstKind::Compare(cc) => Some(cc),
            _ => None,
        }
    }

    pub fn flow_target(&self) -> Option<FlowTarget> {
        match self.kind {
            InstKind::Flow(t) => Some(t),
            _ => None,
        }
    }

    /// Predecessor blocks of a phi, parallel to its sources.
    pub fn phi_preds(&self) -> Option<&[BlockId]> {
        match &self.kind {
            InstKind::Phi(preds) => Some(preds),
            _ => None,
        }
    }

    pub fn phi_preds_mut(&mut self) -> Option<&mut Vec<BlockId>> {
        match &mut self.kind {
            InstKind::Phi(preds) => Some(preds),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_slots() {
        let mut i = Instruction::new(Op::Tex, DataType::F32);
        i.srcs = vec![Src::new(ValueId(1)), Src::default(), Src::new(ValueId(3))];
        i.defs = vec![Some(ValueId(4)), Some(ValueId(5))];

        assert_eq!(i.src_count(), 1);
        assert!(i.src_exists(2));
        assert_eq!(i.srcs().collect::<Vec<_>>(), vec![ValueId(1), ValueId(3)]);
        assert_eq!(i.def_count(), 2);
        assert!(i.constrained_defs());
    }

    #[test]
    fn test_reads_include_indirect_and_predicate() {
        let mut i = Instruction::new(Op::Ld, DataType::U64);
        let mut src = Src::new(ValueId(0));
        src.indirect[0] = Some(ValueId(1));
        i.srcs.push(src);
        i.pred = Some(ValueId(2));
        assert_eq!(
            i.reads().collect::<Vec<_>>(),
            vec![ValueId(0), ValueId(1), ValueId(2)]
        );
    }

    #[test]
    fn test_kind_follows_op() {
        assert!(matches!(Instruction::new(Op::Phi, DataType::U32).kind, InstKind::Phi(_)));
        assert!(Instruction::new(Op::Bra, DataType::None).flow_target().is_some());
        assert!(Instruction::new(Op::Add, DataType::U32).tex().is_none());
        assert_eq!(Op::from_name("br"), Some(Op::Bra));
    }
}
