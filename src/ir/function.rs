// This module implements Function and BasicBlock, the owners of the instruction graph
// the register allocator transforms in place. A function owns two pools (values and
// instructions), its blocks with CFG edges, the declared inputs/outputs, and the
// results of allocation (per-file register high-water mark and clobbered slots).
// Instructions are kept in per-block intrusive doubly-linked lists whose links live in
// the instruction records, giving O(1) insert-before/after and removal while a pass
// walks the list. Every operand mutation goes through Function so the def and use
// lists on values always mirror the operand slots.

//! Functions, basic blocks and operand bookkeeping.

use super::instruction::{FlowTarget, Instruction, Src};
use super::pool::Pool;
use super::value::{Modifier, PerRegFile, RegFile, Use, UseSlot, Value};
use super::{BlockId, InstId, ValueId};
use crate::core::target::TargetDesc;

/// CFG edge classification from a depth-first walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Not yet classified.
    Dummy,
    Tree,
    Forward,
    Back,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub target: BlockId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub name: String,
    pub(crate) head: Option<InstId>,
    pub(crate) tail: Option<InstId>,
    pub(crate) succs: Vec<Edge>,
    pub(crate) preds: Vec<BlockId>,
}

impl BasicBlock {
    fn new(name: String) -> Self {
        Self {
            name,
            head: None,
            tail: None,
            succs: Vec::new(),
            preds: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn succ_edges(&self) -> &[Edge] {
        &self.succs
    }

    pub fn succs(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.succs.iter().map(|e| e.target)
    }

    pub fn preds(&self) -> &[BlockId] {
        &self.preds
    }
}

/// A physical register slot written by a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Clobber {
    pub file: RegFile,
    pub id: i32,
    pub size: u8,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub(crate) values: Pool<Value>,
    pub(crate) insts: Pool<Instruction>,
    pub(crate) blocks: Vec<BasicBlock>,
    pub entry: BlockId,
    /// Block that leaves the function; outputs are live out of it.
    pub exit: Option<BlockId>,
    /// Values defined on function entry.
    pub ins: Vec<ValueId>,
    /// Values live at function exit.
    pub outs: Vec<ValueId>,
    /// Register slots written by this function, filled after allocation.
    pub clobbers: Vec<Clobber>,
    /// Highest register unit used per file, `-1` if none.
    pub max_reg: PerRegFile<i32>,
    pub loop_nesting_bound: u32,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        let mut func = Self {
            name: name.into(),
            values: Pool::new(),
            insts: Pool::new(),
            blocks: Vec::new(),
            entry: BlockId(0),
            exit: None,
            ins: Vec::new(),
            outs: Vec::new(),
            clobbers: Vec::new(),
            max_reg: PerRegFile::new_with(|_| -1),
            loop_nesting_bound: 0,
        };
        func.entry = func.add_block("entry");
        func
    }

    // ---------------------------------------------------------------------
    // Blocks and edges
    // ---------------------------------------------------------------------

    pub fn add_block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(name.into()));
        id
    }

    pub fn block(&self, b: BlockId) -> &BasicBlock {
        &self.blocks[b.index()]
    }

    pub fn block_mut(&mut self, b: BlockId) -> &mut BasicBlock {
        &mut self.blocks[b.index()]
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn find_block(&self, name: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.name == name)
            .map(|i| BlockId(i as u32))
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from.index()].succs.push(Edge {
            target: to,
            kind: EdgeKind::Dummy,
        });
        self.blocks[to.index()].preds.push(from);
    }

    /// Redirect the edge `from -> old` to `from -> new`, keeping its position
    /// in the successor list.
    pub(crate) fn retarget_edge(&mut self, from: BlockId, old: BlockId, new: BlockId, kind: EdgeKind) {
        if let Some(edge) = self.blocks[from.index()]
            .succs
            .iter_mut()
            .find(|e| e.target == old)
        {
            edge.target = new;
            edge.kind = kind;
        }
        let preds = &mut self.blocks[old.index()].preds;
        if let Some(pos) = preds.iter().position(|&p| p == from) {
            preds.remove(pos);
        }
        self.blocks[new.index()].preds.push(from);
    }

    // ---------------------------------------------------------------------
    // Values
    // ---------------------------------------------------------------------

    pub fn new_value(&mut self, value: Value) -> ValueId {
        ValueId(self.values.acquire(value))
    }

    /// Fresh register value with the same file and size as `like`.
    pub fn new_lvalue_like(&mut self, like: ValueId) -> ValueId {
        let src = self.value(like);
        let mut v = Value::new(src.file, src.size);
        v.ty = src.ty;
        self.new_value(v)
    }

    pub fn value(&self, v: ValueId) -> &Value {
        self.values
            .get(v.0)
            .unwrap_or_else(|| panic!("dangling value %{}", v.0))
    }

    pub fn value_mut(&mut self, v: ValueId) -> &mut Value {
        self.values
            .get_mut(v.0)
            .unwrap_or_else(|| panic!("dangling value %{}", v.0))
    }

    /// Bound on value indices, used to size per-value tables.
    pub fn num_value_slots(&self) -> usize {
        self.values.capacity()
    }

    pub fn values(&self) -> impl Iterator<Item = (ValueId, &Value)> + '_ {
        self.values.iter().map(|(i, v)| (ValueId(i), v))
    }

    /// Ids of all values living in a register file.
    pub fn lvalues(&self) -> Vec<ValueId> {
        self.values()
            .filter(|(_, v)| v.is_lvalue())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn find_value(&self, name: &str) -> Option<ValueId> {
        self.values()
            .find(|(_, v)| v.name.as_deref() == Some(name))
            .map(|(id, _)| id)
    }

    /// The instruction that defines `v`, if it has exactly one.
    pub fn unique_def(&self, v: ValueId) -> Option<InstId> {
        self.value(v).unique_def()
    }

    // ---------------------------------------------------------------------
    // Instructions
    // ---------------------------------------------------------------------

    /// Register an unlinked instruction, recording the operands it already
    /// carries in the def/use lists.
    pub fn new_inst(&mut self, inst: Instruction) -> InstId {
        let id = InstId(self.insts.acquire(inst));
        let (defs, uses) = {
            let inst = self.inst(id);
            let defs: Vec<ValueId> = inst.defs().collect();
            let mut uses = Vec::new();
            for (s, src) in inst.srcs.iter().enumerate() {
                if let Some(v) = src.value {
                    uses.push((v, UseSlot::Src(s as u8)));
                }
                for (dim, ind) in src.indirect.iter().enumerate() {
                    if let Some(v) = ind {
                        uses.push((*v, UseSlot::Indirect(s as u8, dim as u8)));
                    }
                }
            }
            if let Some(p) = inst.pred {
                uses.push((p, UseSlot::Pred));
            }
            (defs, uses)
        };
        for v in defs {
            self.value_mut(v).defs.push(id);
        }
        for (v, slot) in uses {
            self.value_mut(v).uses.push(Use { inst: id, slot });
        }
        id
    }

    pub fn inst(&self, i: InstId) -> &Instruction {
        self.insts
            .get(i.0)
            .unwrap_or_else(|| panic!("dangling instruction {}", i.0))
    }

    pub fn inst_mut(&mut self, i: InstId) -> &mut Instruction {
        self.insts
            .get_mut(i.0)
            .unwrap_or_else(|| panic!("dangling instruction {}", i.0))
    }

    pub fn num_insts(&self) -> usize {
        self.insts.len()
    }

    pub fn insts(&self) -> impl Iterator<Item = (InstId, &Instruction)> + '_ {
        self.insts.iter().map(|(i, inst)| (InstId(i), inst))
    }

    fn drop_use(&mut self, v: ValueId, u: Use) {
        let uses = &mut self.value_mut(v).uses;
        if let Some(pos) = uses.iter().position(|x| *x == u) {
            uses.swap_remove(pos);
        }
    }

    fn add_use(&mut self, v: ValueId, u: Use) {
        self.value_mut(v).uses.push(u);
    }

    /// Set source `s` to `value`, keeping the slot's modifier and indirect
    /// sub-operands. Passing `None` nulls the slot without shifting later
    /// sources.
    pub fn set_src(&mut self, i: InstId, s: usize, value: Option<ValueId>) {
        let u = Use {
            inst: i,
            slot: UseSlot::Src(s as u8),
        };
        let inst = self.inst_mut(i);
        if inst.srcs.len() <= s {
            inst.srcs.resize(s + 1, Src::default());
        }
        let old = std::mem::replace(&mut inst.srcs[s].value, value);
        if old == value {
            return;
        }
        if let Some(old) = old {
            self.drop_use(old, u);
        }
        if let Some(v) = value {
            self.add_use(v, u);
        }
    }

    /// Replace the whole source slot, including modifier and indirects.
    pub fn set_src_ref(&mut self, i: InstId, s: usize, src: Src) {
        self.set_src(i, s, src.value);
        self.set_indirect(i, s, 0, src.indirect[0]);
        self.set_indirect(i, s, 1, src.indirect[1]);
        self.inst_mut(i).srcs[s].modifier = src.modifier;
    }

    pub fn set_modifier(&mut self, i: InstId, s: usize, modifier: Modifier) {
        self.inst_mut(i).srcs[s].modifier = modifier;
    }

    pub fn set_indirect(&mut self, i: InstId, s: usize, dim: usize, value: Option<ValueId>) {
        let u = Use {
            inst: i,
            slot: UseSlot::Indirect(s as u8, dim as u8),
        };
        let inst = self.inst_mut(i);
        if inst.srcs.len() <= s {
            inst.srcs.resize(s + 1, Src::default());
        }
        let old = std::mem::replace(&mut inst.srcs[s].indirect[dim], value);
        if old == value {
            return;
        }
        if let Some(old) = old {
            self.drop_use(old, u);
        }
        if let Some(v) = value {
            self.add_use(v, u);
        }
    }

    pub fn set_predicate(&mut self, i: InstId, value: Option<ValueId>) {
        let u = Use {
            inst: i,
            slot: UseSlot::Pred,
        };
        let old = std::mem::replace(&mut self.inst_mut(i).pred, value);
        if old == value {
            return;
        }
        if let Some(old) = old {
            self.drop_use(old, u);
        }
        if let Some(v) = value {
            self.add_use(v, u);
        }
    }

    pub fn set_def(&mut self, i: InstId, d: usize, value: Option<ValueId>) {
        let inst = self.inst_mut(i);
        if inst.defs.len() <= d {
            inst.defs.resize(d + 1, None);
        }
        let old = std::mem::replace(&mut inst.defs[d], value);
        if old == value {
            return;
        }
        if let Some(old) = old {
            let defs = &mut self.value_mut(old).defs;
            if let Some(pos) = defs.iter().position(|&x| x == i) {
                defs.remove(pos);
            }
        }
        if let Some(v) = value {
            self.value_mut(v).defs.push(i);
        }
    }

    // ---------------------------------------------------------------------
    // Instruction lists
    // ---------------------------------------------------------------------

    pub fn first_inst(&self, b: BlockId) -> Option<InstId> {
        self.blocks[b.index()].head
    }

    pub fn last_inst(&self, b: BlockId) -> Option<InstId> {
        self.blocks[b.index()].tail
    }

    /// First instruction after the phi prefix.
    pub fn entry_inst(&self, b: BlockId) -> Option<InstId> {
        let mut cur = self.first_inst(b);
        while let Some(i) = cur {
            let inst = self.inst(i);
            if inst.op != super::Op::Phi {
                return Some(i);
            }
            cur = inst.next;
        }
        None
    }

    pub fn phis(&self, b: BlockId) -> Vec<InstId> {
        let mut out = Vec::new();
        let mut cur = self.first_inst(b);
        while let Some(i) = cur {
            let inst = self.inst(i);
            if inst.op != super::Op::Phi {
                break;
            }
            out.push(i);
            cur = inst.next;
        }
        out
    }

    /// Snapshot of the block's instruction order.
    pub fn block_insts(&self, b: BlockId) -> Vec<InstId> {
        let mut out = Vec::new();
        let mut cur = self.first_inst(b);
        while let Some(i) = cur {
            out.push(i);
            cur = self.inst(i).next;
        }
        out
    }

    pub fn is_terminated(&self, b: BlockId) -> bool {
        self.last_inst(b)
            .is_some_and(|i| self.inst(i).op.is_terminator())
    }

    pub fn append_inst(&mut self, b: BlockId, i: InstId) {
        debug_assert!(self.inst(i).block.is_none(), "instruction already linked");
        let tail = self.blocks[b.index()].tail;
        {
            let inst = self.inst_mut(i);
            inst.block = Some(b);
            inst.prev = tail;
            inst.next = None;
        }
        match tail {
            Some(t) => self.inst_mut(t).next = Some(i),
            None => self.blocks[b.index()].head = Some(i),
        }
        self.blocks[b.index()].tail = Some(i);
    }

    /// Link `i` immediately before `anchor`.
    pub fn insert_before(&mut self, anchor: InstId, i: InstId) {
        debug_assert!(self.inst(i).block.is_none(), "instruction already linked");
        let a = self.inst(anchor);
        let (Some(b), prev) = (a.block, a.prev) else {
            debug_assert!(false, "anchor not linked");
            return;
        };
        {
            let inst = self.inst_mut(i);
            inst.block = Some(b);
            inst.prev = prev;
            inst.next = Some(anchor);
        }
        self.inst_mut(anchor).prev = Some(i);
        match prev {
            Some(p) => self.inst_mut(p).next = Some(i),
            None => self.blocks[b.index()].head = Some(i),
        }
    }

    /// Link `i` immediately after `anchor`.
    pub fn insert_after(&mut self, anchor: InstId, i: InstId) {
        debug_assert!(self.inst(i).block.is_none(), "instruction already linked");
        let a = self.inst(anchor);
        let (Some(b), next) = (a.block, a.next) else {
            debug_assert!(false, "anchor not linked");
            return;
        };
        {
            let inst = self.inst_mut(i);
            inst.block = Some(b);
            inst.prev = Some(anchor);
            inst.next = next;
        }
        self.inst_mut(anchor).next = Some(i);
        match next {
            Some(n) => self.inst_mut(n).prev = Some(i),
            None => self.blocks[b.index()].tail = Some(i),
        }
    }

    /// Insert before the block's terminator, or at its end if it has none.
    pub fn insert_before_exit(&mut self, b: BlockId, i: InstId) {
        match self.last_inst(b) {
            Some(t) if self.inst(t).op.is_terminator() => self.insert_before(t, i),
            _ => self.append_inst(b, i),
        }
    }

    pub fn unlink_inst(&mut self, i: InstId) {
        let (b, prev, next) = {
            let inst = self.inst(i);
            match inst.block {
                Some(b) => (b, inst.prev, inst.next),
                None => return,
            }
        };
        match prev {
            Some(p) => self.inst_mut(p).next = next,
            None => self.blocks[b.index()].head = next,
        }
        match next {
            Some(n) => self.inst_mut(n).prev = prev,
            None => self.blocks[b.index()].tail = prev,
        }
        let inst = self.inst_mut(i);
        inst.block = None;
        inst.prev = None;
        inst.next = None;
    }

    /// Unlink an instruction, drop its operand references and release it.
    pub fn remove_inst(&mut self, i: InstId) {
        self.unlink_inst(i);
        let (nsrcs, ndefs) = {
            let inst = self.inst(i);
            (inst.srcs.len(), inst.defs.len())
        };
        for s in 0..nsrcs {
            self.set_src(i, s, None);
            self.set_indirect(i, s, 0, None);
            self.set_indirect(i, s, 1, None);
        }
        for d in 0..ndefs {
            self.set_def(i, d, None);
        }
        self.set_predicate(i, None);
        self.insts.release(i.0);
    }

    /// Retarget a block terminator that branches to `old`.
    pub(crate) fn retarget_branch(&mut self, b: BlockId, old: BlockId, new: BlockId) {
        if let Some(t) = self.last_inst(b) {
            let inst = self.inst_mut(t);
            if inst.flow_target() == Some(FlowTarget::Block(old)) {
                inst.kind = super::InstKind::Flow(FlowTarget::Block(new));
            }
        }
    }

    // ---------------------------------------------------------------------
    // Modifier folding
    // ---------------------------------------------------------------------

    /// Whether every use of `value` can be replaced by `rep`.
    ///
    /// A modifier on the replacement must be supported by the target in each
    /// consuming slot, and an instruction reading the value more than once is
    /// rejected since the combined modifiers could not be checked.
    pub fn may_replace(&self, value: ValueId, rep: &Src, target: &TargetDesc) -> bool {
        if rep.modifier.is_none() {
            return true;
        }
        for u in self.value(value).uses() {
            let s = match u.slot {
                UseSlot::Src(s) => s as usize,
                UseSlot::Indirect(..) | UseSlot::Pred => return false,
            };
            let inst = self.inst(u.inst);
            let refs = inst.reads().filter(|&r| r == value).count();
            if refs > 1 {
                return false;
            }
            let combined = inst.srcs[s].modifier * rep.modifier;
            if !target.is_mod_supported(inst.op, s, combined) {
                return false;
            }
        }
        true
    }

    /// Point every use of `value` at `rep`, composing modifiers.
    ///
    /// Returns `false` and leaves the graph untouched if the replacement is
    /// not allowed.
    pub fn replace_uses(&mut self, value: ValueId, rep: Src, target: &TargetDesc) -> bool {
        if !self.may_replace(value, &rep, target) {
            log::warn!(
                "{}: cannot fold modifier {:#x} into uses of %{}",
                self.name,
                rep.modifier.bits(),
                value.0
            );
            return false;
        }
        let Some(new) = rep.value else {
            return false;
        };
        if new == value {
            return true;
        }
        while let Some(u) = self.value(value).uses.first().copied() {
            match u.slot {
                UseSlot::Src(s) => {
                    let s = s as usize;
                    let modifier = self.inst(u.inst).srcs[s].modifier * rep.modifier;
                    self.set_src(u.inst, s, Some(new));
                    self.set_modifier(u.inst, s, modifier);
                }
                UseSlot::Indirect(s, dim) => {
                    self.set_indirect(u.inst, s as usize, dim as usize, Some(new))
                }
                UseSlot::Pred => self.set_predicate(u.inst, Some(new)),
            }
        }
        true
    }
}
