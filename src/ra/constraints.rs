// This module rewrites instructions whose operands the hardware needs in consecutive
// registers. Texture results are first compacted to the components actually read.
// On NV50 every texture argument is copied into a fresh value and the results are
// padded so each argument has a result slot to share a register with. On NVC0 the
// coordinate arguments and the remaining arguments each become a constraint bundle,
// a pseudo-op whose results are pinned together and stand in for the operands they copy.
// Store and export data operands are bundled the same way. A bundle with the same
// operands in a dominating block is reused instead of creating a new one. Finally
// every bundle operand that could not share a register with its bundle slot (read
// elsewhere, read twice, or itself produced by a multi-result instruction) gets a
// copy. Wide loads with an indirect address are followed by a hazard NOP.

//! Operand constraint insertion.

use bumpalo::collections::Vec as BumpVec;

use crate::core::error::{RaError, RaResult};
use crate::core::session::CompilationSession;
use crate::core::target::{ConstraintStrategy, TargetDesc};
use crate::ir::cfg::{reverse_post_order, DomTree};
use crate::ir::{DataType, Function, InstId, Instruction, Op, RegFile, Value, ValueId};

pub struct InsertConstraints<'f, 's, 'arena> {
    func: &'f mut Function,
    target: &'f TargetDesc,
    session: &'s CompilationSession<'arena>,
    dom: DomTree,
    constr_list: BumpVec<'arena, InstId>,
}

impl<'f, 's, 'arena> InsertConstraints<'f, 's, 'arena> {
    pub fn new(
        func: &'f mut Function,
        target: &'f TargetDesc,
        session: &'s CompilationSession<'arena>,
    ) -> Self {
        let dom = DomTree::compute(func);
        Self {
            func,
            target,
            session,
            dom,
            constr_list: BumpVec::new_in(session.arena()),
        }
    }

    pub fn run(mut self) -> RaResult<()> {
        for b in reverse_post_order(self.func) {
            for i in self.func.block_insts(b) {
                let inst = self.func.inst(i);
                match inst.op {
                    Op::Phi => {}
                    op if op.is_tex() => match self.target.constraint_strategy {
                        ConstraintStrategy::PerSourceMove => self.tex_per_source_moves(i)?,
                        ConstraintStrategy::RangeConstraint => self.tex_range_constraints(i)?,
                    },
                    Op::Export | Op::St => self.store_constraint(i)?,
                    Op::Ld => {
                        let addr = inst.src_ref(0).and_then(|s| s.indirect[0]);
                        if let Some(addr) = addr.filter(|_| inst.ty.size() >= 8) {
                            self.add_hazard(i, addr);
                        }
                    }
                    _ => {}
                }
            }
        }
        self.insert_constraint_moves();
        Ok(())
    }

    /// Drop texture results that are never read, compacting the write mask.
    /// A result returned through the function outputs counts as read.
    fn texture_mask(&mut self, i: InstId) {
        let inst = self.func.inst(i);
        let Some(mask) = inst.tex().map(|t| t.mask) else {
            return;
        };
        let mut kept = Vec::new();
        let mut new_mask = 0u8;
        let mut k = 0;
        for c in 0..4 {
            if mask & (1 << c) == 0 {
                continue;
            }
            if let Some(d) = inst.def(k) {
                if self.func.value(d).ref_count() > 0 || self.func.outs.contains(&d) {
                    new_mask |= 1 << c;
                    kept.push(d);
                }
            }
            k += 1;
        }
        if kept.is_empty() {
            // keep one result so the instruction still writes something
            if let Some(d) = inst.def(0) {
                kept.push(d);
                new_mask = mask & mask.wrapping_neg();
            }
        }
        let slots = inst.defs.len();
        for d in 0..slots {
            self.func.set_def(i, d, kept.get(d).copied());
        }
        if let Some(tex) = self.func.inst_mut(i).tex_mut() {
            tex.mask = new_mask;
        }
    }

    fn tex_per_source_moves(&mut self, i: InstId) -> RaResult<()> {
        self.texture_mask(i);
        let Some(def0) = self.func.inst(i).def(0) else {
            return Err(RaError::InvalidIr {
                reason: format!("{}: texture instruction without result", self.func.name),
            });
        };
        // Sources are not padded: results past the last source share with no
        // source and the vector pre-pass places them after the others. The
        // predicate is not a source slot and stays on the texture.
        let n = self.func.inst(i).src_count();
        for c in 0..n {
            if !self.func.inst(i).def_exists(c) {
                let pad = self.func.new_lvalue_like(def0);
                self.func.set_def(i, c, Some(pad));
            }
        }
        for c in 0..n {
            let Some(v) = self.func.inst(i).src(c) else {
                continue;
            };
            let size = self.func.value(v).size;
            let copy = self.func.new_value(Value::new(RegFile::Gpr, size));
            let mov = self.new_mov(copy, v, size);
            self.func.set_src(i, c, Some(copy));
            self.func.insert_before(i, mov);
        }
        self.session.record_moves(n);
        Ok(())
    }

    fn tex_range_constraints(&mut self, i: InstId) -> RaResult<()> {
        self.texture_mask(i);
        let inst = self.func.inst(i);
        let Some(tex) = inst.tex().copied() else {
            return Ok(());
        };
        let total = inst.src_count();
        let (s, n) = if inst.op == Op::Txq {
            (total, 0)
        } else {
            let mut s = tex.target.arg_count();
            if !tex.target.is_array()
                && (tex.r_indirect_src.is_some() || tex.s_indirect_src.is_some())
            {
                s += 1;
            }
            if inst.op == Op::Txd && tex.use_offsets {
                s += 1;
            }
            let s = s.min(total);
            (s, total - s)
        };
        if s > 1 {
            self.add_constraint(i, 0, s)?;
        }
        if n > 1 {
            self.add_constraint(i, s, n)?;
        }
        Ok(())
    }

    fn store_constraint(&mut self, i: InstId) -> RaResult<()> {
        let inst = self.func.inst(i);
        let mut remaining = inst.ty.size() as i32;
        let mut s = 1;
        while remaining > 0 {
            let Some(v) = inst.src(s) else {
                return Err(RaError::InvalidIr {
                    reason: format!(
                        "{}: {} stores {} bytes but has too few data operands",
                        self.func.name,
                        inst.op.name(),
                        inst.ty.size()
                    ),
                });
            };
            remaining -= self.func.value(v).size as i32;
            s += 1;
        }
        let count = s - 1;
        if count > 1 {
            self.add_constraint(i, 1, count)?;
        }
        Ok(())
    }

    /// Route sources `s..s + n` of `i` through a constraint bundle.
    fn add_constraint(&mut self, i: InstId, s: usize, n: usize) -> RaResult<()> {
        let block = self.func.inst(i).block();
        let wanted: Vec<Option<ValueId>> = (s..s + n).map(|k| self.func.inst(i).src(k)).collect();

        for &cst in self.constr_list.iter().rev() {
            let c = self.func.inst(cst);
            let dominates = match (c.block(), block) {
                (Some(cb), Some(b)) => self.dom.dominates(cb, b),
                _ => false,
            };
            if !dominates || c.src_count() != n {
                continue;
            }
            if (0..n).any(|k| c.src(k) != wanted[k]) {
                continue;
            }
            let defs: Vec<Option<ValueId>> = (0..n).map(|k| c.def(k)).collect();
            for (k, d) in defs.into_iter().enumerate() {
                self.func.set_src(i, s + k, d);
            }
            self.session.record_constraint(true);
            log::debug!("{}: reusing constraint {}", self.func.name, cst);
            return Ok(());
        }

        let ty = self.func.inst(i).ty;
        let cst = self.func.new_inst(Instruction::new(Op::Constraint, ty));
        for (k, v) in wanted.into_iter().enumerate() {
            let Some(v) = v else {
                return Err(RaError::InvalidIr {
                    reason: format!("{}: missing operand {} of {}", self.func.name, s + k, i),
                });
            };
            let size = self.func.value(v).size;
            let def = self.func.new_value(Value::new(RegFile::Gpr, size));
            self.func.set_def(cst, k, Some(def));
            self.func.set_src(cst, k, Some(v));
            self.func.set_src(i, s + k, Some(def));
        }
        self.func.insert_before(i, cst);
        self.constr_list.push(cst);
        self.session.record_constraint(false);
        log::debug!("{}: constraint {} for {} operands of {}", self.func.name, cst, n, i);
        Ok(())
    }

    fn add_hazard(&mut self, i: InstId, addr: ValueId) {
        let nop = self.func.new_inst(Instruction::new(Op::Nop, DataType::None));
        self.func.set_src(nop, 0, Some(addr));
        self.func.insert_after(i, nop);
        self.session.record_hazard();
    }

    fn new_mov(&mut self, def: ValueId, src: ValueId, size: u8) -> InstId {
        let mov = self.func.new_inst(Instruction::new(Op::Mov, DataType::of_size(size)));
        self.func.set_def(mov, 0, Some(def));
        self.func.set_src(mov, 0, Some(src));
        mov
    }

    /// Whether source `s` of a bundle cannot share a register with its slot.
    fn detect_conflict(&self, cst: InstId, s: usize) -> bool {
        let inst = self.func.inst(cst);
        let Some(v) = inst.src(s) else {
            return false;
        };
        let val = self.func.value(v);
        if !val.is_lvalue() {
            return true;
        }
        if val.uses().iter().any(|u| u.inst != cst) {
            return true;
        }
        if (s + 1..inst.src_count()).any(|k| inst.src(k) == Some(v)) {
            return true;
        }
        match val.unique_def() {
            None => true,
            Some(d) => self.func.inst(d).constrained_defs(),
        }
    }

    fn insert_constraint_moves(&mut self) {
        let list: Vec<InstId> = self.constr_list.iter().copied().collect();
        let mut moves = 0;
        for cst in list {
            for s in 0..self.func.inst(cst).src_count() {
                if !self.detect_conflict(cst, s) {
                    continue;
                }
                let Some(v) = self.func.inst(cst).src(s) else {
                    continue;
                };
                let size = self.func.value(v).size;
                let copy = self.func.new_value(Value::new(RegFile::Gpr, size));
                let mov = self.new_mov(copy, v, size);
                self.func.set_src(cst, s, Some(copy));
                self.func.insert_before(cst, mov);
                moves += 1;
            }
        }
        self.session.record_moves(moves);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FlowTarget, TexInfo, TexTarget};
    use bumpalo::Bump;

    fn gpr(func: &mut Function) -> ValueId {
        func.new_value(Value::new(RegFile::Gpr, 4))
    }

    fn tex(func: &mut Function, b: crate::ir::BlockId, defs: &[ValueId], srcs: &[ValueId]) -> InstId {
        let i = func.new_inst(Instruction::new_tex(
            Op::Tex,
            DataType::F32,
            TexInfo::new(TexTarget::Tex2D),
        ));
        for (d, v) in defs.iter().enumerate() {
            func.set_def(i, d, Some(*v));
        }
        for (s, v) in srcs.iter().enumerate() {
            func.set_src(i, s, Some(*v));
        }
        func.append_inst(b, i);
        i
    }

    fn use_all(func: &mut Function, b: crate::ir::BlockId, vals: &[ValueId]) {
        let i = func.new_inst(Instruction::new(Op::Export, DataType::of_size(4 * vals.len() as u8)));
        let out = func.new_value(Value::symbol(RegFile::ShaderOut, 0, DataType::U32));
        func.set_src(i, 0, Some(out));
        for (s, v) in vals.iter().enumerate() {
            func.set_src(i, s + 1, Some(*v));
        }
        func.append_inst(b, i);
    }

    fn count_ops(func: &Function, op: Op) -> usize {
        func.block_ids()
            .flat_map(|b| func.block_insts(b))
            .filter(|&i| func.inst(i).op == op)
            .count()
    }

    #[test]
    fn test_nvc0_texture_arguments_are_bundled() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut func = Function::new("f");
        let b = func.entry;
        let (u, v) = (gpr(&mut func), gpr(&mut func));
        func.ins.extend([u, v]);
        let r: Vec<ValueId> = (0..4).map(|_| gpr(&mut func)).collect();
        let t = tex(&mut func, b, &r, &[u, v]);
        use_all(&mut func, b, &r);

        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        InsertConstraints::new(&mut func, &TargetDesc::nvc0(), &session)
            .run()
            .unwrap();

        assert_eq!(count_ops(&func, Op::Constraint), 2);
        let cst = func.inst(t).prev().unwrap();
        assert_eq!(func.inst(cst).op, Op::Constraint);
        assert_eq!(func.inst(t).src(0), func.inst(cst).def(0));
        // inputs have no defining instruction and texture results come from a
        // multi-result instruction, so every bundle operand is copied
        assert_eq!(session.stats().moves_inserted, 6);
        assert_eq!(session.stats().constraints_created, 2);
    }

    #[test]
    fn test_texture_mask_drops_unread_results() {
        let mut func = Function::new("f");
        let b = func.entry;
        let (u, v) = (gpr(&mut func), gpr(&mut func));
        func.ins.extend([u, v]);
        let r: Vec<ValueId> = (0..4).map(|_| gpr(&mut func)).collect();
        let t = tex(&mut func, b, &r, &[u, v]);
        use_all(&mut func, b, &[r[1], r[3]]);

        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        InsertConstraints::new(&mut func, &TargetDesc::nvc0(), &session)
            .run()
            .unwrap();
        let inst = func.inst(t);
        assert_eq!(inst.tex().unwrap().mask, 0b1010);
        assert_eq!(inst.def_count(), 2);
        assert_eq!(inst.def(0), Some(r[1]));
        assert_eq!(inst.def(1), Some(r[3]));
    }

    #[test]
    fn test_nv50_texture_pads_results_and_copies_sources() {
        let mut func = Function::new("f");
        let b = func.entry;
        let (u, v, w) = (gpr(&mut func), gpr(&mut func), gpr(&mut func));
        func.ins.extend([u, v, w]);
        let r = gpr(&mut func);
        let t = tex(&mut func, b, &[r], &[u, v, w]);
        use_all(&mut func, b, &[r]);

        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        InsertConstraints::new(&mut func, &TargetDesc::nv50(), &session)
            .run()
            .unwrap();
        let inst = func.inst(t);
        assert_eq!(inst.def_count(), 3);
        assert_eq!(count_ops(&func, Op::Mov), 3);
        assert_eq!(count_ops(&func, Op::Constraint), 0);
        for c in 0..3 {
            let s = inst.src(c).unwrap();
            assert_eq!(func.inst(func.unique_def(s).unwrap()).op, Op::Mov);
        }
    }

    #[test]
    fn test_nv50_texture_with_more_results_than_sources() {
        let mut func = Function::new("f");
        let b = func.entry;
        let (u, v) = (gpr(&mut func), gpr(&mut func));
        let p = func.new_value(Value::new(RegFile::Predicate, 1));
        func.ins.extend([u, v, p]);
        let r: Vec<ValueId> = (0..4).map(|_| gpr(&mut func)).collect();
        let t = tex(&mut func, b, &r, &[u, v]);
        func.set_predicate(t, Some(p));
        for &v in &r {
            use_all(&mut func, b, &[v]);
        }

        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        InsertConstraints::new(&mut func, &TargetDesc::nv50(), &session)
            .run()
            .unwrap();
        let inst = func.inst(t);
        assert_eq!(inst.src_count(), 2);
        assert_eq!(inst.def_count(), 4);
        assert_eq!(inst.predicate(), Some(p));
        assert_eq!(session.stats().moves_inserted, 2);
        for c in 0..2 {
            let copy = func.unique_def(inst.src(c).unwrap()).unwrap();
            assert_eq!(func.inst(copy).op, Op::Mov);
            assert_eq!(func.inst(copy).predicate(), None);
        }
    }

    #[test]
    fn test_texture_result_returned_from_function_is_kept() {
        let mut func = Function::new("f");
        let b = func.entry;
        let (u, v) = (gpr(&mut func), gpr(&mut func));
        func.ins.extend([u, v]);
        let r: Vec<ValueId> = (0..2).map(|_| gpr(&mut func)).collect();
        let t = tex(&mut func, b, &r, &[u, v]);
        func.inst_mut(t).tex_mut().unwrap().mask = 0b0011;
        use_all(&mut func, b, &[r[0]]);
        func.outs.push(r[1]);

        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        InsertConstraints::new(&mut func, &TargetDesc::nvc0(), &session)
            .run()
            .unwrap();
        let inst = func.inst(t);
        assert_eq!(inst.tex().unwrap().mask, 0b0011);
        assert_eq!(inst.def(1), Some(r[1]));
        assert_eq!(func.unique_def(r[1]), Some(t));
    }

    #[test]
    fn test_dominating_bundle_is_reused() {
        let mut func = Function::new("f");
        let entry = func.entry;
        let next = func.add_block("next");
        func.add_edge(entry, next);
        let (u, v) = (gpr(&mut func), gpr(&mut func));
        func.ins.extend([u, v]);
        let r0: Vec<ValueId> = (0..4).map(|_| gpr(&mut func)).collect();
        let r1: Vec<ValueId> = (0..4).map(|_| gpr(&mut func)).collect();
        tex(&mut func, entry, &r0, &[u, v]);
        let bra = func.new_inst(Instruction::new_flow(Op::Bra, FlowTarget::Block(next)));
        func.append_inst(entry, bra);
        tex(&mut func, next, &r1, &[u, v]);
        use_all(&mut func, next, &r0);
        use_all(&mut func, next, &r1);

        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        InsertConstraints::new(&mut func, &TargetDesc::nvc0(), &session)
            .run()
            .unwrap();
        let stats = session.stats();
        // one texture bundle reused, plus two 4-operand export bundles
        assert_eq!(stats.constraints_reused, 1);
        assert_eq!(stats.constraints_created, 3);
    }

    #[test]
    fn test_wide_indirect_load_gets_hazard_nop() {
        let mut func = Function::new("f");
        let b = func.entry;
        let addr = func.new_value(Value::new(RegFile::Address, 4));
        func.ins.push(addr);
        let dst = func.new_value(Value::new(RegFile::Gpr, 8));
        let mem = func.new_value(Value::symbol(RegFile::MemGlobal, 16, DataType::U64));
        let ld = func.new_inst(Instruction::new(Op::Ld, DataType::U64));
        func.set_def(ld, 0, Some(dst));
        func.set_src(ld, 0, Some(mem));
        func.set_indirect(ld, 0, 0, Some(addr));
        func.append_inst(b, ld);

        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        InsertConstraints::new(&mut func, &TargetDesc::nv50(), &session)
            .run()
            .unwrap();
        let nop = func.inst(ld).next().unwrap();
        assert_eq!(func.inst(nop).op, Op::Nop);
        assert_eq!(func.inst(nop).src(0), Some(addr));
        assert_eq!(session.stats().hazards_inserted, 1);
    }
}
