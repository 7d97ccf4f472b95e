// This module inserts the copies that give phis and calls their register freedom.
// Every phi operand is copied into a fresh value at the end of the predecessor it
// flows in from, so each phi can be coalesced with its copies without touching the
// operands themselves. A predecessor with two forward successors would run the copy on
// both paths, so that edge is split first. Call sites copy their arguments into and
// their results out of temporaries pinned to the callee's input and output registers,
// and every register the callee writes that the call does not already define becomes
// an extra dead result so it is treated as clobbered across the call.

//! Phi and call argument moves.

use crate::core::session::CompilationSession;
use crate::core::target::TargetDesc;
use crate::ir::cfg::{classify_edges, split_edge};
use crate::ir::{
    BlockId, Clobber, DataType, EdgeKind, FlowTarget, Function, Instruction, Op, RegFile, Value,
    ValueId,
};

use super::register_set::RegisterSet;

/// Registers a callee expects its inputs in, returns its outputs in, and
/// writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalleeAbi {
    pub ins: Vec<i32>,
    pub outs: Vec<i32>,
    pub clobbers: Vec<Clobber>,
}

impl CalleeAbi {
    /// Read the binding of an allocated function.
    pub fn of(func: &Function) -> Self {
        Self {
            ins: func.ins.iter().map(|&v| func.value(v).reg).collect(),
            outs: func.outs.iter().map(|&v| func.value(v).reg).collect(),
            clobbers: func.clobbers.clone(),
        }
    }
}

fn needs_split(func: &Function, pred: BlockId) -> bool {
    func.block(pred)
        .succ_edges()
        .iter()
        .filter(|e| matches!(e.kind, EdgeKind::Tree | EdgeKind::Forward))
        .count()
        == 2
}

fn new_mov(func: &mut Function, ty: DataType, def: ValueId, src: ValueId) -> crate::ir::InstId {
    let mov = func.new_inst(Instruction::new(Op::Mov, ty));
    func.set_def(mov, 0, Some(def));
    func.set_src(mov, 0, Some(src));
    mov
}

/// Copy every phi operand at the end of its predecessor.
pub fn insert_phi_moves(func: &mut Function, session: &CompilationSession<'_>) {
    classify_edges(func);
    let blocks: Vec<BlockId> = func.block_ids().collect();
    let mut moves = 0;
    for b in blocks {
        let phis = func.phis(b);
        if phis.is_empty() {
            continue;
        }
        let preds = func.block(b).preds().to_vec();
        for pred in preds {
            let pb = if needs_split(func, pred) {
                session.record_edge_split();
                split_edge(func, pred, b)
            } else {
                pred
            };
            for &phi in &phis {
                let inst = func.inst(phi);
                let Some(def) = inst.def(0) else {
                    continue;
                };
                let ty = inst.ty;
                let slots: Vec<(usize, ValueId)> = inst
                    .phi_preds()
                    .unwrap_or(&[])
                    .iter()
                    .enumerate()
                    .filter(|&(_, &p)| p == pb)
                    .filter_map(|(s, _)| inst.src(s).map(|v| (s, v)))
                    .collect();
                for (s, v) in slots {
                    let tmp = func.new_lvalue_like(def);
                    let mov = new_mov(func, ty, tmp, v);
                    func.set_src(phi, s, Some(tmp));
                    func.insert_before_exit(pb, mov);
                    moves += 1;
                }
            }
        }
    }
    log::debug!("{}: {} phi moves", func.name, moves);
    session.record_moves(moves);
}

/// Bind call operands to the registers of an already allocated callee.
///
/// `abis` is indexed by function id; callees without an entry are treated
/// as having no fixed bindings.
pub fn insert_argument_moves(
    func: &mut Function,
    abis: &[CalleeAbi],
    target: &TargetDesc,
    session: &CompilationSession<'_>,
) {
    let mut moves = 0;
    let calls: Vec<_> = func
        .block_ids()
        .flat_map(|b| func.block_insts(b))
        .filter(|&i| func.inst(i).op == Op::Call)
        .collect();

    for call in calls {
        let Some(FlowTarget::Func(callee)) = func.inst(call).flow_target() else {
            continue;
        };
        let abi = abis.get(callee.index()).cloned().unwrap_or_default();
        let mut written = RegisterSet::new(target);

        for s in 0..func.inst(call).src_count() {
            let Some(v) = func.inst(call).src(s) else {
                continue;
            };
            let val = func.value(v);
            let file = if val.is_lvalue() { val.file } else { RegFile::Gpr };
            let size = val.size;
            let mut tmp = Value::new(file, size);
            tmp.reg = abi.ins.get(s).copied().unwrap_or(-1);
            let tmp = func.new_value(tmp);
            let mov = new_mov(func, DataType::of_size(size), tmp, v);
            func.set_src(call, s, Some(tmp));
            func.insert_before(call, mov);
            moves += 1;
        }

        let mut anchor = call;
        let ndefs = func.inst(call).def_count();
        for d in 0..ndefs {
            let Some(v) = func.inst(call).def(d) else {
                continue;
            };
            let tmp = func.new_lvalue_like(v);
            let reg = abi.outs.get(d).copied().unwrap_or(-1);
            func.value_mut(tmp).reg = reg;
            let (file, size) = (func.value(v).file, func.value(v).size);
            written.occupy(file, reg, written.units(file, size as u32));
            func.set_def(call, d, Some(tmp));
            let mov = new_mov(func, DataType::of_size(size), v, tmp);
            func.insert_after(anchor, mov);
            anchor = mov;
            moves += 1;
        }

        let mut slot = ndefs;
        for c in &abi.clobbers {
            let units = written.units(c.file, c.size as u32);
            if !written.test_occupy(c.file, c.id, units) {
                continue;
            }
            let mut dead = Value::new(c.file, c.size);
            dead.reg = c.id;
            let dead = func.new_value(dead);
            func.set_def(call, slot, Some(dead));
            slot += 1;
        }
        log::debug!(
            "{}: bound call {} with {} clobbers",
            func.name,
            call,
            slot - ndefs
        );
    }
    session.record_moves(moves);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FuncId;
    use bumpalo::Bump;

    fn gpr(func: &mut Function) -> ValueId {
        func.new_value(Value::new(RegFile::Gpr, 4))
    }

    #[test]
    fn test_phi_moves_split_critical_edge() {
        let _ = env_logger::builder().is_test(true).try_init();
        // entry -> a | join, a -> join
        let mut func = Function::new("f");
        let entry = func.entry;
        let a = func.add_block("a");
        let join = func.add_block("join");
        func.add_edge(entry, a);
        func.add_edge(entry, join);
        func.add_edge(a, join);
        let (x, y, r) = (gpr(&mut func), gpr(&mut func), gpr(&mut func));
        func.ins.extend([x, y]);

        let phi = func.new_inst(Instruction::new(Op::Phi, DataType::U32));
        func.set_def(phi, 0, Some(r));
        func.set_src(phi, 0, Some(x));
        func.set_src(phi, 1, Some(y));
        func.inst_mut(phi).phi_preds_mut().unwrap().extend([entry, a]);
        func.append_inst(join, phi);

        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        insert_phi_moves(&mut func, &session);

        let stats = session.stats();
        assert_eq!(stats.edges_split, 1);
        assert_eq!(stats.moves_inserted, 2);
        let mid = func.find_block("entry.join").unwrap();
        assert_eq!(func.inst(phi).phi_preds().unwrap(), &[mid, a]);
        let copy = func.inst(phi).src(0).unwrap();
        let def = func.unique_def(copy).unwrap();
        assert_eq!(func.inst(def).block(), Some(mid));
        assert_eq!(func.inst(def).src(0), Some(x));
    }

    #[test]
    fn test_call_binds_callee_registers() {
        let mut func = Function::new("caller");
        let b = func.entry;
        let (arg, res) = (gpr(&mut func), gpr(&mut func));
        func.ins.push(arg);
        let call = func.new_inst(Instruction::new_flow(Op::Call, FlowTarget::Func(FuncId(1))));
        func.set_src(call, 0, Some(arg));
        func.set_def(call, 0, Some(res));
        func.append_inst(b, call);

        let abis = vec![
            CalleeAbi::default(),
            CalleeAbi {
                ins: vec![2],
                outs: vec![0],
                clobbers: vec![
                    Clobber { file: RegFile::Gpr, id: 0, size: 4 },
                    Clobber { file: RegFile::Gpr, id: 3, size: 4 },
                ],
            },
        ];
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        insert_argument_moves(&mut func, &abis, &TargetDesc::nvc0(), &session);

        let inst = func.inst(call);
        assert_eq!(func.value(inst.src(0).unwrap()).reg, 2);
        assert_eq!(func.value(inst.def(0).unwrap()).reg, 0);
        // $r0 is already a result, so only $r3 is added
        assert_eq!(inst.def_count(), 2);
        assert_eq!(func.value(inst.def(1).unwrap()).reg, 3);
        let after = inst.next().unwrap();
        assert_eq!(func.inst(after).def(0), Some(res));
        assert_eq!(session.stats().moves_inserted, 2);
    }
}
