// This module builds the liveness information the allocator works from. Phase one is a
// backward dataflow over the CFG producing a live-in bitset per block: live-out is the
// union of the successors' live-in (plus the function outputs at the exit block), the
// block is walked bottom-up clearing definitions and adding reads, and phi results
// are removed since they are defined on the incoming edges. Iteration runs at least
// loop_nesting_bound + 1 rounds and until nothing changes. Phase two numbers all
// instructions in reverse post-order (serial 0 stands for function entry) and turns
// the sets into per-value live intervals. A phi operand is live out of exactly the
// predecessor it flows in from, using the phi's recorded provenance instead of the
// generic union, which would stretch it over sibling predecessors.

//! Live sets and live interval construction.

use crate::core::bitset::BitSet;
use crate::ir::cfg::reverse_post_order;
use crate::ir::{BlockId, Function, Op, ValueId};

use super::interval::LiveInterval;

fn is_lvalue(func: &Function, v: ValueId) -> bool {
    func.value(v).is_lvalue()
}

/// Live-out set of `b` derived from the successors' live-in sets.
fn live_out(func: &Function, b: BlockId, live_in: &[BitSet]) -> BitSet {
    let mut live = BitSet::with_capacity(func.num_value_slots());
    for succ in func.block(b).succs() {
        live.union_with(&live_in[succ.index()]);
    }
    if func.exit == Some(b) {
        for &v in &func.outs {
            live.insert(v.index());
        }
    }
    for succ in func.block(b).succs() {
        for phi in func.phis(succ) {
            let inst = func.inst(phi);
            if let Some(d) = inst.def(0) {
                live.remove(d.index());
            }
            let preds = inst.phi_preds().unwrap_or(&[]);
            for (s, src) in inst.srcs.iter().enumerate() {
                let Some(v) = src.value.filter(|&v| is_lvalue(func, v)) else {
                    continue;
                };
                if preds.get(s) == Some(&b) {
                    live.insert(v.index());
                } else {
                    live.remove(v.index());
                }
            }
        }
    }
    live
}

/// Compute the live-in set of every block.
pub fn build_live_sets(func: &Function) -> Vec<BitSet> {
    let n = func.num_value_slots();
    let rpo = reverse_post_order(func);
    let mut live_in = vec![BitSet::with_capacity(n); func.num_blocks()];
    let min_rounds = func.loop_nesting_bound + 1;
    let mut round = 0;

    loop {
        let mut changed = false;
        for &b in rpo.iter().rev() {
            let mut live = live_out(func, b, &live_in);
            let mut cur = func.last_inst(b);
            while let Some(i) = cur {
                let inst = func.inst(i);
                if inst.op == Op::Phi {
                    if let Some(d) = inst.def(0) {
                        live.remove(d.index());
                    }
                } else {
                    for d in inst.defs() {
                        live.remove(d.index());
                    }
                    for r in inst.reads().filter(|&r| is_lvalue(func, r)) {
                        live.insert(r.index());
                    }
                }
                cur = inst.prev;
            }
            if !live.same_members(&live_in[b.index()]) {
                live_in[b.index()] = live;
                changed = true;
            }
        }
        round += 1;
        if round >= min_rounds && !changed {
            break;
        }
    }
    log::trace!("{}: live sets converged after {} rounds", func.name, round);
    live_in
}

/// Assign serial numbers in reverse post-order, starting at 1.
///
/// Returns the block order used.
pub fn number_instructions(func: &mut Function) -> Vec<BlockId> {
    let order = reverse_post_order(func);
    let mut serial = 1;
    for &b in &order {
        for i in func.block_insts(b) {
            func.inst_mut(i).serial = serial;
            serial += 1;
        }
    }
    order
}

struct BlockBounds {
    entry: u32,
    exit: u32,
}

fn block_bounds(func: &Function, b: BlockId) -> Option<BlockBounds> {
    let entry = func.entry_inst(b)?;
    let exit = func.last_inst(b)?;
    Some(BlockBounds {
        entry: func.inst(entry).serial,
        exit: func.inst(exit).serial,
    })
}

fn add_live_range(
    func: &Function,
    intervals: &mut [LiveInterval],
    v: ValueId,
    b: BlockId,
    bounds: &BlockBounds,
    end: u32,
) {
    let begin = func
        .unique_def(v)
        .map(|i| func.inst(i))
        .filter(|inst| inst.block() == Some(b))
        .map(|inst| inst.serial)
        .filter(|&s| s >= bounds.entry && s <= bounds.exit)
        .unwrap_or(bounds.entry);
    if begin < end {
        log::trace!("{}: {} live [{}, {})", func.name, func.value_label(v), begin, end);
        intervals[v.index()].extend(begin, end);
    }
}

/// Build one live interval per value slot from the block live-in sets.
///
/// Definitions that are never read, and every definition pinned to a fixed
/// register, still cover their own instruction so the register they write is
/// reserved there. Function inputs are defined at serial 0.
pub fn build_intervals(func: &Function, live_in: &[BitSet], order: &[BlockId]) -> Vec<LiveInterval> {
    let mut intervals = vec![LiveInterval::new(); func.num_value_slots()];

    for &b in order {
        let mut live = live_out(func, b, live_in);
        let Some(bounds) = block_bounds(func, b) else {
            continue;
        };
        for v in live.iter().map(|i| ValueId(i as u32)) {
            add_live_range(func, &mut intervals, v, b, &bounds, bounds.exit + 1);
        }

        let mut cur = func.last_inst(b);
        while let Some(i) = cur {
            let inst = func.inst(i);
            if inst.op == Op::Phi {
                break;
            }
            let serial = inst.serial;
            for d in inst.defs().filter(|&d| is_lvalue(func, d)) {
                let was_live = live.remove(d.index());
                if !was_live || func.value(d).reg >= 0 {
                    intervals[d.index()].extend(serial, serial + 1);
                }
            }
            for r in inst.reads().filter(|&r| is_lvalue(func, r)) {
                if live.insert(r.index()) {
                    add_live_range(func, &mut intervals, r, b, &bounds, serial);
                }
            }
            cur = inst.prev;
        }
    }

    // Serial 1 is the entry block's first instruction, so this joins any
    // range an input has there.
    for &v in &func.ins {
        intervals[v.index()].extend(0, 1);
    }
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DataType, FlowTarget, Instruction, RegFile, Value};

    fn emit(func: &mut Function, b: BlockId, op: Op, defs: &[ValueId], srcs: &[ValueId]) {
        let i = func.new_inst(Instruction::new(op, DataType::U32));
        for (d, v) in defs.iter().enumerate() {
            func.set_def(i, d, Some(*v));
        }
        for (s, v) in srcs.iter().enumerate() {
            func.set_src(i, s, Some(*v));
        }
        func.append_inst(b, i);
    }

    fn ret(func: &mut Function, b: BlockId) {
        let i = func.new_inst(Instruction::new_flow(Op::Ret, FlowTarget::None));
        func.append_inst(b, i);
    }

    #[test]
    fn test_straight_line_intervals() {
        let mut func = Function::new("f");
        let b = func.entry;
        let x = func.new_value(Value::new(RegFile::Gpr, 4));
        let a = func.new_value(Value::new(RegFile::Gpr, 4));
        let c = func.new_value(Value::new(RegFile::Gpr, 4));
        let dead = func.new_value(Value::new(RegFile::Gpr, 4));
        func.ins.push(x);
        func.outs.push(c);
        func.exit = Some(b);
        emit(&mut func, b, Op::Mov, &[a], &[x]); // 1
        emit(&mut func, b, Op::Add, &[c], &[a, x]); // 2
        emit(&mut func, b, Op::Mov, &[dead], &[a]); // 3
        ret(&mut func, b); // 4

        let live = build_live_sets(&func);
        assert!(live[b.index()].contains(x.index()));
        assert!(!live[b.index()].contains(a.index()));

        let order = number_instructions(&mut func);
        let iv = build_intervals(&func, &live, &order);
        assert_eq!(iv[x.index()].to_string(), "[0, 2)");
        assert_eq!(iv[a.index()].to_string(), "[1, 3)");
        assert_eq!(iv[c.index()].to_string(), "[2, 5)");
        assert_eq!(iv[dead.index()].to_string(), "[3, 4)");
    }

    #[test]
    fn test_loop_carried_value_covers_loop() {
        // entry -> head -> body -> head, head -> exit
        let mut func = Function::new("loop");
        let entry = func.entry;
        let head = func.add_block("head");
        let body = func.add_block("body");
        let exit = func.add_block("exit");
        func.add_edge(entry, head);
        func.add_edge(head, body);
        func.add_edge(body, head);
        func.add_edge(head, exit);
        func.exit = Some(exit);
        func.loop_nesting_bound = 1;

        let n = func.new_value(Value::new(RegFile::Gpr, 4));
        let t = func.new_value(Value::new(RegFile::Gpr, 4));
        func.ins.push(n);
        let br = |func: &mut Function, b: BlockId, to: BlockId| {
            let i = func.new_inst(Instruction::new_flow(Op::Bra, FlowTarget::Block(to)));
            func.append_inst(b, i);
        };
        br(&mut func, entry, head);
        br(&mut func, head, body);
        emit(&mut func, body, Op::Add, &[t], &[n, n]);
        br(&mut func, body, head);
        ret(&mut func, exit);

        let live = build_live_sets(&func);
        for b in [head, body] {
            assert!(live[b.index()].contains(n.index()));
        }
        assert!(!live[exit.index()].contains(n.index()));

        let order = number_instructions(&mut func);
        let iv = build_intervals(&func, &live, &order);
        let bra_body = func.last_inst(body).unwrap();
        // n stays live across the back edge up to the end of the body
        assert!(iv[n.index()].contains(func.inst(bra_body).serial));
        assert_eq!(iv[n.index()].begin(), 0);
    }
}
