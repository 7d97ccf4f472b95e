// This module assigns physical registers. A pre-pass places the results of
// texture instructions and constraint bundles as one aligned block, each result
// directly after the previous one whatever its width. For each class in the block it
// collects the fixed registers live at the same time, keeps only the conflicts at
// that class's lane positions, and ORs the lanes together before searching for a
// block. A class that already has a register pins the block around it, and a block
// that cannot be placed is an error. The main pass is a classic linear scan over
// class intervals ordered by start point. Active and inactive lists track classes
// that are live, or in a lifetime hole, at the current position; a class is placed
// in the lowest free aligned block that no overlapping inactive class and no
// overlapping later fixed class holds. There is no spilling: a class that does not
// fit is an error.

//! Register assignment.

use bumpalo::collections::Vec as BumpVec;

use crate::core::error::{RaError, RaResult};
use crate::core::session::CompilationSession;
use crate::core::target::TargetDesc;
use crate::ir::cfg::reverse_post_order;
use crate::ir::{Function, RegFile, ValueId};

use super::register_set::RegisterSet;
use super::{referenced_lvalues, FuncAlloc};

/// Lane positions of `units` units starting at `first`, repeated every
/// `period` units within a 32-unit word.
pub fn lane_mask(period: u32, first: u32, units: u32) -> u32 {
    let mut mask = 0u32;
    let mut base = 0;
    while base < 32 {
        for o in first..first + units {
            if base + o < 32 {
                mask |= 1 << (base + o);
            }
        }
        base += period.max(1);
    }
    mask
}

/// A class taking part in a vector group, `pos` units into the group block.
struct Lane {
    root: ValueId,
    pos: u32,
    units: u32,
}

/// Lay out the classes of `defs` so that each result follows the previous one.
///
/// A class holding a result at an offset starts before that result; the block
/// begins at the lowest class start.
fn group_lanes(
    func: &Function,
    state: &mut FuncAlloc,
    target: &TargetDesc,
    defs: &[ValueId],
) -> RaResult<Vec<Lane>> {
    let unit = target.unit_log2(RegFile::Gpr);
    let mut starts: Vec<(ValueId, i32, u32)> = Vec::new();
    let mut pos = 0i32;
    for &d in defs {
        let (root, off) = state.join.find(d);
        let start = pos - (off >> unit);
        match starts.iter().find(|s| s.0 == root) {
            Some(s) if s.1 != start => {
                return Err(RaError::JoinInconsistency {
                    value: func.value_label(d),
                })
            }
            Some(_) => {}
            None => starts.push((root, start, state.class_units(func, target, root))),
        }
        pos += (func.value(d).size as u32).div_ceil(1 << unit).max(1) as i32;
    }
    let lo = starts.iter().map(|s| s.1).min().unwrap_or(0);
    let lanes: Vec<Lane> = starts
        .into_iter()
        .map(|(root, start, units)| Lane {
            root,
            pos: (start - lo) as u32,
            units,
        })
        .collect();
    for (k, a) in lanes.iter().enumerate() {
        if let Some(b) = lanes[..k]
            .iter()
            .find(|b| a.pos < b.pos + b.units && b.pos < a.pos + a.units)
        {
            return Err(RaError::JoinInconsistency {
                value: format!("{} and {}", func.value_label(a.root), func.value_label(b.root)),
            });
        }
    }
    Ok(lanes)
}

/// Place the results of every vector-result instruction as one aligned block.
///
/// If one of the classes already has a register the block is placed around
/// it, and the rest of the block must be free there.
pub fn allocate_constrained_values(
    func: &mut Function,
    state: &mut FuncAlloc,
    target: &TargetDesc,
) -> RaResult<()> {
    let file = RegFile::Gpr;
    for b in reverse_post_order(func) {
        for i in func.block_insts(b) {
            let inst = func.inst(i);
            if !inst.vector_defs() {
                continue;
            }
            let defs: Vec<ValueId> = inst.defs().collect();
            if defs.iter().any(|&d| func.value(d).file != file) {
                continue;
            }
            let lanes = group_lanes(func, state, target, &defs)?;
            let span = lanes.iter().map(|l| l.pos + l.units).max().unwrap_or(0);
            let period = span.next_power_of_two();
            let no_room = || RaError::OutOfRegisters {
                function: func.name.clone(),
                file,
                value: func.value_label(defs[0]),
            };
            if period > 32 {
                return Err(no_room());
            }

            let fixed: Vec<(ValueId, i32, u32)> = func
                .values()
                .filter(|&(id, v)| {
                    v.file == file
                        && v.reg >= 0
                        && state.join.is_rep(id)
                        && lanes.iter().all(|l| l.root != id)
                })
                .map(|(id, v)| (id, v.reg, state.class_units(func, target, id)))
                .collect();
            let busy = |root: ValueId| {
                let mut set = RegisterSet::new(target);
                for &(id, reg, units) in &fixed {
                    if state.intervals[id.index()].overlaps(&state.intervals[root.index()]) {
                        set.occupy(file, reg, units);
                    }
                }
                set
            };

            let mut pinned: Option<i32> = None;
            for lane in &lanes {
                let reg = func.value(lane.root).reg;
                if reg < 0 {
                    continue;
                }
                let base = reg - lane.pos as i32;
                if pinned.is_some_and(|p| p != base) {
                    return Err(RaError::JoinInconsistency {
                        value: func.value_label(lane.root),
                    });
                }
                pinned = Some(base);
            }

            let base = match pinned {
                Some(base) => {
                    let last = RegisterSet::new(target).last(file);
                    if base < 0 || base + span as i32 - 1 > last {
                        return Err(no_room());
                    }
                    let clash = lanes.iter().any(|l| {
                        func.value(l.root).reg < 0
                            && !busy(l.root).is_free(file, base + l.pos as i32, l.units)
                    });
                    if clash {
                        return Err(no_room());
                    }
                    base
                }
                None => {
                    let mut combined = RegisterSet::new(target);
                    for lane in &lanes {
                        let mut set = busy(lane.root);
                        set.periodic_mask(file, 0, !lane_mask(period, lane.pos, lane.units));
                        combined.intersect(file, &set);
                    }
                    combined.assign(file, span).ok_or_else(no_room)?
                }
            };

            for lane in &lanes {
                if func.value(lane.root).reg < 0 {
                    func.value_mut(lane.root).reg = base + lane.pos as i32;
                }
            }
            log::debug!(
                "{}: placed {} results of {} at {}{}",
                func.name,
                defs.len(),
                i,
                file.reg_prefix(),
                base
            );
        }
    }
    Ok(())
}

/// Assign a register to every referenced class.
pub fn linear_scan(
    func: &mut Function,
    state: &mut FuncAlloc,
    target: &TargetDesc,
    session: &CompilationSession<'_>,
) -> RaResult<()> {
    let arena = session.arena();
    let mut unhandled = BumpVec::new_in(arena);
    for v in referenced_lvalues(func) {
        let root = state.join.rep(v);
        if !unhandled.contains(&root) {
            unhandled.push(root);
        }
    }
    unhandled.sort_by_key(|&v: &ValueId| state.intervals[v.index()].begin());
    let units: Vec<u32> = unhandled
        .iter()
        .map(|&v| state.class_units(func, target, v))
        .collect();

    let mut active: BumpVec<'_, usize> = BumpVec::new_in(arena);
    let mut inactive: BumpVec<'_, usize> = BumpVec::new_in(arena);
    let mut free = RegisterSet::new(target);
    let iv = |k: usize| &state.intervals[unhandled[k].index()];

    for cur in 0..unhandled.len() {
        let pos = iv(cur).begin();

        let mut k = 0;
        while k < active.len() {
            let a = active[k];
            let val = func.value(unhandled[a]);
            if iv(a).end() <= pos {
                free.release(val.file, val.reg, units[a]);
                active.swap_remove(k);
            } else if !iv(a).contains(pos) {
                free.release(val.file, val.reg, units[a]);
                inactive.push(a);
                active.swap_remove(k);
            } else {
                k += 1;
            }
        }
        let mut k = 0;
        while k < inactive.len() {
            let a = inactive[k];
            let val = func.value(unhandled[a]);
            if iv(a).end() <= pos {
                inactive.swap_remove(k);
            } else if iv(a).contains(pos) {
                free.occupy(val.file, val.reg, units[a]);
                active.push(a);
                inactive.swap_remove(k);
            } else {
                k += 1;
            }
        }

        let id = unhandled[cur];
        let file = func.value(id).file;
        if func.value(id).reg < 0 {
            let mut snapshot = free.clone();
            for &a in inactive.iter() {
                if iv(a).overlaps(iv(cur)) {
                    let val = func.value(unhandled[a]);
                    snapshot.occupy(val.file, val.reg, units[a]);
                }
            }
            for later in cur + 1..unhandled.len() {
                let val = func.value(unhandled[later]);
                if val.reg >= 0 && val.file == file && iv(later).overlaps(iv(cur)) {
                    snapshot.occupy(val.file, val.reg, units[later]);
                }
            }
            let Some(reg) = snapshot.assign(file, units[cur]) else {
                return Err(RaError::OutOfRegisters {
                    function: func.name.clone(),
                    file,
                    value: func.value_label(id),
                });
            };
            func.value_mut(id).reg = reg;
        }

        let reg = func.value(id).reg;
        if !free.occupy(file, reg, units[cur]) {
            let other = active.iter().map(|&a| unhandled[a]).find(|&o| {
                let val = func.value(o);
                val.file == file
                    && val.reg < reg + units[cur] as i32
                    && reg < val.reg + state.class_units(func, target, o) as i32
            });
            return Err(RaError::Interference {
                function: func.name.clone(),
                a: func.value_label(id),
                b: other.map_or_else(|| "?".to_string(), |o| func.value_label(o)),
                reg: format!("{}{}", file.reg_prefix(), reg),
            });
        }
        log::trace!(
            "{}: {} -> {}{}",
            func.name,
            func.value_label(id),
            file.reg_prefix(),
            reg
        );
        active.push(cur);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DataType, InstId, Instruction, Op, Value};
    use crate::ra::interval::LiveInterval;
    use bumpalo::Bump;

    #[test]
    fn test_lane_mask() {
        assert_eq!(lane_mask(4, 0, 1), 0x1111_1111);
        assert_eq!(lane_mask(4, 2, 1), 0x4444_4444);
        assert_eq!(lane_mask(4, 2, 2), 0xcccc_cccc);
        assert_eq!(lane_mask(4, 1, 2), 0x6666_6666);
        assert_eq!(lane_mask(32, 0, 3), 0x0000_0007);
    }

    /// Values defined by a nop each so they count as referenced.
    fn defined(func: &mut Function, sizes: &[u8]) -> Vec<ValueId> {
        let entry = func.entry;
        sizes
            .iter()
            .map(|&s| {
                let v = func.new_value(Value::new(RegFile::Gpr, s));
                let i = func.new_inst(Instruction::new(Op::Nop, DataType::None));
                func.set_def(i, 0, Some(v));
                func.append_inst(entry, i);
                v
            })
            .collect()
    }

    fn run(func: &mut Function, target: &TargetDesc, ranges: &[&[(u32, u32)]]) -> RaResult<FuncAlloc> {
        let intervals = ranges.iter().map(|r| LiveInterval::from_ranges(r)).collect();
        let mut state = FuncAlloc::new(func, intervals);
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        linear_scan(func, &mut state, target, &session)?;
        Ok(state)
    }

    #[test]
    fn test_expired_interval_frees_register() {
        let target = TargetDesc::nvc0().with_file_size(RegFile::Gpr, 1);
        let mut func = Function::new("f");
        let v = defined(&mut func, &[4, 4]);
        run(&mut func, &target, &[&[(0, 5)], &[(5, 10)]]).unwrap();
        assert_eq!(func.value(v[0]).reg, 0);
        assert_eq!(func.value(v[1]).reg, 0);
    }

    #[test]
    fn test_overlap_runs_out_of_registers() {
        let target = TargetDesc::nvc0().with_file_size(RegFile::Gpr, 1);
        let mut func = Function::new("f");
        defined(&mut func, &[4, 4]);
        let err = run(&mut func, &target, &[&[(0, 10)], &[(5, 15)]]).unwrap_err();
        assert!(matches!(err, RaError::OutOfRegisters { file: RegFile::Gpr, .. }));
    }

    #[test]
    fn test_lifetime_hole_is_reused() {
        let target = TargetDesc::nvc0().with_file_size(RegFile::Gpr, 2);
        let mut func = Function::new("f");
        let v = defined(&mut func, &[4, 4, 4]);
        // v0 has a hole over [4, 8) which v2 fits in
        run(&mut func, &target, &[&[(0, 4), (8, 12)], &[(1, 12)], &[(4, 8)]]).unwrap();
        assert_eq!(func.value(v[0]).reg, 0);
        assert_eq!(func.value(v[1]).reg, 1);
        assert_eq!(func.value(v[2]).reg, 0);
    }

    #[test]
    fn test_later_fixed_value_is_avoided() {
        let target = TargetDesc::nvc0();
        let mut func = Function::new("f");
        let v = defined(&mut func, &[4, 4]);
        func.value_mut(v[1]).reg = 0;
        run(&mut func, &target, &[&[(0, 10)], &[(5, 6)]]).unwrap();
        assert_eq!(func.value(v[0]).reg, 1);
    }

    #[test]
    fn test_wide_values_are_aligned() {
        let target = TargetDesc::nvc0();
        let mut func = Function::new("f");
        let v = defined(&mut func, &[4, 8]);
        run(&mut func, &target, &[&[(0, 10)], &[(1, 10)]]).unwrap();
        assert_eq!(func.value(v[0]).reg, 0);
        assert_eq!(func.value(v[1]).reg, 2);
    }

    #[test]
    fn test_fixed_conflict_is_interference() {
        let target = TargetDesc::nvc0();
        let mut func = Function::new("f");
        let v = defined(&mut func, &[4, 4]);
        func.value_mut(v[0]).reg = 3;
        func.value_mut(v[1]).reg = 3;
        let err = run(&mut func, &target, &[&[(0, 10)], &[(5, 6)]]).unwrap_err();
        assert!(matches!(err, RaError::Interference { .. }));
    }

    fn vector_inst(func: &mut Function, sizes: &[u8]) -> (InstId, Vec<ValueId>) {
        let entry = func.entry;
        let defs: Vec<ValueId> = sizes
            .iter()
            .map(|&s| func.new_value(Value::new(RegFile::Gpr, s)))
            .collect();
        let cst = func.new_inst(Instruction::new(Op::Constraint, DataType::B128));
        for (d, &v) in defs.iter().enumerate() {
            func.set_def(cst, d, Some(v));
        }
        func.append_inst(entry, cst);
        (cst, defs)
    }

    fn prepass(func: &mut Function, live: &[(ValueId, (u32, u32))]) -> RaResult<()> {
        let mut intervals = vec![LiveInterval::new(); func.num_value_slots()];
        for &(v, r) in live {
            intervals[v.index()] = LiveInterval::from_ranges(&[r]);
        }
        let mut state = FuncAlloc::new(func, intervals);
        allocate_constrained_values(func, &mut state, &TargetDesc::nvc0())
    }

    #[test]
    fn test_mixed_width_results_are_consecutive() {
        let mut func = Function::new("f");
        let (_, d) = vector_inst(&mut func, &[4, 8, 4]);
        let live: Vec<_> = d.iter().map(|&v| (v, (1, 4))).collect();
        prepass(&mut func, &live).unwrap();
        let regs: Vec<i32> = d.iter().map(|&v| func.value(v).reg).collect();
        assert_eq!(regs, vec![0, 1, 3]);
    }

    #[test]
    fn test_pinned_result_places_the_rest_around_it() {
        let mut func = Function::new("f");
        let (_, d) = vector_inst(&mut func, &[4, 4, 4]);
        func.value_mut(d[2]).reg = 6;
        let live: Vec<_> = d.iter().map(|&v| (v, (1, 4))).collect();
        prepass(&mut func, &live).unwrap();
        let regs: Vec<i32> = d.iter().map(|&v| func.value(v).reg).collect();
        assert_eq!(regs, vec![4, 5, 6]);
    }

    #[test]
    fn test_pinned_result_without_room_is_an_error() {
        let mut func = Function::new("f");
        let (_, d) = vector_inst(&mut func, &[4, 4]);
        func.value_mut(d[1]).reg = 0;
        let live: Vec<_> = d.iter().map(|&v| (v, (1, 4))).collect();
        let err = prepass(&mut func, &live).unwrap_err();
        assert!(matches!(err, RaError::OutOfRegisters { file: RegFile::Gpr, .. }));

        // a fixed class live across the slot the block needs
        let mut func = Function::new("f");
        let (_, d) = vector_inst(&mut func, &[4, 4]);
        let other = func.new_value(Value::new(RegFile::Gpr, 4));
        func.ins.push(other);
        func.value_mut(other).reg = 2;
        func.value_mut(d[1]).reg = 3;
        let mut live: Vec<_> = d.iter().map(|&v| (v, (1, 4))).collect();
        live.push((other, (0, 4)));
        assert!(prepass(&mut func, &live).is_err());
    }

    #[test]
    fn test_vector_results_avoid_fixed_lanes() {
        let target = TargetDesc::nvc0();
        let mut func = Function::new("f");
        let entry = func.entry;
        let fixed = func.new_value(Value::new(RegFile::Gpr, 4));
        func.value_mut(fixed).reg = 1;
        func.ins.push(fixed);
        let r: Vec<ValueId> = (0..4)
            .map(|_| func.new_value(Value::new(RegFile::Gpr, 4)))
            .collect();
        let tex = func.new_inst(Instruction::new(Op::Tex, DataType::F32));
        for (d, &v) in r.iter().enumerate() {
            func.set_def(tex, d, Some(v));
        }
        func.append_inst(entry, tex);

        let mut intervals = vec![LiveInterval::new(); func.num_value_slots()];
        intervals[fixed.index()] = LiveInterval::from_ranges(&[(0, 4)]);
        for &v in &r {
            intervals[v.index()] = LiveInterval::from_ranges(&[(1, 4)]);
        }
        let mut state = FuncAlloc::new(&func, intervals);
        allocate_constrained_values(&mut func, &mut state, &target).unwrap();
        let regs: Vec<i32> = r.iter().map(|&v| func.value(v).reg).collect();
        assert_eq!(regs, vec![4, 5, 6, 7]);
    }
}
