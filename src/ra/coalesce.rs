// This module joins values into classes that must, or may, share a register. Each
// pass is driven by a JoinMask: phi results with their sources, union/split/merge
// pieces at their byte offsets, constraint bundles with the values they copy, NV50
// texture results with their arguments, and finally plain moves. Forced joins come
// from pseudo-ops whose semantics require a shared register and fail hard when the
// class layout cannot satisfy them; voluntary joins (phi and mov) are refused if the
// classes live at the same time, differ in file or size, or would drag an unfixed
// class onto a fixed register another fixed class already holds while it is live.

//! Value coalescing.

use crate::core::error::{RaError, RaResult};
use crate::core::session::CompilationSession;
use crate::core::target::{JoinMask, TargetDesc};
use crate::ir::cfg::reverse_post_order;
use crate::ir::{Function, Op, ValueId};

use super::FuncAlloc;

/// Join `src` into the class of `dst` so that it sits `delta` bytes after it.
///
/// Returns `Ok(false)` if the join is refused. A forced join skips the
/// interference checks but still needs a consistent layout.
pub fn coalesce(
    func: &mut Function,
    state: &mut FuncAlloc,
    target: &TargetDesc,
    dst: ValueId,
    src: ValueId,
    delta: i32,
    force: bool,
) -> RaResult<bool> {
    let (rd, od) = state.join.find(dst);
    let (rs, os) = state.join.find(src);
    if rd == rs {
        return Ok(od + delta == os);
    }
    // Byte position of rs relative to rd.
    let d = od + delta - os;
    let (file, fd) = (func.value(rd).file, func.value(rd).reg);
    let fs = func.value(rs).reg;
    let unit = target.unit_log2(file);

    if fd >= 0 && fs >= 0 && fs != fd + (d >> unit) {
        return Ok(false);
    }
    if !force {
        if func.value(rs).file != file
            || d != 0
            || state.join.extent(rd) != state.join.extent(rs)
            || state.intervals[rd.index()].overlaps(&state.intervals[rs.index()])
        {
            return Ok(false);
        }
        if (fd >= 0) != (fs >= 0) {
            let (fixed, other) = if fd >= 0 { (rd, rs) } else { (rs, rd) };
            if fixed_conflict(func, state, target, fixed, other) {
                return Ok(false);
            }
        }
    }

    let prefer = match (fd >= 0, fs >= 0) {
        (false, true) => Some(rs),
        (true, _) => Some(rd),
        _ => None,
    };
    let rs_under_rd = d > 0 || (d == 0 && prefer != Some(rs));
    let (root, child, off) = if rs_under_rd { (rd, rs, d) } else { (rs, rd, -d) };
    let (root_reg, child_reg) = (func.value(root).reg, func.value(child).reg);
    let inherited = if root_reg < 0 && child_reg >= 0 {
        let reg = child_reg - (off >> unit);
        if reg < 0 {
            return Ok(false);
        }
        Some(reg)
    } else {
        None
    };

    if state.join.union(rd, rs, d, prefer) != Some(root) {
        return Err(RaError::JoinInconsistency {
            value: func.value_label(src),
        });
    }
    if let Some(reg) = inherited {
        func.value_mut(root).reg = reg;
    }
    let child_iv = std::mem::take(&mut state.intervals[child.index()]);
    state.intervals[root.index()].unify(&child_iv);
    state.intervals[child.index()] = child_iv;

    log::debug!(
        "{}: joining {} to {}",
        func.name,
        func.value_label(src),
        func.value_label(dst)
    );
    Ok(true)
}

/// Whether giving the class of `other` the register of `fixed` would collide
/// with another fixed class while both are live.
fn fixed_conflict(
    func: &Function,
    state: &FuncAlloc,
    target: &TargetDesc,
    fixed: ValueId,
    other: ValueId,
) -> bool {
    let file = func.value(fixed).file;
    let reg = func.value(fixed).reg;
    let units = state.class_units(func, target, fixed) as i32;
    func.values()
        .filter(|&(id, v)| {
            id != fixed
                && v.file == file
                && v.reg >= 0
                && state.join.is_rep(id)
                && v.reg < reg + units
                && reg < v.reg + state.class_units(func, target, id) as i32
        })
        .any(|(id, _)| state.intervals[id.index()].overlaps(&state.intervals[other.index()]))
}

fn is_lvalue_src(func: &Function, v: Option<ValueId>) -> Option<ValueId> {
    v.filter(|&v| func.value(v).is_lvalue())
}

fn forced(
    func: &mut Function,
    state: &mut FuncAlloc,
    target: &TargetDesc,
    dst: ValueId,
    src: ValueId,
    delta: i32,
) -> RaResult<()> {
    if coalesce(func, state, target, dst, src, delta, true)? {
        Ok(())
    } else {
        Err(RaError::JoinInconsistency {
            value: func.value_label(src),
        })
    }
}

/// Run one coalescing pass over every instruction selected by `mask`.
pub fn coalesce_values(
    func: &mut Function,
    state: &mut FuncAlloc,
    target: &TargetDesc,
    mask: JoinMask,
    session: &CompilationSession<'_>,
) -> RaResult<()> {
    let mut joined = 0;
    for b in reverse_post_order(func) {
        for i in func.block_insts(b) {
            let inst = func.inst(i);
            let op = inst.op;
            let defs: Vec<Option<ValueId>> = (0..inst.defs.len()).map(|d| inst.def(d)).collect();
            let srcs: Vec<Option<ValueId>> = inst.srcs.iter().map(|s| s.value).collect();
            let lvalue_srcs: Vec<ValueId> = srcs.iter().filter_map(|&s| is_lvalue_src(func, s)).collect();

            match op {
                Op::Phi if mask.contains(JoinMask::PHI) => {
                    let Some(d) = defs.first().copied().flatten() else {
                        continue;
                    };
                    for &s in &lvalue_srcs {
                        if !coalesce(func, state, target, d, s, 0, false)? {
                            return Err(RaError::PhiCoalesce {
                                function: func.name.clone(),
                                value: func.value_label(d),
                            });
                        }
                        joined += 1;
                    }
                }
                Op::Union if mask.contains(JoinMask::UNION) => {
                    let Some(d) = defs.first().copied().flatten() else {
                        continue;
                    };
                    for &s in &lvalue_srcs {
                        forced(func, state, target, d, s, 0)?;
                        joined += 1;
                    }
                }
                Op::Split if mask.contains(JoinMask::UNION) => {
                    let Some(whole) = is_lvalue_src(func, srcs.first().copied().flatten()) else {
                        continue;
                    };
                    let mut off = 0;
                    for d in defs.iter().copied().flatten() {
                        forced(func, state, target, whole, d, off)?;
                        off += func.value(d).size as i32;
                        joined += 1;
                    }
                }
                Op::Merge if mask.contains(JoinMask::UNION) => {
                    let Some(whole) = defs.first().copied().flatten() else {
                        continue;
                    };
                    let mut off = 0;
                    for s in srcs.iter().copied().flatten() {
                        let size = func.value(s).size as i32;
                        if func.value(s).is_lvalue() {
                            forced(func, state, target, whole, s, off)?;
                            joined += 1;
                        }
                        off += size;
                    }
                }
                Op::Constraint if mask.contains(JoinMask::CONSTRAINT) => {
                    for (c, d) in defs.iter().enumerate() {
                        let (Some(d), Some(s)) = (*d, is_lvalue_src(func, srcs.get(c).copied().flatten()))
                        else {
                            continue;
                        };
                        forced(func, state, target, d, s, 0)?;
                        joined += 1;
                    }
                }
                op if op.is_tex() && mask.contains(JoinMask::TEX) => {
                    for (c, d) in defs.iter().enumerate() {
                        let (Some(d), Some(s)) = (*d, is_lvalue_src(func, srcs.get(c).copied().flatten()))
                        else {
                            continue;
                        };
                        forced(func, state, target, d, s, 0)?;
                        joined += 1;
                    }
                }
                Op::Mov if mask.contains(JoinMask::MOV) => {
                    let (Some(d), Some(s)) = (
                        defs.first().copied().flatten(),
                        is_lvalue_src(func, srcs.first().copied().flatten()),
                    ) else {
                        continue;
                    };
                    let feeds_constraint = func
                        .value(d)
                        .uses()
                        .iter()
                        .any(|u| func.inst(u.inst).op == Op::Constraint);
                    if feeds_constraint {
                        continue;
                    }
                    let Some(src_def) = func.unique_def(s) else {
                        continue;
                    };
                    if func.inst(src_def).constrained_defs() {
                        continue;
                    }
                    if coalesce(func, state, target, d, s, 0, false)? {
                        joined += 1;
                    }
                }
                _ => {}
            }
        }
    }
    for _ in 0..joined {
        session.record_join();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DataType, Instruction, RegFile, Value};
    use crate::ra::interval::LiveInterval;

    fn setup(sizes: &[u8]) -> (Function, Vec<ValueId>) {
        let mut func = Function::new("f");
        let ids = sizes
            .iter()
            .map(|&s| func.new_value(Value::new(RegFile::Gpr, s)))
            .collect();
        (func, ids)
    }

    fn state_with(func: &Function, ranges: &[&[(u32, u32)]]) -> FuncAlloc {
        let intervals = ranges.iter().map(|r| LiveInterval::from_ranges(r)).collect();
        FuncAlloc::new(func, intervals)
    }

    #[test]
    fn test_voluntary_join_refuses_overlap() {
        let target = TargetDesc::nvc0();
        let (mut func, v) = setup(&[4, 4, 4]);
        let mut state = state_with(&func, &[&[(0, 5)], &[(5, 9)], &[(3, 7)]]);
        assert!(coalesce(&mut func, &mut state, &target, v[0], v[1], 0, false).unwrap());
        assert_eq!(state.class_interval(v[1]).to_string(), "[0, 9)");
        assert!(!coalesce(&mut func, &mut state, &target, v[0], v[2], 0, false).unwrap());
        // forced joins ignore liveness
        assert!(coalesce(&mut func, &mut state, &target, v[0], v[2], 0, true).unwrap());
    }

    #[test]
    fn test_repeated_join_is_a_no_op() {
        let target = TargetDesc::nvc0();
        let (mut func, v) = setup(&[4, 4]);
        let mut state = state_with(&func, &[&[(0, 3)], &[(3, 6)]]);
        assert!(coalesce(&mut func, &mut state, &target, v[0], v[1], 0, false).unwrap());
        let root = state.join.rep(v[1]);
        let interval = state.class_interval(v[1]).to_string();

        assert!(coalesce(&mut func, &mut state, &target, v[0], v[1], 0, false).unwrap());
        assert_eq!(state.join.rep(v[1]), root);
        assert_eq!(state.join.rep(v[0]), root);
        assert_eq!(state.class_interval(v[1]).to_string(), interval);
        assert_eq!(interval, "[0, 6)");
        // same pair at a different offset contradicts the existing layout
        assert!(!coalesce(&mut func, &mut state, &target, v[0], v[1], 4, true).unwrap());
    }

    #[test]
    fn test_voluntary_join_requires_same_size() {
        let target = TargetDesc::nvc0();
        let (mut func, v) = setup(&[4, 8]);
        let mut state = state_with(&func, &[&[(0, 2)], &[(4, 6)]]);
        assert!(!coalesce(&mut func, &mut state, &target, v[0], v[1], 0, false).unwrap());
    }

    #[test]
    fn test_fixed_register_moves_to_root() {
        let target = TargetDesc::nvc0();
        let (mut func, v) = setup(&[4, 4]);
        func.value_mut(v[1]).reg = 5;
        let mut state = state_with(&func, &[&[(0, 2)], &[(2, 4)]]);
        assert!(coalesce(&mut func, &mut state, &target, v[0], v[1], 0, false).unwrap());
        let root = state.join.rep(v[0]);
        assert_eq!(root, v[1]);
        assert_eq!(func.value(root).reg, 5);
    }

    #[test]
    fn test_fixed_register_conflict_is_refused() {
        let target = TargetDesc::nvc0();
        let (mut func, v) = setup(&[4, 4, 4]);
        // v1 and v2 both hold $r0; v0 is live while v2 is
        func.value_mut(v[1]).reg = 0;
        func.value_mut(v[2]).reg = 0;
        let mut state = state_with(&func, &[&[(2, 6)], &[(0, 2)], &[(4, 5)]]);
        assert!(!coalesce(&mut func, &mut state, &target, v[1], v[0], 0, false).unwrap());
    }

    #[test]
    fn test_split_parts_get_offsets() {
        let target = TargetDesc::nvc0();
        let mut func = Function::new("f");
        let whole = func.new_value(Value::new(RegFile::Gpr, 8));
        let lo = func.new_value(Value::new(RegFile::Gpr, 4));
        let hi = func.new_value(Value::new(RegFile::Gpr, 4));
        let split = func.new_inst(Instruction::new(Op::Split, DataType::U32));
        func.set_src(split, 0, Some(whole));
        func.set_def(split, 0, Some(lo));
        func.set_def(split, 1, Some(hi));
        let entry = func.entry;
        func.append_inst(entry, split);

        let arena = bumpalo::Bump::new();
        let session = CompilationSession::new(&arena);
        let mut state = FuncAlloc::new(&func, Vec::new());
        coalesce_values(&mut func, &mut state, &target, JoinMask::UNION, &session).unwrap();
        assert_eq!(state.join.find(hi), (whole, 4));
        assert_eq!(state.join.find(lo), (whole, 0));
        assert_eq!(session.stats().values_joined, 2);
    }
}
