// This module removes split and merge pseudo-ops once registers are known. Coalescing
// placed every part at its byte offset inside the wide value's class, so after ids are
// propagated each part must already sit at the wide value's register plus its offset.
// That is checked before the instruction is dropped; a mismatch means a join was lost
// and is reported instead of silently emitting wrong code.

//! Split/merge resolution.

use crate::core::error::{RaError, RaResult};
use crate::core::target::TargetDesc;
use crate::ir::{Function, InstId, Op, ValueId};

use super::FuncAlloc;

fn check_part(
    func: &Function,
    target: &TargetDesc,
    whole: ValueId,
    part: ValueId,
    off: i32,
) -> RaResult<()> {
    let (w, p) = (func.value(whole), func.value(part));
    if !w.is_lvalue() || !p.is_lvalue() {
        return Ok(());
    }
    let expected = w.reg + (off >> target.unit_log2(w.file));
    if p.file != w.file || p.reg != expected {
        return Err(RaError::JoinInconsistency {
            value: format!(
                "{} at {}{} (expected {}{})",
                func.value_label(part),
                p.file.reg_prefix(),
                p.reg,
                w.file.reg_prefix(),
                expected
            ),
        });
    }
    Ok(())
}

/// Verify and drop every split and merge; returns how many were removed.
pub fn resolve(func: &mut Function, state: &FuncAlloc, target: &TargetDesc) -> RaResult<usize> {
    let pseudo: Vec<InstId> = func
        .insts()
        .filter(|(_, inst)| inst.block().is_some() && matches!(inst.op, Op::Split | Op::Merge))
        .map(|(i, _)| i)
        .collect();

    for &i in &pseudo {
        let inst = func.inst(i);
        let (whole, parts): (Option<ValueId>, Vec<ValueId>) = match inst.op {
            Op::Split => (inst.src(0), inst.defs().collect()),
            _ => (inst.def(0), inst.srcs().collect()),
        };
        let Some(whole) = whole else {
            continue;
        };
        debug_assert!(parts
            .iter()
            .all(|&p| !func.value(p).is_lvalue()
                || state.join.find_const(p).0 == state.join.find_const(whole).0));
        let mut off = 0;
        for part in parts {
            check_part(func, target, whole, part, off)?;
            off += func.value(part).size as i32;
        }
    }
    for &i in &pseudo {
        func.remove_inst(i);
    }
    if !pseudo.is_empty() {
        log::debug!("{}: resolved {} split/merge ops", func.name, pseudo.len());
    }
    Ok(pseudo.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DataType, Instruction, RegFile, Value};

    fn merge(func: &mut Function, whole_reg: i32, part_regs: [i32; 2]) -> (ValueId, InstId) {
        let whole = func.new_value(Value::new(RegFile::Gpr, 8));
        func.value_mut(whole).reg = whole_reg;
        let i = func.new_inst(Instruction::new(Op::Merge, DataType::U64));
        func.set_def(i, 0, Some(whole));
        for (s, reg) in part_regs.into_iter().enumerate() {
            let part = func.new_value(Value::new(RegFile::Gpr, 4));
            func.value_mut(part).reg = reg;
            func.set_src(i, s, Some(part));
        }
        let entry = func.entry;
        func.append_inst(entry, i);
        (whole, i)
    }

    fn joined(func: &Function) -> FuncAlloc {
        let mut state = FuncAlloc::new(func, Vec::new());
        let whole = ValueId(0);
        state.join.union(whole, ValueId(1), 0, None);
        state.join.union(whole, ValueId(2), 4, None);
        state
    }

    #[test]
    fn test_consistent_merge_is_removed() {
        let mut func = Function::new("f");
        let (whole, _) = merge(&mut func, 4, [4, 5]);
        let state = joined(&func);
        assert_eq!(resolve(&mut func, &state, &TargetDesc::nvc0()), Ok(1));
        assert!(func.value(whole).defs().is_empty());
        assert!(func.first_inst(func.entry).is_none());
    }

    #[test]
    fn test_misplaced_part_is_reported() {
        let mut func = Function::new("f");
        merge(&mut func, 4, [4, 6]);
        let state = joined(&func);
        let err = resolve(&mut func, &state, &TargetDesc::nvc0()).unwrap_err();
        assert!(matches!(err, RaError::JoinInconsistency { .. }));
    }
}
