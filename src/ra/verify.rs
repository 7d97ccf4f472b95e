// This module checks a finished allocation. Every register value that is defined,
// read or part of the function interface must have a register, and no two classes of
// the same file may hold overlapping register units while their intervals overlap.
// Members of one class share storage by construction and are not compared. The
// results of texture instructions and constraint bundles must also follow each other
// without gaps.

//! Post-allocation interference check.

use crate::core::error::{RaError, RaResult};
use crate::core::target::TargetDesc;
use crate::ir::{Function, RegFile, ValueId};

use super::{referenced_lvalues, FuncAlloc};

pub fn verify_allocation(func: &Function, state: &FuncAlloc, target: &TargetDesc) -> RaResult<()> {
    let mut roots: Vec<ValueId> = Vec::new();
    for v in referenced_lvalues(func) {
        if func.value(v).reg < 0 {
            return Err(RaError::InvalidIr {
                reason: format!("{}: {} has no register", func.name, func.value_label(v)),
            });
        }
        let root = state.join.find_const(v).0;
        if !roots.contains(&root) {
            roots.push(root);
        }
    }

    for (k, &a) in roots.iter().enumerate() {
        let va = func.value(a);
        let ua = state.class_units(func, target, a) as i32;
        for &b in &roots[k + 1..] {
            let vb = func.value(b);
            if va.file != vb.file {
                continue;
            }
            let ub = state.class_units(func, target, b) as i32;
            if va.reg >= vb.reg + ub || vb.reg >= va.reg + ua {
                continue;
            }
            if state.intervals[a.index()].overlaps(&state.intervals[b.index()]) {
                return Err(RaError::Interference {
                    function: func.name.clone(),
                    a: func.value_label(a),
                    b: func.value_label(b),
                    reg: format!("{}{}", va.file.reg_prefix(), va.reg.max(vb.reg)),
                });
            }
        }
    }
    check_vector_results(func, target)?;
    log::trace!("{}: {} classes verified", func.name, roots.len());
    Ok(())
}

fn check_vector_results(func: &Function, target: &TargetDesc) -> RaResult<()> {
    let unit = target.unit_log2(RegFile::Gpr);
    for b in func.block_ids() {
        for i in func.block_insts(b) {
            let inst = func.inst(i);
            if !inst.vector_defs() || inst.defs().any(|d| func.value(d).file != RegFile::Gpr) {
                continue;
            }
            let mut next: Option<i32> = None;
            for d in inst.defs() {
                let val = func.value(d);
                if next.is_some_and(|n| n != val.reg) {
                    return Err(RaError::InvalidIr {
                        reason: format!(
                            "{}: results of {} are not consecutive at {}",
                            func.name,
                            i,
                            func.value_label(d)
                        ),
                    });
                }
                next = Some(val.reg + (val.size as u32).div_ceil(1 << unit).max(1) as i32);
            }
        }
    }
    Ok(())
}
