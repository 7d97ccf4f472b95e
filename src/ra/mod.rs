// This module drives register allocation. Functions are processed callee-first so that
// call sites can be bound to the registers of their callee's inputs, outputs and
// clobbers. For each function the pipeline is: insert texture/store constraints and
// load hazards, insert phi moves (splitting critical edges) and call argument moves,
// compute live sets, number instructions, build live intervals, run the target's
// coalescing passes, place vector-constrained groups, run the linear scan, copy class
// registers down to every member, resolve split/merge pseudo-ops, optionally verify,
// and record the register high-water mark and clobber list. The first failing pass
// aborts the whole program with its error; there is no spilling.

//! Linear-scan register allocation.
//!
//! # Usage
//!
//! ```ignore
//! use bumpalo::Bump;
//! use nvra::core::{CompilationSession, RaOptions};
//! use nvra::ra::RegAlloc;
//!
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! RegAlloc::new(&session, RaOptions::default()).run(&mut program)?;
//! ```

pub mod coalesce;
pub mod constraints;
pub mod interval;
pub mod join;
pub mod linear_scan;
pub mod liveness;
pub mod moves;
pub mod register_set;
pub mod split_merge;
pub mod verify;

pub use interval::LiveInterval;
pub use join::JoinForest;
pub use moves::CalleeAbi;
pub use register_set::RegisterSet;

use bumpalo::Bump;
use hashbrown::HashSet;
use std::fmt::Write;

use crate::core::error::RaResult;
use crate::core::session::{CompilationSession, SessionStats};
use crate::core::target::{RaOptions, TargetDesc};
use crate::ir::{cfg, Clobber, Function, Program, RegFile, ValueId};

/// Transient per-function allocation state: live intervals and join classes.
///
/// Class-level data (the unified interval) is stored at the class root.
#[derive(Debug, Clone)]
pub struct FuncAlloc {
    pub intervals: Vec<LiveInterval>,
    pub join: JoinForest,
}

impl FuncAlloc {
    pub fn new(func: &Function, mut intervals: Vec<LiveInterval>) -> Self {
        intervals.resize(func.num_value_slots(), LiveInterval::new());
        Self {
            intervals,
            join: JoinForest::new(func),
        }
    }

    /// Interval of the class `v` belongs to.
    pub fn class_interval(&self, v: ValueId) -> &LiveInterval {
        &self.intervals[self.join.find_const(v).0.index()]
    }

    /// Allocation units reserved for the class rooted at `root`.
    pub fn class_units(&self, func: &Function, target: &TargetDesc, root: ValueId) -> u32 {
        let unit = target.unit_log2(func.value(root).file);
        let bytes = self.join.extent(root).max(1);
        bytes.div_ceil(1 << unit).max(1)
    }

    /// Give every class member the register of its root plus its offset.
    pub fn propagate(&mut self, func: &mut Function, target: &TargetDesc) {
        for v in func.lvalues() {
            let (root, off) = self.join.find(v);
            if root == v {
                continue;
            }
            let base = func.value(root).reg;
            if base < 0 {
                continue;
            }
            let unit = target.unit_log2(func.value(v).file);
            func.value_mut(v).reg = base + (off >> unit);
        }
    }

    /// One line per class: root, members, register and interval.
    pub fn dump(&self, func: &Function) -> String {
        let mut out = String::new();
        for root in referenced_lvalues(func) {
            if self.join.find_const(root).0 != root {
                continue;
            }
            let members: Vec<String> = referenced_lvalues(func)
                .into_iter()
                .filter(|&m| m != root && self.join.find_const(m).0 == root)
                .map(|m| func.value_label(m))
                .collect();
            let val = func.value(root);
            let _ = write!(out, "{}", func.value_label(root));
            if !members.is_empty() {
                let _ = write!(out, " {{{}}}", members.join(", "));
            }
            if val.is_assigned() {
                let _ = write!(out, " {}{}", val.file.reg_prefix(), val.reg);
            }
            let _ = writeln!(out, ": {}", self.intervals[root.index()]);
        }
        out
    }
}

/// Register values that are defined, read, or part of the function interface.
pub fn referenced_lvalues(func: &Function) -> Vec<ValueId> {
    func.values()
        .filter(|(id, v)| {
            v.is_lvalue()
                && (!v.defs().is_empty()
                    || !v.uses().is_empty()
                    || func.ins.contains(id)
                    || func.outs.contains(id))
        })
        .map(|(id, _)| id)
        .collect()
}

/// Register allocator for whole programs.
pub struct RegAlloc<'s, 'arena> {
    session: &'s CompilationSession<'arena>,
    options: RaOptions,
}

impl<'s, 'arena> RegAlloc<'s, 'arena> {
    pub fn new(session: &'s CompilationSession<'arena>, options: RaOptions) -> Self {
        Self { session, options }
    }

    pub fn run(&self, prog: &mut Program) -> RaResult<()> {
        self.run_with(prog, |_, _| {})
    }

    /// Allocate every function, handing each one's final state to `inspect`
    /// before it is dropped.
    pub fn run_with<F>(&self, prog: &mut Program, mut inspect: F) -> RaResult<()>
    where
        F: FnMut(&Function, &FuncAlloc),
    {
        let target = prog.target.clone();
        let order = prog.call_order();
        let mut abis = vec![CalleeAbi::default(); prog.functions.len()];
        for f in order {
            let func = prog.function_mut(f);
            let state = self.exec_func(func, &target, &abis)?;
            inspect(func, &state);
            abis[f.index()] = CalleeAbi::of(func);
        }
        Ok(())
    }

    /// Run the whole pipeline on one function.
    pub fn exec_func(
        &self,
        func: &mut Function,
        target: &TargetDesc,
        abis: &[CalleeAbi],
    ) -> RaResult<FuncAlloc> {
        log::debug!("allocating registers for {}", func.name);
        func.loop_nesting_bound = cfg::loop_nesting_bound(func);

        constraints::InsertConstraints::new(func, target, self.session).run()?;
        moves::insert_phi_moves(func, self.session);
        moves::insert_argument_moves(func, abis, target, self.session);

        let live_in = liveness::build_live_sets(func);
        let order = liveness::number_instructions(func);
        let intervals = liveness::build_intervals(func, &live_in, &order);
        let mut state = FuncAlloc::new(func, intervals);

        for &mask in &target.join_passes {
            coalesce::coalesce_values(func, &mut state, target, mask, self.session)?;
        }

        linear_scan::allocate_constrained_values(func, &mut state, target)?;
        linear_scan::linear_scan(func, &mut state, target, self.session)?;
        state.propagate(func, target);
        split_merge::resolve(func, &state, target)?;

        if self.options.verify {
            verify::verify_allocation(func, &state, target)?;
        }
        record_usage(func, target);
        if self.options.dump {
            log::debug!("{}", func);
            log::debug!("{}: intervals\n{}", func.name, state.dump(func));
        }
        self.session.record_function_allocated(&func.max_reg);
        Ok(state)
    }
}

/// Fill in the register high-water mark and the clobber list of `func`.
fn record_usage(func: &mut Function, target: &TargetDesc) {
    let mut max_reg = func.max_reg;
    for file in RegFile::REGISTER_FILES {
        max_reg[file] = -1;
    }
    for v in referenced_lvalues(func) {
        let val = func.value(v);
        if val.reg < 0 {
            continue;
        }
        let units = (val.size as u32).div_ceil(1 << target.unit_log2(val.file)).max(1);
        let top = val.reg + units as i32 - 1;
        max_reg[val.file] = max_reg[val.file].max(top);
    }
    func.max_reg = max_reg;

    let mut seen = HashSet::new();
    let mut clobbers = Vec::new();
    for (_, inst) in func.insts() {
        for d in inst.defs() {
            let val = func.value(d);
            if !val.is_lvalue() || val.reg < 0 {
                continue;
            }
            let clobber = Clobber {
                file: val.file,
                id: val.reg,
                size: val.size,
            };
            if seen.insert(clobber) {
                clobbers.push(clobber);
            }
        }
    }
    clobbers.sort_by_key(|c| (c.file, c.id, c.size));
    func.clobbers = clobbers;
}

/// Allocate registers for a whole program with a private session.
pub fn allocate_program(prog: &mut Program, options: RaOptions) -> RaResult<SessionStats> {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    RegAlloc::new(&session, options).run(prog)?;
    Ok(session.stats())
}
