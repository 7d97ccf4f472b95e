// This module provides the allocation session: the owner of a bumpalo arena used for
// short-lived per-function scratch data (linear-scan work lists, constraint bundle
// lists, liveness work queues) and of SessionStats, the counters every pass reports
// into. Passes only hold a shared reference, so statistics are kept in a RefCell and
// updated through small record_* methods. The arena is reset by the caller between
// programs; nothing allocated in it outlives the session.

//! Arena-backed allocation session and statistics.

use bumpalo::Bump;
use std::cell::RefCell;
use std::fmt;

use crate::ir::{PerRegFile, RegFile};

/// Counters collected over one or more allocation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub functions_allocated: usize,
    /// Copies inserted for phis, constraints and call arguments.
    pub moves_inserted: usize,
    pub constraints_created: usize,
    pub constraints_reused: usize,
    /// Hazard NOPs placed after wide indirect loads.
    pub hazards_inserted: usize,
    pub values_joined: usize,
    pub edges_split: usize,
    /// Highest register unit used in any function, per file.
    pub max_reg: PerRegFile<i32>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            functions_allocated: 0,
            moves_inserted: 0,
            constraints_created: 0,
            constraints_reused: 0,
            hazards_inserted: 0,
            values_joined: 0,
            edges_split: 0,
            max_reg: PerRegFile::new_with(|_| -1),
        }
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Register Allocation Statistics:")?;
        writeln!(f, "  Functions allocated: {}", self.functions_allocated)?;
        writeln!(f, "  Moves inserted: {}", self.moves_inserted)?;
        writeln!(
            f,
            "  Constraints: {} created, {} reused",
            self.constraints_created, self.constraints_reused
        )?;
        writeln!(f, "  Hazards inserted: {}", self.hazards_inserted)?;
        writeln!(f, "  Values joined: {}", self.values_joined)?;
        writeln!(f, "  Edges split: {}", self.edges_split)?;
        for (file, max) in self.max_reg.iter() {
            if *max >= 0 {
                writeln!(f, "  Max {file} register: {max}")?;
            }
        }
        Ok(())
    }
}

/// Arena-based allocation session.
pub struct CompilationSession<'arena> {
    arena: &'arena Bump,
    stats: RefCell<SessionStats>,
}

impl<'arena> CompilationSession<'arena> {
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
        }
    }

    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }

    pub fn record_function_allocated(&self, max_reg: &PerRegFile<i32>) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_allocated += 1;
        for file in RegFile::REGISTER_FILES {
            stats.max_reg[file] = stats.max_reg[file].max(max_reg[file]);
        }
    }

    pub fn record_moves(&self, n: usize) {
        self.stats.borrow_mut().moves_inserted += n;
    }

    pub fn record_constraint(&self, reused: bool) {
        let mut stats = self.stats.borrow_mut();
        if reused {
            stats.constraints_reused += 1;
        } else {
            stats.constraints_created += 1;
        }
    }

    pub fn record_hazard(&self) {
        self.stats.borrow_mut().hazards_inserted += 1;
    }

    pub fn record_join(&self) {
        self.stats.borrow_mut().values_joined += 1;
    }

    pub fn record_edge_split(&self) {
        self.stats.borrow_mut().edges_split += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_statistics() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        session.record_moves(3);
        session.record_constraint(false);
        session.record_constraint(true);
        session.record_constraint(true);
        session.record_join();
        let mut max = PerRegFile::new_with(|_| -1);
        max[RegFile::Gpr] = 7;
        session.record_function_allocated(&max);
        max[RegFile::Gpr] = 3;
        session.record_function_allocated(&max);

        let stats = session.stats();
        assert_eq!(stats.moves_inserted, 3);
        assert_eq!(stats.constraints_created, 1);
        assert_eq!(stats.constraints_reused, 2);
        assert_eq!(stats.values_joined, 1);
        assert_eq!(stats.functions_allocated, 2);
        assert_eq!(stats.max_reg[RegFile::Gpr], 7);
        assert_eq!(stats.max_reg[RegFile::Predicate], -1);
        assert!(stats.to_string().contains("Max gpr register: 7"));
    }

    #[test]
    fn test_arena_scratch() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut list = bumpalo::collections::Vec::new_in(session.arena());
        list.extend([1u32, 2, 3]);
        assert_eq!(list.iter().sum::<u32>(), 6);
    }
}
