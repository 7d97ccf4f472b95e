// This module defines the error types of the register allocator using thiserror.
// RaError separates resource exhaustion (no register left for a value; there is no
// spilling, so this aborts the run) from internal-consistency failures (a phi that
// cannot share its operands' register, a broken coalescing class, malformed IR handed
// in by the caller, an interference found by post-allocation verification). Each
// variant carries the function and value context needed to locate the problem.
// RaResult<T> is the alias used by every pass; the first error aborts the whole run.

//! Error types for register allocation.

use crate::ir::RegFile;
use thiserror::Error;

/// Main error type for register allocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RaError {
    #[error("{function}: no free {file} register for {value}")]
    OutOfRegisters {
        function: String,
        file: RegFile,
        value: String,
    },

    #[error("{function}: failed to coalesce phi {value} with its sources")]
    PhiCoalesce { function: String, value: String },

    #[error("inconsistent join for {value}")]
    JoinInconsistency { value: String },

    #[error("Invalid IR: {reason}")]
    InvalidIr { reason: String },

    #[error("Unsupported chipset: {chipset:#x}")]
    UnsupportedChipset { chipset: u32 },

    #[error("{function}: {a} and {b} overlap in {reg}")]
    Interference {
        function: String,
        a: String,
        b: String,
        reg: String,
    },
}

/// Result type alias for allocator passes.
pub type RaResult<T> = Result<T, RaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RaError::OutOfRegisters {
            function: "main".into(),
            file: RegFile::Gpr,
            value: "%a".into(),
        };
        assert_eq!(err.to_string(), "main: no free gpr register for %a");
        assert_eq!(
            RaError::UnsupportedChipset { chipset: 0x40 }.to_string(),
            "Unsupported chipset: 0x40"
        );
    }
}
