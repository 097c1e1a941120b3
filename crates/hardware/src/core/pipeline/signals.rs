//! Signals from the execution core to the front end.
//!
//! The engine never squashes the front end directly. Hardware events that
//! require a redirect are queued as [`PipelineSignal`]s and drained by the
//! owner after each cycle:
//! 1. **Recover:** A control uop resolved to a different next PC than predicted.
//!    Everything younger than the uop is squashed and fetch restarts at `new_pc`.
//! 2. **Flush:** A load was found to have executed before an older overlapping
//!    store. The macro-op containing the load is squashed along with everything
//!    younger, and re-fetched.

use std::fmt;

/// A redirect request raised by the execution core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineSignal {
    /// Branch (or load-fed return) misprediction.
    Recover {
        /// Macro-op of the mispredicted uop.
        mop_seq: u64,
        /// The uop that detected the misprediction.
        seq: u64,
        /// Correct next PC.
        new_pc: u64,
    },
    /// Memory-order violation.
    Flush {
        /// Macro-op of the offending load; it is squashed too.
        mop_seq: u64,
        /// The offending load.
        seq: u64,
    },
}

impl PipelineSignal {
    /// Macro-op the signal refers to.
    pub const fn mop_seq(&self) -> u64 {
        match *self {
            Self::Recover { mop_seq, .. } | Self::Flush { mop_seq, .. } => mop_seq,
        }
    }
}

impl fmt::Display for PipelineSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Recover {
                mop_seq,
                seq,
                new_pc,
            } => write!(f, "recover mop {mop_seq} (uop {seq}) -> {new_pc:#x}"),
            Self::Flush { mop_seq, seq } => write!(f, "flush mop {mop_seq} (uop {seq})"),
        }
    }
}
