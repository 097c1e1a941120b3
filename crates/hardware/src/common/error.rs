//! Engine and configuration error definitions.
//!
//! This module defines the error types returned by the execution core. It provides:
//! 1. **Engine Errors:** Broken invariants that indicate a simulator bug. Callers
//!    are expected to abort the simulation on any of these.
//! 2. **Configuration Errors:** Malformed or inconsistent configuration input.
//!
//! Expected back-pressure ("queue full", "cannot issue this cycle") is never an
//! error; those paths return `bool` or `Option`.

use thiserror::Error;

use super::constants::Tick;

/// A broken engine invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecError {
    /// Insert into a queue that has no free slot.
    #[error("{queue} is full (capacity {capacity})")]
    QueueFull {
        /// Queue name (`RS`, `LDQ`, `STQ`).
        queue: &'static str,
        /// Configured capacity.
        capacity: usize,
    },

    /// Deallocate or squash from an empty queue.
    #[error("{queue} is empty")]
    QueueEmpty {
        /// Queue name.
        queue: &'static str,
    },

    /// An index that does not address a live slot.
    #[error("{queue} index {index} out of range or not live")]
    BadIndex {
        /// Queue or table name.
        queue: &'static str,
        /// Offending index.
        index: usize,
    },

    /// A uop handle that no longer resolves where a live uop is required.
    #[error("stale uop handle in {context}")]
    StaleUop {
        /// The operation that needed the uop.
        context: &'static str,
    },

    /// A uop is missing the queue slot its kind requires.
    #[error("uop seq {seq} has no {slot} slot")]
    MissingSlot {
        /// Uop sequence number.
        seq: u64,
        /// Slot kind (`port`, `LDQ`, `STQ`, `RS`).
        slot: &'static str,
    },

    /// A uop was bound to a port without a functional unit for its class.
    #[error("port {port} has no functional unit for {class}")]
    NoFunctionalUnit {
        /// Port index.
        port: usize,
        /// FU class name.
        class: &'static str,
    },

    /// `insert_ready_uop` preconditions violated.
    #[error("uop seq {seq} cannot enter the ready queue: {reason}")]
    NotSchedulable {
        /// Uop sequence number.
        seq: u64,
        /// Which precondition failed.
        reason: &'static str,
    },

    /// Store-color walk ran into the STQ tail.
    #[error("store color chain from STQ {from} reached the tail at {tail}")]
    ColorChainOverrun {
        /// Starting STQ index.
        from: usize,
        /// STQ tail.
        tail: usize,
    },

    /// Occupancy counters disagree with the structure contents.
    #[error("{structure} occupancy {count} at cycle {cycle}, expected {expected}")]
    Occupancy {
        /// Structure name.
        structure: &'static str,
        /// Observed count.
        count: usize,
        /// Expected count.
        expected: usize,
        /// Cycle of the check.
        cycle: Tick,
    },
}

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON parse failure.
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// File could not be read.
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed memory-dependence predictor option string.
    #[error("invalid memdep predictor option `{0}`")]
    MemDepOption(String),

    /// A field has a value the engine cannot model.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the field.
        field: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
