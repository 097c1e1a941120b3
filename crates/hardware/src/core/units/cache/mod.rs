//! Cache hierarchy interface.
//!
//! The execution core does not model caches itself. It talks to a
//! [`MemoryHierarchy`] through three calls:
//! 1. **`enqueuable`:** Whether a request slot is free this cycle for a target and address.
//! 2. **`enqueue`:** Submit a request carrying a [`CompletionToken`].
//! 3. **`process`:** Advance the hierarchy one cycle and drain finished requests into
//!    the engine's per-cycle inbox as [`Completion`] messages.
//!
//! Tokens identify their originator by handle and epoch, so a completion for
//! a load that has since been squashed or re-issued is recognised and dropped.
//! [`TimedHierarchy`] is a small self-contained implementation.

/// Fixed-latency hierarchy with a set-associative DL1 tag store.
pub mod timed;

pub use timed::TimedHierarchy;

use crate::common::{ActionId, Tick};
use crate::core::uop::UopHandle;

/// Which structure a request is sent to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemTarget {
    /// Data TLB for loads.
    Dtlb,
    /// TLB used by committed stores (second-level TLB when present).
    StoreDtlb,
    /// L1 data cache.
    Dl1,
    /// Memory repeater (uncacheable or remote accesses).
    Repeater,
}

/// Direction of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    /// Read.
    Read,
    /// Write.
    Write,
}

/// Originator of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenOwner {
    /// A load uop, valid while its action id is unchanged.
    Load {
        /// The load.
        uop: UopHandle,
        /// Load epoch at enqueue time.
        action_id: ActionId,
    },
    /// A committed store in the senior STQ.
    Store {
        /// STQ slot.
        stq_index: usize,
        /// Entry epoch at enqueue time.
        action_id: ActionId,
    },
}

/// Which half of a possibly line-crossing access a request covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessHalf {
    /// The half containing the first byte.
    First,
    /// The half containing the last byte.
    Last,
}

/// Identifies the request a completion belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionToken {
    /// Originator and its epoch.
    pub owner: TokenOwner,
    /// Access half.
    pub half: AccessHalf,
    /// Sent to the memory repeater rather than the DL1.
    pub repeated: bool,
}

/// A request to the hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemRequest {
    /// Destination.
    pub target: MemTarget,
    /// Read or write.
    pub kind: AccessKind,
    /// Address-space id.
    pub asid: u32,
    /// PC of the originating instruction.
    pub pc: u64,
    /// Address; a page-table address for TLB requests.
    pub addr: u64,
    /// Completion routing.
    pub token: CompletionToken,
    /// Second half of a line-crossing access.
    pub split: bool,
}

/// What finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionEvent {
    /// DL1 data returned (loads) or write performed (stores).
    Data,
    /// Address translation finished.
    Translated,
    /// Memory repeater answered.
    Repeater {
        /// The repeater held the data.
        hit: bool,
    },
    /// A load missed; its data is now expected after `latency` cycles, or
    /// [`BIG_LATENCY`](crate::common::BIG_LATENCY) if unknown.
    Reschedule {
        /// Predicted remaining latency.
        latency: Tick,
    },
}

/// A message in the engine's completion inbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Completion {
    /// Routing token from the request.
    pub token: CompletionToken,
    /// What happened.
    pub event: CompletionEvent,
}

/// The cache and TLB hierarchy as seen by the execution core.
pub trait MemoryHierarchy {
    /// Returns `true` if `target` can accept a request for `addr` this cycle.
    fn enqueuable(&self, target: MemTarget, asid: u32, addr: u64) -> bool;

    /// Submits a request. Callers check [`MemoryHierarchy::enqueuable`] first.
    fn enqueue(&mut self, request: MemRequest);

    /// Advances the hierarchy to cycle `now`, pushing every completion due
    /// at or before `now` onto `completions`.
    fn process(&mut self, now: Tick, completions: &mut Vec<Completion>);
}
