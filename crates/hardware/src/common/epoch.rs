//! Action-id (epoch) service.
//!
//! Every queue entry, ready-queue node and in-flight pipeline slot captures the
//! action id of the uop or entry it refers to. Squashing something is a matter
//! of stamping a fresh id: every outstanding reference then fails its
//! comparison and is dropped the next time it is looked at.

use std::fmt;

/// Epoch stamp for an in-flight reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(u64);

impl ActionId {
    /// The id carried by freshly built records that have never been stamped.
    pub const NONE: Self = Self(0);

    /// Raw counter value, for tracing.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-core monotonically increasing action-id counter.
#[derive(Debug, Default)]
pub struct ActionIdSource {
    next: u64,
}

impl ActionIdSource {
    /// Creates a counter; the first id handed out is 1.
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Returns a fresh id, distinct from every id returned before.
    pub const fn next_id(&mut self) -> ActionId {
        self.next += 1;
        ActionId(self.next)
    }
}
