//! Load queue.
//!
//! A circular buffer of loads and fences in program order. Each entry tracks
//! the two halves of a possibly line-crossing access separately, for both
//! the DL1 path and the memory repeater path, and remembers the youngest
//! older store at allocation (`store_color`) as the anchor for disambiguation.

use crate::common::{ActionId, ActionIdSource, ExecError, TICK_NEVER, Tick};
use crate::core::uop::{FenceKind, UopHandle, UopPool};

use super::stq::StoreQueue;

/// One LDQ entry.
#[derive(Clone, Debug)]
pub struct LdqEntry {
    /// The load or fence.
    pub uop: Option<UopHandle>,
    /// Sequence number of `uop`.
    pub seq: u64,
    /// Fence kind, for fence entries.
    pub fence: Option<FenceKind>,
    /// Access size in bytes.
    pub mem_size: u64,
    /// Virtual address, once computed.
    pub virt_addr: u64,
    /// `virt_addr` is known.
    pub addr_valid: bool,
    /// STQ index of the youngest store older than this load.
    pub store_color: usize,
    /// Epoch of that store's entry at allocation; heavy fences wait for it to change.
    pub colored_store_action_id: ActionId,
    /// Request for the half containing the first byte has been sent.
    pub first_byte_requested: bool,
    /// Request for the half containing the last byte has been sent.
    pub last_byte_requested: bool,
    /// DL1 data for the first half arrived.
    pub first_byte_arrived: bool,
    /// DL1 data for the last half arrived.
    pub last_byte_arrived: bool,
    /// The first half was sent to the repeater.
    pub first_repeated: bool,
    /// The last half was sent to the repeater.
    pub last_repeated: bool,
    /// The repeater answered for the first half.
    pub repeater_first_arrived: bool,
    /// The repeater answered for the last half.
    pub repeater_last_arrived: bool,
    /// Value was forwarded from the STQ.
    pub hit_in_stq: bool,
    /// A partially overlapping older store blocks this load.
    pub partial_forward: bool,
    /// Dependents were woken assuming a DL1 hit.
    pub speculative_broadcast: bool,
    /// Sent only to the STQ search pipeline, expecting a forward.
    pub forward_only: bool,
    /// Cycle the load issued to memory, [`TICK_NEVER`] while it may issue.
    pub when_issued: Tick,
}

impl Default for LdqEntry {
    fn default() -> Self {
        Self {
            uop: None,
            seq: 0,
            fence: None,
            mem_size: 0,
            virt_addr: 0,
            addr_valid: false,
            store_color: 0,
            colored_store_action_id: ActionId::NONE,
            first_byte_requested: false,
            last_byte_requested: false,
            first_byte_arrived: false,
            last_byte_arrived: false,
            first_repeated: false,
            last_repeated: false,
            repeater_first_arrived: false,
            repeater_last_arrived: false,
            hit_in_stq: false,
            partial_forward: false,
            speculative_broadcast: false,
            forward_only: false,
            when_issued: TICK_NEVER,
        }
    }
}

impl LdqEntry {
    /// Both halves have their data, from the repeater where one was used.
    pub const fn all_arrived(&self) -> bool {
        let first = if self.first_repeated {
            self.repeater_first_arrived
        } else {
            self.first_byte_arrived
        };
        let last = if self.last_repeated {
            self.repeater_last_arrived
        } else {
            self.last_byte_arrived
        };
        first && last
    }

    /// Forgets every outstanding request and arrival.
    pub(crate) const fn clear_requests(&mut self) {
        self.first_byte_requested = false;
        self.last_byte_requested = false;
        self.first_byte_arrived = false;
        self.last_byte_arrived = false;
        self.repeater_first_arrived = false;
        self.repeater_last_arrived = false;
        self.forward_only = false;
    }

    /// Entry is a fence.
    pub const fn is_fence(&self) -> bool {
        self.fence.is_some()
    }
}

/// Circular load queue.
#[derive(Debug)]
pub struct LoadQueue {
    entries: Vec<LdqEntry>,
    head: usize,
    tail: usize,
    num: usize,
}

impl LoadQueue {
    /// Creates an empty queue of `size` entries.
    pub fn new(size: usize) -> Self {
        Self {
            entries: vec![LdqEntry::default(); size],
            head: 0,
            tail: 0,
            num: 0,
        }
    }

    /// Total entries.
    pub const fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Live entries.
    pub const fn len(&self) -> usize {
        self.num
    }

    /// Returns `true` if no entry is live.
    pub const fn is_empty(&self) -> bool {
        self.num == 0
    }

    /// Returns `true` if an entry is free.
    pub const fn available(&self) -> bool {
        self.num < self.entries.len()
    }

    /// Oldest entry index.
    pub const fn head(&self) -> usize {
        self.head
    }

    /// Next free index.
    pub const fn tail(&self) -> usize {
        self.tail
    }

    /// Entry at `index`.
    pub fn entry(&self, index: usize) -> Option<&LdqEntry> {
        self.entries.get(index)
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut LdqEntry> {
        self.entries.get_mut(index)
    }

    /// Index after `index`, wrapping.
    pub const fn modinc(&self, index: usize) -> usize {
        if index + 1 == self.entries.len() { 0 } else { index + 1 }
    }

    /// Index before `index`, wrapping.
    pub const fn moddec(&self, index: usize) -> usize {
        if index == 0 { self.entries.len() - 1 } else { index - 1 }
    }

    /// Live entry indices, oldest first.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        let mut index = self.head;
        (0..self.num).map(move |_| {
            let current = index;
            index = self.modinc(index);
            current
        })
    }

    /// Appends a load or fence.
    pub(crate) fn insert(
        &mut self,
        uops: &mut UopPool,
        handle: UopHandle,
        stq: &StoreQueue,
        actions: &mut ActionIdSource,
    ) -> Result<(), ExecError> {
        if !self.available() {
            return Err(ExecError::QueueFull {
                queue: "LDQ",
                capacity: self.entries.len(),
            });
        }
        let uop = uops.resolve_mut(handle).ok_or(ExecError::StaleUop {
            context: "LDQ insert",
        })?;

        let store_color = stq.moddec(stq.tail());
        let colored_store_action_id = if stq.is_senior_entry_valid(store_color) {
            stq.entry(store_color).map_or(ActionId::NONE, |e| e.action_id)
        } else {
            actions.next_id()
        };

        let index = self.tail;
        self.entries[index] = LdqEntry {
            uop: Some(handle),
            seq: uop.decode.seq,
            fence: uop.decode.fence,
            mem_size: uop.decode.mem_size,
            store_color,
            colored_store_action_id,
            ..LdqEntry::default()
        };
        uop.alloc.ldq_index = Some(index);
        self.num += 1;
        self.tail = self.modinc(self.tail);
        Ok(())
    }

    /// Retires the head entry at commit.
    pub(crate) fn deallocate(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        if self.num == 0 {
            return Err(ExecError::QueueEmpty { queue: "LDQ" });
        }
        if self.entries[self.head].uop != Some(handle) {
            return Err(ExecError::BadIndex {
                queue: "LDQ",
                index: self.head,
            });
        }
        self.entries[self.head].uop = None;
        self.num -= 1;
        self.head = self.modinc(self.head);
        if let Some(uop) = uops.resolve_mut(handle) {
            uop.alloc.ldq_index = None;
        }
        Ok(())
    }

    /// Removes the youngest entry, which must hold `handle`.
    pub(crate) fn squash(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        if self.num == 0 {
            return Err(ExecError::QueueEmpty { queue: "LDQ" });
        }
        let index = self.moddec(self.tail);
        if self.entries[index].uop != Some(handle) {
            return Err(ExecError::BadIndex { queue: "LDQ", index });
        }
        self.entries[index] = LdqEntry::default();
        self.num -= 1;
        self.tail = index;
        if let Some(uop) = uops.resolve_mut(handle) {
            uop.alloc.ldq_index = None;
        }
        Ok(())
    }
}
