//! Store queue.
//!
//! A circular buffer of stores in program order, split into two ranges that
//! share the same storage:
//! 1. **Regular:** `head..tail`, stores that have not yet been sent to memory.
//!    Each holds an STA (address) and an STD (data) uop.
//! 2. **Senior:** `senior_head..tail`, which also covers committed stores whose
//!    write to memory has not finished. These have lost their uops but keep
//!    their address and value for disambiguation.

use crate::common::{ActionId, ActionIdSource, ExecError, Tick};
use crate::core::uop::{UopHandle, UopPool};

/// One STQ entry.
#[derive(Clone, Debug, Default)]
pub struct StqEntry {
    /// Store-address uop, until the store commits.
    pub sta: Option<UopHandle>,
    /// Store-data uop, until the write is sent to memory.
    pub std: Option<UopHandle>,
    /// Sequence number of the STA.
    pub seq: u64,
    /// Bytes written.
    pub mem_size: u64,
    /// Virtual address, once computed.
    pub virt_addr: u64,
    /// Value to write, once computed.
    pub value: u64,
    /// `virt_addr` is known.
    pub addr_valid: bool,
    /// `value` is known.
    pub value_valid: bool,
    /// LDQ tail at allocation: the oldest load younger than this store.
    pub next_load: usize,
    /// Entry epoch; stale memory completions carry an older one.
    pub action_id: ActionId,
    /// Request for the half containing the first byte has been sent.
    pub first_byte_requested: bool,
    /// Request for the half containing the last byte has been sent.
    pub last_byte_requested: bool,
    /// First half written.
    pub first_byte_written: bool,
    /// Last half written.
    pub last_byte_written: bool,
    /// Both halves written.
    pub write_complete: bool,
    /// Address translation for the write finished.
    pub translation_complete: bool,
}

/// Circular store queue with a senior sub-range.
#[derive(Debug)]
pub struct StoreQueue {
    entries: Vec<StqEntry>,
    head: usize,
    tail: usize,
    senior_head: usize,
    num: usize,
    senior_num: usize,
}

impl StoreQueue {
    /// Creates an empty queue of `size` entries.
    pub fn new(size: usize) -> Self {
        Self {
            entries: vec![StqEntry::default(); size],
            head: 0,
            tail: 0,
            senior_head: 0,
            num: 0,
            senior_num: 0,
        }
    }

    /// Total entries.
    pub const fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Stores not yet sent to memory.
    pub const fn len(&self) -> usize {
        self.num
    }

    /// Returns `true` if no uncommitted store is present.
    pub const fn is_empty(&self) -> bool {
        self.num == 0
    }

    /// Every store still holding an entry, committed or not.
    pub const fn senior_len(&self) -> usize {
        self.senior_num
    }

    /// Returns `true` if an entry is free.
    pub const fn available(&self) -> bool {
        self.senior_num < self.entries.len()
    }

    /// Oldest uncommitted store.
    pub const fn head(&self) -> usize {
        self.head
    }

    /// Next free index.
    pub const fn tail(&self) -> usize {
        self.tail
    }

    /// Oldest store, committed or not.
    pub const fn senior_head(&self) -> usize {
        self.senior_head
    }

    /// Entry at `index`.
    pub fn entry(&self, index: usize) -> Option<&StqEntry> {
        self.entries.get(index)
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut StqEntry> {
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

    /// Distance from the senior head to `index`, if `index` is live.
    pub const fn senior_offset(&self, index: usize) -> Option<usize> {
        let size = self.entries.len();
        let offset = (index + size - self.senior_head) % size;
        if offset < self.senior_num { Some(offset) } else { None }
    }

    /// The entry holds a store, or a committed store still writing back.
    pub fn is_senior_entry_valid(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|e| {
            e.sta.is_some() || e.std.is_some() || e.first_byte_requested || e.last_byte_requested
        })
    }

    /// Appends a store-address uop.
    pub(crate) fn insert_sta(
        &mut self,
        uops: &mut UopPool,
        handle: UopHandle,
        next_load: usize,
        actions: &mut ActionIdSource,
    ) -> Result<(), ExecError> {
        if !self.available() {
            return Err(ExecError::QueueFull {
                queue: "STQ",
                capacity: self.entries.len(),
            });
        }
        let uop = uops.resolve_mut(handle).ok_or(ExecError::StaleUop {
            context: "STQ insert STA",
        })?;
        uop.decode.is_sta = true;

        let index = self.tail;
        self.entries[index] = StqEntry {
            sta: Some(handle),
            seq: uop.decode.seq,
            mem_size: uop.decode.mem_size,
            next_load,
            action_id: actions.next_id(),
            ..StqEntry::default()
        };
        uop.alloc.stq_index = Some(index);
        self.num += 1;
        self.senior_num += 1;
        self.tail = self.modinc(self.tail);
        Ok(())
    }

    /// Attaches the store-data uop to the youngest entry.
    pub(crate) fn insert_std(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        if self.num == 0 {
            return Err(ExecError::QueueEmpty { queue: "STQ" });
        }
        let index = self.moddec(self.tail);
        let sta = self.entries[index].sta.ok_or(ExecError::BadIndex { queue: "STQ", index })?;
        let std_mop = uops.resolve(handle).map(|u| u.decode.mop_seq);
        let sta_mop = uops.resolve(sta).map(|u| u.decode.mop_seq);
        if std_mop.is_none() || std_mop != sta_mop {
            return Err(ExecError::StaleUop {
                context: "STQ insert STD",
            });
        }
        self.entries[index].std = Some(handle);
        if let Some(uop) = uops.resolve_mut(handle) {
            uop.alloc.stq_index = Some(index);
        }
        Ok(())
    }

    /// Records the address computed by the STA.
    pub(crate) fn set_addr(&mut self, index: usize, virt_addr: u64) {
        if let Some(e) = self.entries.get_mut(index) {
            e.virt_addr = virt_addr;
            e.addr_valid = true;
        }
    }

    /// Records the value computed by the STD.
    pub(crate) fn set_data(&mut self, index: usize, value: u64) {
        if let Some(e) = self.entries.get_mut(index) {
            e.value = value;
            e.value_valid = true;
        }
    }

    /// Detaches the head's STA at commit.
    pub(crate) fn deallocate_sta(&mut self) {
        let head = self.head;
        self.entries[head].sta = None;
    }

    /// Moves the head into the senior range once its write is in flight.
    pub(crate) fn retire_head(&mut self) {
        let head = self.head;
        self.entries[head].std = None;
        self.num = self.num.saturating_sub(1);
        self.head = self.modinc(head);
    }

    /// Frees the oldest senior entry if its write and translation finished.
    ///
    /// Returns `true` if an entry was freed.
    pub(crate) fn deallocate_senior(&mut self, actions: &mut ActionIdSource) -> bool {
        if self.senior_num == 0 {
            return false;
        }
        let index = self.senior_head;
        let e = &mut self.entries[index];
        if !(e.write_complete && e.translation_complete) {
            return false;
        }
        e.write_complete = false;
        e.translation_complete = false;
        e.first_byte_requested = false;
        e.last_byte_requested = false;
        e.action_id = actions.next_id();
        self.senior_head = self.modinc(index);
        self.senior_num -= 1;
        true
    }

    /// Removes the youngest entry, which must hold `handle` as its STA.
    pub(crate) fn squash_sta(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        if self.num == 0 {
            return Err(ExecError::QueueEmpty { queue: "STQ" });
        }
        let index = self.moddec(self.tail);
        let e = &self.entries[index];
        if e.sta != Some(handle) || e.std.is_some() {
            return Err(ExecError::BadIndex { queue: "STQ", index });
        }
        self.entries[index] = StqEntry::default();
        self.num -= 1;
        self.senior_num -= 1;
        self.tail = index;
        if let Some(uop) = uops.resolve_mut(handle) {
            uop.alloc.stq_index = None;
        }
        Ok(())
    }

    /// Detaches a squashed STD.
    pub(crate) fn squash_std(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        let index = uops
            .resolve(handle)
            .and_then(|u| u.alloc.stq_index)
            .ok_or(ExecError::StaleUop {
                context: "STQ squash STD",
            })?;
        match self.entries.get_mut(index) {
            Some(e) if e.std == Some(handle) => e.std = None,
            _ => return Err(ExecError::BadIndex { queue: "STQ", index }),
        }
        if let Some(uop) = uops.resolve_mut(handle) {
            uop.alloc.stq_index = None;
        }
        Ok(())
    }

    /// Drops every senior entry, refreshing their epochs.
    pub(crate) fn squash_senior(&mut self, actions: &mut ActionIdSource) {
        while self.senior_num > 0 {
            let index = self.senior_head;
            self.entries[index] = StqEntry {
                action_id: actions.next_id(),
                ..StqEntry::default()
            };
            if index == self.head && self.num > 0 {
                self.head = self.modinc(self.head);
                self.num -= 1;
            }
            self.senior_head = self.modinc(index);
            self.senior_num -= 1;
        }
    }

    /// Occupancy check used after a full flush.
    pub(crate) const fn check_empty(&self, cycle: Tick) -> Result<(), ExecError> {
        if self.senior_num != 0 {
            return Err(ExecError::Occupancy {
                structure: "senior STQ",
                count: self.senior_num,
                expected: 0,
                cycle,
            });
        }
        if self.num != 0 {
            return Err(ExecError::Occupancy {
                structure: "STQ",
                count: self.num,
                expected: 0,
                cycle,
            });
        }
        Ok(())
    }
}
