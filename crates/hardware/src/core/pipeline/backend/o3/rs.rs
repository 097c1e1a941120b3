//! Reservation station bookkeeping.
//!
//! The RS is a pool of slots; a uop holds one from allocation until it
//! enters a functional unit. Fused uops share their head's slot, so two
//! counts are kept: `num` (slots held) and `eff_num` (uops represented).

use crate::common::{ExecError, TICK_NEVER};
use crate::core::uop::{UopHandle, UopPool};

/// Reservation station occupancy.
#[derive(Debug)]
pub struct ReservationStation {
    slots: Vec<Option<UopHandle>>,
    num: usize,
    eff_num: usize,
}

impl ReservationStation {
    /// Creates an empty RS with `size` slots.
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
            num: 0,
            eff_num: 0,
        }
    }

    /// Total slots.
    pub const fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots in use.
    pub const fn len(&self) -> usize {
        self.num
    }

    /// Returns `true` if no slot is in use.
    pub const fn is_empty(&self) -> bool {
        self.num == 0
    }

    /// Uops in the RS, counting every member of a fused group.
    pub const fn eff_len(&self) -> usize {
        self.eff_num
    }

    /// Returns `true` if a slot is free.
    pub const fn available(&self) -> bool {
        self.num < self.slots.len()
    }

    /// Occupant of `index`.
    pub fn slot(&self, index: usize) -> Option<UopHandle> {
        self.slots.get(index).copied().flatten()
    }

    /// Takes the first free slot for `handle`.
    pub(crate) fn insert(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        let uop = uops.resolve_mut(handle).ok_or(ExecError::StaleUop {
            context: "RS insert",
        })?;
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ExecError::QueueFull {
                queue: "RS",
                capacity: self.slots.len(),
            })?;

        self.slots[index] = Some(handle);
        self.num += 1;
        self.eff_num += 1;
        uop.alloc.rs_index = Some(index);
        if uop.decode.in_fusion {
            uop.exec.uops_in_rs += 1;
        }
        uop.alloc.full_fusion_allocated = false;
        Ok(())
    }

    /// Adds a fused body uop to its head's slot.
    pub(crate) fn fuse_insert(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        let uop = uops.resolve(handle).ok_or(ExecError::StaleUop {
            context: "RS fuse insert",
        })?;
        let seq = uop.decode.seq;
        let last = uop.decode.fusion_next.is_none();
        let head_handle = uop.decode.fusion_head.ok_or(ExecError::MissingSlot {
            seq,
            slot: "fusion head",
        })?;

        let head = uops.resolve_mut(head_handle).ok_or(ExecError::StaleUop {
            context: "RS fuse insert (head)",
        })?;
        let index = head.alloc.rs_index.ok_or(ExecError::MissingSlot {
            seq: head.decode.seq,
            slot: "RS",
        })?;
        head.exec.uops_in_rs += 1;
        if last {
            head.alloc.full_fusion_allocated = true;
        }

        if let Some(uop) = uops.resolve_mut(handle) {
            uop.alloc.rs_index = Some(index);
        }
        self.eff_num += 1;
        Ok(())
    }

    /// Releases a squashed uop. The fusion head releases the shared slot.
    pub(crate) fn deallocate(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        let uop = uops.resolve(handle).ok_or(ExecError::StaleUop {
            context: "RS deallocate",
        })?;
        let Some(index) = uop.alloc.rs_index else {
            return Ok(());
        };
        if index >= self.slots.len() {
            return Err(ExecError::BadIndex { queue: "RS", index });
        }
        let in_fusion = uop.decode.in_fusion;
        let is_head = uop.decode.is_fusion_head;
        let not_executed = uop.timing.when_exec == TICK_NEVER;
        let head_handle = uop.decode.fusion_head;

        if in_fusion && not_executed {
            if let Some(head) = head_handle.and_then(|h| uops.resolve_mut(h)) {
                head.exec.uops_in_rs = head.exec.uops_in_rs.saturating_sub(1);
            }
            self.eff_num = self.eff_num.saturating_sub(1);
        }
        if !in_fusion {
            self.eff_num = self.eff_num.saturating_sub(1);
        }
        if (!in_fusion || is_head) && self.slots[index].is_some() {
            self.slots[index] = None;
            self.num -= 1;
        }
        if let Some(uop) = uops.resolve_mut(handle) {
            uop.alloc.rs_index = None;
        }
        Ok(())
    }

    /// Called when `handle` enters its functional unit.
    ///
    /// The slot is freed once the whole fused group (or the lone uop) has
    /// left, and every member's slot index is cleared.
    pub(crate) fn release_on_exec(&mut self, uops: &mut UopPool, handle: UopHandle) {
        let Some(uop) = uops.resolve(handle) else {
            return;
        };
        let in_fusion = uop.decode.in_fusion;
        let index = uop.alloc.rs_index;
        let head_handle = uop.decode.fusion_head;

        let group_done = if in_fusion {
            head_handle.and_then(|h| uops.resolve_mut(h)).is_none_or(|head| {
                head.exec.uops_in_rs = head.exec.uops_in_rs.saturating_sub(1);
                head.exec.uops_in_rs == 0
            })
        } else {
            true
        };

        if group_done {
            if let Some(slot) = index.and_then(|i| self.slots.get_mut(i)) {
                if slot.take().is_some() {
                    self.num -= 1;
                }
            }
            if in_fusion {
                let mut cursor = head_handle;
                while let Some(member) = cursor.and_then(|h| uops.resolve_mut(h)) {
                    member.alloc.rs_index = None;
                    cursor = member.decode.fusion_next;
                }
            } else if let Some(uop) = uops.resolve_mut(handle) {
                uop.alloc.rs_index = None;
            }
        }
        self.eff_num = self.eff_num.saturating_sub(1);
    }
}
