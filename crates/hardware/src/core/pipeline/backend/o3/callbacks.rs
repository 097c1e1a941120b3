//! Memory-hierarchy completions.
//!
//! Every completion names its originator by handle and action id. A load
//! completion whose uop was re-issued, squashed or already left the LDQ is
//! stale and only traced; the same goes for a store completion whose STQ
//! entry has been drained or squashed since.

use tracing::trace;

use crate::common::{BIG_LATENCY, ExecError, TICK_NEVER};
use crate::core::units::cache::{AccessHalf, Completion, CompletionEvent, CompletionToken, TokenOwner};
use crate::core::uop::{Translation, UopHandle, UopPool};

use super::O3Engine;

impl O3Engine {
    /// Routes one completion to its load or store handler.
    pub(super) fn dispatch(&mut self, uops: &mut UopPool, completion: Completion) -> Result<(), ExecError> {
        match completion.token.owner {
            TokenOwner::Load { uop, action_id } => {
                let ldq_index = uops
                    .resolve(uop)
                    .filter(|u| u.exec.action_id == action_id)
                    .and_then(|u| u.alloc.ldq_index);
                match ldq_index {
                    Some(index) => self.load_completion(uops, uop, index, completion),
                    None => {
                        trace!(cycle = self.now, ?completion.event, "stale load completion dropped");
                        Ok(())
                    }
                }
            }
            TokenOwner::Store { stq_index, action_id } => {
                let live = self.stq.entry(stq_index).is_some_and(|e| e.action_id == action_id);
                if live {
                    self.store_completion(stq_index, completion);
                } else {
                    trace!(cycle = self.now, stq = stq_index, ?completion.event, "stale store completion dropped");
                }
                Ok(())
            }
        }
    }

    /// Returns `true` once the request behind `token` no longer waits on
    /// address translation. Stale requests count as translated.
    pub fn is_translated(&self, uops: &UopPool, token: &CompletionToken) -> bool {
        match token.owner {
            TokenOwner::Load { uop, action_id } => uops
                .resolve(uop)
                .filter(|u| u.exec.action_id == action_id && u.alloc.ldq_index.is_some())
                .is_none_or(|u| u.exec.translation.is_done_by(self.now)),
            TokenOwner::Store { stq_index, action_id } => self
                .stq
                .entry(stq_index)
                .filter(|e| e.action_id == action_id)
                .is_none_or(|e| e.translation_complete),
        }
    }

    fn load_completion(
        &mut self,
        uops: &mut UopPool,
        handle: UopHandle,
        index: usize,
        completion: Completion,
    ) -> Result<(), ExecError> {
        let now = self.now;
        let rep_req = self.params.dl1_rep_req;
        let half = completion.token.half;
        let entry = self.ldq.entry_mut(index).ok_or(ExecError::BadIndex { queue: "LDQ", index })?;

        match completion.event {
            CompletionEvent::Data => {
                let repeater_hit = match half {
                    AccessHalf::First => {
                        entry.first_byte_arrived = true;
                        entry.first_repeated && entry.repeater_first_arrived
                    }
                    AccessHalf::Last => {
                        entry.last_byte_arrived = true;
                        entry.last_repeated && entry.repeater_last_arrived
                    }
                };
                trace!(cycle = now, ldq = index, ?half, "load data returned");
                if !repeater_hit {
                    let _ = self.try_writeback(uops, handle, index)?;
                }
            }
            CompletionEvent::Repeater { hit } => {
                trace!(cycle = now, ldq = index, ?half, hit, "load returned from repeater");
                match half {
                    AccessHalf::First => entry.repeater_first_arrived = true,
                    AccessHalf::Last => entry.repeater_last_arrived = true,
                }
                if hit {
                    let _ = self.try_writeback(uops, handle, index)?;
                } else if !rep_req {
                    // No DL1 request went out in parallel: send it there next.
                    entry.when_issued = TICK_NEVER;
                    match half {
                        AccessHalf::First => {
                            entry.first_byte_requested = false;
                            entry.first_byte_arrived = false;
                            entry.repeater_first_arrived = false;
                        }
                        AccessHalf::Last => {
                            entry.last_byte_requested = false;
                            entry.last_byte_arrived = false;
                            entry.repeater_last_arrived = false;
                        }
                    }
                    if let Some(uop) = uops.resolve_mut(handle) {
                        uop.oracle.is_repeated = false;
                    }
                } else if !self.try_writeback(uops, handle, index)? {
                    if let Some(entry) = self.ldq.entry_mut(index) {
                        match half {
                            AccessHalf::First if entry.repeater_last_arrived => entry.first_repeated = false,
                            AccessHalf::First => {}
                            AccessHalf::Last => entry.last_repeated = false,
                        }
                    }
                }
            }
            CompletionEvent::Translated => {
                if let Some(uop) = uops.resolve_mut(handle) {
                    uop.exec.translation = Translation::Done(now);
                }
                trace!(cycle = now, ldq = index, "load address translated");
                let _ = self.try_writeback(uops, handle, index)?;
            }
            CompletionEvent::Reschedule { latency } => {
                self.load_miss_reschedule(uops, handle, index, latency)?;
            }
        }
        Ok(())
    }

    /// Writes the load back if translation finished and every requested
    /// half has arrived. Returns `true` if it did.
    fn try_writeback(&mut self, uops: &mut UopPool, handle: UopHandle, index: usize) -> Result<bool, ExecError> {
        let now = self.now;
        let translated = uops
            .resolve(handle)
            .is_some_and(|u| u.exec.translation.is_done_by(now));
        let ready = self
            .ldq
            .entry(index)
            .is_some_and(|e| e.all_arrived() && !e.hit_in_stq);
        if !(translated && ready) {
            return Ok(false);
        }
        if let Some(uop) = uops.resolve_mut(handle) {
            uop.timing.when_data_loaded = now;
        }
        self.load_writeback(uops, handle, index)?;
        Ok(true)
    }

    /// Completes a load from the cache value and wakes its dependents.
    fn load_writeback(&mut self, uops: &mut UopPool, handle: UopHandle, index: usize) -> Result<(), ExecError> {
        if self.ldq.entry(index).is_none_or(|e| e.hit_in_stq) {
            return Ok(());
        }
        let now = self.now;
        let fp_penalty = self.params.fp_penalty;
        let Some(uop) = uops.resolve_mut(handle) else {
            return Ok(());
        };
        let seq = uop.decode.seq;
        let port = uop.alloc.port.ok_or(ExecError::MissingSlot { seq, slot: "port" })?;
        let done = now + uop.load_penalty(fp_penalty);
        uop.exec.ovalue = uop.oracle.ovalue;
        uop.exec.ovalue_valid = true;
        uop.timing.when_completed = done;
        uop.timing.when_otag_ready = uop.timing.when_otag_ready.min(done);
        let value = uop.exec.ovalue;
        let mispredicted = uop.decode.is_ctrl && uop.mispredicted();

        if let Some(p) = self.ports.get_mut(port) {
            p.when_bypass_used = done;
        }
        trace!(seq, cycle = now, done, value, "load writeback from cache");
        if mispredicted {
            self.signal_recover(uops, handle);
        }
        self.wake_early(uops, handle, done, done)?;
        self.bypass(uops, handle, value, done);
        Ok(())
    }

    /// The DL1 missed after dependents were woken assuming a hit. Puts them
    /// back to sleep and, unless the new latency is unknown, wakes them
    /// again for the next level's latency.
    fn load_miss_reschedule(
        &mut self,
        uops: &mut UopPool,
        handle: UopHandle,
        index: usize,
        latency: u64,
    ) -> Result<(), ExecError> {
        let completed = uops
            .resolve(handle)
            .is_none_or(|u| u.timing.when_completed != TICK_NEVER);
        if completed {
            return Ok(());
        }
        let Some(entry) = self.ldq.entry(index) else {
            return Ok(());
        };
        if !entry.speculative_broadcast || entry.hit_in_stq {
            trace!(cycle = self.now, ldq = index, "miss not observed, STQ hit");
            return Ok(());
        }

        if let Some(uop) = uops.resolve_mut(handle) {
            uop.timing.when_otag_ready = TICK_NEVER;
        }
        let dependents = uops.dependents(handle);
        for dep in &dependents {
            if let Some(child) = uops.resolve_mut(dep.consumer) {
                child.timing.when_itag_ready[dep.op_num] = TICK_NEVER;
            }
            self.snatch_back(uops, dep.consumer)?;
        }

        let otag = if latency == BIG_LATENCY {
            TICK_NEVER
        } else {
            (self.now + latency).saturating_sub(self.params.payload_depth + 1)
        };
        if let Some(uop) = uops.resolve_mut(handle) {
            uop.timing.when_otag_ready = otag;
        }
        trace!(cycle = self.now, ldq = index, latency, otag, "load miss, dependents rescheduled");
        for dep in dependents {
            self.retag(uops, dep.consumer, dep.op_num, otag)?;
        }
        Ok(())
    }

    fn store_completion(&mut self, index: usize, completion: Completion) {
        let Some(entry) = self.stq.entry_mut(index) else {
            return;
        };
        let written = match completion.event {
            // Repeater writes take precedence over the DL1.
            CompletionEvent::Data => !completion.token.repeated,
            CompletionEvent::Repeater { .. } => true,
            CompletionEvent::Translated => {
                entry.translation_complete = true;
                trace!(cycle = self.now, stq = index, "store translated");
                false
            }
            CompletionEvent::Reschedule { .. } => false,
        };
        if !written {
            return;
        }
        match completion.token.half {
            AccessHalf::First => entry.first_byte_written = true,
            AccessHalf::Last => entry.last_byte_written = true,
        }
        if entry.first_byte_written && entry.last_byte_written {
            entry.write_complete = true;
            trace!(cycle = self.now, stq = index, "store written");
        }
    }
}
