//! Load issue, the STQ search pipeline and store-side disambiguation.
//!
//! Loads leave the LDQ in two steps. `ldq_schedule` sends a load whose
//! address is known to the DTLB, DL1 and/or repeater and, in parallel, into
//! its port's STQ search pipeline. `ldst_exec` then checks the store queue
//! for the load at the far end of that pipeline, forwarding a covering
//! store's value or holding the load back behind a store that is not ready.
//! `st_alu_exec` covers the opposite order, where a store resolves after a
//! younger overlapping load already went ahead.

use tracing::{debug, trace};

use crate::common::{ExecError, TICK_NEVER, Tick, page_table_addr, single_line_access};
use crate::core::units::cache::{
    AccessHalf, AccessKind, CompletionToken, MemRequest, MemTarget, MemoryHierarchy, TokenOwner,
};
use crate::core::units::memdep::MemDepPredictor;
use crate::core::uop::{FenceKind, Translation, UopHandle, UopPool};

use super::O3Engine;
use super::forward::{Overlap, byte_mask, classify, clear_overwritten, extract, ranges_overlap, reads_live_bytes};
use super::port::InFlight;

/// What the backward STQ walk from a load's store color found.
#[derive(Clone, Copy, Debug)]
struct StoreScan {
    /// An older store has not computed its address.
    sta_unknown: bool,
    /// Closest older store with a known, overlapping address.
    matched: Option<(usize, Overlap)>,
    /// Closest older store whose true address overlaps.
    oracle: Overlap,
}

/// Where the STQ search left a load.
enum SearchOutcome {
    /// No overlapping store with a known address.
    NoMatch,
    /// Value forwarded, order violation flushed, or waiting on store data.
    Resolved,
}

impl O3Engine {
    /// Walks older stores, nearest first, including committed ones.
    fn scan_older_stores(&self, uops: &UopPool, ldq_index: usize) -> StoreScan {
        let mut scan = StoreScan {
            sta_unknown: false,
            matched: None,
            oracle: Overlap::None,
        };
        let Some(load) = self.ldq.entry(ldq_index) else {
            return scan;
        };
        let Some(offset) = self.stq.senior_offset(load.store_color) else {
            return scan;
        };

        let mut index = load.store_color;
        for _ in 0..=offset {
            let Some(store) = self.stq.entry(index) else {
                break;
            };
            if store.seq >= load.seq {
                break;
            }
            let addr = if store.addr_valid {
                Some(store.virt_addr)
            } else {
                scan.sta_unknown = true;
                store.sta.and_then(|h| uops.resolve(h)).map(|u| u.oracle.virt_addr)
            };
            if let Some(addr) = addr {
                let overlap = classify(addr, store.mem_size, load.virt_addr, load.mem_size);
                if overlap != Overlap::None {
                    if scan.matched.is_none() && store.addr_valid {
                        scan.matched = Some((index, overlap));
                    }
                    if scan.oracle == Overlap::None {
                        scan.oracle = overlap;
                    }
                }
            }
            index = self.stq.moddec(index);
        }
        scan
    }

    /// Decides whether the load in `ldq_index` may issue this cycle.
    pub(super) fn check_load_issue_conditions(&mut self, uops: &UopPool, ldq_index: usize) -> bool {
        let Some(load) = self.ldq.entry(ldq_index) else {
            return false;
        };
        if load.when_issued != TICK_NEVER {
            return false;
        }
        let Some(pc) = load.uop.and_then(|h| uops.resolve(h)).map(|u| u.fetch.pc) else {
            return false;
        };

        let fenced = self.ldq.indices().take_while(|&i| i != ldq_index).any(|i| {
            self.ldq.entry(i).is_some_and(|e| {
                e.is_fence()
                    && e.uop
                        .and_then(|h| uops.resolve(h))
                        .is_some_and(|f| f.timing.when_completed == TICK_NEVER)
            })
        });
        if fenced {
            return false;
        }

        let scan = self.scan_older_stores(uops, ldq_index);
        if matches!(scan.matched, Some((_, Overlap::Partial))) {
            if let Some(load) = self.ldq.entry_mut(ldq_index) {
                load.partial_forward = true;
            }
            self.stats.partial_forwards += 1;
            return false;
        }

        self.stats.memdep_lookups += 1;
        self.memdep.lookup(
            pc,
            scan.sta_unknown,
            scan.oracle == Overlap::Full,
            scan.oracle == Overlap::Partial,
            self.now,
        )
    }

    /// The uncommitted store a load can take its whole value from, if any.
    fn forward_source(&self, uops: &UopPool, ldq_index: usize) -> Option<usize> {
        match self.scan_older_stores(uops, ldq_index).matched {
            Some((index, Overlap::Full)) => self
                .stq
                .entry(index)
                .filter(|s| s.sta.is_some() && s.value_valid)
                .map(|_| index),
            _ => None,
        }
    }

    /// Completes fences at the LDQ head and issues loads to memory.
    ///
    /// Loads younger than a fence are held only until the fence completes,
    /// not until it retires, so they may issue in the same pass.
    pub(super) fn ldq_schedule(&mut self, uops: &mut UopPool, mem: &mut dyn MemoryHierarchy) -> Result<(), ExecError> {
        let now = self.now;
        let head = self.ldq.head();
        let live: Vec<usize> = self.ldq.indices().collect();

        for index in live {
            let Some(entry) = self.ldq.entry(index) else {
                continue;
            };
            let Some(handle) = entry.uop else {
                continue;
            };

            if let Some(kind) = entry.fence {
                if index == head {
                    self.try_complete_fence(uops, index, handle, kind);
                }
                continue;
            }

            if !entry.addr_valid || (entry.partial_forward && self.partial_throttle) || entry.when_issued != TICK_NEVER {
                continue;
            }
            if self.check_load_issue_conditions(uops, index) {
                self.issue_load(uops, mem, index, handle)?;
            } else {
                if let Some(uop) = uops.resolve_mut(handle) {
                    uop.timing.when_otag_ready = TICK_NEVER;
                    uop.timing.when_completed = TICK_NEVER;
                }
                if let Some(entry) = self.ldq.entry_mut(index) {
                    entry.hit_in_stq = false;
                }
                trace!(seq = entry_seq(uops, handle), cycle = now, "load held in LDQ");
                self.unwind_speculative_wakeup(uops, handle, index)?;
            }
        }
        Ok(())
    }

    fn try_complete_fence(&mut self, uops: &mut UopPool, index: usize, handle: UopHandle, kind: FenceKind) {
        let Some(entry) = self.ldq.entry(index) else {
            return;
        };
        let Some(fence) = uops.resolve(handle) else {
            return;
        };
        if fence.timing.when_completed != TICK_NEVER {
            return;
        }
        if let FenceKind::Mfence { light } = kind {
            let store = self.stq.entry(entry.store_color);
            let store_pending = store
                .and_then(|s| s.std)
                .and_then(|h| uops.resolve(h))
                .is_some_and(|s| s.decode.seq < fence.decode.seq);
            if store_pending {
                return;
            }
            if !light && store.is_some_and(|s| s.action_id == entry.colored_store_action_id) {
                return;
            }
        }
        let now = self.now;
        if let Some(fence) = uops.resolve_mut(handle) {
            fence.timing.when_completed = now;
            trace!(seq = fence.decode.seq, cycle = now, ?kind, "fence complete");
        }
    }

    fn issue_load(
        &mut self,
        uops: &mut UopPool,
        mem: &mut dyn MemoryHierarchy,
        index: usize,
        handle: UopHandle,
    ) -> Result<(), ExecError> {
        let now = self.now;
        let params = self.params.clone();
        let uop = uops.resolve(handle).ok_or(ExecError::StaleUop { context: "LDQ schedule" })?;
        let seq = uop.decode.seq;
        let port = uop.alloc.port.ok_or(ExecError::MissingSlot { seq, slot: "port" })?;
        let (pc, addr, size, action_id) = (uop.fetch.pc, uop.oracle.virt_addr, uop.decode.mem_size, uop.exec.action_id);
        let repeated = uop.oracle.is_repeated;
        let send_to_dl1 = !repeated || params.dl1_rep_req;
        let asid = params.asid;
        let token = |half, repeated| CompletionToken {
            owner: TokenOwner::Load { uop: handle, action_id },
            half,
            repeated,
        };
        let request = |target, addr, token, split| MemRequest {
            target,
            kind: AccessKind::Read,
            asid,
            pc,
            addr,
            token,
            split,
        };
        let pipe_free = self.ports.get(port).and_then(|p| p.stq_pipe.first()).is_some_and(Option::is_none);
        let entry = self.ldq.entry(index).ok_or(ExecError::BadIndex { queue: "LDQ", index })?;

        if !entry.first_byte_requested {
            if self.forward_source(uops, index).is_some() {
                if pipe_free {
                    self.ports[port].stq_pipe[0] = Some(InFlight { uop: handle, action_id });
                    if let Some(entry) = self.ldq.entry_mut(index) {
                        entry.forward_only = true;
                        entry.when_issued = now;
                    }
                    trace!(seq, cycle = now, addr, "load sent to STQ search only");
                }
                return Ok(());
            }

            let pt_addr = page_table_addr(asid, addr);
            let enqueuable = mem.enqueuable(MemTarget::Dtlb, asid, pt_addr)
                && (!send_to_dl1 || mem.enqueuable(MemTarget::Dl1, asid, addr))
                && (!repeated || mem.enqueuable(MemTarget::Repeater, asid, addr))
                && pipe_free;
            if !enqueuable {
                return Ok(());
            }

            if let Some(uop) = uops.resolve_mut(handle) {
                uop.timing.when_data_loaded = TICK_NEVER;
                if uop.exec.translation == Translation::NotRequested {
                    uop.exec.translation = Translation::Pending;
                    mem.enqueue(request(MemTarget::Dtlb, pt_addr, token(AccessHalf::First, false), false));
                } else {
                    uop.exec.translation = Translation::Done(now);
                }
            }
            if send_to_dl1 {
                mem.enqueue(request(MemTarget::Dl1, addr, token(AccessHalf::First, false), false));
            }
            if repeated {
                mem.enqueue(request(MemTarget::Repeater, addr, token(AccessHalf::First, true), false));
            }
            self.ports[port].stq_pipe[0] = Some(InFlight { uop: handle, action_id });

            let single_line = single_line_access(addr, size, params.dl1_line_bytes);
            let mut rebroadcast = false;
            if let Some(entry) = self.ldq.entry_mut(index) {
                entry.first_repeated = repeated;
                entry.first_byte_requested = true;
                if single_line {
                    entry.last_byte_requested = true;
                    entry.last_byte_arrived = true;
                    entry.when_issued = now;
                    entry.repeater_last_arrived = true;
                    entry.last_repeated = false;
                }
                rebroadcast = !entry.speculative_broadcast;
                entry.speculative_broadcast = true;
            }
            trace!(seq, cycle = now, addr, single_line, "load enqueued to memory");
            if rebroadcast {
                self.rebroadcast_load(uops, handle)?;
            }
        }

        let entry = self.ldq.entry(index).ok_or(ExecError::BadIndex { queue: "LDQ", index })?;
        if entry.first_byte_requested && !entry.last_byte_requested {
            let split_addr = addr + size;
            let enqueuable = (!send_to_dl1 || mem.enqueuable(MemTarget::Dl1, asid, split_addr))
                && (!repeated || mem.enqueuable(MemTarget::Repeater, asid, split_addr));
            if enqueuable {
                if send_to_dl1 {
                    self.stats.dl1_load_split_accesses += 1;
                    mem.enqueue(request(MemTarget::Dl1, split_addr, token(AccessHalf::Last, false), true));
                }
                if repeated {
                    mem.enqueue(request(MemTarget::Repeater, split_addr, token(AccessHalf::Last, true), true));
                }
                if let Some(entry) = self.ldq.entry_mut(index) {
                    entry.last_repeated = repeated;
                    entry.last_byte_requested = true;
                    entry.when_issued = now;
                }
                trace!(seq, cycle = now, split_addr, "split load second half enqueued");
            }
        }
        Ok(())
    }

    /// Wakes a load's dependents again assuming a DL1 hit from now.
    fn rebroadcast_load(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        let now = self.now;
        let (depth, dl1) = (self.params.payload_depth, self.params.dl1_latency);
        let otag = if depth < dl1 { now + dl1 - depth } else { now };
        if let Some(uop) = uops.resolve_mut(handle) {
            uop.timing.when_otag_ready = otag;
        }
        let mut recovered = false;
        for dep in uops.dependents(handle) {
            let executed = uops
                .resolve(dep.consumer)
                .is_some_and(|c| c.timing.when_exec != TICK_NEVER);
            if executed {
                if !recovered {
                    self.signal_recover(uops, handle);
                    recovered = true;
                }
            } else {
                self.retag(uops, dep.consumer, dep.op_num, otag)?;
            }
        }
        Ok(())
    }

    /// Puts back to sleep any dependents woken on the assumption that the
    /// load would complete on time.
    pub(super) fn unwind_speculative_wakeup(
        &mut self,
        uops: &mut UopPool,
        handle: UopHandle,
        ldq_index: usize,
    ) -> Result<(), ExecError> {
        let Some(entry) = self.ldq.entry_mut(ldq_index) else {
            return Ok(());
        };
        if !entry.speculative_broadcast {
            return Ok(());
        }
        entry.speculative_broadcast = false;
        if let Some(uop) = uops.resolve_mut(handle) {
            uop.timing.when_otag_ready = TICK_NEVER;
            uop.timing.when_completed = TICK_NEVER;
        }
        for dep in uops.dependents(handle) {
            if let Some(child) = uops.resolve_mut(dep.consumer) {
                child.timing.when_itag_ready[dep.op_num] = TICK_NEVER;
                child.exec.ivalue_valid[dep.op_num] = false;
            }
            self.snatch_back(uops, dep.consumer)?;
        }
        Ok(())
    }

    /// Returns a load to the not-issued state and invalidates its in-flight requests.
    pub(super) fn reset_load(&mut self, uops: &mut UopPool, handle: UopHandle, ldq_index: usize) {
        if let Some(entry) = self.ldq.entry_mut(ldq_index) {
            entry.when_issued = TICK_NEVER;
            entry.hit_in_stq = false;
            entry.clear_requests();
        }
        let action_id = self.actions.next_id();
        if let Some(uop) = uops.resolve_mut(handle) {
            uop.exec.action_id = action_id;
        }
    }

    /// Advances the STQ search pipelines, resolves the loads leaving them,
    /// then lets the memory hierarchy run and delivers its completions.
    pub(super) fn ldst_exec(&mut self, uops: &mut UopPool, mem: &mut dyn MemoryHierarchy) -> Result<(), ExecError> {
        for port in self.ports.iter_mut().filter(|p| p.is_load_port()) {
            let pipe = &mut port.stq_pipe;
            for stage in (1..pipe.len()).rev() {
                pipe[stage] = pipe[stage - 1].take();
            }
            pipe[0] = None;
        }

        for p in 0..self.ports.len() {
            let Some(slot) = self.ports[p].stq_pipe.last().copied().flatten() else {
                continue;
            };
            if uops.resolve(slot.uop).is_some_and(|u| u.exec.action_id == slot.action_id) {
                self.search_stq(uops, slot.uop)?;
            }
        }

        let mut inbox = std::mem::take(&mut self.inbox);
        mem.process(self.now, &mut inbox);
        for completion in inbox.drain(..) {
            self.dispatch(uops, completion)?;
        }
        self.inbox = inbox;
        Ok(())
    }

    /// Checks older stores for the load leaving the STQ search pipeline.
    fn search_stq(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        let uop = uops.resolve(handle).ok_or(ExecError::StaleUop { context: "STQ search" })?;
        let seq = uop.decode.seq;
        let index = uop.alloc.ldq_index.ok_or(ExecError::MissingSlot { seq, slot: "LDQ" })?;
        let load = self.ldq.entry(index).ok_or(ExecError::BadIndex { queue: "LDQ", index })?;
        let (ld_addr, ld_size, color, forward_only) = (load.virt_addr, load.mem_size, load.store_color, load.forward_only);

        let mut outcome = SearchOutcome::NoMatch;
        let mut j = color;
        let mut searched = 0;
        while searched < self.stq.senior_len() {
            let Some(store) = self.stq.entry(j) else {
                break;
            };
            if store.sta.is_none() || store.seq >= seq {
                break;
            }
            if store.addr_valid {
                match classify(store.virt_addr, store.mem_size, ld_addr, ld_size) {
                    Overlap::Full => {
                        self.stq_full_match(uops, handle, index, j)?;
                        outcome = SearchOutcome::Resolved;
                        break;
                    }
                    Overlap::Partial => {
                        self.stq_partial_match(uops, handle, index, j)?;
                        outcome = SearchOutcome::Resolved;
                        break;
                    }
                    Overlap::None => {}
                }
            }
            searched += 1;
            j = self.stq.moddec(j);
        }

        if forward_only && matches!(outcome, SearchOutcome::NoMatch) {
            trace!(seq, cycle = self.now, "forwarding store gone, reissuing load");
            self.reset_load(uops, handle, index);
            self.unwind_speculative_wakeup(uops, handle, index)?;
        }
        Ok(())
    }

    fn stq_full_match(
        &mut self,
        uops: &mut UopPool,
        handle: UopHandle,
        ldq_index: usize,
        stq_index: usize,
    ) -> Result<(), ExecError> {
        let now = self.now;
        let uop = uops.resolve(handle).ok_or(ExecError::StaleUop { context: "STQ hit" })?;
        let seq = uop.decode.seq;
        if uop.timing.when_completed != TICK_NEVER {
            self.signal_flush(uops, handle);
            return Ok(());
        }

        let store = self.stq.entry(stq_index).ok_or(ExecError::BadIndex {
            queue: "STQ",
            index: stq_index,
        })?;
        if !store.value_valid {
            trace!(seq, cycle = now, stq = stq_index, "STQ address hit, data not ready");
            self.unwind_speculative_wakeup(uops, handle, ldq_index)?;
            let action_id = self.actions.next_id();
            if let Some(uop) = uops.resolve_mut(handle) {
                uop.exec.action_id = action_id;
            }
            if let Some(entry) = self.ldq.entry_mut(ldq_index) {
                entry.hit_in_stq = false;
                entry.clear_requests();
            }
            return Ok(());
        }

        let (ld_addr, ld_size) = self
            .ldq
            .entry(ldq_index)
            .map_or((store.virt_addr, store.mem_size), |e| (e.virt_addr, e.mem_size));
        let value = extract(store.value, store.virt_addr, ld_addr, ld_size);
        let done = now + uop.load_penalty(self.params.fp_penalty);
        let action_id = self.actions.next_id();
        let Some(uop) = uops.resolve_mut(handle) else {
            return Ok(());
        };
        uop.exec.ovalue = value;
        uop.exec.ovalue_valid = true;
        uop.exec.action_id = action_id;
        uop.timing.when_completed = done;
        uop.timing.when_exec = done;
        uop.timing.when_otag_ready = uop.timing.when_otag_ready.min(done);
        let mispredicted = uop.decode.is_ctrl && uop.mispredicted();

        if let Some(entry) = self.ldq.entry_mut(ldq_index) {
            if entry.when_issued == TICK_NEVER {
                entry.when_issued = done;
            }
            entry.hit_in_stq = true;
        }
        self.stats.stq_forwards += 1;
        trace!(seq, cycle = now, stq = stq_index, value, "store-to-load forward");

        if mispredicted {
            self.signal_recover(uops, handle);
        }
        self.wake_early(uops, handle, now, done)?;
        self.bypass(uops, handle, value, done);
        Ok(())
    }

    /// Pulls in dependents whose tag for this producer is later than `done`.
    pub(super) fn wake_early(&mut self, uops: &mut UopPool, handle: UopHandle, after: Tick, done: Tick) -> Result<(), ExecError> {
        for dep in uops.dependents(handle) {
            let late = uops
                .resolve(dep.consumer)
                .is_some_and(|c| c.timing.when_itag_ready[dep.op_num] > after);
            if late {
                self.retag(uops, dep.consumer, dep.op_num, done)?;
            }
        }
        Ok(())
    }

    fn stq_partial_match(
        &mut self,
        uops: &mut UopPool,
        handle: UopHandle,
        ldq_index: usize,
        stq_index: usize,
    ) -> Result<(), ExecError> {
        let completed = uops
            .resolve(handle)
            .is_some_and(|u| u.timing.when_completed != TICK_NEVER);
        if let Some(entry) = self.ldq.entry_mut(ldq_index) {
            entry.partial_forward = true;
        }
        self.stats.partial_forwards += 1;

        if completed {
            self.signal_flush(uops, handle);
        } else {
            self.unwind_speculative_wakeup(uops, handle, ldq_index)?;
        }
        self.reset_load(uops, handle, ldq_index);
        trace!(seq = entry_seq(uops, handle), cycle = self.now, stq = stq_index, "partial store overlap");

        if self.params.throttle_partial {
            if !self.partial_throttle {
                debug!(cycle = self.now, stq = stq_index, "partial-forward throttle engaged");
            }
            self.partial_throttle = true;
        }
        Ok(())
    }

    /// Runs once a store has both its address and its data: finds younger
    /// loads that already read bytes this store writes.
    pub(super) fn st_alu_exec(&mut self, uops: &mut UopPool, stq_index: usize) -> Result<(), ExecError> {
        let store = self.stq.entry(stq_index).ok_or(ExecError::BadIndex {
            queue: "STQ",
            index: stq_index,
        })?;
        let (st_addr, st_size, st_seq) = (store.virt_addr, store.mem_size, store.seq);
        let mut live = byte_mask(st_size);
        let mut overwrite = stq_index;
        let mut index = store.next_load;
        let mut visited = 0;

        while visited < self.ldq.len() {
            let Some(load) = self.ldq.entry(index) else {
                break;
            };
            let Some(handle) = load.uop else {
                break;
            };
            if load.seq <= st_seq {
                break;
            }
            if load.is_fence() {
                visited += 1;
                index = self.ldq.modinc(index);
                continue;
            }

            if load.store_color != stq_index {
                while overwrite != load.store_color {
                    overwrite = self.stq.modinc(overwrite);
                    if overwrite == self.stq.tail() {
                        return Err(ExecError::ColorChainOverrun {
                            from: stq_index,
                            tail: self.stq.tail(),
                        });
                    }
                    if let Some(younger) = self.stq.entry(overwrite).filter(|y| y.addr_valid) {
                        if ranges_overlap(st_addr, st_size, younger.virt_addr, younger.mem_size) {
                            live = clear_overwritten(live, st_addr, younger.virt_addr, younger.mem_size);
                            if live == 0 {
                                break;
                            }
                        }
                    }
                }
                if live == 0 {
                    break;
                }
            }

            let conflicts = load.addr_valid
                && load.when_issued != TICK_NEVER
                && ranges_overlap(st_addr, st_size, load.virt_addr, load.mem_size)
                && reads_live_bytes(live, st_addr, load.virt_addr, load.mem_size);
            if conflicts {
                let completed = uops
                    .resolve(handle)
                    .is_some_and(|u| u.timing.when_completed != TICK_NEVER);
                if completed {
                    self.signal_flush(uops, handle);
                } else {
                    trace!(seq = load.seq, cycle = self.now, stq = stq_index, "store data ready, reissuing load");
                    self.reset_load(uops, handle, index);
                    self.unwind_speculative_wakeup(uops, handle, index)?;
                }
            }

            visited += 1;
            index = self.ldq.modinc(index);
        }
        Ok(())
    }
}

fn entry_seq(uops: &UopPool, handle: UopHandle) -> u64 {
    uops.resolve(handle).map_or(0, |u| u.decode.seq)
}
