//! Fixed-latency memory hierarchy.
//!
//! A compact [`MemoryHierarchy`] for driving the engine without a full cache
//! model. It provides:
//! 1. **DL1 tag store:** Set-associative with LRU replacement; hits return after the
//!    DL1 latency, misses after an additional fixed miss latency.
//! 2. **Miss notification:** A [`CompletionEvent::Reschedule`] is sent to the load when
//!    the miss is discovered, so speculatively woken dependents can be rescheduled.
//! 3. **TLBs and repeater:** Fixed latencies; the repeater always hits.
//! 4. **Back-pressure:** A per-target limit on outstanding requests.

use super::{
    AccessKind, Completion, CompletionEvent, MemRequest, MemTarget, MemoryHierarchy, TokenOwner,
};
use crate::common::Tick;
use crate::config::MemoryConfig;
use tracing::trace;

/// Cache line entry containing tag, validity and LRU stamp.
#[derive(Clone, Copy, Default, Debug)]
struct CacheLine {
    tag: u64,
    valid: bool,
    last_use: u64,
}

/// Set-associative tag array with LRU replacement.
#[derive(Debug)]
struct TagStore {
    lines: Vec<CacheLine>,
    num_sets: usize,
    ways: usize,
    line_bytes: u64,
    stamp: u64,
}

impl TagStore {
    fn new(size_bytes: usize, line_bytes: u64, ways: usize) -> Self {
        let ways = ways.max(1);
        let line_bytes = line_bytes.max(1);
        let num_lines = (size_bytes / line_bytes as usize).max(ways);
        let num_sets = (num_lines / ways).max(1);
        Self {
            lines: vec![CacheLine::default(); num_sets * ways],
            num_sets,
            ways,
            line_bytes,
            stamp: 0,
        }
    }

    const fn locate(&self, addr: u64) -> (usize, u64) {
        let line = addr / self.line_bytes;
        ((line % self.num_sets as u64) as usize, line / self.num_sets as u64)
    }

    /// Looks up `addr`, installing it on a miss. Returns `true` on a hit.
    fn access(&mut self, addr: u64) -> bool {
        let (set, tag) = self.locate(addr);
        self.stamp += 1;
        let base = set * self.ways;
        let ways = &mut self.lines[base..base + self.ways];

        if let Some(line) = ways.iter_mut().find(|l| l.valid && l.tag == tag) {
            line.last_use = self.stamp;
            return true;
        }

        let victim = ways
            .iter_mut()
            .min_by_key(|l| if l.valid { l.last_use } else { 0 });
        if let Some(line) = victim {
            *line = CacheLine {
                tag,
                valid: true,
                last_use: self.stamp,
            };
        }
        false
    }
}

#[derive(Debug)]
struct Pending {
    due: Tick,
    order: u64,
    slot: Option<usize>,
    completion: Completion,
}

/// Fixed-latency hierarchy; see the module documentation.
#[derive(Debug)]
pub struct TimedHierarchy {
    dl1: TagStore,
    dl1_latency: Tick,
    miss_latency: Tick,
    tlb_latency: Tick,
    repeater_latency: Tick,
    max_outstanding: usize,
    now: Tick,
    order: u64,
    pending: Vec<Pending>,
    outstanding: [usize; 4],
}

const fn slot(target: MemTarget) -> usize {
    match target {
        MemTarget::Dtlb => 0,
        MemTarget::StoreDtlb => 1,
        MemTarget::Dl1 => 2,
        MemTarget::Repeater => 3,
    }
}

impl TimedHierarchy {
    /// Builds the hierarchy from the memory configuration.
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            dl1: TagStore::new(config.dl1_size_bytes, config.dl1_line_bytes, config.dl1_ways),
            dl1_latency: config.dl1_latency,
            miss_latency: config.miss_latency,
            tlb_latency: config.tlb_latency,
            repeater_latency: config.repeater_latency,
            max_outstanding: config.max_outstanding.max(1),
            now: 0,
            order: 0,
            pending: Vec::new(),
            outstanding: [0; 4],
        }
    }

    /// Requests not yet completed.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    fn schedule(&mut self, due: Tick, target: Option<MemTarget>, completion: Completion) {
        self.order += 1;
        self.pending.push(Pending {
            due,
            order: self.order,
            slot: target.map(slot),
            completion,
        });
    }
}

impl MemoryHierarchy for TimedHierarchy {
    fn enqueuable(&self, target: MemTarget, _asid: u32, _addr: u64) -> bool {
        self.outstanding[slot(target)] < self.max_outstanding
    }

    fn enqueue(&mut self, request: MemRequest) {
        self.outstanding[slot(request.target)] += 1;
        let token = request.token;
        let now = self.now;
        match request.target {
            MemTarget::Dtlb | MemTarget::StoreDtlb => {
                let done = Completion {
                    token,
                    event: CompletionEvent::Translated,
                };
                self.schedule(now + self.tlb_latency, Some(request.target), done);
            }
            MemTarget::Repeater => {
                let done = Completion {
                    token,
                    event: CompletionEvent::Repeater { hit: true },
                };
                self.schedule(now + self.repeater_latency, Some(request.target), done);
            }
            MemTarget::Dl1 => {
                let hit = self.dl1.access(request.addr);
                let mut latency = self.dl1_latency;
                if !hit {
                    trace!(addr = request.addr, cycle = now, "dl1 miss");
                    latency += self.miss_latency;
                    let is_load = matches!(token.owner, TokenOwner::Load { .. });
                    if is_load && request.kind == AccessKind::Read {
                        let notice = Completion {
                            token,
                            event: CompletionEvent::Reschedule {
                                latency: self.miss_latency,
                            },
                        };
                        // Notices do not hold a request slot.
                        self.schedule(now + self.dl1_latency, None, notice);
                    }
                }
                let done = Completion {
                    token,
                    event: CompletionEvent::Data,
                };
                self.schedule(now + latency, Some(MemTarget::Dl1), done);
            }
        }
    }

    fn process(&mut self, now: Tick, completions: &mut Vec<Completion>) {
        self.now = now;
        self.pending.sort_by_key(|p| (p.due, p.order));
        let due = self.pending.partition_point(|p| p.due <= now);
        for p in self.pending.drain(..due) {
            if let Some(index) = p.slot {
                self.outstanding[index] = self.outstanding[index].saturating_sub(1);
            }
            completions.push(p.completion);
        }
    }
}
