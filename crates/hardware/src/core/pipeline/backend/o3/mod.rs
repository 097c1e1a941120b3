//! Out-of-order execution engine.
//!
//! `O3Engine` models, cycle by cycle, how uops wait for operands, are picked
//! for issue on their execution port, travel through payload and functional
//! unit pipelines, and interact with the load and store queues. Each cycle
//! runs these stages in order:
//! 1. **LDST exec:** Loads at the end of the STQ search pipeline look for a
//!    forwarding store; then the memory hierarchy is advanced and its
//!    completions are delivered.
//! 2. **ALU exec:** Functional units finish and bypass results; uops leave the
//!    payload pipeline for a unit, or replay.
//! 3. **LDQ schedule:** Fences complete and loads with known addresses issue to
//!    the DTLB, DL1 and memory repeater.
//! 4. **RS schedule:** Each port issues its oldest ready uop.
//! 5. **Occupancy:** Per-cycle statistics.
//!
//! Squashes never search for the references they invalidate. Uops, LDQ
//! entries and STQ entries carry an action id; every pipeline slot, ready
//! node and memory request records the id it was created under and is
//! dropped when the two disagree.

/// Functional-unit completion, bypass and replay.
mod alu;
/// Cache, TLB and repeater completions.
mod callbacks;
/// Store commit path into the memory hierarchy.
mod commit;
/// Byte-range overlap and forwarding arithmetic.
pub mod forward;
/// Load queue.
pub mod ldq;
/// LDQ scheduling, STQ search and store-side disambiguation.
mod lsq_exec;
/// Execution ports and functional units.
pub mod port;
/// Per-port ready queue.
pub mod ready_queue;
/// Reservation station.
pub mod rs;
/// Ready-queue insertion, issue, wakeup and snatch-back.
mod schedule;
/// Store queue.
pub mod stq;

use tracing::debug;

use crate::common::{ActionIdSource, ConfigError, ExecError, Tick};
use crate::config::Config;
use crate::core::pipeline::engine::ExecutionEngine;
use crate::core::pipeline::signals::PipelineSignal;
use crate::core::units::cache::{Completion, MemoryHierarchy};
use crate::core::units::memdep::{MemDepPredictor, MemDepWrapper};
use crate::core::uop::{UopHandle, UopPool};
use crate::stats::ExecStats;

use self::ldq::LoadQueue;
use self::port::ExecPort;
use self::rs::ReservationStation;
use self::stq::StoreQueue;

/// Engine parameters fixed at construction.
#[derive(Clone, Debug)]
struct Params {
    asid: u32,
    payload_depth: Tick,
    fp_penalty: Tick,
    tornado_breaker: bool,
    throttle_partial: bool,
    dl1_latency: Tick,
    dl1_line_bytes: u64,
    dl1_rep_req: bool,
}

/// The detailed out-of-order execution core.
pub struct O3Engine {
    /// Performance counters.
    pub stats: ExecStats,
    /// Memory-dependence predictor consulted before loads bypass older stores.
    pub memdep: MemDepWrapper,
    /// Execution ports.
    pub ports: Vec<ExecPort>,
    /// Reservation station.
    pub rs: ReservationStation,
    /// Load queue.
    pub ldq: LoadQueue,
    /// Store queue.
    pub stq: StoreQueue,
    actions: ActionIdSource,
    now: Tick,
    check_for_work: bool,
    partial_throttle: bool,
    signals: Vec<PipelineSignal>,
    inbox: Vec<Completion>,
    params: Params,
}

impl O3Engine {
    /// Builds an engine from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns the first problem [`Config::validate`] finds.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let exec = &config.exec;
        Ok(Self {
            stats: ExecStats::default(),
            memdep: MemDepWrapper::new(&config.memdep),
            ports: ExecPort::build_all(config),
            rs: ReservationStation::new(exec.rs_size),
            ldq: LoadQueue::new(exec.ldq_size),
            stq: StoreQueue::new(exec.stq_size),
            actions: ActionIdSource::new(),
            now: 0,
            check_for_work: true,
            partial_throttle: false,
            signals: Vec::new(),
            inbox: Vec::new(),
            params: Params {
                asid: config.general.asid,
                payload_depth: exec.payload_depth as Tick,
                fp_penalty: exec.fp_penalty,
                tornado_breaker: exec.tornado_breaker,
                throttle_partial: exec.throttle_partial,
                dl1_latency: config.memory.dl1_latency,
                dl1_line_bytes: config.memory.dl1_line_bytes,
                dl1_rep_req: config.memory.dl1_rep_req,
            },
        })
    }

    /// Replaces the memory-dependence predictor.
    pub fn with_memdep(mut self, predictor: Box<dyn MemDepPredictor>) -> Self {
        self.memdep = MemDepWrapper::Custom(predictor);
        self
    }

    /// Returns `true` while loads are held back by a partial store overlap.
    pub const fn partial_throttle(&self) -> bool {
        self.partial_throttle
    }

    /// Hands completions produced outside [`ExecutionEngine::tick`] to the engine.
    ///
    /// Each one is validated against the current epoch of its load or
    /// store entry before it has any effect.
    pub fn deliver(&mut self, uops: &mut UopPool, completions: &[Completion]) -> Result<(), ExecError> {
        for &completion in completions {
            self.dispatch(uops, completion)?;
        }
        Ok(())
    }

    /// Accumulates per-cycle occupancy statistics.
    pub fn update_occupancy(&mut self) {
        let stats = &mut self.stats;
        let rs = &self.rs;
        stats.rs_occupancy += rs.len() as u64;
        stats.rs_eff_occupancy += rs.eff_len() as u64;
        if rs.len() >= rs.capacity() {
            stats.rs_full_cycles += 1;
        }
        if rs.is_empty() {
            stats.rs_empty_cycles += 1;
        }

        stats.ldq_occupancy += self.ldq.len() as u64;
        if self.ldq.len() >= self.ldq.capacity() {
            stats.ldq_full_cycles += 1;
        }
        if self.ldq.is_empty() {
            stats.ldq_empty_cycles += 1;
        }

        stats.stq_occupancy += self.stq.len() as u64;
        if self.stq.len() >= self.stq.capacity() {
            stats.stq_full_cycles += 1;
        }
        if self.stq.is_empty() {
            stats.stq_empty_cycles += 1;
        }

        for fu in self.ports.iter().flat_map(|p| p.fus.iter().flatten()) {
            let busy = fu.occupancy() as u64;
            if fu.class.is_int() {
                stats.int_fu_occupancy += busy;
            } else if fu.class.is_fp() {
                stats.fp_fu_occupancy += busy;
            } else if fu.class.is_mul() {
                stats.mul_fu_occupancy += busy;
            }
        }
        stats.cycles += 1;
    }

    fn signal_recover(&mut self, uops: &UopPool, handle: UopHandle) {
        let Some(uop) = uops.resolve(handle) else {
            return;
        };
        let signal = PipelineSignal::Recover {
            mop_seq: uop.decode.mop_seq,
            seq: uop.decode.seq,
            new_pc: uop.oracle.next_pc,
        };
        self.stats.num_jeclear += 1;
        if uop.oracle.spec_mode {
            self.stats.num_wp_jeclear += 1;
        }
        debug!(seq = uop.decode.seq, cycle = self.now, new_pc = uop.oracle.next_pc, "jeclear");
        self.signals.push(signal);
    }

    fn signal_flush(&mut self, uops: &UopPool, handle: UopHandle) {
        let Some(uop) = uops.resolve(handle) else {
            return;
        };
        self.memdep.update(uop.fetch.pc, self.now);
        self.stats.memdep_updates += 1;
        self.stats.load_nukes += 1;
        if uop.oracle.spec_mode {
            self.stats.wp_load_nukes += 1;
        }
        debug!(seq = uop.decode.seq, cycle = self.now, pc = uop.fetch.pc, "order violation, flushing load");
        self.signals.push(PipelineSignal::Flush {
            mop_seq: uop.decode.mop_seq,
            seq: uop.decode.seq,
        });
    }
}

impl std::fmt::Debug for O3Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("O3Engine")
            .field("now", &self.now)
            .field("memdep", &self.memdep)
            .field("rs", &self.rs.len())
            .field("ldq", &self.ldq.len())
            .field("stq", &self.stq.len())
            .field("stq_senior", &self.stq.senior_len())
            .finish_non_exhaustive()
    }
}

impl ExecutionEngine for O3Engine {
    fn tick(&mut self, uops: &mut UopPool, mem: &mut dyn MemoryHierarchy) -> Result<(), ExecError> {
        self.ldst_exec(uops, mem)?;
        self.alu_exec(uops)?;
        self.ldq_schedule(uops, mem)?;
        self.rs_schedule(uops)?;
        self.update_occupancy();
        self.now += 1;
        Ok(())
    }

    fn now(&self) -> Tick {
        self.now
    }

    fn insert_ready_uop(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError> {
        self.insert_ready(uops, uop)
    }

    fn rs_available(&self) -> bool {
        self.rs.available()
    }

    fn rs_insert(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError> {
        self.rs.insert(uops, uop)
    }

    fn rs_fuse_insert(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError> {
        self.rs.fuse_insert(uops, uop)
    }

    fn rs_deallocate(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError> {
        self.rs.deallocate(uops, uop)
    }

    fn ldq_available(&self) -> bool {
        self.ldq.available()
    }

    fn ldq_insert(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError> {
        self.ldq.insert(uops, uop, &self.stq, &mut self.actions)
    }

    fn ldq_deallocate(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError> {
        self.ldq.deallocate(uops, uop)
    }

    fn ldq_squash(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError> {
        self.ldq.squash(uops, uop)
    }

    fn stq_empty(&self) -> bool {
        self.stq.senior_len() == 0
    }

    fn stq_available(&self) -> bool {
        self.stq.available()
    }

    fn stq_insert_sta(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError> {
        let next_load = self.ldq.tail();
        self.stq.insert_sta(uops, uop, next_load, &mut self.actions)
    }

    fn stq_insert_std(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError> {
        self.stq.insert_std(uops, uop)
    }

    fn stq_deallocate_sta(&mut self) {
        self.stq.deallocate_sta();
    }

    fn stq_deallocate_std(
        &mut self,
        uops: &UopPool,
        mem: &mut dyn MemoryHierarchy,
        uop: UopHandle,
    ) -> Result<bool, ExecError> {
        self.commit_store(uops, mem, uop)
    }

    fn stq_deallocate_senior(&mut self) {
        if self.stq.deallocate_senior(&mut self.actions) {
            if self.partial_throttle {
                debug!(cycle = self.now, "senior store drained, partial-forward throttle released");
            }
            self.partial_throttle = false;
        }
    }

    fn stq_squash_sta(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError> {
        self.stq.squash_sta(uops, uop)
    }

    fn stq_squash_std(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError> {
        self.stq.squash_std(uops, uop)
    }

    fn stq_squash_senior(&mut self) {
        self.stq.squash_senior(&mut self.actions);
    }

    fn recover(&mut self, uops: &UopPool) {
        let live = |slot: &Option<port::InFlight>| {
            slot.is_some_and(|f| uops.resolve(f.uop).is_some_and(|u| u.exec.action_id == f.action_id))
        };
        for port in &mut self.ports {
            port.ready_queue.retain(|n| {
                uops.resolve(n.uop).is_some_and(|u| u.exec.action_id == n.action_id)
            });
            for slot in port.payload.iter_mut().chain(port.stq_pipe.iter_mut()) {
                if !live(slot) {
                    *slot = None;
                }
            }
        }
    }

    fn recover_check_assertions(&self) -> Result<(), ExecError> {
        self.stq.check_empty(self.now)?;
        if !self.ldq.is_empty() {
            return Err(ExecError::Occupancy {
                structure: "LDQ",
                count: self.ldq.len(),
                expected: 0,
                cycle: self.now,
            });
        }
        if !self.rs.is_empty() {
            return Err(ExecError::Occupancy {
                structure: "RS",
                count: self.rs.len(),
                expected: 0,
                cycle: self.now,
            });
        }
        Ok(())
    }

    fn reset_execution(&mut self) {
        let now = self.now;
        for port in &mut self.ports {
            port.when_bypass_used = 0;
            for fu in port.fus.iter_mut().flatten() {
                fu.when_scheduleable = now;
                fu.when_executable = now;
            }
        }
        self.check_for_work = true;
    }

    fn take_signals(&mut self) -> Vec<PipelineSignal> {
        std::mem::take(&mut self.signals)
    }

    fn stats(&self) -> &ExecStats {
        &self.stats
    }
}
