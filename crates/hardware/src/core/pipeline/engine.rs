//! Execution engine interface.
//!
//! This module defines the surface the allocation and commit stages use to
//! drive an execution core:
//! 1. **Cycle:** `tick` advances every internal stage by one cycle.
//! 2. **Scheduling:** `insert_ready_uop` hands a uop whose inputs are tagged ready
//!    to its port's ready queue.
//! 3. **Queues:** Availability, insert, deallocate and squash for the RS, LDQ and
//!    STQ (separate STA/STD halves and a regular/senior STQ split).
//! 4. **Recovery:** `recover` and `recover_check_assertions` after a flush, and
//!    `reset_execution` when execution resumes.
//!
//! The front end owns every uop. Each call borrows the [`UopPool`] so the
//! engine can resolve its handles; none of them keep a borrow past return.

use crate::common::{ExecError, Tick};
use crate::core::pipeline::signals::PipelineSignal;
use crate::core::units::cache::MemoryHierarchy;
use crate::core::uop::{UopHandle, UopPool};
use crate::stats::ExecStats;

/// An out-of-order execution core, as seen by allocation and commit.
///
/// `O3Engine` is the detailed implementation; simpler timing models can
/// implement the same trait.
pub trait ExecutionEngine {
    /// Runs one cycle of every execution stage.
    fn tick(&mut self, uops: &mut UopPool, mem: &mut dyn MemoryHierarchy) -> Result<(), ExecError>;

    /// Current cycle.
    fn now(&self) -> Tick;

    /// Puts a uop whose inputs are all tagged ready onto its port's ready queue.
    ///
    /// The uop must have a port assignment whose port carries its unit class,
    /// must not have issued or completed, and must not already be queued.
    fn insert_ready_uop(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError>;

    /// Returns `true` if the RS has a free entry.
    fn rs_available(&self) -> bool;
    /// Allocates an RS entry.
    fn rs_insert(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError>;
    /// Adds a fused uop to its fusion head's RS entry.
    fn rs_fuse_insert(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError>;
    /// Releases a squashed uop's RS entry.
    fn rs_deallocate(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError>;

    /// Returns `true` if the LDQ has a free entry.
    fn ldq_available(&self) -> bool;
    /// Appends a load or fence to the LDQ.
    fn ldq_insert(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError>;
    /// Retires the LDQ head at commit.
    fn ldq_deallocate(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError>;
    /// Removes the youngest LDQ entry on a squash.
    fn ldq_squash(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError>;

    /// Returns `true` if no store, committed or not, is in the STQ.
    fn stq_empty(&self) -> bool;
    /// Returns `true` if the STQ has a free entry.
    fn stq_available(&self) -> bool;
    /// Appends a store-address uop to the STQ.
    fn stq_insert_sta(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError>;
    /// Attaches a store-data uop to the youngest STQ entry.
    fn stq_insert_std(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError>;
    /// Detaches the STA of the STQ head at commit.
    fn stq_deallocate_sta(&mut self);
    /// Sends the STQ head's write to memory at commit.
    ///
    /// Returns `Ok(false)` while the hierarchy cannot take every request yet;
    /// commit retries next cycle. On `Ok(true)` the entry has moved to the
    /// senior STQ.
    fn stq_deallocate_std(
        &mut self,
        uops: &UopPool,
        mem: &mut dyn MemoryHierarchy,
        uop: UopHandle,
    ) -> Result<bool, ExecError>;
    /// Drains the oldest senior store once its write and translation finished.
    fn stq_deallocate_senior(&mut self);
    /// Removes the youngest STQ entry on a squash (its STD must be gone).
    fn stq_squash_sta(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError>;
    /// Detaches a squashed STD from its entry.
    fn stq_squash_std(&mut self, uops: &mut UopPool, uop: UopHandle) -> Result<(), ExecError>;
    /// Drops every senior store.
    fn stq_squash_senior(&mut self);

    /// Cleans up after the front end squashed uops.
    fn recover(&mut self, uops: &UopPool);
    /// Verifies that every queue is empty after a full flush.
    fn recover_check_assertions(&self) -> Result<(), ExecError>;
    /// Makes bypass and functional units available from the current cycle.
    fn reset_execution(&mut self);

    /// Drains redirects raised since the last call.
    fn take_signals(&mut self) -> Vec<PipelineSignal>;
    /// Statistics gathered so far.
    fn stats(&self) -> &ExecStats;
}
