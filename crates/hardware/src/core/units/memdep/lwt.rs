//! Load Wait Table predictor.
//!
//! A PC-indexed bit table. A load whose bit is set waits until all older
//! store addresses are known; any other load issues freely. Bits are set by
//! order violations and the whole table is cleared periodically so that
//! loads which stopped conflicting are released again.

use super::MemDepPredictor;
use crate::common::Tick;
use crate::config::LwtConfig;
use tracing::{debug, trace};

/// Load wait table.
#[derive(Debug, Clone)]
pub struct LoadWaitTable {
    table: Vec<bool>,
    mask: u64,
    reset_interval: Tick,
    last_reset: Tick,
}

impl LoadWaitTable {
    /// Creates an empty table.
    ///
    /// `config.entries` must be a power of two; validation enforces it.
    pub fn new(config: &LwtConfig) -> Self {
        let entries = config.entries.max(1).next_power_of_two();
        Self {
            table: vec![false; entries],
            mask: (entries - 1) as u64,
            reset_interval: config.reset_interval.max(1),
            last_reset: 0,
        }
    }

    /// Clears the table when a reset interval has elapsed since the last clear.
    fn check_reset(&mut self, now: Tick) {
        if now.saturating_sub(self.last_reset) >= self.reset_interval {
            self.table.fill(false);
            self.last_reset = now - now % self.reset_interval;
            debug!(cycle = now, "load wait table cleared");
        }
    }

    const fn index(&self, pc: u64) -> usize {
        (pc & self.mask) as usize
    }

    /// Returns `true` if the load at `pc` is marked as waiting.
    pub fn is_marked(&self, pc: u64) -> bool {
        self.table[self.index(pc)]
    }
}

impl MemDepPredictor for LoadWaitTable {
    fn lookup(&mut self, pc: u64, sta_unknown: bool, _conflict: bool, _partial: bool, now: Tick) -> bool {
        self.check_reset(now);
        if self.is_marked(pc) { !sta_unknown } else { true }
    }

    fn update(&mut self, pc: u64, now: Tick) {
        self.check_reset(now);
        let index = self.index(pc);
        trace!(pc, index, "load marked to wait");
        self.table[index] = true;
    }
}
