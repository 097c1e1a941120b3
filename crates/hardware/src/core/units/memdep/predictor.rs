//! Memory-Dependence Predictor Interface.
//!
//! This module defines the `MemDepPredictor` trait consulted by the load queue
//! before a load may issue past older stores whose addresses or overlap are
//! not yet known to the hardware.

use crate::common::Tick;

/// Trait for memory-dependence prediction algorithms.
pub trait MemDepPredictor {
    /// Decides whether a load may issue now.
    ///
    /// # Arguments
    ///
    /// * `pc` - Program counter of the load
    /// * `sta_unknown` - Some older store has not computed its address yet
    /// * `conflict_exists` - An older store truly writes all bytes of the load
    /// * `partial_match` - An older store truly writes some bytes of the load
    /// * `now` - Current cycle
    ///
    /// # Returns
    ///
    /// `true` if the load may issue this cycle.
    fn lookup(
        &mut self,
        pc: u64,
        sta_unknown: bool,
        conflict_exists: bool,
        partial_match: bool,
        now: Tick,
    ) -> bool;

    /// Trains the predictor after a memory-order violation by the load at `pc`.
    fn update(&mut self, pc: u64, now: Tick);
}
