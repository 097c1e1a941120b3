//! Oracle memory-dependence predictor.
//!
//! Uses the true addresses of unresolved stores: a load waits only when one
//! of them really conflicts with it.

use super::MemDepPredictor;
use crate::common::Tick;

/// Perfect-knowledge predictor.
#[derive(Debug, Default, Clone, Copy)]
pub struct OraclePredictor;

impl MemDepPredictor for OraclePredictor {
    fn lookup(&mut self, _pc: u64, sta_unknown: bool, conflict: bool, partial: bool, _now: Tick) -> bool {
        (!conflict && !partial) || !sta_unknown
    }

    fn update(&mut self, _pc: u64, _now: Tick) {}
}
