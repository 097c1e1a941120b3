//! Non-speculative memory-dependence predictor.

use super::MemDepPredictor;
use crate::common::Tick;

/// Waits until every older store address is known and no partial overlap exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSpecPredictor;

impl MemDepPredictor for NoSpecPredictor {
    fn lookup(&mut self, _pc: u64, sta_unknown: bool, _conflict: bool, partial: bool, _now: Tick) -> bool {
        !sta_unknown && !partial
    }

    fn update(&mut self, _pc: u64, _now: Tick) {}
}
