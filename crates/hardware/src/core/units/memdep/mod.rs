//! Memory-dependence prediction (MDP) implementations.
//!
//! This module contains the predictors consulted by the load queue before a
//! load is allowed to bypass older stores: blind speculation, no speculation,
//! a perfect oracle, and the load wait table.

pub use self::predictor::MemDepPredictor;

/// Blind predictor (always issue).
pub mod blind;

/// Load wait table predictor.
pub mod lwt;

/// Non-speculative predictor.
pub mod no_spec;

/// Oracle predictor.
pub mod oracle;

/// Predictor trait.
pub mod predictor;

use std::fmt;

use self::{
    blind::BlindPredictor, lwt::LoadWaitTable, no_spec::NoSpecPredictor, oracle::OraclePredictor,
};
use crate::common::Tick;
use crate::config::{MemDepConfig, MemDepPredictor as MdpType};

/// Enum wrapper for static dispatch of memory-dependence predictors.
///
/// `Custom` accepts any boxed implementation, for experiments and tests.
pub enum MemDepWrapper {
    /// Always issue.
    Blind(BlindPredictor),
    /// Never speculate.
    NoSpec(NoSpecPredictor),
    /// Perfect knowledge.
    Oracle(OraclePredictor),
    /// Load wait table.
    Lwt(LoadWaitTable),
    /// User-supplied predictor.
    Custom(Box<dyn MemDepPredictor>),
}

impl MemDepWrapper {
    /// Creates the predictor selected by the configuration.
    pub fn new(config: &MemDepConfig) -> Self {
        match config.predictor {
            MdpType::Blind => Self::Blind(BlindPredictor),
            MdpType::None => Self::NoSpec(NoSpecPredictor),
            MdpType::Oracle => Self::Oracle(OraclePredictor),
            MdpType::Lwt => Self::Lwt(LoadWaitTable::new(&config.lwt)),
        }
    }

    /// Short name for reports.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Blind(_) => "blind",
            Self::NoSpec(_) => "none",
            Self::Oracle(_) => "oracle",
            Self::Lwt(_) => "lwt",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for MemDepWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MemDepWrapper").field(&self.name()).finish()
    }
}

impl MemDepPredictor for MemDepWrapper {
    #[inline(always)]
    fn lookup(&mut self, pc: u64, sta_unknown: bool, conflict: bool, partial: bool, now: Tick) -> bool {
        match self {
            Self::Blind(p) => p.lookup(pc, sta_unknown, conflict, partial, now),
            Self::NoSpec(p) => p.lookup(pc, sta_unknown, conflict, partial, now),
            Self::Oracle(p) => p.lookup(pc, sta_unknown, conflict, partial, now),
            Self::Lwt(p) => p.lookup(pc, sta_unknown, conflict, partial, now),
            Self::Custom(p) => p.lookup(pc, sta_unknown, conflict, partial, now),
        }
    }

    #[inline(always)]
    fn update(&mut self, pc: u64, now: Tick) {
        match self {
            Self::Blind(p) => p.update(pc, now),
            Self::NoSpec(p) => p.update(pc, now),
            Self::Oracle(p) => p.update(pc, now),
            Self::Lwt(p) => p.update(pc, now),
            Self::Custom(p) => p.update(pc, now),
        }
    }
}
