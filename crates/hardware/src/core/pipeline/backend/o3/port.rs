//! Execution ports and their functional units.
//!
//! A port binds one instance of every unit class configured on it and owns
//! three pipelines:
//! 1. **Payload:** `payload_depth` stages between issue and execute, where operands
//!    are gathered. A uop occupies slot 0 in the cycle it issues.
//! 2. **Functional units:** One shift register per unit, `latency` stages long.
//! 3. **STQ search:** Load ports only; loads sent to memory traverse it in parallel
//!    with the cache access and check the store queue at its far end.
//!
//! Every slot captures the action id of its uop so squashed occupants are
//! recognised without searching the pipelines.

use crate::common::{ActionId, Tick};
use crate::config::{Config, FuConfig};
use crate::core::uop::{FuClass, UopHandle};

use super::ready_queue::ReadyQueue;

/// A uop in a pipeline slot, with its action id at entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InFlight {
    /// The uop.
    pub uop: UopHandle,
    /// Uop action id when the slot was filled.
    pub action_id: ActionId,
}

/// One pipelined functional unit instance.
#[derive(Debug)]
pub struct FunctionalUnit {
    /// Unit class.
    pub class: FuClass,
    /// Stages, and so cycles to a result.
    pub latency: Tick,
    /// Cycles between successive issues.
    pub issue_rate: Tick,
    /// Stage slots; index 0 is the entry stage.
    pub pipe: Vec<Option<InFlight>>,
    /// First cycle the scheduler may pick a uop for this unit.
    pub when_scheduleable: Tick,
    /// First cycle a uop may enter the entry stage.
    pub when_executable: Tick,
}

impl FunctionalUnit {
    /// Creates an idle unit.
    pub fn new(class: FuClass, config: &FuConfig) -> Self {
        let latency = config.latency.max(1);
        Self {
            class,
            latency,
            issue_rate: config.issue_rate.max(1),
            pipe: vec![None; latency as usize],
            when_scheduleable: 0,
            when_executable: 0,
        }
    }

    /// Busy stages.
    pub fn occupancy(&self) -> usize {
        self.pipe.iter().filter(|s| s.is_some()).count()
    }

    /// Moves every uop one stage closer to the end, filling gaps.
    ///
    /// A uop held in the last stage (no bypass slot) stays put and the ones
    /// behind it only advance into free stages.
    pub(crate) fn advance(&mut self) {
        for stage in (1..self.pipe.len()).rev() {
            if self.pipe[stage].is_none() {
                self.pipe[stage] = self.pipe[stage - 1].take();
            }
        }
    }
}

/// One execution port.
#[derive(Debug)]
pub struct ExecPort {
    /// Units indexed by [`FuClass::index`].
    pub fus: Vec<Option<FunctionalUnit>>,
    /// Payload pipeline; the last slot feeds the units.
    pub payload: Vec<Option<InFlight>>,
    /// STQ search pipeline; empty on ports without a load unit.
    pub stq_pipe: Vec<Option<InFlight>>,
    /// Last cycle a result was bypassed from this port.
    pub when_bypass_used: Tick,
    /// Uops waiting to issue on this port.
    pub ready_queue: ReadyQueue,
}

impl ExecPort {
    /// Builds every port described by the configuration.
    pub fn build_all(config: &Config) -> Vec<Self> {
        let exec = &config.exec;
        let stq_depth = config.memory.dl1_latency.max(2) as usize;
        let mut ports: Vec<Self> = (0..exec.num_exec_ports)
            .map(|_| Self {
                fus: (0..FuClass::COUNT).map(|_| None).collect(),
                payload: vec![None; exec.payload_depth.max(1)],
                stq_pipe: Vec::new(),
                when_bypass_used: 0,
                ready_queue: ReadyQueue::new(),
            })
            .collect();

        for class in FuClass::ALL {
            let unit = exec.units.get(class);
            for &p in &unit.ports {
                if let Some(port) = ports.get_mut(p) {
                    port.fus[class.index()] = Some(FunctionalUnit::new(class, unit));
                    if class == FuClass::Ld {
                        port.stq_pipe = vec![None; stq_depth];
                    }
                }
            }
        }
        ports
    }

    /// The unit of `class`, if this port has one.
    pub fn fu(&self, class: FuClass) -> Option<&FunctionalUnit> {
        self.fus.get(class.index()).and_then(Option::as_ref)
    }

    pub(crate) fn fu_mut(&mut self, class: FuClass) -> Option<&mut FunctionalUnit> {
        self.fus.get_mut(class.index()).and_then(Option::as_mut)
    }

    /// Returns `true` if the port hosts a load unit.
    pub fn is_load_port(&self) -> bool {
        !self.stq_pipe.is_empty()
    }

    /// Occupied payload slots.
    pub fn payload_occupancy(&self) -> usize {
        self.payload.iter().filter(|s| s.is_some()).count()
    }

    /// Removes `uop` from the payload pipeline. Returns `true` if it was there.
    pub(crate) fn remove_from_payload(&mut self, uop: UopHandle) -> bool {
        match self.payload.iter_mut().find(|s| s.is_some_and(|f| f.uop == uop)) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }
}
