//! Functional-unit completion and the payload-to-execute hand-off.

use tracing::trace;

use crate::common::{BIG_LATENCY, ExecError, TORNADO_SHALLOW_REPLAYS, TORNADO_STEEP_REPLAYS, Tick};
use crate::core::uop::{FuClass, UopHandle, UopPool};

use super::O3Engine;
use super::port::InFlight;

impl O3Engine {
    /// Retires finished functional-unit work and moves payload uops into
    /// their units, replaying those whose operands or unit are not ready.
    ///
    /// Skipped entirely while no pipeline holds anything.
    pub(super) fn alu_exec(&mut self, uops: &mut UopPool) -> Result<(), ExecError> {
        if !self.check_for_work {
            return Ok(());
        }
        let now = self.now;
        let mut work_found = false;

        for p in 0..self.ports.len() {
            for c in 0..FuClass::COUNT {
                let bypass_free = self.ports[p].when_bypass_used != now;
                let Some(fu) = self.ports[p].fus[c].as_mut() else {
                    continue;
                };
                if fu.occupancy() == 0 {
                    continue;
                }
                work_found = true;

                let last = fu.pipe.len() - 1;
                let mut finished = None;
                if let Some(slot) = fu.pipe[last] {
                    match uops.resolve(slot.uop).filter(|u| u.exec.action_id == slot.action_id) {
                        None => fu.pipe[last] = None,
                        Some(uop) => {
                            let d = &uop.decode;
                            let needs_bypass = !(d.is_sta || d.is_std || d.is_load || d.is_ctrl);
                            if !needs_bypass || bypass_free {
                                fu.pipe[last] = None;
                                finished = Some((slot.uop, needs_bypass));
                            }
                        }
                    }
                }
                fu.advance();

                if let Some((handle, needs_bypass)) = finished {
                    if needs_bypass {
                        self.ports[p].when_bypass_used = now;
                    }
                    self.complete(uops, handle)?;
                }
            }
        }

        for p in 0..self.ports.len() {
            if self.ports[p].payload_occupancy() == 0 {
                continue;
            }
            work_found = true;
            let depth = self.ports[p].payload.len();
            if let Some(slot) = self.ports[p].payload[depth - 1].take() {
                if uops.resolve(slot.uop).is_some_and(|u| u.exec.action_id == slot.action_id) {
                    self.leave_payload(uops, p, slot)?;
                }
            }
            let payload = &mut self.ports[p].payload;
            for stage in (1..depth).rev() {
                payload[stage] = payload[stage - 1].take();
            }
        }

        self.check_for_work = work_found;
        Ok(())
    }

    /// Finishes a non-load uop's execution, or records a load's address.
    fn complete(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        let now = self.now;
        let Some(uop) = uops.resolve_mut(handle) else {
            return Ok(());
        };
        let seq = uop.decode.seq;

        if uop.decode.is_load {
            let addr = uop.oracle.virt_addr;
            let index = uop.alloc.ldq_index.ok_or(ExecError::MissingSlot { seq, slot: "LDQ" })?;
            let entry = self.ldq.entry_mut(index).ok_or(ExecError::BadIndex { queue: "LDQ", index })?;
            entry.virt_addr = addr;
            entry.addr_valid = true;
            trace!(seq, cycle = now, addr, "load address computed");
            return Ok(());
        }

        let done = now + uop.domain_penalty(self.params.fp_penalty);
        uop.exec.ovalue = uop.oracle.ovalue;
        uop.exec.ovalue_valid = true;
        let mispredicted = uop.decode.is_ctrl && uop.mispredicted();
        if mispredicted {
            uop.fetch.pred_npc = uop.oracle.next_pc;
        }
        let (is_sta, is_std) = (uop.decode.is_sta, uop.decode.is_std);
        let (value, addr) = (uop.exec.ovalue, uop.oracle.virt_addr);
        let stq_index = uop.alloc.stq_index;

        if mispredicted {
            self.signal_recover(uops, handle);
        } else if let Some(index) = stq_index.filter(|_| is_sta || is_std) {
            if is_sta {
                self.stq.set_addr(index, addr);
            } else {
                self.stq.set_data(index, value);
            }
        }
        if is_sta || is_std {
            let index = stq_index.ok_or(ExecError::MissingSlot { seq, slot: "STQ" })?;
            if self.stq.entry(index).is_some_and(|e| e.addr_valid && e.value_valid) {
                self.st_alu_exec(uops, index)?;
            }
        }

        if let Some(uop) = uops.resolve_mut(handle) {
            uop.timing.when_completed = done;
        }
        trace!(seq, cycle = now, done, "execution complete");
        self.bypass(uops, handle, value, done);
        Ok(())
    }

    /// Delivers `value` to every consumer of `producer`, available at `when`.
    pub(super) fn bypass(&mut self, uops: &mut UopPool, producer: UopHandle, value: u64, when: Tick) {
        for dep in uops.dependents(producer) {
            if let Some(child) = uops.resolve_mut(dep.consumer) {
                child.exec.ivalue_valid[dep.op_num] = true;
                child.exec.ivalue[dep.op_num] = value;
                child.timing.when_ival_ready[dep.op_num] = when;
            }
        }
    }

    /// A live uop at the end of the payload pipe either enters its unit or replays.
    fn leave_payload(&mut self, uops: &mut UopPool, p: usize, slot: InFlight) -> Result<(), ExecError> {
        let now = self.now;
        let uop = uops.resolve(slot.uop).ok_or(ExecError::StaleUop { context: "payload" })?;
        let seq = uop.decode.seq;
        let class = uop.decode.fu_class.ok_or(ExecError::NotSchedulable {
            seq,
            reason: "uop has no functional unit class",
        })?;
        let fu = self.ports[p].fu(class).ok_or(ExecError::NoFunctionalUnit {
            port: p,
            class: class.name(),
        })?;

        if uop.inputs_valid() && fu.pipe[0].is_none() && fu.when_executable <= now {
            self.rs.release_on_exec(uops, slot.uop);
            if let Some(uop) = uops.resolve_mut(slot.uop) {
                uop.timing.when_exec = now;
            }
            if let Some(fu) = self.ports[p].fu_mut(class) {
                fu.pipe[0] = Some(slot);
                fu.when_executable = now + fu.issue_rate;
            }
            self.check_for_work = true;
            trace!(seq, port = p, cycle = now, "payload to execute");
            return Ok(());
        }

        // Producers that should already have delivered but did not are
        // somewhere slow; park the uop until they wake it again.
        let stalled = uop.oracle.producers.iter().enumerate().any(|(op, producer)| {
            !uop.exec.ivalue_valid[op]
                && producer
                    .and_then(|h| uops.resolve(h))
                    .is_some_and(|prod| prod.timing.when_otag_ready < now)
        });
        self.stats.uops_replayed += 1;
        if let Some(uop) = uops.resolve_mut(slot.uop) {
            uop.exec.num_replays += 1;
            if stalled {
                uop.timing.when_ready = now + BIG_LATENCY;
            }
        }

        self.snatch_back(uops, slot.uop)?;

        let tornado = self.params.tornado_breaker;
        if let Some(uop) = uops.resolve_mut(slot.uop) {
            if uop.timing.when_ready <= now {
                uop.timing.when_ready = now + 1;
                if tornado {
                    let replays = Tick::from(uop.exec.num_replays);
                    if uop.exec.num_replays > TORNADO_STEEP_REPLAYS {
                        uop.timing.when_ready += replays << 1;
                    } else if uop.exec.num_replays > TORNADO_SHALLOW_REPLAYS {
                        uop.timing.when_ready += replays << 3;
                    }
                }
            }
            trace!(
                seq,
                cycle = now,
                replays = uop.exec.num_replays,
                when_ready = uop.timing.when_ready,
                "replay: inputs or unit not ready"
            );
        }
        Ok(())
    }
}
