//! Ready-queue insertion, issue and tag broadcast, and snatch-back.

use tracing::trace;

use crate::common::{ExecError, TICK_NEVER, Tick};
use crate::core::uop::{UopHandle, UopPool};

use super::O3Engine;
use super::port::InFlight;
use super::ready_queue::ReadyNode;

impl O3Engine {
    /// Places a uop on its port's ready queue under a fresh action id.
    pub(super) fn insert_ready(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        let uop = uops.resolve_mut(handle).ok_or(ExecError::StaleUop {
            context: "insert ready uop",
        })?;
        let seq = uop.decode.seq;
        let port = uop.alloc.port.ok_or(ExecError::MissingSlot { seq, slot: "port" })?;
        let class = uop.decode.fu_class.ok_or(ExecError::NotSchedulable {
            seq,
            reason: "uop has no functional unit class",
        })?;
        let exec_port = self.ports.get_mut(port).ok_or(ExecError::BadIndex {
            queue: "exec port",
            index: port,
        })?;
        if exec_port.fu(class).is_none() {
            return Err(ExecError::NoFunctionalUnit {
                port,
                class: class.name(),
            });
        }
        let timing = &uop.timing;
        if timing.when_completed != TICK_NEVER || timing.when_exec != TICK_NEVER || timing.when_issued != TICK_NEVER {
            return Err(ExecError::NotSchedulable {
                seq,
                reason: "uop already issued",
            });
        }
        if uop.exec.in_ready_queue {
            return Err(ExecError::NotSchedulable {
                seq,
                reason: "uop already in the ready queue",
            });
        }

        let action_id = self.actions.next_id();
        uop.exec.in_ready_queue = true;
        uop.exec.action_id = action_id;
        exec_port.ready_queue.insert(ReadyNode {
            uop: handle,
            seq,
            action_id,
        });
        Ok(())
    }

    /// Sets input tag `op_num` of `consumer` and queues it if it becomes schedulable.
    pub(super) fn retag(
        &mut self,
        uops: &mut UopPool,
        consumer: UopHandle,
        op_num: usize,
        tag: Tick,
    ) -> Result<(), ExecError> {
        let Some(uop) = uops.resolve_mut(consumer) else {
            return Ok(());
        };
        uop.timing.when_itag_ready[op_num] = tag;
        self.requeue(uops, consumer)
    }

    /// Recomputes `when_ready` from the input tags and queues the uop if
    /// every tag is known and it is not already waiting or in flight.
    pub(super) fn requeue(&mut self, uops: &mut UopPool, handle: UopHandle) -> Result<(), ExecError> {
        let Some(uop) = uops.resolve_mut(handle) else {
            return Ok(());
        };
        let ready = uop.timing.max_itag();
        uop.timing.when_ready = ready;
        let idle = uop.timing.when_issued == TICK_NEVER && uop.timing.when_completed == TICK_NEVER;
        if ready < TICK_NEVER && idle && !uop.exec.in_ready_queue {
            self.insert_ready(uops, handle)?;
        }
        Ok(())
    }

    /// Issues at most one uop per port from its ready queue into the payload pipe.
    pub(super) fn rs_schedule(&mut self, uops: &mut UopPool) -> Result<(), ExecError> {
        let now = self.now;
        for p in 0..self.ports.len() {
            if self.ports[p].payload[0].is_some() {
                continue;
            }
            let mut picked = None;
            let mut i = 0;
            while let Some(node) = self.ports[p].ready_queue.get(i) {
                let Some(uop) = uops.resolve(node.uop).filter(|u| u.exec.action_id == node.action_id) else {
                    let _ = self.ports[p].ready_queue.remove(i);
                    continue;
                };
                if picked.is_none() {
                    let fu_free = uop
                        .decode
                        .fu_class
                        .and_then(|c| self.ports[p].fu(c))
                        .is_some_and(|fu| fu.when_scheduleable <= now);
                    let fusion_ready = !uop.decode.in_fusion
                        || uop
                            .decode
                            .fusion_head
                            .and_then(|h| uops.resolve(h))
                            .is_some_and(|head| head.alloc.full_fusion_allocated);
                    if uop.timing.when_ready <= now && fu_free && fusion_ready {
                        picked = Some(self.ports[p].ready_queue.remove(i));
                        continue;
                    }
                }
                i += 1;
            }
            if let Some(node) = picked {
                self.issue(uops, p, node)?;
            }
        }
        Ok(())
    }

    /// Moves `node` into port `p`'s payload pipe and broadcasts its output tag.
    fn issue(&mut self, uops: &mut UopPool, p: usize, node: ReadyNode) -> Result<(), ExecError> {
        let now = self.now;
        let params = &self.params;
        let uop = uops.resolve_mut(node.uop).ok_or(ExecError::StaleUop {
            context: "RS schedule",
        })?;
        let seq = uop.decode.seq;
        let class = uop.decode.fu_class.ok_or(ExecError::NotSchedulable {
            seq,
            reason: "uop has no functional unit class",
        })?;
        let fu = self.ports[p].fu_mut(class).ok_or(ExecError::NoFunctionalUnit {
            port: p,
            class: class.name(),
        })?;

        uop.exec.in_ready_queue = false;
        uop.timing.when_issued = now;
        uop.timing.when_otag_ready = if uop.decode.is_load {
            now + fu.latency + params.dl1_latency + uop.load_penalty(params.fp_penalty)
        } else {
            now + fu.latency + uop.domain_penalty(params.fp_penalty)
        };
        fu.when_scheduleable = now + fu.issue_rate;
        let otag = uop.timing.when_otag_ready;
        let ldq_index = uop.decode.is_load.then_some(uop.alloc.ldq_index).flatten();

        self.ports[p].payload[0] = Some(InFlight {
            uop: node.uop,
            action_id: node.action_id,
        });
        self.check_for_work = true;
        if let Some(entry) = ldq_index.and_then(|i| self.ldq.entry_mut(i)) {
            entry.speculative_broadcast = true;
        }
        trace!(seq, port = p, cycle = now, otag, "issued to payload");

        for dep in uops.dependents(node.uop) {
            self.retag(uops, dep.consumer, dep.op_num, otag)?;
        }
        self.stats.uops_issued += 1;
        Ok(())
    }

    /// Pulls `root` and every transitively issued dependent back out of
    /// execution, then re-queues `root` if its input tags are all known.
    ///
    /// A uop still waiting in its ready queue keeps a single node. Running it
    /// again on an already snatched uop changes nothing but action ids.
    pub(super) fn snatch_back(&mut self, uops: &mut UopPool, root: UopHandle) -> Result<(), ExecError> {
        let mut stack = vec![root];
        while let Some(handle) = stack.pop() {
            let action_id = self.actions.next_id();
            let Some(uop) = uops.resolve_mut(handle) else {
                continue;
            };
            let queued = uop.exec.in_ready_queue;
            uop.timing.reset_execution();
            uop.exec.action_id = action_id;
            uop.exec.in_ready_queue = false;
            let port = uop.alloc.port;
            let ldq_index = uop.decode.is_load.then_some(uop.alloc.ldq_index).flatten();
            let seq = uop.decode.seq;

            if let Some(entry) = ldq_index.and_then(|i| self.ldq.entry_mut(i)) {
                entry.hit_in_stq = false;
                entry.addr_valid = false;
                entry.when_issued = TICK_NEVER;
                entry.clear_requests();
            }
            if let Some(exec_port) = port.and_then(|p| self.ports.get_mut(p)) {
                if queued {
                    exec_port.ready_queue.retain(|n| n.uop != handle);
                }
                if exec_port.remove_from_payload(handle) {
                    self.stats.uops_snatched_back += 1;
                    trace!(seq, cycle = self.now, "snatched back from payload");
                }
            }

            for dep in uops.dependents(handle) {
                let Some(child) = uops.resolve_mut(dep.consumer) else {
                    continue;
                };
                child.timing.when_itag_ready[dep.op_num] = TICK_NEVER;
                if child.timing.when_issued != TICK_NEVER {
                    stack.push(dep.consumer);
                } else if child.exec.in_ready_queue {
                    child.exec.action_id = self.actions.next_id();
                    child.exec.in_ready_queue = false;
                }
            }
        }

        let Some(uop) = uops.resolve_mut(root) else {
            return Ok(());
        };
        let ready = uop.timing.max_itag();
        if ready != TICK_NEVER {
            uop.timing.when_ready = ready;
            self.insert_ready(uops, root)?;
        }
        Ok(())
    }
}
