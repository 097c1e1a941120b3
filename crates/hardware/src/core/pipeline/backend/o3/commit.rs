//! Store commit: sending the STQ head's write into the memory hierarchy.

use tracing::trace;

use crate::common::{ExecError, page_table_addr, single_line_access};
use crate::core::units::cache::{
    AccessHalf, AccessKind, CompletionToken, MemRequest, MemTarget, MemoryHierarchy, TokenOwner,
};
use crate::core::uop::{UopHandle, UopPool};

use super::O3Engine;

impl O3Engine {
    /// Issues the write for the store whose STD is committing. Returns
    /// `true` once every half has been requested and the entry moved to
    /// the senior range; `false` means retry next cycle.
    ///
    /// Requests carry the entry's action id rather than the uop's, since
    /// the uops are gone by the time the write finishes.
    pub(super) fn commit_store(
        &mut self,
        uops: &UopPool,
        mem: &mut dyn MemoryHierarchy,
        std: UopHandle,
    ) -> Result<bool, ExecError> {
        let uop = uops.resolve(std).ok_or(ExecError::StaleUop {
            context: "STQ deallocate STD",
        })?;
        let index = self.stq.head();
        if uop.alloc.stq_index != Some(index) {
            return Err(ExecError::BadIndex { queue: "STQ", index });
        }
        let entry = self.stq.entry(index).ok_or(ExecError::BadIndex { queue: "STQ", index })?;
        let (seq, pc) = (uop.decode.seq, uop.fetch.pc);
        let (addr, size) = (entry.virt_addr, entry.mem_size);
        let repeated = uop.oracle.is_repeated;
        let send_to_dl1 = !repeated || self.params.dl1_rep_req;
        let asid = self.params.asid;
        let action_id = entry.action_id;

        let write = |target, addr, half, repeated, split| MemRequest {
            target,
            kind: AccessKind::Write,
            asid,
            pc,
            addr,
            token: CompletionToken {
                owner: TokenOwner::Store {
                    stq_index: index,
                    action_id,
                },
                half,
                repeated,
            },
            split,
        };

        let pt_addr = page_table_addr(asid, addr);
        let enqueuable = mem.enqueuable(MemTarget::StoreDtlb, asid, pt_addr)
            && (!send_to_dl1 || mem.enqueuable(MemTarget::Dl1, asid, addr))
            && (!repeated || mem.enqueuable(MemTarget::Repeater, asid, addr));
        if !enqueuable {
            return Ok(false);
        }

        if !entry.first_byte_requested {
            if send_to_dl1 {
                mem.enqueue(write(MemTarget::Dl1, addr, AccessHalf::First, repeated, false));
            }
            mem.enqueue(MemRequest {
                kind: AccessKind::Read,
                ..write(MemTarget::StoreDtlb, pt_addr, AccessHalf::First, false, false)
            });
            if repeated {
                mem.enqueue(write(MemTarget::Repeater, addr, AccessHalf::First, true, false));
            }
            let single_line = single_line_access(addr, size, self.params.dl1_line_bytes);
            if let Some(entry) = self.stq.entry_mut(index) {
                entry.write_complete = false;
                entry.translation_complete = false;
                entry.first_byte_requested = true;
                if single_line {
                    entry.last_byte_requested = true;
                    entry.last_byte_written = true;
                }
            }
            trace!(seq, cycle = self.now, addr, single_line, "store sent to memory");
        }

        let requested_last = self.stq.entry(index).is_some_and(|e| e.last_byte_requested);
        if !requested_last {
            let split_addr = addr + size;
            let enqueuable = (!send_to_dl1 || mem.enqueuable(MemTarget::Dl1, asid, split_addr))
                && (!repeated || mem.enqueuable(MemTarget::Repeater, asid, split_addr));
            if !enqueuable {
                return Ok(false);
            }
            if send_to_dl1 {
                self.stats.dl1_store_split_accesses += 1;
                mem.enqueue(write(MemTarget::Dl1, split_addr, AccessHalf::Last, repeated, true));
            }
            if repeated {
                mem.enqueue(write(MemTarget::Repeater, split_addr, AccessHalf::Last, true, true));
            }
            if let Some(entry) = self.stq.entry_mut(index) {
                entry.last_byte_requested = true;
            }
            trace!(seq, cycle = self.now, split_addr, "split store second half sent");
        }

        self.stq.retire_head();
        Ok(true)
    }
}
