//! Per-port age-ordered ready queue.
//!
//! Nodes are kept sorted by uop sequence number, oldest first. A node
//! remembers the action id its uop had when inserted; once the uop is
//! squashed or re-queued the ids no longer match and the node is reaped the
//! next time the scheduler walks past it.

use crate::common::ActionId;
use crate::core::uop::UopHandle;

/// One ready-queue entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadyNode {
    /// The uop.
    pub uop: UopHandle,
    /// Uop sequence number at insertion.
    pub seq: u64,
    /// Uop action id at insertion.
    pub action_id: ActionId,
}

/// Age-ordered queue of uops whose inputs are tagged ready.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    nodes: Vec<ReadyNode>,
}

impl ReadyQueue {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Number of nodes, stale ones included.
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if there are no nodes.
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in age order.
    pub fn nodes(&self) -> &[ReadyNode] {
        &self.nodes
    }

    /// Inserts `node` in front of the first node that is not older.
    pub fn insert(&mut self, node: ReadyNode) {
        let at = self.nodes.partition_point(|n| n.seq < node.seq);
        self.nodes.insert(at, node);
    }

    pub(crate) fn get(&self, index: usize) -> Option<ReadyNode> {
        self.nodes.get(index).copied()
    }

    pub(crate) fn remove(&mut self, index: usize) -> ReadyNode {
        self.nodes.remove(index)
    }

    /// Drops every node `keep` rejects.
    pub(crate) fn retain(&mut self, keep: impl FnMut(&ReadyNode) -> bool) {
        self.nodes.retain(keep);
    }
}
