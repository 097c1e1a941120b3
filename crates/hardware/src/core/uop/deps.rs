//! Producer-to-consumer dependency edges.
//!
//! Edges live in a flat vector and are chained per producer through `next`
//! indices. Released edges go on an explicit free list and are reused by
//! later insertions, so steady-state simulation does not allocate.

use super::UopHandle;

/// One consumer of a producer's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dependent {
    /// The consuming uop.
    pub consumer: UopHandle,
    /// Which input operand of the consumer.
    pub op_num: usize,
}

#[derive(Clone, Copy, Debug)]
struct Edge {
    dep: Dependent,
    next: Option<u32>,
}

/// Arena of dependency edges with a free list.
#[derive(Debug, Default)]
pub struct EdgePool {
    edges: Vec<Edge>,
    free: Vec<u32>,
}

impl EdgePool {
    /// Links a new edge in front of `next` and returns its index.
    pub(crate) fn push(&mut self, consumer: UopHandle, op_num: usize, next: Option<u32>) -> u32 {
        let edge = Edge {
            dep: Dependent { consumer, op_num },
            next,
        };
        if let Some(index) = self.free.pop() {
            self.edges[index as usize] = edge;
            index
        } else {
            self.edges.push(edge);
            (self.edges.len() - 1) as u32
        }
    }

    /// Returns every edge of a chain to the free list.
    pub(crate) fn release_chain(&mut self, mut cursor: Option<u32>) {
        while let Some(index) = cursor {
            cursor = self.edges.get(index as usize).and_then(|e| e.next);
            self.free.push(index);
        }
    }

    /// Walks a chain from `head`.
    pub(crate) fn iter_chain(&self, head: Option<u32>) -> impl Iterator<Item = Dependent> + '_ {
        let mut cursor = head;
        std::iter::from_fn(move || {
            let edge = self.edges.get(cursor? as usize)?;
            cursor = edge.next;
            Some(edge.dep)
        })
    }

    /// Edges currently in use.
    pub fn live_edges(&self) -> usize {
        self.edges.len() - self.free.len()
    }
}
