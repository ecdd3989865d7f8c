// SPDX-License-Identifier: MIT OR Apache-2.0
//! Topological scheduling of linked nodes.

use crate::graph::Graph;
use crate::node::NodeId;
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};

/// Evaluation order of a graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Linked nodes, producers before consumers
    pub order: Vec<NodeId>,
    /// Linked nodes left out because they sit on a cycle
    pub cyclic: Vec<NodeId>,
}

impl Schedule {
    /// Position of a node in the order
    pub fn position(&self, node_id: NodeId) -> Option<usize> {
        self.order.iter().position(|id| *id == node_id)
    }

    /// Whether the node is scheduled
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.order.contains(&node_id)
    }
}

/// Order the linked nodes of a graph so that every node follows its producers
///
/// Kahn's algorithm run from the sinks: a node's pending degree is the number
/// of links leaving it, sinks seed a FIFO queue, and popping a node releases
/// the nodes feeding its inputs. The sink-first list is reversed at the end.
/// Nodes without any link are not scheduled. Nodes on a cycle never reach a
/// zero degree and are reported in [`Schedule::cyclic`].
pub fn topological_order(graph: &Graph) -> Schedule {
    let mut pending: IndexMap<NodeId, usize> = IndexMap::new();
    for node in graph.nodes() {
        if !node.has_links() {
            continue;
        }
        let degree = node.outputs().iter().map(|o| o.links().len()).sum();
        pending.insert(node.id, degree);
    }

    let mut queue: VecDeque<NodeId> = pending
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(pending.len());

    while let Some(id) = queue.pop_front() {
        order.push(id);
        let Some(node) = graph.node(id) else {
            continue;
        };
        for upstream in node.inputs().iter().filter_map(|input| input.link()) {
            let Some(degree) = pending.get_mut(&upstream.node) else {
                continue;
            };
            if *degree == 0 {
                continue;
            }
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(upstream.node);
            }
        }
    }

    order.reverse();

    let scheduled: HashSet<NodeId> = order.iter().copied().collect();
    let cyclic: Vec<NodeId> = pending
        .keys()
        .filter(|id| !scheduled.contains(id))
        .copied()
        .collect();
    if !cyclic.is_empty() {
        tracing::warn!("{} node(s) on a cycle were left out of the schedule", cyclic.len());
    }

    Schedule { order, cyclic }
}
