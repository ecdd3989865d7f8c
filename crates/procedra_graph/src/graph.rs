// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and the links between their sockets.

use crate::link::Link;
use crate::node::{Node, NodeId};
use crate::schedule::{topological_order, Schedule};
use crate::socket::{InputRef, InputSocket, OutputRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// A node graph
///
/// Nodes live in an arena keyed by [`NodeId`]; links are stored on the
/// sockets of both endpoints. Every structural mutation invalidates the cached
/// [`Schedule`] and resets the evaluation state of the affected nodes.
#[derive(Debug, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name
    pub name: String,
    nodes: IndexMap<NodeId, Node>,
    #[serde(skip)]
    schedule: Option<Schedule>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            schedule: None,
        }
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        self.schedule = None;
        id
    }

    /// Remove an unlinked node
    ///
    /// Fails with [`GraphError::NodeHasLinks`] if any socket is still linked;
    /// use [`Graph::remove_node_with_links`] to unlink first.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<Node, GraphError> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        if node.has_links() {
            return Err(GraphError::NodeHasLinks(node_id));
        }
        self.schedule = None;
        self.nodes
            .shift_remove(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))
    }

    /// Unlink every link touching a node, then remove it
    ///
    /// Returns the node and the links that were removed, in [`Graph::links`] order.
    pub fn remove_node_with_links(&mut self, node_id: NodeId) -> Result<(Node, Vec<Link>), GraphError> {
        if !self.nodes.contains_key(&node_id) {
            return Err(GraphError::NodeNotFound(node_id));
        }
        let links = self.links_for_node(node_id);
        for link in &links {
            self.unlink(link.from, link.to);
        }
        let node = self.remove_node(node_id)?;
        Ok((node, links))
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Whether a node exists
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all nodes mutably
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// First node with this display name
    pub fn find_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.name == name)
    }

    /// Link an output socket to an input socket
    ///
    /// The graph is left unchanged on error.
    pub fn link(&mut self, from: OutputRef, to: InputRef) -> Result<(), GraphError> {
        let source = self.nodes.get(&from.node).ok_or(GraphError::NodeNotFound(from.node))?;
        if source.output(from.index).is_none() {
            return Err(GraphError::OutputNotFound(from));
        }
        let target = self.nodes.get(&to.node).ok_or(GraphError::NodeNotFound(to.node))?;
        let input = target.input(to.index).ok_or(GraphError::InputNotFound(to))?;
        if input.is_linked() {
            return Err(GraphError::InputAlreadyLinked(to));
        }
        if self.reaches(to.node, from.node) {
            return Err(GraphError::WouldCreateCycle {
                from: from.node,
                to: to.node,
            });
        }

        if let Some(target) = self.nodes.get_mut(&to.node) {
            target.inputs[to.index].set_link(Some(from));
        }
        if let Some(source) = self.nodes.get_mut(&from.node) {
            source.outputs[from.index].add_link(to);
        }

        tracing::debug!("Linked {:?} -> {:?}", from, to);
        self.structure_changed(to.node);
        Ok(())
    }

    /// Remove a link; returns `false` if the sockets were not linked
    pub fn unlink(&mut self, from: OutputRef, to: InputRef) -> bool {
        let linked = self
            .nodes
            .get(&to.node)
            .and_then(|n| n.input(to.index))
            .is_some_and(|input| input.link() == Some(from));
        if !linked {
            return false;
        }

        if let Some(target) = self.nodes.get_mut(&to.node) {
            target.inputs[to.index].set_link(None);
        }
        if let Some(source) = self.nodes.get_mut(&from.node) {
            if let Some(output) = source.outputs.get_mut(from.index) {
                output.remove_link(to);
            }
        }

        tracing::debug!("Unlinked {:?} -> {:?}", from, to);
        self.structure_changed(to.node);
        true
    }

    /// The output feeding an input, if linked
    pub fn upstream(&self, to: InputRef) -> Option<OutputRef> {
        self.nodes.get(&to.node)?.input(to.index)?.link()
    }

    /// All links, grouped by downstream node in insertion order
    pub fn links(&self) -> Vec<Link> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.inputs().iter().enumerate().filter_map(move |(index, input)| {
                    input.link().map(|from| Link::new(from, InputRef::new(node.id, index)))
                })
            })
            .collect()
    }

    /// Links touching a node
    pub fn links_for_node(&self, node_id: NodeId) -> Vec<Link> {
        self.links().into_iter().filter(|l| l.involves_node(node_id)).collect()
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.nodes
            .values()
            .map(|n| n.inputs().iter().filter(|i| i.is_linked()).count())
            .sum()
    }

    /// A node and every node downstream of it, breadth first
    pub fn downstream_nodes(&self, start: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut result = Vec::new();

        while let Some(id) = queue.pop_front() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            result.push(id);
            for input in node.outputs().iter().flat_map(|o| o.links()) {
                if seen.insert(input.node) {
                    queue.push_back(input.node);
                }
            }
        }

        result
    }

    fn reaches(&self, start: NodeId, target: NodeId) -> bool {
        start == target || self.downstream_nodes(start).contains(&target)
    }

    fn structure_changed(&mut self, node_id: NodeId) {
        self.schedule = None;
        self.invalidate(node_id);
    }

    /// Reset the evaluation state of a node and of everything downstream of it
    pub fn invalidate(&mut self, node_id: NodeId) {
        for id in self.downstream_nodes(node_id) {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.reset_runtime();
            }
        }
    }

    /// Evaluation order, recomputed if the structure changed since the last call
    pub fn schedule(&mut self) -> &Schedule {
        if self.schedule.is_none() {
            tracing::debug!("Recomputing schedule for graph {}", self.name);
            self.schedule = Some(topological_order(self));
        }
        self.schedule.get_or_insert_with(Schedule::default)
    }

    /// Whether the cached schedule is up to date
    pub fn is_schedule_valid(&self) -> bool {
        self.schedule.is_some()
    }

    /// Move evaluation state over from an earlier version of this graph
    ///
    /// A node keeps its state when it and its whole upstream subgraph have the
    /// same type, properties, bypass flag and input links in both graphs.
    /// Returns the number of nodes whose state was carried over.
    pub fn adopt_runtime(&mut self, previous: &mut Graph) -> usize {
        let mut unchanged = HashMap::new();
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for &id in &ids {
            self.is_unchanged(id, previous, &mut unchanged);
        }

        let mut adopted = 0;
        for id in ids {
            if !unchanged.get(&id).copied().unwrap_or(false) {
                continue;
            }
            if let (Some(node), Some(old)) = (self.nodes.get_mut(&id), previous.nodes.get_mut(&id)) {
                node.runtime = std::mem::take(&mut old.runtime);
                adopted += 1;
            }
        }
        adopted
    }

    fn is_unchanged(&self, id: NodeId, previous: &Graph, memo: &mut HashMap<NodeId, bool>) -> bool {
        if let Some(&known) = memo.get(&id) {
            return known;
        }
        // Guards against revisiting through a malformed cyclic graph
        memo.insert(id, false);

        let same = match (self.nodes.get(&id), previous.nodes.get(&id)) {
            (Some(node), Some(old)) => {
                node.type_name == old.type_name
                    && node.flags.bypassed == old.flags.bypassed
                    && node.properties == old.properties
                    && node.inputs == old.inputs
                    && node
                        .inputs()
                        .iter()
                        .filter_map(InputSocket::link)
                        .all(|from| self.is_unchanged(from.node, previous, memo))
            }
            _ => false,
        };
        memo.insert(id, same);
        same
    }

    /// Reset the evaluation state of every node
    pub fn reset_runtime(&mut self) {
        for node in self.nodes.values_mut() {
            node.reset_runtime();
        }
    }

    /// Check link symmetry and acyclicity, e.g. after deserialization
    pub fn validate(&self) -> Result<(), GraphError> {
        for link in self.links() {
            let back = self
                .nodes
                .get(&link.from.node)
                .and_then(|n| n.output(link.from.index))
                .is_some_and(|o| o.links().contains(&link.to));
            if !back {
                return Err(GraphError::BrokenLink(link));
            }
        }
        for node in self.nodes.values() {
            for (index, output) in node.outputs().iter().enumerate() {
                for to in output.links() {
                    let from = OutputRef::new(node.id, index);
                    if self.upstream(*to) != Some(from) {
                        return Err(GraphError::BrokenLink(Link::new(from, *to)));
                    }
                }
            }
        }

        let schedule = topological_order(self);
        if !schedule.cyclic.is_empty() {
            return Err(GraphError::CycleDetected(schedule.cyclic));
        }
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Structural error; the graph is unchanged when one is returned
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Input socket not found
    #[error("Input not found: {0:?}")]
    InputNotFound(InputRef),

    /// Output socket not found
    #[error("Output not found: {0:?}")]
    OutputNotFound(OutputRef),

    /// The input already has an upstream link
    #[error("Input already linked: {0:?}")]
    InputAlreadyLinked(InputRef),

    /// The link would close a cycle
    #[error("Linking {from:?} to {to:?} would create a cycle")]
    WouldCreateCycle {
        /// Upstream node of the rejected link
        from: NodeId,
        /// Downstream node of the rejected link
        to: NodeId,
    },

    /// The node still has links
    #[error("Node {0:?} still has links")]
    NodeHasLinks(NodeId),

    /// A link whose endpoints disagree
    #[error("Link {0:?} is only recorded on one endpoint")]
    BrokenLink(Link),

    /// Nodes that take part in a cycle
    #[error("Graph contains a cycle through {0:?}")]
    CycleDetected(Vec<NodeId>),
}
