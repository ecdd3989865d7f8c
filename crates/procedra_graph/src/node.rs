// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node instances in the graph.

use crate::collection::Collection;
use crate::evaluation::Operator;
use crate::property::Properties;
use crate::socket::{InputSocket, OutputSocket};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-node editor flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags {
    /// Selected in the graph editor
    pub selected: bool,
    /// Forward input 0 instead of running the operator
    pub bypassed: bool,
}

/// Evaluation state that lives as long as the node but is never persisted
#[derive(Debug, Default)]
pub(crate) struct NodeRuntime {
    pub(crate) operator: Option<Box<dyn Operator>>,
    pub(crate) output: Option<Arc<Collection>>,
    pub(crate) warnings: Vec<String>,
}

/// A node instance in the graph
#[derive(Debug, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Registered operator type name
    pub type_name: String,
    /// Display name (can be customized)
    pub name: String,
    /// Position in the graph UI
    pub position: [f32; 2],
    /// Editor flags
    pub flags: NodeFlags,
    pub(crate) inputs: Vec<InputSocket>,
    pub(crate) outputs: Vec<OutputSocket>,
    pub(crate) properties: Properties,
    #[serde(skip)]
    pub(crate) runtime: NodeRuntime,
}

impl Node {
    /// Create a node without sockets, properties or operator
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            id: NodeId::new(),
            name: type_name.clone(),
            type_name,
            position: [0.0, 0.0],
            flags: NodeFlags::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: Properties::new(),
            runtime: NodeRuntime::default(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append an input socket, returning its index
    pub fn add_input(&mut self, name: impl Into<String>) -> usize {
        self.inputs.push(InputSocket::new(name));
        self.inputs.len() - 1
    }

    /// Append an output socket, returning its index
    pub fn add_output(&mut self, name: impl Into<String>) -> usize {
        self.outputs.push(OutputSocket::new(name));
        self.outputs.len() - 1
    }

    /// Input sockets in declaration order
    pub fn inputs(&self) -> &[InputSocket] {
        &self.inputs
    }

    /// Output sockets in declaration order
    pub fn outputs(&self) -> &[OutputSocket] {
        &self.outputs
    }

    /// Get an input socket by index
    pub fn input(&self, index: usize) -> Option<&InputSocket> {
        self.inputs.get(index)
    }

    /// Get an output socket by index
    pub fn output(&self, index: usize) -> Option<&OutputSocket> {
        self.outputs.get(index)
    }

    /// Index of the input with this name
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s.name == name)
    }

    /// Index of the output with this name
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s.name == name)
    }

    /// Whether any socket of this node is linked
    pub fn has_links(&self) -> bool {
        self.inputs.iter().any(InputSocket::is_linked) || self.outputs.iter().any(OutputSocket::is_linked)
    }

    /// Declared properties
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Declared properties, for editing
    ///
    /// Changing a value does not reset cached simulation state; simulations
    /// pick up new parameters on their next step.
    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Output collection of the last evaluation, if any
    pub fn output_collection(&self) -> Option<&Arc<Collection>> {
        self.runtime.output.as_ref()
    }

    /// Warnings raised during the last evaluation of this node
    pub fn warnings(&self) -> &[String] {
        &self.runtime.warnings
    }

    /// Whether an operator instance is bound
    pub fn has_operator(&self) -> bool {
        self.runtime.operator.is_some()
    }

    /// Bind the operator instance that evaluates this node
    pub fn bind_operator(&mut self, operator: Box<dyn Operator>) {
        self.runtime = NodeRuntime {
            operator: Some(operator),
            ..NodeRuntime::default()
        };
    }

    /// Drop cached output and let the operator forget its frame state
    pub fn reset_runtime(&mut self) {
        self.runtime.output = None;
        self.runtime.warnings.clear();
        if let Some(operator) = self.runtime.operator.as_mut() {
            operator.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sockets_by_index_and_name() {
        let mut node = Node::new("Transform").with_position(10.0, 20.0);
        assert_eq!(node.add_input("in"), 0);
        assert_eq!(node.add_input("mask"), 1);
        assert_eq!(node.add_output("out"), 0);

        assert_eq!(node.input_index("mask"), Some(1));
        assert_eq!(node.output_index("out"), Some(0));
        assert_eq!(node.input_index("out"), None);
        assert_eq!(node.position, [10.0, 20.0]);
        assert!(!node.has_links());
        assert!(!node.has_operator());
    }
}
