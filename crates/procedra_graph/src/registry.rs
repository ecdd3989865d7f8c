// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of operator types available to the graph.

use crate::evaluation::Operator;
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use indexmap::IndexMap;

/// Builds a fresh operator instance
pub type OperatorConstructor = fn() -> Box<dyn Operator>;

/// A registered operator type
#[derive(Debug, Clone)]
pub struct OperatorDescriptor {
    /// Type name stored in serialized nodes
    pub name: String,
    /// Menu category
    pub category: String,
    /// One-line help text
    pub help: String,
    /// Instance constructor
    pub constructor: OperatorConstructor,
}

/// Operator types by name, in registration order
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    descriptors: IndexMap<String, OperatorDescriptor>,
}

impl OperatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in operators
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::operators::register_builtins(&mut registry);
        registry
    }

    /// Register an operator type, replacing any previous one with the same name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        category: impl Into<String>,
        help: impl Into<String>,
        constructor: OperatorConstructor,
    ) {
        let name = name.into();
        let descriptor = OperatorDescriptor {
            name: name.clone(),
            category: category.into(),
            help: help.into(),
            constructor,
        };
        if self.descriptors.insert(name.clone(), descriptor).is_some() {
            tracing::warn!("Operator '{name}' registered twice, keeping the latest");
        }
    }

    /// Get a descriptor by type name
    pub fn get(&self, name: &str) -> Option<&OperatorDescriptor> {
        self.descriptors.get(name)
    }

    /// Whether a type name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// All descriptors in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &OperatorDescriptor> {
        self.descriptors.values()
    }

    /// Distinct categories in registration order
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for d in self.descriptors.values() {
            if !categories.contains(&d.category.as_str()) {
                categories.push(&d.category);
            }
        }
        categories
    }

    /// Build a new operator instance
    pub fn instantiate(&self, name: &str) -> Option<Box<dyn Operator>> {
        self.get(name).map(|d| (d.constructor)())
    }

    /// Create a node with the operator's sockets and properties, operator bound
    pub fn create_node(&self, name: &str) -> Option<Node> {
        let operator = self.instantiate(name)?;
        let mut node = Node::new(name);
        operator.declare(&mut node);
        node.bind_operator(operator);
        Some(node)
    }

    /// Bind fresh operators to every node of a graph, e.g. after loading
    ///
    /// Returns the nodes whose type is not registered; they stay unbound.
    pub fn bind_operators(&self, graph: &mut Graph) -> Vec<NodeId> {
        let mut unknown = Vec::new();
        for node in graph.nodes_mut() {
            match self.instantiate(&node.type_name) {
                Some(operator) => node.bind_operator(operator),
                None => {
                    tracing::warn!("Unknown operator type '{}' on {}", node.type_name, node.name);
                    unknown.push(node.id);
                }
            }
        }
        unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = OperatorRegistry::with_builtins();
        for name in ["Points", "Curves", "Transform", "Gravity", "MassSpring", "Output"] {
            assert!(registry.contains(name), "{name} missing");
        }
        assert_eq!(
            registry.categories(),
            vec!["Geometry", "Modifiers", "Physics", "Output"]
        );
    }

    #[test]
    fn test_create_node_declares_sockets() {
        let registry = OperatorRegistry::with_builtins();
        let node = registry.create_node("Gravity").unwrap();
        assert_eq!(node.type_name, "Gravity");
        assert_eq!(node.input_index("in"), Some(0));
        assert_eq!(node.output_index("out"), Some(0));
        assert!(node.properties().get("mass").is_some());
        assert!(node.has_operator());
        assert!(registry.create_node("Nope").is_none());
    }

    #[test]
    fn test_bind_operators_reports_unknown_types() {
        let registry = OperatorRegistry::with_builtins();
        let mut graph = Graph::default();
        let known = graph.add_node(Node::new("Points"));
        let unknown = graph.add_node(Node::new("Teapot"));

        assert_eq!(registry.bind_operators(&mut graph), vec![unknown]);
        assert!(graph.node(known).unwrap().has_operator());
        assert!(!graph.node(unknown).unwrap().has_operator());
    }
}
