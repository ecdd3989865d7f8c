// SPDX-License-Identifier: MIT OR Apache-2.0
//! Links (edges) between sockets.

use crate::node::NodeId;
use crate::socket::{InputRef, OutputRef};
use serde::{Deserialize, Serialize};

/// A directed edge from an output socket to an input socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Upstream output
    pub from: OutputRef,
    /// Downstream input
    pub to: InputRef,
}

impl Link {
    /// Create a link
    pub fn new(from: OutputRef, to: InputRef) -> Self {
        Self { from, to }
    }

    /// Check if this link touches a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from.node == node_id || self.to.node == node_id
    }
}
