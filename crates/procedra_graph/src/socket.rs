// SPDX-License-Identifier: MIT OR Apache-2.0
//! Input and output sockets.
//!
//! Sockets are owned by their node and addressed by position. Links are stored
//! on both endpoints as [`OutputRef`]/[`InputRef`] handles, which never own
//! anything: a handle to a removed node simply fails to resolve.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// Handle to an output socket: owning node and output index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// Owning node
    pub node: NodeId,
    /// Position in the node's outputs
    pub index: usize,
}

impl OutputRef {
    /// Create an output handle
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

/// Handle to an input socket: owning node and input index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputRef {
    /// Owning node
    pub node: NodeId,
    /// Position in the node's inputs
    pub index: usize,
}

impl InputRef {
    /// Create an input handle
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

/// An input socket; at most one upstream link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSocket {
    /// Socket name
    pub name: String,
    link: Option<OutputRef>,
}

impl InputSocket {
    /// Create an unlinked input
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: None,
        }
    }

    /// The upstream output, if linked
    pub fn link(&self) -> Option<OutputRef> {
        self.link
    }

    /// Whether an upstream output is linked
    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    pub(crate) fn set_link(&mut self, link: Option<OutputRef>) {
        self.link = link;
    }
}

/// An output socket; fans out to any number of inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSocket {
    /// Socket name
    pub name: String,
    links: Vec<InputRef>,
}

impl OutputSocket {
    /// Create an unlinked output
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            links: Vec::new(),
        }
    }

    /// Downstream inputs in link order
    pub fn links(&self) -> &[InputRef] {
        &self.links
    }

    /// Whether any input is linked
    pub fn is_linked(&self) -> bool {
        !self.links.is_empty()
    }

    pub(crate) fn add_link(&mut self, input: InputRef) {
        if !self.links.contains(&input) {
            self.links.push(input);
        }
    }

    pub(crate) fn remove_link(&mut self, input: InputRef) -> bool {
        let before = self.links.len();
        self.links.retain(|l| *l != input);
        self.links.len() != before
    }
}
