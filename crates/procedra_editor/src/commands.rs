// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor commands.
//!
//! A command validates its parameters before touching the state, so a failed
//! command leaves the graph unchanged. Undo is handled by the dispatcher
//! through graph snapshots; commands only implement the forward step.

use crate::history::HistoryError;
use crate::keymap::{EventKind, InputEvent};
use crate::state::{EditorState, ZOOM_RANGE};
use indexmap::IndexMap;
use procedra_graph::{GraphError, InputRef, NodeId, OutputRef, PropertyError, PropertyValue};
use std::fmt;

/// An editor operation triggered by input or by the UI
pub trait Command: fmt::Debug {
    /// Name used in key bindings and menus
    fn name(&self) -> &str;

    /// Whether the command spans several input events
    fn is_modal(&self) -> bool {
        false
    }

    /// Whether the command is recorded in the undo history
    fn supports_undo(&self) -> bool {
        true
    }

    /// Whether the graph must be re-evaluated afterwards
    fn touches_graph(&self) -> bool {
        true
    }

    /// First call of a command, with the event that triggered it
    fn invoke(&mut self, state: &mut EditorState, event: &InputEvent) -> Result<(), CommandError> {
        self.execute(state, event)
    }

    /// Run the command; modal commands get one call per forwarded event
    fn execute(&mut self, state: &mut EditorState, event: &InputEvent) -> Result<(), CommandError>;
}

/// Error type for command execution
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Snapshot serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// History error
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Graph error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Property error
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),

    /// No operator registered under this name
    #[error("Unknown operator type: {0}")]
    UnknownOperator(String),

    /// The command needs a selection
    #[error("Nothing selected")]
    NothingSelected,

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

fn require_node(state: &EditorState, node: NodeId) -> Result<(), CommandError> {
    if state.graph.contains(node) {
        Ok(())
    } else {
        Err(GraphError::NodeNotFound(node).into())
    }
}

/// Create a node from a registered operator
#[derive(Debug, Clone)]
pub struct AddNode {
    /// Operator type name
    pub type_name: String,
    /// Position in the graph view
    pub position: [f32; 2],
    /// Node created by the last execution
    pub created: Option<NodeId>,
}

impl AddNode {
    /// Create a new add-node command
    pub fn new(type_name: impl Into<String>, position: [f32; 2]) -> Self {
        Self {
            type_name: type_name.into(),
            position,
            created: None,
        }
    }
}

impl Command for AddNode {
    fn name(&self) -> &str {
        "add_node"
    }

    fn execute(&mut self, state: &mut EditorState, _event: &InputEvent) -> Result<(), CommandError> {
        let node = state
            .registry
            .create_node(&self.type_name)
            .ok_or_else(|| CommandError::UnknownOperator(self.type_name.clone()))?
            .with_position(self.position[0], self.position[1]);
        let id = state.graph.add_node(node);
        state.select(&[id]);
        tracing::debug!("Added {} node {id:?}", self.type_name);
        self.created = Some(id);
        Ok(())
    }
}

/// Remove nodes and every link touching them
#[derive(Debug, Clone, Default)]
pub struct RemoveNode {
    /// Nodes to remove; the selection when `None`
    pub targets: Option<Vec<NodeId>>,
}

impl RemoveNode {
    /// Remove the selected nodes
    pub fn selected() -> Self {
        Self::default()
    }

    /// Remove one node
    #[allow(dead_code)] // Intentionally kept for API completeness
    pub fn node(node: NodeId) -> Self {
        Self {
            targets: Some(vec![node]),
        }
    }
}

impl Command for RemoveNode {
    fn name(&self) -> &str {
        "remove_node"
    }

    fn execute(&mut self, state: &mut EditorState, _event: &InputEvent) -> Result<(), CommandError> {
        let targets = match &self.targets {
            Some(targets) => targets.clone(),
            None => state.selected_nodes(),
        };
        if targets.is_empty() {
            return Err(CommandError::NothingSelected);
        }
        for node in &targets {
            require_node(state, *node)?;
        }

        for node in targets {
            let (removed, links) = state.graph.remove_node_with_links(node)?;
            tracing::debug!("Removed {} with {} link(s)", removed.name, links.len());
        }
        Ok(())
    }
}

/// Link an output to an input
#[derive(Debug, Clone)]
pub struct LinkSockets {
    /// Upstream output
    pub from: OutputRef,
    /// Downstream input
    pub to: InputRef,
}

impl Command for LinkSockets {
    fn name(&self) -> &str {
        "link_sockets"
    }

    fn execute(&mut self, state: &mut EditorState, _event: &InputEvent) -> Result<(), CommandError> {
        state.graph.link(self.from, self.to)?;
        Ok(())
    }
}

/// Remove a link
#[allow(dead_code)] // Intentionally kept for API completeness
#[derive(Debug, Clone)]
pub struct UnlinkSockets {
    /// Upstream output
    pub from: OutputRef,
    /// Downstream input
    pub to: InputRef,
}

impl Command for UnlinkSockets {
    fn name(&self) -> &str {
        "unlink_sockets"
    }

    fn execute(&mut self, state: &mut EditorState, _event: &InputEvent) -> Result<(), CommandError> {
        if state.graph.upstream(self.to) != Some(self.from) {
            return Err(CommandError::InvalidOperation(format!(
                "{:?} is not linked to {:?}",
                self.from, self.to
            )));
        }
        state.graph.unlink(self.from, self.to);
        Ok(())
    }
}

/// Write a property value back from the UI
#[derive(Debug, Clone)]
pub struct SetProperty {
    /// Node owning the property
    pub node: NodeId,
    /// Property name
    pub name: String,
    /// New value
    pub value: PropertyValue,
}

impl SetProperty {
    /// Create a new set-property command
    pub fn new(node: NodeId, name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            node,
            name: name.into(),
            value,
        }
    }
}

impl Command for SetProperty {
    fn name(&self) -> &str {
        "set_property"
    }

    fn execute(&mut self, state: &mut EditorState, _event: &InputEvent) -> Result<(), CommandError> {
        let node = state
            .graph
            .node_mut(self.node)
            .ok_or(GraphError::NodeNotFound(self.node))?;
        node.properties_mut().set_value(&self.name, self.value.clone())?;
        state.graph.invalidate(self.node);
        Ok(())
    }
}

/// Move a node in the graph view
#[allow(dead_code)] // Intentionally kept for API completeness
#[derive(Debug, Clone)]
pub struct MoveNode {
    /// Node to move
    pub node: NodeId,
    /// New position
    pub position: [f32; 2],
}

impl Command for MoveNode {
    fn name(&self) -> &str {
        "move_node"
    }

    fn touches_graph(&self) -> bool {
        false
    }

    fn execute(&mut self, state: &mut EditorState, _event: &InputEvent) -> Result<(), CommandError> {
        let node = state
            .graph
            .node_mut(self.node)
            .ok_or(GraphError::NodeNotFound(self.node))?;
        node.position = self.position;
        Ok(())
    }
}

/// Jump to a frame; the first frame of the timeline when `None`
#[derive(Debug, Clone, Default)]
pub struct SetFrame {
    /// Target frame
    pub frame: Option<i32>,
}

impl SetFrame {
    /// Jump to a frame
    pub fn new(frame: i32) -> Self {
        Self { frame: Some(frame) }
    }

    /// Jump to the first frame
    pub fn start() -> Self {
        Self::default()
    }
}

impl Command for SetFrame {
    fn name(&self) -> &str {
        "set_frame"
    }

    fn supports_undo(&self) -> bool {
        false
    }

    fn execute(&mut self, state: &mut EditorState, _event: &InputEvent) -> Result<(), CommandError> {
        let frame = self.frame.unwrap_or(state.settings.frame_start);
        state.set_frame(frame);
        Ok(())
    }
}

/// Advance one frame
#[derive(Debug, Clone, Default)]
pub struct NextFrame;

impl Command for NextFrame {
    fn name(&self) -> &str {
        "next_frame"
    }

    fn supports_undo(&self) -> bool {
        false
    }

    fn execute(&mut self, state: &mut EditorState, _event: &InputEvent) -> Result<(), CommandError> {
        state.set_frame(state.frame().saturating_add(1));
        Ok(())
    }
}

/// Go back one frame
#[derive(Debug, Clone, Default)]
pub struct PreviousFrame;

impl Command for PreviousFrame {
    fn name(&self) -> &str {
        "previous_frame"
    }

    fn supports_undo(&self) -> bool {
        false
    }

    fn execute(&mut self, state: &mut EditorState, _event: &InputEvent) -> Result<(), CommandError> {
        state.set_frame(state.frame().saturating_sub(1));
        Ok(())
    }
}

/// Zoom factor applied per wheel step
pub const ZOOM_STEP: f32 = 1.1;

/// Zoom the graph view
#[derive(Debug, Clone, Default)]
pub struct ZoomView {
    /// Explicit factor; derived from the wheel delta when `None`
    pub factor: Option<f32>,
}

impl Command for ZoomView {
    fn name(&self) -> &str {
        "zoom_view"
    }

    fn supports_undo(&self) -> bool {
        false
    }

    fn touches_graph(&self) -> bool {
        false
    }

    fn execute(&mut self, state: &mut EditorState, event: &InputEvent) -> Result<(), CommandError> {
        let factor = self.factor.unwrap_or_else(|| ZOOM_STEP.powf(event.wheel_delta));
        state.view.zoom = (state.view.zoom * factor).clamp(ZOOM_RANGE.0, ZOOM_RANGE.1);
        Ok(())
    }
}

/// Drag the graph view while a button is held
#[derive(Debug, Clone, Default)]
pub struct PanView {
    last: Option<[f32; 2]>,
}

impl Command for PanView {
    fn name(&self) -> &str {
        "pan_view"
    }

    fn is_modal(&self) -> bool {
        true
    }

    fn supports_undo(&self) -> bool {
        false
    }

    fn touches_graph(&self) -> bool {
        false
    }

    fn invoke(&mut self, _state: &mut EditorState, event: &InputEvent) -> Result<(), CommandError> {
        self.last = Some(event.position);
        Ok(())
    }

    fn execute(&mut self, state: &mut EditorState, event: &InputEvent) -> Result<(), CommandError> {
        if event.kind != EventKind::Motion {
            return Ok(());
        }
        if let Some([x, y]) = self.last {
            state.view.pan[0] += event.position[0] - x;
            state.view.pan[1] += event.position[1] - y;
        }
        self.last = Some(event.position);
        Ok(())
    }
}

/// Builds a command with default parameters
pub type CommandConstructor = fn() -> Box<dyn Command>;

/// Commands reachable from key bindings, by name
#[derive(Debug, Default)]
pub struct CommandRegistry {
    constructors: IndexMap<String, CommandConstructor>,
}

impl CommandRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in commands
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("remove_node", || Box::new(RemoveNode::selected()));
        registry.register("first_frame", || Box::new(SetFrame::start()));
        registry.register("next_frame", || Box::new(NextFrame));
        registry.register("previous_frame", || Box::new(PreviousFrame));
        registry.register("zoom_view", || Box::new(ZoomView::default()));
        registry.register("pan_view", || Box::new(PanView::default()));
        registry
    }

    /// Register a command, replacing any previous one with the same name
    pub fn register(&mut self, name: impl Into<String>, constructor: CommandConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    /// Whether a name is registered
    #[allow(dead_code)] // Intentionally kept for API completeness
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Instantiate a command
    pub fn create(&self, name: &str) -> Option<Box<dyn Command>> {
        self.constructors.get(name).map(|constructor| constructor())
    }

    /// Registered names in registration order
    #[allow(dead_code)] // Intentionally kept for API completeness
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}
