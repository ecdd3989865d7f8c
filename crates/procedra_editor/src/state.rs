// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor state management.
//!
//! The state owns the scene graph, the operator registry used to rebuild
//! operators, the evaluation context of the session and the view state the
//! viewport reads.

use crate::project::{EditorSettings, Project};
use procedra_graph::{evaluate, EvalReport, EvaluationContext, Graph, NodeId, OperatorRegistry};
use std::path::PathBuf;

/// Zoom bounds of the graph view
pub const ZOOM_RANGE: (f32, f32) = (0.1, 10.0);

/// Pan and zoom of the graph view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// Scale factor
    pub zoom: f32,
    /// Offset in view pixels
    pub pan: [f32; 2],
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: [0.0, 0.0],
        }
    }
}

/// Main editor state
pub struct EditorState {
    /// Scene graph
    pub graph: Graph,
    /// Operator types
    pub registry: OperatorRegistry,
    /// Session evaluation state (frame, time step, collision plane)
    pub context: EvaluationContext,
    /// Timeline and session settings
    pub settings: EditorSettings,
    /// Graph view
    pub view: ViewState,
    /// Result of the latest evaluation
    pub last_report: Option<EvalReport>,
    /// Current project file path
    pub project_path: Option<PathBuf>,
    /// Whether the graph has unsaved changes
    pub dirty: bool,
}

impl EditorState {
    /// Create a state with an empty graph and the built-in operators
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            graph: Graph::default(),
            registry: OperatorRegistry::with_builtins(),
            context: settings.evaluation_context(),
            settings,
            view: ViewState::default(),
            last_report: None,
            project_path: None,
            dirty: false,
        }
    }

    /// Create a state from a loaded project
    pub fn from_project(project: Project, path: Option<PathBuf>) -> Self {
        let mut state = Self::new(project.settings);
        state.restore_graph(project.graph);
        state.project_path = path;
        state
    }

    /// Snapshot the state as a project
    pub fn to_project(&self) -> Result<Project, crate::history::HistoryError> {
        let snapshot = crate::history::StateSnapshot::from_value(&self.graph)?;
        Ok(Project::new(snapshot.to_value()?, self.settings.clone()))
    }

    /// Replace the graph, rebinding operators and re-evaluating
    ///
    /// Nodes whose upstream subgraph is unchanged keep their cached outputs
    /// and simulation state.
    pub fn restore_graph(&mut self, mut graph: Graph) {
        let unknown = self.registry.bind_operators(&mut graph);
        if !unknown.is_empty() {
            tracing::warn!("{} node(s) have no registered operator", unknown.len());
        }
        let kept = graph.adopt_runtime(&mut self.graph);
        tracing::debug!("Kept evaluation state of {kept}/{} node(s)", graph.node_count());
        self.graph = graph;
        self.evaluate();
    }

    /// Current frame
    pub fn frame(&self) -> i32 {
        self.context.frame
    }

    /// Move to a frame, clamped into the timeline; returns the frame set
    pub fn set_frame(&mut self, frame: i32) -> i32 {
        self.context.frame = self.settings.clamp_frame(frame);
        self.context.frame
    }

    /// Evaluate the graph at the current frame
    pub fn evaluate(&mut self) -> &EvalReport {
        self.context.cancel.reset();
        let report = evaluate(&mut self.graph, &self.context);
        for (node, warning) in report.warnings() {
            tracing::debug!("Warning on {node:?}: {warning}");
        }
        self.last_report.insert(report)
    }

    /// Selected nodes in graph order
    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.graph
            .nodes()
            .filter(|n| n.flags.selected)
            .map(|n| n.id)
            .collect()
    }

    /// Replace the selection
    pub fn select(&mut self, nodes: &[NodeId]) {
        for node in self.graph.nodes_mut() {
            node.flags.selected = nodes.contains(&node.id);
        }
    }

    /// Mark the graph as modified
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_clamped_to_timeline() {
        let mut state = EditorState::default();
        assert_eq!(state.set_frame(10), 10);
        assert_eq!(state.set_frame(-3), 0);
        assert_eq!(state.set_frame(1000), state.settings.frame_end);
    }

    #[test]
    fn test_selection() {
        let mut state = EditorState::default();
        let a = state.graph.add_node(state.registry.create_node("Points").unwrap());
        let b = state.graph.add_node(state.registry.create_node("Output").unwrap());
        state.select(&[b]);
        assert_eq!(state.selected_nodes(), vec![b]);
        state.select(&[a, b]);
        assert_eq!(state.selected_nodes(), vec![a, b]);
    }

    #[test]
    fn test_restore_graph_rebinds_operators() {
        let mut state = EditorState::default();
        let id = state.graph.add_node(state.registry.create_node("Points").unwrap());
        let project = state.to_project().unwrap();
        assert!(!project.graph.node(id).unwrap().has_operator());

        let restored = EditorState::from_project(project, None);
        assert!(restored.graph.node(id).unwrap().has_operator());
        assert!(restored.last_report.is_some());
    }
}
