// SPDX-License-Identifier: MIT OR Apache-2.0
//! Project files and editor settings.
//!
//! A project is a single RON file holding the editor settings and the scene
//! graph. Runtime state (operators, cached collections) is not stored; it is
//! rebuilt from the operator registry on load.

use crate::keymap::KeyMap;
use procedra_graph::{CollisionPlane, EvaluationContext, Graph, GraphError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Current project file format version
pub const PROJECT_FORMAT_VERSION: u32 = 1;

/// Project loading and saving errors
#[derive(Debug, Error)]
pub enum ProjectError {
    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed project file
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Written by a newer editor
    #[error("Project version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },

    /// The stored graph breaks a structural invariant
    #[error("Invalid graph: {0}")]
    InvalidGraph(#[from] GraphError),
}

/// Timeline and session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Frames per second; the evaluation time step is `1 / fps`
    pub fps: f32,
    /// First frame of the timeline
    pub frame_start: i32,
    /// Last frame of the timeline
    pub frame_end: i32,
    /// Maximum undo depth
    pub history_depth: usize,
    /// A point on the collision plane
    pub collision_point: [f32; 3],
    /// Collision plane normal
    pub collision_normal: [f32; 3],
    /// Key bindings
    pub keymap: KeyMap,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            fps: 24.0,
            frame_start: 0,
            frame_end: 96,
            history_depth: crate::history::MAX_HISTORY,
            collision_point: [0.0; 3],
            collision_normal: [0.0, 1.0, 0.0],
            keymap: KeyMap::default(),
        }
    }
}

impl EditorSettings {
    /// Seconds per frame
    pub fn time_step(&self) -> f32 {
        if self.fps > 0.0 {
            1.0 / self.fps
        } else {
            tracing::warn!("Invalid fps {}, using 24", self.fps);
            1.0 / 24.0
        }
    }

    /// Clamp a frame into the timeline
    pub fn clamp_frame(&self, frame: i32) -> i32 {
        frame.clamp(self.frame_start, self.frame_end.max(self.frame_start))
    }

    /// Evaluation context at the first frame
    pub fn evaluation_context(&self) -> EvaluationContext {
        EvaluationContext {
            frame: self.frame_start,
            time_step: self.time_step(),
            collision_plane: CollisionPlane::new(self.collision_point.into(), self.collision_normal.into()),
            ..EvaluationContext::default()
        }
    }
}

/// A saved scene
#[derive(Debug, Serialize, Deserialize)]
pub struct Project {
    /// File format version
    pub version: u32,
    /// Editor settings
    #[serde(default)]
    pub settings: EditorSettings,
    /// Scene graph
    pub graph: Graph,
}

impl Project {
    /// Create a project around a graph
    pub fn new(graph: Graph, settings: EditorSettings) -> Self {
        Self {
            version: PROJECT_FORMAT_VERSION,
            settings,
            graph,
        }
    }

    /// Parse a project from RON text
    pub fn from_ron_str(text: &str) -> Result<Self, ProjectError> {
        let project: Project = ron::from_str(text)?;

        if project.version > PROJECT_FORMAT_VERSION {
            return Err(ProjectError::UnsupportedVersion {
                found: project.version,
                supported: PROJECT_FORMAT_VERSION,
            });
        }
        project.graph.validate()?;

        Ok(project)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String, ProjectError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load a project file
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path)?;
        let project = Self::from_ron_str(&content)?;
        tracing::info!(
            "Loaded project {} ({} nodes)",
            path.display(),
            project.graph.node_count()
        );
        Ok(project)
    }

    /// Save to a project file
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        std::fs::write(path, self.to_ron_string()?)?;
        tracing::info!("Saved project {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procedra_graph::{InputRef, OperatorRegistry, OutputRef, PropertyValue};

    fn sample_graph() -> Graph {
        let registry = OperatorRegistry::with_builtins();
        let mut graph = Graph::new("Sample");
        let points = graph.add_node(registry.create_node("Points").unwrap());
        let gravity = graph.add_node(registry.create_node("Gravity").unwrap().with_position(200.0, 0.0));
        graph.link(OutputRef::new(points, 0), InputRef::new(gravity, 0)).unwrap();
        graph
            .node_mut(gravity)
            .unwrap()
            .properties_mut()
            .set_value("elasticity", PropertyValue::Float(0.25))
            .unwrap();
        graph
    }

    #[test]
    fn test_default_settings() {
        let settings = EditorSettings::default();
        assert!((settings.time_step() - 1.0 / 24.0).abs() < 1e-6);
        assert_eq!(settings.clamp_frame(-5), 0);
        assert_eq!(settings.clamp_frame(500), 96);
        assert_eq!(settings.evaluation_context().collision_plane.normal(), glam::Vec3::Y);
    }

    #[test]
    fn test_project_round_trip() {
        let project = Project::new(sample_graph(), EditorSettings::default());
        let text = project.to_ron_string().unwrap();
        let loaded = Project::from_ron_str(&text).unwrap();

        assert_eq!(loaded.graph.name, "Sample");
        assert_eq!(loaded.graph.node_count(), 2);
        assert_eq!(loaded.graph.links(), project.graph.links());
        assert_eq!(loaded.settings, project.settings);
        let gravity = loaded.graph.find_by_name("Gravity").unwrap();
        assert_eq!(gravity.properties().eval_float("elasticity"), 0.25);
        assert_eq!(gravity.position, [200.0, 0.0]);
        assert!(!gravity.has_operator());
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let mut project = Project::new(Graph::default(), EditorSettings::default());
        project.version = PROJECT_FORMAT_VERSION + 1;
        let text = project.to_ron_string().unwrap();
        assert!(matches!(
            Project::from_ron_str(&text),
            Err(ProjectError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_missing_settings_use_defaults() {
        let project = Project::new(Graph::new("Bare"), EditorSettings::default());
        let text = project.to_ron_string().unwrap();
        let start = text.find("settings:").unwrap();
        let end = text[start..].find("graph:").unwrap() + start;
        let stripped = format!("{}{}", &text[..start], &text[end..]);

        let loaded = Project::from_ron_str(&stripped).unwrap();
        assert_eq!(loaded.settings, EditorSettings::default());
    }
}
