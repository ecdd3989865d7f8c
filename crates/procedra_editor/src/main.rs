// SPDX-License-Identifier: MIT OR Apache-2.0
//! Procedra - procedural scene editor core
//!
//! Headless entry point of the editor:
//! - Loads a project file, or builds a demo scene
//! - Plays the timeline through the command dispatcher
//! - Logs a summary of every evaluated frame
//!
//! Usage: `procedra [project.ron] [--save <path>]`

mod commands;
mod dispatcher;
mod history;
mod keymap;
mod project;
mod state;

use commands::{AddNode, CommandError, LinkSockets, NextFrame, SetFrame, SetProperty};
use dispatcher::Dispatcher;
use procedra_graph::{InputRef, NodeId, OutputRef, PropertyValue};
use project::{EditorSettings, Project, ProjectError};
use state::EditorState;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Default)]
struct Args {
    project: Option<PathBuf>,
    save: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--save" => {
                let path = iter.next().ok_or("--save needs a path")?;
                args.save = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => return Err(format!("Unknown option {flag}")),
            path => args.project = Some(PathBuf::from(path)),
        }
    }
    Ok(args)
}

fn add_node(
    state: &mut EditorState,
    dispatcher: &mut Dispatcher,
    type_name: &str,
    position: [f32; 2],
) -> Result<NodeId, CommandError> {
    let mut command = AddNode::new(type_name, position);
    dispatcher.run(state, &mut command)?;
    command
        .created
        .ok_or_else(|| CommandError::InvalidOperation(format!("{type_name} was not created")))
}

fn connect(
    state: &mut EditorState,
    dispatcher: &mut Dispatcher,
    from: NodeId,
    to: NodeId,
) -> Result<(), CommandError> {
    let mut command = LinkSockets {
        from: OutputRef::new(from, 0),
        to: InputRef::new(to, 0),
    };
    dispatcher.run(state, &mut command)
}

/// Falling points and hanging curves
fn build_demo(state: &mut EditorState, dispatcher: &mut Dispatcher) -> Result<(), CommandError> {
    state.graph.name = "Demo".to_string();

    let points = add_node(state, dispatcher, "Points", [0.0, 0.0])?;
    let gravity = add_node(state, dispatcher, "Gravity", [200.0, 0.0])?;
    let falling = add_node(state, dispatcher, "Output", [400.0, 0.0])?;
    connect(state, dispatcher, points, gravity)?;
    connect(state, dispatcher, gravity, falling)?;
    dispatcher.run(
        state,
        &mut SetProperty::new(gravity, "elasticity", PropertyValue::Float(0.7)),
    )?;

    let curves = add_node(state, dispatcher, "Curves", [0.0, 150.0])?;
    let springs = add_node(state, dispatcher, "MassSpring", [200.0, 150.0])?;
    let lifted = add_node(state, dispatcher, "Transform", [400.0, 150.0])?;
    let hanging = add_node(state, dispatcher, "Output", [600.0, 150.0])?;
    connect(state, dispatcher, curves, springs)?;
    connect(state, dispatcher, springs, lifted)?;
    connect(state, dispatcher, lifted, hanging)?;
    dispatcher.run(
        state,
        &mut SetProperty::new(lifted, "translate", PropertyValue::Vec3([0.0, 1.0, 0.0])),
    )?;

    tracing::info!(
        "Built demo scene: {} nodes, {} links",
        state.graph.node_count(),
        state.graph.link_count()
    );
    Ok(())
}

fn log_frame(state: &EditorState) {
    let Some(report) = &state.last_report else {
        return;
    };
    if report.cancelled {
        tracing::warn!("Frame {} cancelled", report.frame);
    }
    for node in state.graph.nodes().filter(|n| n.outputs().is_empty()) {
        match node.output_collection().and_then(|c| c.bounds()) {
            Some((lo, hi)) => tracing::info!(
                "Frame {:>3} {}: {} points, y in [{:.3}, {:.3}]",
                report.frame,
                node.name,
                node.output_collection().map_or(0, |c| c.point_count()),
                lo.y,
                hi.y
            ),
            None => tracing::info!("Frame {:>3} {}: empty", report.frame, node.name),
        }
    }
    for (node, warning) in report.warnings() {
        tracing::warn!("Frame {} {node:?}: {warning}", report.frame);
    }
}

fn play(state: &mut EditorState, dispatcher: &mut Dispatcher) -> Result<(), CommandError> {
    dispatcher.run(state, &mut SetFrame::start())?;
    log_frame(state);
    while state.frame() < state.settings.frame_end {
        dispatcher.run(state, &mut NextFrame)?;
        log_frame(state);
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("{0}")]
    Args(String),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

fn run() -> Result<(), AppError> {
    let args = parse_args().map_err(AppError::Args)?;

    let (mut state, mut dispatcher) = match &args.project {
        Some(path) => {
            let project = Project::load(path)?;
            let state = EditorState::from_project(project, Some(path.clone()));
            let dispatcher = Dispatcher::for_state(&state);
            (state, dispatcher)
        }
        None => {
            let mut state = EditorState::new(EditorSettings::default());
            let mut dispatcher = Dispatcher::for_state(&state);
            build_demo(&mut state, &mut dispatcher)?;
            (state, dispatcher)
        }
    };

    play(&mut state, &mut dispatcher)?;

    let stats = dispatcher.history_stats();
    tracing::info!(
        "History: {} undoable step(s), {} bytes",
        stats.undo_count,
        stats.memory_used
    );

    if let Some(path) = &args.save {
        let project = state.to_project().map_err(CommandError::from)?;
        project.save(path)?;
    } else if state.dirty {
        match &state.project_path {
            Some(path) => tracing::info!("Unsaved changes to {}", path.display()),
            None => tracing::info!("Demo scene not saved; pass --save <path> to keep it"),
        }
    }
    Ok(())
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("procedra_editor=debug,procedra_graph=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Procedra v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
