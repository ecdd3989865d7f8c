// SPDX-License-Identifier: MIT OR Apache-2.0
//! Input dispatch, modal commands and undo/redo.

use crate::commands::{Command, CommandError, CommandRegistry};
use crate::history::{History, HistoryStats, StateSnapshot};
use crate::keymap::{EventKind, InputCode, InputEvent, Key, KeyMap};
use crate::state::EditorState;
use procedra_graph::Graph;

/// Reserved binding name routed to [`Dispatcher::undo`]
pub const UNDO: &str = "undo";

/// Reserved binding name routed to [`Dispatcher::redo`]
pub const REDO: &str = "redo";

#[derive(Debug)]
struct ActiveModal {
    command: Box<dyn Command>,
    trigger: Option<InputCode>,
}

/// Routes input to commands and owns the undo history
#[derive(Debug)]
pub struct Dispatcher {
    keymap: KeyMap,
    commands: CommandRegistry,
    history: History,
    modal: Option<ActiveModal>,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(keymap: KeyMap, commands: CommandRegistry, history_depth: usize) -> Self {
        Self {
            keymap,
            commands,
            history: History::with_max_depth(history_depth),
            modal: None,
        }
    }

    /// Dispatcher for the settings of a state, with the built-in commands
    pub fn for_state(state: &EditorState) -> Self {
        Self::new(
            state.settings.keymap.clone(),
            CommandRegistry::with_builtins(),
            state.settings.history_depth,
        )
    }

    /// Undo history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// History statistics
    pub fn history_stats(&self) -> HistoryStats {
        self.history.stats()
    }

    /// Name of the modal command in progress
    #[allow(dead_code)] // Intentionally kept for API completeness
    pub fn active_modal(&self) -> Option<&str> {
        self.modal.as_ref().map(|m| m.command.name())
    }

    /// Handle one input event
    ///
    /// Events go to the active modal command until its trigger is released or
    /// Escape is pressed. Otherwise the key map picks a command; presses with
    /// no binding, and bindings to unregistered names, are ignored.
    pub fn handle_input(&mut self, state: &mut EditorState, event: &InputEvent) -> Result<(), CommandError> {
        if let Some(modal) = self.modal.as_mut() {
            let ends = match event.kind {
                EventKind::Release => event.code == modal.trigger,
                EventKind::Press => event.is_key_press(Key::Escape),
                EventKind::Motion => false,
            };
            if ends {
                if let Some(modal) = self.modal.take() {
                    tracing::debug!("Ended modal command {}", modal.command.name());
                }
                return Ok(());
            }
            modal.command.execute(state, event)?;
            if modal.command.touches_graph() {
                state.evaluate();
            }
            return Ok(());
        }

        let Some(name) = self.keymap.lookup(event).map(str::to_owned) else {
            tracing::trace!("No binding for {event:?}");
            return Ok(());
        };

        match name.as_str() {
            UNDO => {
                self.undo(state)?;
            }
            REDO => {
                self.redo(state)?;
            }
            _ => {
                let Some(mut command) = self.commands.create(&name) else {
                    tracing::trace!("Binding to unregistered command '{name}'");
                    return Ok(());
                };
                if command.is_modal() {
                    command.invoke(state, event)?;
                    tracing::debug!("Started modal command {name}");
                    self.modal = Some(ActiveModal {
                        command,
                        trigger: event.code,
                    });
                } else {
                    self.execute(state, command.as_mut(), event)?;
                }
            }
        }
        Ok(())
    }

    /// Run a command outside of input dispatch
    pub fn run(&mut self, state: &mut EditorState, command: &mut dyn Command) -> Result<(), CommandError> {
        self.execute(state, command, &InputEvent::default())
    }

    fn execute(
        &mut self,
        state: &mut EditorState,
        command: &mut dyn Command,
        event: &InputEvent,
    ) -> Result<(), CommandError> {
        let before = if command.supports_undo() {
            Some(StateSnapshot::from_value(&state.graph)?)
        } else {
            None
        };

        command.execute(state, event)?;
        tracing::debug!("Executed {}", command.name());

        if let Some(before) = before {
            let after = StateSnapshot::from_value(&state.graph)?;
            self.history.commit(command.name(), before, after);
            state.mark_dirty();
        }
        if command.touches_graph() {
            state.evaluate();
        }
        Ok(())
    }

    /// Restore the graph from before the latest undoable command
    ///
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self, state: &mut EditorState) -> Result<bool, CommandError> {
        if !self.history.can_undo() {
            tracing::debug!("Nothing to undo");
            return Ok(false);
        }
        let entry = self.history.undo()?;
        tracing::debug!("Undo #{} {}", entry.id.value(), entry.description);
        let graph: Graph = entry.before.to_value()?;
        state.restore_graph(graph);
        state.mark_dirty();
        Ok(true)
    }

    /// Re-apply the latest undone command
    ///
    /// Returns `false` when there is nothing to redo.
    pub fn redo(&mut self, state: &mut EditorState) -> Result<bool, CommandError> {
        if !self.history.can_redo() {
            tracing::debug!("Nothing to redo");
            return Ok(false);
        }
        let entry = self.history.redo()?;
        tracing::debug!("Redo #{} {}", entry.id.value(), entry.description);
        let graph: Graph = entry.after.to_value()?;
        state.restore_graph(graph);
        state.mark_dirty();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{AddNode, LinkSockets, MoveNode, NextFrame, SetFrame, SetProperty};
    use crate::keymap::{Modifiers, MouseButton};
    use procedra_graph::{InputRef, NodeId, NodeStatus, OutputRef, PropertyValue};

    fn setup() -> (EditorState, Dispatcher) {
        let state = EditorState::default();
        let dispatcher = Dispatcher::for_state(&state);
        (state, dispatcher)
    }

    fn add(state: &mut EditorState, dispatcher: &mut Dispatcher, type_name: &str) -> NodeId {
        let mut command = AddNode::new(type_name, [0.0, 0.0]);
        dispatcher.run(state, &mut command).unwrap();
        command.created.unwrap()
    }

    fn ctrl(c: char) -> InputEvent {
        InputEvent::press(InputCode::Key(Key::Char(c)), Modifiers::CTRL)
    }

    #[test]
    fn test_non_undoable_commands_skip_history() {
        let (mut state, mut dispatcher) = setup();
        dispatcher.run(&mut state, &mut NextFrame).unwrap();
        assert_eq!(state.frame(), 1);
        assert_eq!(dispatcher.history().undo_depth(), 0);
        assert!(!dispatcher.undo(&mut state).unwrap());
        assert!(!dispatcher.redo(&mut state).unwrap());

        add(&mut state, &mut dispatcher, "Points");
        dispatcher.run(&mut state, &mut NextFrame).unwrap();
        assert_eq!(dispatcher.history().undo_depth(), 1);
        assert_eq!(dispatcher.history().undo_description(), Some("add_node"));
    }

    #[test]
    fn test_undo_redo_restores_graph() {
        let (mut state, mut dispatcher) = setup();
        let points = add(&mut state, &mut dispatcher, "Points");
        let output = add(&mut state, &mut dispatcher, "Output");
        let mut link = LinkSockets {
            from: OutputRef::new(points, 0),
            to: InputRef::new(output, 0),
        };
        dispatcher.run(&mut state, &mut link).unwrap();
        let mut set = SetProperty::new(points, "count", PropertyValue::Int(3));
        dispatcher.run(&mut state, &mut set).unwrap();
        assert_eq!(
            state.graph.node(output).unwrap().output_collection().unwrap().point_count(),
            3
        );

        assert!(dispatcher.undo(&mut state).unwrap());
        assert_eq!(state.graph.node(points).unwrap().properties().eval_int("count"), 16);
        assert_eq!(
            state.graph.node(output).unwrap().output_collection().unwrap().point_count(),
            16
        );

        assert!(dispatcher.undo(&mut state).unwrap());
        assert_eq!(state.graph.link_count(), 0);
        assert!(state.graph.node(points).unwrap().has_operator());

        assert!(dispatcher.redo(&mut state).unwrap());
        assert!(dispatcher.redo(&mut state).unwrap());
        assert_eq!(state.graph.link_count(), 1);
        assert_eq!(state.graph.node(points).unwrap().properties().eval_int("count"), 3);
        assert!(!dispatcher.redo(&mut state).unwrap());
    }

    fn falling_points(state: &mut EditorState, dispatcher: &mut Dispatcher) -> (NodeId, NodeId) {
        let points = add(state, dispatcher, "Points");
        let gravity = add(state, dispatcher, "Gravity");
        let mut link = LinkSockets {
            from: OutputRef::new(points, 0),
            to: InputRef::new(gravity, 0),
        };
        dispatcher.run(state, &mut link).unwrap();
        for _ in 0..5 {
            dispatcher.run(state, &mut NextFrame).unwrap();
        }
        (points, gravity)
    }

    fn status(state: &EditorState, node: NodeId) -> Option<NodeStatus> {
        state.last_report.as_ref()?.status(node).cloned()
    }

    #[test]
    fn test_undo_keeps_unrelated_simulation_state() {
        let (mut state, mut dispatcher) = setup();
        let (_, gravity) = falling_points(&mut state, &mut dispatcher);
        assert_eq!(state.frame(), 5);
        assert_eq!(status(&state, gravity), Some(NodeStatus::Evaluated { points: 16 }));
        let before = state.graph.node(gravity).unwrap().output_collection().unwrap().clone();

        add(&mut state, &mut dispatcher, "Curves");
        assert!(dispatcher.undo(&mut state).unwrap());
        assert_eq!(status(&state, gravity), Some(NodeStatus::Evaluated { points: 16 }));
        let after = state.graph.node(gravity).unwrap().output_collection().unwrap().clone();
        assert_eq!(*before, *after);

        assert!(dispatcher.redo(&mut state).unwrap());
        assert_eq!(status(&state, gravity), Some(NodeStatus::Evaluated { points: 16 }));
    }

    #[test]
    fn test_upstream_edit_resets_simulation() {
        let (mut state, mut dispatcher) = setup();
        let (points, gravity) = falling_points(&mut state, &mut dispatcher);

        let mut set = SetProperty::new(points, "count", PropertyValue::Int(3));
        dispatcher.run(&mut state, &mut set).unwrap();
        assert!(matches!(status(&state, gravity), Some(NodeStatus::Warning(_))));

        // Undo restores an upstream that differs from the edited graph
        assert!(dispatcher.undo(&mut state).unwrap());
        assert!(matches!(status(&state, gravity), Some(NodeStatus::Warning(_))));

        dispatcher.run(&mut state, &mut SetFrame::start()).unwrap();
        assert_eq!(status(&state, gravity), Some(NodeStatus::Evaluated { points: 16 }));
    }

    #[test]
    fn test_move_node_is_undoable_without_evaluation() {
        let (mut state, mut dispatcher) = setup();
        let (points, gravity) = falling_points(&mut state, &mut dispatcher);
        state.last_report = None;

        let mut command = MoveNode {
            node: points,
            position: [80.0, 40.0],
        };
        dispatcher.run(&mut state, &mut command).unwrap();
        assert!(state.last_report.is_none());
        assert_eq!(state.graph.node(points).unwrap().position, [80.0, 40.0]);
        assert_eq!(dispatcher.history().undo_description(), Some("move_node"));

        assert!(dispatcher.undo(&mut state).unwrap());
        assert_eq!(state.graph.node(points).unwrap().position, [0.0, 0.0]);
        assert_eq!(status(&state, gravity), Some(NodeStatus::Evaluated { points: 16 }));
    }

    #[test]
    fn test_failed_command_leaves_history_untouched() {
        let (mut state, mut dispatcher) = setup();
        let a = add(&mut state, &mut dispatcher, "Points");
        let mut link = LinkSockets {
            from: OutputRef::new(a, 0),
            to: InputRef::new(a, 0),
        };
        assert!(dispatcher.run(&mut state, &mut link).is_err());
        assert_eq!(dispatcher.history().undo_depth(), 1);
    }

    #[test]
    fn test_keys_route_to_history_and_commands() {
        let (mut state, mut dispatcher) = setup();
        let a = add(&mut state, &mut dispatcher, "Points");

        dispatcher
            .handle_input(&mut state, &InputEvent::press(InputCode::Key(Key::Delete), Modifiers::NONE))
            .unwrap();
        assert!(!state.graph.contains(a));

        dispatcher.handle_input(&mut state, &ctrl('z')).unwrap();
        assert!(state.graph.contains(a));
        dispatcher.handle_input(&mut state, &ctrl('y')).unwrap();
        assert!(!state.graph.contains(a));

        dispatcher
            .handle_input(&mut state, &InputEvent::press(InputCode::Key(Key::Right), Modifiers::NONE))
            .unwrap();
        assert_eq!(state.frame(), 1);
    }

    #[test]
    fn test_lookup_misses_are_silent() {
        let (mut state, mut dispatcher) = setup();
        dispatcher.keymap.bind(Modifiers::NONE, InputCode::Key(Key::Char('q')), "not_registered");

        dispatcher.handle_input(&mut state, &ctrl('q')).unwrap();
        dispatcher
            .handle_input(&mut state, &InputEvent::press(InputCode::Key(Key::Char('q')), Modifiers::NONE))
            .unwrap();
        dispatcher.handle_input(&mut state, &InputEvent::motion(3.0, 4.0)).unwrap();
        assert_eq!(dispatcher.history().undo_depth(), 0);
        assert!(dispatcher.active_modal().is_none());
    }

    #[test]
    fn test_modal_pan_until_release() {
        let (mut state, mut dispatcher) = setup();
        let middle = InputCode::Mouse(MouseButton::Middle);

        dispatcher
            .handle_input(&mut state, &InputEvent::press(middle, Modifiers::NONE).at(10.0, 10.0))
            .unwrap();
        assert_eq!(dispatcher.active_modal(), Some("pan_view"));

        dispatcher.handle_input(&mut state, &InputEvent::motion(15.0, 12.0)).unwrap();
        dispatcher.handle_input(&mut state, &InputEvent::motion(20.0, 10.0)).unwrap();
        assert_eq!(state.view.pan, [10.0, 0.0]);

        // Keys are forwarded to the modal command instead of the key map.
        dispatcher
            .handle_input(&mut state, &InputEvent::press(InputCode::Key(Key::Right), Modifiers::NONE))
            .unwrap();
        assert_eq!(state.frame(), 0);

        dispatcher.handle_input(&mut state, &InputEvent::release(middle)).unwrap();
        assert!(dispatcher.active_modal().is_none());
        dispatcher.handle_input(&mut state, &InputEvent::motion(50.0, 50.0)).unwrap();
        assert_eq!(state.view.pan, [10.0, 0.0]);
        assert_eq!(dispatcher.history().undo_depth(), 0);
    }

    #[test]
    fn test_escape_ends_modal() {
        let (mut state, mut dispatcher) = setup();
        let middle = InputCode::Mouse(MouseButton::Middle);
        dispatcher
            .handle_input(&mut state, &InputEvent::press(middle, Modifiers::NONE))
            .unwrap();
        dispatcher
            .handle_input(&mut state, &InputEvent::press(InputCode::Key(Key::Escape), Modifiers::NONE))
            .unwrap();
        assert!(dispatcher.active_modal().is_none());
    }
}
