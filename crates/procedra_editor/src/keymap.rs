// SPDX-License-Identifier: MIT OR Apache-2.0
//! Input events and the key-binding table.
//!
//! The table is an ordered list of `(modifiers, input code, command name)`
//! bindings. The first binding matching a press wins.

use serde::{Deserialize, Serialize};

/// Modifier keys held during an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    /// Control
    pub ctrl: bool,
    /// Shift
    pub shift: bool,
    /// Alt
    pub alt: bool,
}

impl Modifiers {
    /// No modifier
    pub const NONE: Self = Self {
        ctrl: false,
        shift: false,
        alt: false,
    };

    /// Control only
    pub const CTRL: Self = Self {
        ctrl: true,
        shift: false,
        alt: false,
    };

    /// Control and Shift
    pub const CTRL_SHIFT: Self = Self {
        ctrl: true,
        shift: true,
        alt: false,
    };
}

/// Keyboard keys the editor binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// A printable character, lowercase
    Char(char),
    /// Delete
    Delete,
    /// Escape
    Escape,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// Home
    Home,
}

/// Mouse buttons
#[allow(dead_code)] // Intentionally kept for API completeness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    /// Left button
    Left,
    /// Middle button
    Middle,
    /// Right button
    Right,
}

/// The physical input an event comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputCode {
    /// Keyboard key
    Key(Key),
    /// Mouse button
    Mouse(MouseButton),
    /// Mouse wheel
    Wheel,
}

/// What happened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventKind {
    /// Key or button pressed, or wheel turned
    #[default]
    Press,
    /// Key or button released
    Release,
    /// Pointer moved
    Motion,
}

/// An input event delivered by the windowing layer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputEvent {
    /// Press, release or motion
    pub kind: EventKind,
    /// Source of a press or release; `None` for motion
    pub code: Option<InputCode>,
    /// Modifiers held
    pub modifiers: Modifiers,
    /// Pointer position in view pixels
    pub position: [f32; 2],
    /// Wheel steps, positive away from the user
    pub wheel_delta: f32,
}

#[allow(dead_code)] // Intentionally kept for API completeness
impl InputEvent {
    /// Press of a key or button
    pub fn press(code: InputCode, modifiers: Modifiers) -> Self {
        Self {
            kind: EventKind::Press,
            code: Some(code),
            modifiers,
            ..Self::default()
        }
    }

    /// Release of a key or button
    pub fn release(code: InputCode) -> Self {
        Self {
            kind: EventKind::Release,
            code: Some(code),
            ..Self::default()
        }
    }

    /// Pointer motion
    pub fn motion(x: f32, y: f32) -> Self {
        Self {
            kind: EventKind::Motion,
            position: [x, y],
            ..Self::default()
        }
    }

    /// Wheel turn
    pub fn wheel(delta: f32) -> Self {
        Self {
            wheel_delta: delta,
            ..Self::press(InputCode::Wheel, Modifiers::NONE)
        }
    }

    /// Set the pointer position
    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Whether this is a press of `key`
    pub fn is_key_press(&self, key: Key) -> bool {
        self.kind == EventKind::Press && self.code == Some(InputCode::Key(key))
    }
}

/// One entry of the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    /// Modifiers that must be held, exactly
    pub modifiers: Modifiers,
    /// Input that triggers the command
    pub code: InputCode,
    /// Registered command name
    pub command: String,
}

/// Ordered key-binding table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMap {
    bindings: Vec<KeyBinding>,
}

impl KeyMap {
    /// Create an empty table
    pub fn empty() -> Self {
        Self { bindings: Vec::new() }
    }

    /// Append a binding; earlier bindings take precedence
    pub fn bind(&mut self, modifiers: Modifiers, code: InputCode, command: impl Into<String>) -> &mut Self {
        self.bindings.push(KeyBinding {
            modifiers,
            code,
            command: command.into(),
        });
        self
    }

    /// Remove every binding to a command, returning how many were removed
    #[allow(dead_code)] // Intentionally kept for API completeness
    pub fn unbind(&mut self, command: &str) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.command != command);
        before - self.bindings.len()
    }

    /// Command bound to a press event
    pub fn lookup(&self, event: &InputEvent) -> Option<&str> {
        if event.kind != EventKind::Press {
            return None;
        }
        let code = event.code?;
        self.bindings
            .iter()
            .find(|b| b.code == code && b.modifiers == event.modifiers)
            .map(|b| b.command.as_str())
    }

    /// Bindings in precedence order
    #[allow(dead_code)] // Intentionally kept for API completeness
    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        let mut map = Self::empty();
        map.bind(Modifiers::CTRL, InputCode::Key(Key::Char('z')), "undo")
            .bind(Modifiers::CTRL_SHIFT, InputCode::Key(Key::Char('z')), "redo")
            .bind(Modifiers::CTRL, InputCode::Key(Key::Char('y')), "redo")
            .bind(Modifiers::NONE, InputCode::Key(Key::Delete), "remove_node")
            .bind(Modifiers::NONE, InputCode::Key(Key::Char('x')), "remove_node")
            .bind(Modifiers::NONE, InputCode::Key(Key::Right), "next_frame")
            .bind(Modifiers::NONE, InputCode::Key(Key::Left), "previous_frame")
            .bind(Modifiers::NONE, InputCode::Key(Key::Home), "first_frame")
            .bind(Modifiers::NONE, InputCode::Mouse(MouseButton::Middle), "pan_view")
            .bind(Modifiers::NONE, InputCode::Wheel, "zoom_view");
        map
    }
}
