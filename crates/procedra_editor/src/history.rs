// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history of graph snapshots.
//!
//! Every undoable command stores the serialized graph from before and after
//! it ran. Undo restores `before`, redo restores `after`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Default undo history depth
pub const MAX_HISTORY: usize = 100;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Unique entry ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    /// Get the raw ID value
    pub fn value(self) -> u64 {
        self.0
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Serialized state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// bincode bytes
    pub data: Vec<u8>,
    /// Seconds since the epoch when taken
    #[allow(dead_code)] // Intentionally kept for API completeness
    pub timestamp: u64,
}

impl StateSnapshot {
    /// Serialize a value
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            data: bincode::serialize(value)?,
            timestamp: now(),
        })
    }

    /// Deserialize back into a value
    pub fn to_value<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.data)?)
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// One undoable step
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Unique ID
    pub id: EntryId,
    /// Command name shown in menus
    pub description: String,
    /// State before the command (for undo)
    pub before: StateSnapshot,
    /// State after the command (for redo)
    pub after: StateSnapshot,
}

impl HistoryEntry {
    /// Memory held by both snapshots
    pub fn memory_size(&self) -> usize {
        self.before.size() + self.after.size()
    }
}

/// History statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Entries in the undo stack
    pub undo_count: usize,
    /// Entries in the redo stack
    pub redo_count: usize,
    /// Bytes held by the undo stack
    pub memory_used: usize,
    /// Maximum undo depth
    pub max_depth: usize,
}

/// Bounded undo/redo stacks
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    next_id: u64,
    max_depth: usize,
    memory_used: usize,
}

impl History {
    /// Create with the default depth
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with a custom maximum depth (at least one entry)
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            next_id: 1,
            max_depth: max_depth.max(1),
            memory_used: 0,
        }
    }

    /// Record a step; clears the redo stack and drops the oldest entries past the depth
    pub fn commit(&mut self, description: impl Into<String>, before: StateSnapshot, after: StateSnapshot) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;

        self.redo_stack.clear();
        let entry = HistoryEntry {
            id,
            description: description.into(),
            before,
            after,
        };
        self.memory_used += entry.memory_size();
        self.undo_stack.push_back(entry);

        while self.undo_stack.len() > self.max_depth {
            if let Some(old) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(old.memory_size());
            }
        }
        id
    }

    /// Move the latest entry to the redo stack and return it
    pub fn undo(&mut self) -> Result<&HistoryEntry> {
        let entry = self.undo_stack.pop_back().ok_or(HistoryError::NothingToUndo)?;
        self.memory_used = self.memory_used.saturating_sub(entry.memory_size());
        self.redo_stack.push_back(entry);
        self.redo_stack.back().ok_or(HistoryError::NothingToUndo)
    }

    /// Move the latest undone entry back to the undo stack and return it
    pub fn redo(&mut self) -> Result<&HistoryEntry> {
        let entry = self.redo_stack.pop_back().ok_or(HistoryError::NothingToRedo)?;
        self.memory_used += entry.memory_size();
        self.undo_stack.push_back(entry);
        self.undo_stack.back().ok_or(HistoryError::NothingToRedo)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    #[allow(dead_code)] // Intentionally kept for API completeness
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            memory_used: self.memory_used,
            max_depth: self.max_depth,
        }
    }

    /// Description of the next undo step
    #[allow(dead_code)] // Intentionally kept for API completeness
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.description.as_str())
    }

    /// Description of the next redo step
    #[allow(dead_code)] // Intentionally kept for API completeness
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.description.as_str())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
