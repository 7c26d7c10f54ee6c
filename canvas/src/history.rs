//! Bounded undo/redo stacks of whole-board snapshots.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::VecDeque;

use crate::consts::HISTORY_DEPTH;
use crate::doc::BoardSnapshot;

/// Undo/redo stacks. `past` is oldest-first; `future` is nearest-first.
#[derive(Debug, Clone)]
pub struct History {
    past: VecDeque<BoardSnapshot>,
    future: VecDeque<BoardSnapshot>,
    depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_DEPTH)
    }
}

impl History {
    /// Empty history retaining at most `depth` undo steps (minimum 1).
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self { past: VecDeque::new(), future: VecDeque::new(), depth: depth.max(1) }
    }

    /// Record the state before a history-significant mutation. Clears redo.
    pub fn push(&mut self, snapshot: BoardSnapshot) {
        self.past.push_back(snapshot);
        while self.past.len() > self.depth {
            self.past.pop_front();
        }
        self.future.clear();
    }

    /// Step back. Returns the state to restore, or `None` when there is nothing to undo.
    pub fn undo(&mut self, current: BoardSnapshot) -> Option<BoardSnapshot> {
        let previous = self.past.pop_back()?;
        self.future.push_front(current);
        Some(previous)
    }

    /// Step forward. Returns the state to restore, or `None` when there is nothing to redo.
    pub fn redo(&mut self, current: BoardSnapshot) -> Option<BoardSnapshot> {
        let next = self.future.pop_front()?;
        self.past.push_back(current);
        while self.past.len() > self.depth {
            self.past.pop_front();
        }
        Some(next)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.past.len()
    }

    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.future.len()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}
