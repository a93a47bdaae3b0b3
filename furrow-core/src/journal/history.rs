use std::collections::VecDeque;

use super::Transaction;

/// Bounded undo/redo stacks of committed transactions.
pub struct UndoHistory {
    undo_stack: VecDeque<Transaction>,
    redo_stack: VecDeque<Transaction>,
    max_depth: usize,
}

impl UndoHistory {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Record a freshly committed transaction. Clears the redo stack.
    pub fn push(&mut self, tx: Transaction) {
        self.push_undo(tx);
        self.redo_stack.clear();
    }

    fn push_undo(&mut self, tx: Transaction) {
        if self.undo_stack.len() >= self.max_depth {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(tx);
    }

    pub fn pop_undo(&mut self) -> Option<Transaction> {
        self.undo_stack.pop_back()
    }

    /// Keep an undone transaction around for redo.
    pub fn push_redo(&mut self, tx: Transaction) {
        if self.redo_stack.len() >= self.max_depth {
            self.redo_stack.pop_front();
        }
        self.redo_stack.push_back(tx);
    }

    pub fn pop_redo(&mut self) -> Option<Transaction> {
        self.redo_stack.pop_back()
    }

    /// Put a redone transaction back on the undo stack without touching redo.
    pub fn push_redone(&mut self, tx: Transaction) {
        self.push_undo(tx);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
