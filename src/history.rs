// SPDX-License-Identifier: MIT OR Apache-2.0

//! Undo and redo of whole-store snapshots.
//!
//! History lives in memory only and belongs to one session, it is lost when the session or the
//! process ends.
use std::collections::VecDeque;

use crate::store::Snapshot;

/// Two stacks of store snapshots.
///
/// Recording a new mutation clears the redo stack. With a limit set, the oldest undo step is
/// dropped once the limit is exceeded.
#[derive(Clone, Debug, Default)]
pub struct HistoryStack {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    limit: Option<usize>,
}

impl HistoryStack {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit,
        }
    }

    /// Remember the store state from before a new mutation.
    pub fn record(&mut self, before: Snapshot) {
        self.redo.clear();
        self.push_undo(before);
    }

    /// Take the latest undo step, `current` becomes available for redo.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Take the latest redo step, `current` becomes available for undo again.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        let next = self.redo.pop()?;
        self.push_undo(current);
        Some(next)
    }

    /// Put a step taken with [`HistoryStack::undo`] back after restoring it failed.
    pub(crate) fn revert_undo(&mut self, previous: Snapshot) {
        self.redo.pop();
        self.undo.push_back(previous);
    }

    /// Put a step taken with [`HistoryStack::redo`] back after restoring it failed.
    pub(crate) fn revert_redo(&mut self, next: Snapshot) {
        self.undo.pop_back();
        self.redo.push(next);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        self.undo.push_back(snapshot);
        if let Some(limit) = self.limit {
            while self.undo.len() > limit {
                self.undo.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::registration::Role;
    use crate::store::{Snapshot, StoreState};
    use crate::test_utils::registration;

    use super::HistoryStack;

    fn snapshot(codes: &[&str]) -> Snapshot {
        let registrations = codes
            .iter()
            .map(|code| registration(code, Role::Buyer))
            .collect();
        StoreState::from_registrations(registrations)
            .unwrap()
            .snapshot()
    }

    #[test]
    fn undo_then_redo() {
        let mut history = HistoryStack::new(None);
        let empty = snapshot(&[]);
        let one = snapshot(&["AAAAAA"]);

        history.record(empty.clone());
        assert!(history.can_undo());
        assert!(!history.can_redo());

        assert_eq!(history.undo(one.clone()), Some(empty.clone()));
        assert_eq!(history.undo(empty.clone()), None);
        assert!(history.can_redo());

        assert_eq!(history.redo(empty.clone()), Some(one));
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn new_mutation_clears_redo() {
        let mut history = HistoryStack::new(None);
        history.record(snapshot(&[]));
        history.undo(snapshot(&["AAAAAA"]));
        assert!(history.can_redo());

        history.record(snapshot(&[]));
        assert!(!history.can_redo());
    }

    #[test]
    fn limit_drops_oldest() {
        let mut history = HistoryStack::new(Some(2));
        history.record(snapshot(&[]));
        history.record(snapshot(&["AAAAAA"]));
        history.record(snapshot(&["AAAAAA", "BBBBBB"]));
        assert_eq!(history.undo_len(), 2);

        let current = snapshot(&["AAAAAA", "BBBBBB", "CCCCCC"]);
        let previous = history.undo(current.clone()).unwrap();
        assert_eq!(previous.len(), 2);
        let previous = history.undo(previous).unwrap();
        assert_eq!(previous.len(), 1);
        assert_eq!(history.undo(previous), None);
    }
}
