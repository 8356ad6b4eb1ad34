//! Bounded undo/redo history for editor state.
//!
//! Backs the gear-set editor in API clients: the web UI keeps one
//! `History<Gearset>` per open editor and steps it on undo/redo, so the
//! type lives here rather than behind any endpoint.

/// Maximum retained states. Oldest entries fall off when exceeded.
pub const DEFAULT_CAPACITY: usize = 50;

/// Undo/redo stack over snapshots of a cloneable state.
///
/// Pushing a new state truncates any redo tail, and pushing a state
/// identical to the current one is a no-op so repeated saves of the same
/// snapshot do not flood the stack.
#[derive(Debug, Clone)]
pub struct History<T: Clone + PartialEq> {
    states: Vec<T>,
    /// Index of the current state in `states`.
    cursor: usize,
    capacity: usize,
}

impl<T: Clone + PartialEq> History<T> {
    pub fn new(initial: T) -> Self {
        Self::with_capacity(initial, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(initial: T, capacity: usize) -> Self {
        Self {
            states: vec![initial],
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn current(&self) -> &T {
        &self.states[self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.states.len()
    }

    /// Record a new state. Returns false when the state equals the
    /// current one and nothing was recorded.
    pub fn push(&mut self, state: T) -> bool {
        if state == self.states[self.cursor] {
            return false;
        }
        self.states.truncate(self.cursor + 1);
        self.states.push(state);
        if self.states.len() > self.capacity {
            self.states.remove(0);
        } else {
            self.cursor += 1;
        }
        true
    }

    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(&self.states[self.cursor])
    }

    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(&self.states[self.cursor])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_undo_redo() {
        let mut history = History::new(0);
        history.push(1);
        history.push(2);

        assert_eq!(*history.current(), 2);
        assert_eq!(history.undo(), Some(&1));
        assert_eq!(history.undo(), Some(&0));
        assert_eq!(history.undo(), None);
        assert_eq!(history.redo(), Some(&1));
        assert_eq!(history.redo(), Some(&2));
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn test_identical_push_is_coalesced() {
        let mut history = History::new(7);
        assert!(!history.push(7));
        assert!(history.push(8));
        assert!(!history.push(8));
        assert!(history.can_undo());
        history.undo();
        assert!(!history.can_undo());
    }

    #[test]
    fn test_push_truncates_redo_tail() {
        let mut history = History::new(0);
        history.push(1);
        history.push(2);
        history.undo();
        history.push(9);

        assert!(!history.can_redo());
        assert_eq!(*history.current(), 9);
        assert_eq!(history.undo(), Some(&1));
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = History::with_capacity(0, 3);
        history.push(1);
        history.push(2);
        history.push(3);

        assert_eq!(*history.current(), 3);
        assert_eq!(history.undo(), Some(&2));
        assert_eq!(history.undo(), Some(&1));
        // State 0 fell off the bottom.
        assert_eq!(history.undo(), None);
    }
}
