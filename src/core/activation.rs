//! Activation set
//!
//! Tracks which watched apps currently have an unacknowledged
//! notification. Mutations return the emptiness edge they caused, if
//! any; the caller dispatches the resulting light effect. The set never
//! fires callbacks on its own, so every side effect is traceable to an
//! explicit call site on the coordinator thread.

use std::collections::HashSet;

/// Emptiness transition caused by a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationEdge {
    /// The set went from empty to nonempty
    BecameActive,
    /// The set went from nonempty to empty
    BecameIdle,
}

/// Set of watched-app ids believed to have an unacknowledged notification
#[derive(Debug, Default)]
pub struct ActivationSet {
    ids: HashSet<String>,
}

impl ActivationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an id. Idempotent: re-inserting a present id is a no-op
    /// and returns no edge.
    pub fn insert(&mut self, id: &str) -> Option<ActivationEdge> {
        let was_empty = self.ids.is_empty();
        if !self.ids.insert(id.to_string()) {
            return None;
        }
        was_empty.then_some(ActivationEdge::BecameActive)
    }

    /// Remove an id. Idempotent: removing an absent id is a no-op and
    /// returns no edge.
    pub fn remove(&mut self, id: &str) -> Option<ActivationEdge> {
        if !self.ids.remove(id) {
            return None;
        }
        self.ids.is_empty().then_some(ActivationEdge::BecameIdle)
    }

    /// Remove all entries.
    pub fn clear(&mut self) -> Option<ActivationEdge> {
        if self.ids.is_empty() {
            return None;
        }
        self.ids.clear();
        Some(ActivationEdge::BecameIdle)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_idempotent() {
        let mut set = ActivationSet::new();
        assert_eq!(set.insert("a"), Some(ActivationEdge::BecameActive));
        assert_eq!(set.insert("a"), None);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove_idempotent() {
        let mut set = ActivationSet::new();
        set.insert("a");
        assert_eq!(set.remove("a"), Some(ActivationEdge::BecameIdle));
        assert_eq!(set.remove("a"), None);
        assert!(set.is_empty());
    }

    #[test]
    fn test_edges_only_on_emptiness_change() {
        let mut set = ActivationSet::new();
        assert_eq!(set.insert("a"), Some(ActivationEdge::BecameActive));
        // Second distinct insert changes membership but not emptiness
        assert_eq!(set.insert("b"), None);
        assert_eq!(set.remove("a"), None);
        assert_eq!(set.remove("b"), Some(ActivationEdge::BecameIdle));
    }

    #[test]
    fn test_clear() {
        let mut set = ActivationSet::new();
        assert_eq!(set.clear(), None);
        set.insert("a");
        set.insert("b");
        assert_eq!(set.clear(), Some(ActivationEdge::BecameIdle));
        assert!(set.is_empty());
        assert_eq!(set.clear(), None);
    }

    #[test]
    fn test_contains() {
        let mut set = ActivationSet::new();
        set.insert("a");
        assert!(set.contains("a"));
        assert!(!set.contains("b"));
    }
}
