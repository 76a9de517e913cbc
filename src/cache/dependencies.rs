//! Dependency edges between cache keys, kept in process memory.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

/// Maps a dependency key to the cache keys that must be dropped with it.
///
/// Edges are back-references only: they never keep dependent entries alive.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    edges: Mutex<HashMap<String, HashSet<String>>>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key` as dependent on each of `dependencies`.
    pub fn register<S: AsRef<str>>(&self, key: &str, dependencies: &[S]) {
        let mut edges = self.edges.lock();
        for dependency in dependencies {
            edges
                .entry(dependency.as_ref().to_string())
                .or_default()
                .insert(key.to_string());
        }
    }

    /// Removes and returns the dependents of `dependency`, sorted.
    pub fn take_dependents(&self, dependency: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .edges
            .lock()
            .remove(dependency)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        dependents.sort();
        dependents
    }

    pub fn dependents_of(&self, dependency: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .edges
            .lock()
            .get(dependency)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        dependents.sort();
        dependents
    }

    pub fn clear(&self) {
        self.edges.lock().clear();
    }

    /// Number of dependency keys with at least one registered dependent.
    pub fn len(&self) -> usize {
        self.edges.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_take() {
        let tracker = DependencyTracker::new();
        tracker.register("study_offer:list:a", &["study_offer:1", "university:7"]);
        tracker.register("study_offer:list:b", &["study_offer:1"]);

        assert_eq!(
            tracker.take_dependents("study_offer:1"),
            vec!["study_offer:list:a".to_string(), "study_offer:list:b".to_string()]
        );
        assert!(tracker.take_dependents("study_offer:1").is_empty());
        assert_eq!(
            tracker.dependents_of("university:7"),
            vec!["study_offer:list:a".to_string()]
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_is_idempotent() {
        let tracker = DependencyTracker::new();
        tracker.register("a", &["dep"]);
        tracker.register("a", &["dep"]);

        assert_eq!(tracker.dependents_of("dep"), vec!["a".to_string()]);
    }

    #[test]
    fn test_clear() {
        let tracker = DependencyTracker::new();
        tracker.register("a", &["dep".to_string()]);
        tracker.clear();
        assert!(tracker.is_empty());
    }
}
