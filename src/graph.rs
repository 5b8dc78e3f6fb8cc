//! Graph accumulator
//!
//! The shared output of expansion: an ordered task list, the permission
//! scopes those tasks require, and run metadata. Populated only through
//! the task graph manager; serialized by the caller.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Run metadata attached to the emitted graph
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphMetadata {
    pub source: String,
    pub owner: String,
    pub description: String,
    pub name: String,
}

/// Ordered task descriptors plus aggregated scopes.
///
/// Scopes are collected append-only during expansion and deduplicated
/// once, after every build has been configured.
#[derive(Debug, Default, Serialize)]
pub struct Graph {
    pub tasks: Vec<Value>,
    pub scopes: Vec<String>,
    pub metadata: GraphMetadata,
}

impl Graph {
    pub fn new(metadata: GraphMetadata) -> Self {
        Self {
            tasks: Vec::new(),
            scopes: Vec::new(),
            metadata,
        }
    }

    pub fn add_task(&mut self, task: Value) {
        self.tasks.push(task);
    }

    pub fn add_scope(&mut self, scope: impl Into<String>) {
        self.scopes.push(scope.into());
    }

    /// Remove duplicate scopes, preserving first-seen order
    pub fn dedup_scopes(&mut self) {
        let mut seen = HashSet::new();
        self.scopes.retain(|scope| seen.insert(scope.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tasks_keep_insertion_order() {
        let mut graph = Graph::default();
        graph.add_task(json!({"taskId": "a"}));
        graph.add_task(json!({"taskId": "b"}));
        assert_eq!(graph.tasks[0]["taskId"], json!("a"));
        assert_eq!(graph.tasks[1]["taskId"], json!("b"));
    }

    #[test]
    fn test_dedup_scopes_preserves_first_seen_order() {
        let mut graph = Graph::default();
        graph.add_scope("scope:b");
        graph.add_scope("scope:a");
        graph.add_scope("scope:b");
        graph.add_scope("scope:a");
        graph.dedup_scopes();
        assert_eq!(graph.scopes, vec!["scope:b", "scope:a"]);
    }
}
