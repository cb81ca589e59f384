//! Per-node status shared between concurrently running node tasks.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lifecycle state of a node within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
  /// Waiting for its first input item or sentinel.
  Pending,
  Running,
  Completed,
  Failed,
  TimedOut,
}

impl NodeStatus {
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      NodeStatus::Completed | NodeStatus::Failed | NodeStatus::TimedOut
    )
  }

  /// Whether the state machine allows moving from `self` to `next`.
  ///
  /// A node that never received anything may fail or time out directly from
  /// `Pending`; completion always goes through `Running`.
  pub fn can_transition_to(self, next: NodeStatus) -> bool {
    match (self, next) {
      (NodeStatus::Pending, NodeStatus::Running) => true,
      (NodeStatus::Pending, NodeStatus::Failed | NodeStatus::TimedOut) => true,
      (NodeStatus::Running, next) => next.is_terminal(),
      _ => false,
    }
  }
}

/// Status table for every node of a run.
///
/// Updates go through a mutex because several producers may react to the
/// same failing upstream at once.
#[derive(Debug)]
pub struct StatusBoard {
  statuses: Mutex<HashMap<String, NodeStatus>>,
}

impl StatusBoard {
  /// Create a board with every node `Pending`.
  pub fn new<'a>(node_ids: impl IntoIterator<Item = &'a str>) -> Self {
    Self {
      statuses: Mutex::new(
        node_ids
          .into_iter()
          .map(|id| (id.to_string(), NodeStatus::Pending))
          .collect(),
      ),
    }
  }

  pub fn get(&self, node_id: &str) -> Option<NodeStatus> {
    self
      .statuses
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .get(node_id)
      .copied()
  }

  /// Move a node to `next`. Illegal transitions are refused and logged.
  ///
  /// Returns whether the transition happened.
  pub fn transition(&self, node_id: &str, next: NodeStatus) -> bool {
    let mut statuses = self.statuses.lock().unwrap_or_else(|e| e.into_inner());
    let Some(current) = statuses.get_mut(node_id) else {
      warn!(node_id = %node_id, "status update for unknown node");
      return false;
    };

    if !current.can_transition_to(next) {
      if *current != next {
        warn!(
          node_id = %node_id,
          from = ?*current,
          to = ?next,
          "illegal status transition refused"
        );
      }
      return false;
    }

    *current = next;
    true
  }

  /// Copy of every status.
  pub fn snapshot(&self) -> HashMap<String, NodeStatus> {
    self
      .statuses
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_happy_path() {
    let board = StatusBoard::new(["a"]);
    assert_eq!(board.get("a"), Some(NodeStatus::Pending));
    assert!(board.transition("a", NodeStatus::Running));
    assert!(board.transition("a", NodeStatus::Completed));
    assert_eq!(board.get("a"), Some(NodeStatus::Completed));
  }

  #[test]
  fn test_terminal_states_are_final() {
    let board = StatusBoard::new(["a"]);
    assert!(board.transition("a", NodeStatus::Failed));
    assert!(!board.transition("a", NodeStatus::Running));
    assert!(!board.transition("a", NodeStatus::Completed));
    assert_eq!(board.get("a"), Some(NodeStatus::Failed));
  }

  #[test]
  fn test_cannot_complete_without_running() {
    let board = StatusBoard::new(["a"]);
    assert!(!board.transition("a", NodeStatus::Completed));
    assert!(board.transition("a", NodeStatus::TimedOut));
  }

  #[test]
  fn test_unknown_node() {
    let board = StatusBoard::new(["a"]);
    assert!(!board.transition("b", NodeStatus::Running));
    assert_eq!(board.get("b"), None);
    assert_eq!(board.snapshot().len(), 1);
  }
}
