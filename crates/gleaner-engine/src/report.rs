//! Run results.

use gleaner_document::SharedDocument;
use serde::Serialize;

use crate::status::NodeStatus;

/// Outcome of one node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
  pub node_id: String,
  /// Step implementation the node was bound to.
  pub step: String,
  pub status: NodeStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  /// Number of times the step logic ran.
  pub invocations: usize,
  /// Number of documents the node emitted.
  pub emitted: usize,
  pub elapsed_ms: u64,
  /// Emitted documents, kept for terminal nodes (or every node when
  /// configured).
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub documents: Vec<SharedDocument>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub execution_id: String,
  /// Per-node reports in topological order.
  pub nodes: Vec<NodeReport>,
  /// Documents emitted by terminal nodes, in topological then emission order.
  pub outputs: Vec<SharedDocument>,
}

impl RunReport {
  /// Whether every node completed.
  pub fn succeeded(&self) -> bool {
    self
      .nodes
      .iter()
      .all(|n| n.status == NodeStatus::Completed)
  }

  /// Ids of nodes that did not complete.
  pub fn failed_nodes(&self) -> Vec<&str> {
    self
      .nodes
      .iter()
      .filter(|n| n.status != NodeStatus::Completed)
      .map(|n| n.node_id.as_str())
      .collect()
  }

  pub fn node(&self, node_id: &str) -> Option<&NodeReport> {
    self.nodes.iter().find(|n| n.node_id == node_id)
  }

  /// Terminal outputs of one document type.
  pub fn outputs_of_type<'a>(&'a self, doc_type: &'a str) -> impl Iterator<Item = &'a SharedDocument> {
    self.outputs.iter().filter(move |d| d.doc_type() == doc_type)
  }
}
