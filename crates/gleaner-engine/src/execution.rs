//! A single workflow run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use gleaner_workflow::{Graph, WorkflowGraph};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::engine::Engine;
use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::node::{NodeInput, NodeTask};
use crate::queue::{FanOut, QueueSender, channel};
use crate::report::{NodeReport, RunReport};
use crate::status::{NodeStatus, StatusBoard};

/// A handle to a workflow run.
///
/// Call `.wait()` to run it and get the report. The status board can be
/// taken beforehand to watch node states while the run is in flight.
pub struct WorkflowExecution<'a, N: ExecutionNotifier> {
  engine: &'a Engine<N>,
  execution_id: String,
  graph: WorkflowGraph,
  cancel: CancellationToken,
  board: Arc<StatusBoard>,
}

impl<'a, N: ExecutionNotifier + 'static> WorkflowExecution<'a, N> {
  pub(crate) fn new(
    engine: &'a Engine<N>,
    graph: WorkflowGraph,
    cancel: CancellationToken,
  ) -> Self {
    let board = Arc::new(StatusBoard::new(graph.nodes().map(|n| n.id())));
    Self {
      engine,
      execution_id: uuid::Uuid::new_v4().to_string(),
      graph,
      cancel,
      board,
    }
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  /// Live node states for this run. Every node starts out pending.
  pub fn status_board(&self) -> Arc<StatusBoard> {
    self.board.clone()
  }

  /// Run every node concurrently until each reaches a terminal state.
  #[instrument(
    name = "engine_run",
    skip(self),
    fields(execution_id = %self.execution_id, nodes = self.graph.len())
  )]
  pub async fn wait(self) -> RunReport {
    let Self {
      engine,
      execution_id,
      graph,
      cancel,
      board,
    } = self;
    let config = engine.config();
    let notifier = engine.notifier();
    let (adjacency, nodes) = graph.into_parts();

    info!(execution_id = %execution_id, node_count = nodes.len(), "workflow_started");
    notifier.notify(ExecutionEvent::WorkflowStarted {
      execution_id: execution_id.clone(),
      node_count: nodes.len(),
    });

    let produces: HashMap<String, Vec<String>> = nodes
      .iter()
      .map(|n| (n.id().to_string(), n.contract().produces.clone()))
      .collect();

    // One queue per edge, created from the consumer's side so its inputs
    // keep declaration order.
    let mut senders: HashMap<String, Vec<QueueSender>> = HashMap::new();
    let mut inputs: HashMap<String, Vec<NodeInput>> = HashMap::new();
    for node in &nodes {
      for upstream in node.upstream() {
        let (tx, rx) = channel(upstream, config.queue_capacity);
        senders.entry(upstream.clone()).or_default().push(tx);
        inputs.entry(node.id().to_string()).or_default().push(NodeInput {
          receiver: rx,
          produces: produces.get(upstream).cloned().unwrap_or_default(),
        });
      }
    }

    // Spawn in topological order so producers start before their consumers.
    let ids: Vec<String> = nodes.iter().map(|n| n.id().to_string()).collect();
    let mut tokens: HashMap<String, CancellationToken> = HashMap::new();
    let mut steps = Vec::with_capacity(nodes.len());
    let mut running = FuturesUnordered::new();

    for (index, node) in nodes.into_iter().enumerate() {
      let node_id = node.id().to_string();
      let timeout = node
        .timeout_override()
        .or(node.contract().timeout)
        .unwrap_or_else(|| config.default_timeout());
      let token = cancel.child_token();

      let task = NodeTask {
        execution_id: execution_id.clone(),
        inputs: inputs.remove(&node_id).unwrap_or_default(),
        output: FanOut::new(node_id.clone(), senders.remove(&node_id).unwrap_or_default()),
        timeout,
        collect: config.collect_all_outputs || adjacency.is_terminal(&node_id),
        board: board.clone(),
        notifier: notifier.clone(),
        cancel: token.clone(),
        node,
      };
      steps.push(task.node.step_name().to_string());
      tokens.insert(node_id, token);
      running.push(tokio::spawn(task.run()).map(move |joined| (index, joined)));
    }

    let mut stopped: HashSet<String> = HashSet::new();
    let mut finished: Vec<Option<NodeReport>> = ids.iter().map(|_| None).collect();
    while let Some((index, joined)) = running.next().await {
      let node_id = &ids[index];
      let report = match joined {
        Ok(report) => report,
        Err(e) => {
          // The task panicked; its queues were dropped without a sentinel,
          // which consumers read as a failure.
          error!(execution_id = %execution_id, node_id = %node_id, error = %e, "node_panicked");
          board.transition(node_id, NodeStatus::Failed);
          NodeReport {
            node_id: node_id.clone(),
            step: steps[index].clone(),
            status: NodeStatus::Failed,
            error: Some(format!("node task aborted: {}", e)),
            invocations: 0,
            emitted: 0,
            elapsed_ms: 0,
            documents: Vec::new(),
          }
        }
      };
      finished[index] = Some(report);

      for upstream in adjacency.upstream(node_id) {
        if stalled(&adjacency, &board, &stopped, upstream) {
          debug!(execution_id = %execution_id, node_id = %upstream, "node_stopped");
          if let Some(token) = tokens.get(upstream) {
            token.cancel();
          }
          stopped.insert(upstream.clone());
        }
      }
    }
    let reports: Vec<NodeReport> = finished.into_iter().flatten().collect();

    let outputs = reports
      .iter()
      .filter(|r| adjacency.is_terminal(&r.node_id))
      .flat_map(|r| r.documents.iter().cloned())
      .collect();

    let report = RunReport {
      execution_id: execution_id.clone(),
      nodes: reports,
      outputs,
    };

    if report.succeeded() {
      info!(
        execution_id = %execution_id,
        outputs = report.outputs.len(),
        "workflow_completed"
      );
      notifier.notify(ExecutionEvent::WorkflowCompleted { execution_id });
    } else {
      let failed_nodes: Vec<String> = report
        .failed_nodes()
        .into_iter()
        .map(String::from)
        .collect();
      error!(
        execution_id = %execution_id,
        failed_nodes = ?failed_nodes,
        "workflow_failed"
      );
      notifier.notify(ExecutionEvent::WorkflowFailed {
        execution_id,
        failed_nodes,
      });
    }

    report
  }
}

/// A running producer is stalled once every consumer has terminated and at
/// least one of them gave up waiting on it, either by timing out or by being
/// stopped itself. Producers whose consumers merely failed run to completion.
fn stalled(
  adjacency: &Graph,
  board: &StatusBoard,
  stopped: &HashSet<String>,
  producer: &str,
) -> bool {
  if stopped.contains(producer) || board.get(producer).is_none_or(NodeStatus::is_terminal) {
    return false;
  }
  let consumers = adjacency.downstream(producer);
  let all_terminal = consumers
    .iter()
    .all(|c| board.get(c).is_some_and(NodeStatus::is_terminal));
  all_terminal
    && consumers
      .iter()
      .any(|c| stopped.contains(c) || board.get(c) == Some(NodeStatus::TimedOut))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chain() -> (Graph, StatusBoard) {
    let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let edges = vec![
      ("a".to_string(), "b".to_string()),
      ("b".to_string(), "c".to_string()),
    ];
    let board = StatusBoard::new(ids.iter().map(String::as_str));
    (Graph::new(&ids, &edges), board)
  }

  #[test]
  fn test_producer_of_timed_out_consumer_is_stalled() {
    let (graph, board) = chain();
    board.transition("b", NodeStatus::Running);
    board.transition("c", NodeStatus::TimedOut);
    assert!(stalled(&graph, &board, &HashSet::new(), "b"));
  }

  #[test]
  fn test_producer_of_failed_consumer_keeps_running() {
    let (graph, board) = chain();
    board.transition("b", NodeStatus::Running);
    board.transition("c", NodeStatus::Failed);
    assert!(!stalled(&graph, &board, &HashSet::new(), "b"));
  }

  #[test]
  fn test_stopping_cascades_upstream() {
    let (graph, board) = chain();
    board.transition("b", NodeStatus::Failed);
    let stopped: HashSet<String> = ["b".to_string()].into_iter().collect();
    assert!(stalled(&graph, &board, &stopped, "a"));
    assert!(!stalled(&graph, &board, &HashSet::new(), "a"));
  }

  #[test]
  fn test_finished_producer_is_left_alone() {
    let (graph, board) = chain();
    board.transition("b", NodeStatus::Running);
    board.transition("b", NodeStatus::Completed);
    board.transition("c", NodeStatus::TimedOut);
    assert!(!stalled(&graph, &board, &HashSet::new(), "b"));
  }
}
