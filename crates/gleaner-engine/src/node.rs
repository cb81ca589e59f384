//! Execution of a single node within a run.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream::{BoxStream, SelectAll, select_all};
use gleaner_document::SharedDocument;
use gleaner_step::{ErrorKind, InputSpec, Inputs, StepContext, StepError};
use gleaner_workflow::Node;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::queue::{FanOut, Message, QueueReceiver};
use crate::report::NodeReport;
use crate::status::{NodeStatus, StatusBoard};

/// One incoming edge of a node.
pub(crate) struct NodeInput {
  pub receiver: QueueReceiver,
  /// Types the upstream node declares it produces.
  pub produces: Vec<String>,
}

/// Everything a spawned node needs for one run.
pub(crate) struct NodeTask<N> {
  pub node: Node,
  pub execution_id: String,
  pub inputs: Vec<NodeInput>,
  pub output: FanOut,
  pub timeout: Duration,
  pub collect: bool,
  pub board: Arc<StatusBoard>,
  pub notifier: Arc<N>,
  pub cancel: CancellationToken,
}

/// A required input and the documents buffered for it.
struct Slot {
  spec: InputSpec,
  /// Indices of the incoming edges able to feed this slot.
  producers: Vec<usize>,
  buffer: VecDeque<SharedDocument>,
}

impl Slot {
  fn closed(&self, open: &[bool]) -> bool {
    self.producers.iter().all(|&i| !open[i])
  }

  /// A complete input set needs one document, or the whole stream when
  /// aggregating.
  fn ready(&self, open: &[bool]) -> bool {
    if self.spec.aggregate {
      self.closed(open)
    } else {
      !self.buffer.is_empty()
    }
  }

  /// No further input set can ever be assembled.
  fn exhausted(&self, open: &[bool]) -> bool {
    !self.spec.aggregate && self.buffer.is_empty() && self.closed(open)
  }
}

#[derive(Default)]
struct Progress {
  started: bool,
  invocations: usize,
  emitted: usize,
  documents: Vec<SharedDocument>,
}

type Merged = SelectAll<BoxStream<'static, (usize, Message)>>;

impl<N: ExecutionNotifier> NodeTask<N> {
  /// Run the node to a terminal state and report on it.
  ///
  /// Whatever happens, every downstream queue receives a sentinel.
  #[instrument(
    name = "node_run",
    skip(self),
    fields(
      execution_id = %self.execution_id,
      node_id = %self.node.id(),
    )
  )]
  pub async fn run(mut self) -> NodeReport {
    let started_at = Instant::now();
    let mut progress = Progress::default();

    let result = if self.node.is_source() {
      self.run_source(&mut progress).await
    } else {
      self.run_consumer(&mut progress).await
    };

    let node_id = self.node.id().to_string();
    let (status, error) = match result {
      Ok(()) => {
        self.output.finish().await;
        self.board.transition(&node_id, NodeStatus::Completed);
        info!(
          invocations = progress.invocations,
          emitted = progress.emitted,
          "node_completed"
        );
        self.notifier.notify(ExecutionEvent::NodeCompleted {
          execution_id: self.execution_id.clone(),
          node_id: node_id.clone(),
          emitted: progress.emitted,
        });
        (NodeStatus::Completed, None)
      }
      Err(e) => {
        let message = e.to_string();
        self.output.fail(&message).await;
        let status = if e.kind() == ErrorKind::Timeout {
          warn!(error = %message, "node_timed_out");
          self.notifier.notify(ExecutionEvent::NodeTimedOut {
            execution_id: self.execution_id.clone(),
            node_id: node_id.clone(),
            error: message.clone(),
          });
          NodeStatus::TimedOut
        } else {
          error!(error = %message, "node_failed");
          self.notifier.notify(ExecutionEvent::NodeFailed {
            execution_id: self.execution_id.clone(),
            node_id: node_id.clone(),
            error: message.clone(),
          });
          NodeStatus::Failed
        };
        self.board.transition(&node_id, status);
        (status, Some(message))
      }
    };

    NodeReport {
      node_id,
      step: self.node.step_name().to_string(),
      status,
      error,
      invocations: progress.invocations,
      emitted: progress.emitted,
      elapsed_ms: started_at.elapsed().as_millis() as u64,
      documents: progress.documents,
    }
  }

  fn mark_running(&self, progress: &mut Progress) {
    if progress.started {
      return;
    }
    progress.started = true;
    self.board.transition(self.node.id(), NodeStatus::Running);
    info!(step = %self.node.step_name(), "node_started");
    self.notifier.notify(ExecutionEvent::NodeStarted {
      execution_id: self.execution_id.clone(),
      node_id: self.node.id().to_string(),
    });
  }

  async fn run_source(&self, progress: &mut Progress) -> Result<(), StepError> {
    if self.cancel.is_cancelled() {
      return Err(StepError::Cancelled);
    }
    self.mark_running(progress);
    self.invoke(Inputs::empty(), progress).await
  }

  async fn run_consumer(&mut self, progress: &mut Progress) -> Result<(), StepError> {
    let inputs = std::mem::take(&mut self.inputs);
    let mut open = vec![true; inputs.len()];
    let mut slots: Vec<Slot> = self
      .node
      .contract()
      .requires
      .iter()
      .map(|spec| Slot {
        producers: inputs
          .iter()
          .enumerate()
          .filter(|(_, input)| {
            spec.is_wildcard() || input.produces.iter().any(|t| t == &spec.doc_type)
          })
          .map(|(i, _)| i)
          .collect(),
        spec: spec.clone(),
        buffer: VecDeque::new(),
      })
      .collect();
    let all_aggregate = slots.iter().all(|s| s.spec.aggregate);

    let mut merged: Merged = select_all(inputs.into_iter().enumerate().map(|(i, input)| {
      input
        .receiver
        .into_stream()
        .map(move |message| (i, message))
        .boxed()
    }));

    loop {
      while !slots.iter().all(|s| s.ready(&open)) {
        if slots.iter().any(|s| s.exhausted(&open)) {
          return self.drain(&mut merged, &mut open, progress).await;
        }

        let pending = || {
          slots
            .iter()
            .filter(|s| !s.ready(&open))
            .map(|s| s.spec.doc_type.as_str())
            .collect::<Vec<_>>()
            .join(", ")
        };
        let Some((i, message)) = self.next_message(&mut merged, pending).await? else {
          // Every queue delivered its sentinel.
          return Ok(());
        };
        self.mark_running(progress);

        match message {
          Message::Document(document) => route(&mut slots, i, document),
          Message::End => open[i] = false,
          Message::Failed { node_id, reason } => {
            return Err(StepError::UnmetDependency {
              upstream: node_id,
              reason,
            });
          }
        }
      }

      let mut inputs = Inputs::empty();
      for slot in &mut slots {
        let documents = if slot.spec.aggregate {
          slot.buffer.iter().cloned().collect()
        } else {
          slot.buffer.pop_front().into_iter().collect()
        };
        inputs.push(slot.spec.doc_type.clone(), documents);
      }
      self.invoke(inputs, progress).await?;

      if all_aggregate {
        return self.drain(&mut merged, &mut open, progress).await;
      }
    }
  }

  /// Wait for the next message from any incoming edge, bounded by the node
  /// timeout and the run's cancellation.
  async fn next_message(
    &self,
    merged: &mut Merged,
    waiting_for: impl FnOnce() -> String,
  ) -> Result<Option<(usize, Message)>, StepError> {
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(StepError::Cancelled),
      next = tokio::time::timeout(self.timeout, merged.next()) => {
        next.map_err(|_| StepError::Timeout {
          waiting_for: waiting_for(),
          after: self.timeout,
        })
      }
    }
  }

  /// Read the remaining queues to their sentinels after the last invocation
  /// so a late upstream failure still reaches this node.
  async fn drain(
    &self,
    merged: &mut Merged,
    open: &mut [bool],
    progress: &mut Progress,
  ) -> Result<(), StepError> {
    while open.iter().any(|o| *o) {
      let Some((i, message)) = self
        .next_message(merged, || "end of stream".to_string())
        .await?
      else {
        break;
      };
      self.mark_running(progress);
      match message {
        Message::Document(document) => {
          debug!(document_id = %document.id(), "discarding document after last invocation");
        }
        Message::End => open[i] = false,
        Message::Failed { node_id, reason } => {
          return Err(StepError::UnmetDependency {
            upstream: node_id,
            reason,
          });
        }
      }
    }
    Ok(())
  }

  /// Run the step once and forward its output.
  async fn invoke(&self, inputs: Inputs, progress: &mut Progress) -> Result<(), StepError> {
    let ctx = StepContext::new(
      self.execution_id.clone(),
      self.node.id(),
      self.cancel.clone(),
    );
    debug!(documents = inputs.len(), "invoking step");

    let documents = self.node.step().run(&ctx, inputs).await?;
    progress.invocations += 1;

    let contract = self.node.contract();
    if let Some(undeclared) = documents
      .iter()
      .find(|d| !contract.declares_output(d.doc_type()))
    {
      return Err(StepError::UndeclaredOutput {
        doc_type: undeclared.doc_type().to_string(),
      });
    }

    for document in documents {
      let shared = document.into_shared();
      self.output.send(&shared).await;
      progress.emitted += 1;
      if self.collect {
        progress.documents.push(shared);
      }
    }
    Ok(())
  }
}

/// Place a document in the first slot that takes its exact type, falling back
/// to a wildcard slot.
fn route(slots: &mut [Slot], edge: usize, document: SharedDocument) {
  let index = slots
    .iter()
    .position(|s| !s.spec.is_wildcard() && s.spec.doc_type == document.doc_type())
    .or_else(|| slots.iter().position(|s| s.spec.is_wildcard()));

  match index {
    Some(index) if slots[index].producers.contains(&edge) => {
      slots[index].buffer.push_back(document);
    }
    _ => {
      debug!(
        document_id = %document.id(),
        doc_type = %document.doc_type(),
        "no input accepts document, dropping"
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use gleaner_document::Document;
  use serde_json::json;

  fn slot(doc_type: &str, aggregate: bool, producers: Vec<usize>) -> Slot {
    Slot {
      spec: InputSpec {
        doc_type: doc_type.to_string(),
        aggregate,
      },
      producers,
      buffer: VecDeque::new(),
    }
  }

  fn doc(doc_type: &str) -> SharedDocument {
    Document::new("d", doc_type, json!({}), "t").unwrap().into_shared()
  }

  #[test]
  fn test_route_prefers_exact_type() {
    let mut slots = vec![slot("*", false, vec![0, 1]), slot("x", false, vec![0])];
    route(&mut slots, 0, doc("x"));
    route(&mut slots, 1, doc("y"));
    assert_eq!(slots[1].buffer.len(), 1);
    assert_eq!(slots[0].buffer.len(), 1);
    assert_eq!(slots[0].buffer[0].doc_type(), "y");
  }

  #[test]
  fn test_route_drops_unmatched() {
    let mut slots = vec![slot("x", false, vec![0])];
    route(&mut slots, 0, doc("z"));
    assert!(slots[0].buffer.is_empty());
  }

  #[test]
  fn test_slot_readiness() {
    let open = [false, true];
    let mut single = slot("x", false, vec![0]);
    assert!(!single.ready(&open));
    assert!(single.exhausted(&open));
    single.buffer.push_back(doc("x"));
    assert!(single.ready(&open));
    assert!(!single.exhausted(&open));

    let aggregate = slot("*", true, vec![0, 1]);
    assert!(!aggregate.ready(&open));
    assert!(aggregate.ready(&[false, false]));
    assert!(!aggregate.exhausted(&[false, false]));
  }
}
