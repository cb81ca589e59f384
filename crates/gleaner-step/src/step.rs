//! The step trait.

use async_trait::async_trait;
use gleaner_document::Document;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;
use crate::inputs::Inputs;

/// Per-invocation context handed to a step.
#[derive(Debug, Clone)]
pub struct StepContext {
  /// Id of the workflow run.
  pub execution_id: String,
  /// Id of the node the step is bound to.
  pub node_id: String,
  /// Cancelled when the run is aborted. Long-running collaborator work should
  /// check it; the engine never interrupts a step that is already running.
  pub cancel: CancellationToken,
}

impl StepContext {
  pub fn new(
    execution_id: impl Into<String>,
    node_id: impl Into<String>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      execution_id: execution_id.into(),
      node_id: node_id.into(),
      cancel,
    }
  }
}

/// A processing unit bound to its parameters.
///
/// The engine calls `run` once per complete input set (once for source
/// steps). Failures must be reported as errors; a step never substitutes
/// empty output for a failure.
#[async_trait]
pub trait Step: Send + Sync {
  async fn run(&self, ctx: &StepContext, inputs: Inputs) -> Result<Vec<Document>, StepError>;
}
