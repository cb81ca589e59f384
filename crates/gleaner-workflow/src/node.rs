use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gleaner_step::{Parameters, Step, StepContract};

/// Reserved binding parameter overriding a node's input wait bound.
///
/// It is consumed by the workflow loader and never reaches the step.
pub const TIMEOUT_PARAMETER: &str = "timeout_ms";

/// A step bound to an id within a workflow.
pub struct Node {
  pub(crate) id: String,
  pub(crate) step_name: String,
  pub(crate) contract: StepContract,
  pub(crate) params: Parameters,
  pub(crate) step: Arc<dyn Step>,
  pub(crate) upstream: Vec<String>,
  pub(crate) timeout: Option<Duration>,
  pub(crate) line: usize,
}

impl Node {
  pub fn id(&self) -> &str {
    &self.id
  }

  /// Name of the step implementation, as written in the binding.
  pub fn step_name(&self) -> &str {
    &self.step_name
  }

  pub fn contract(&self) -> &StepContract {
    &self.contract
  }

  /// Validated parameters with defaults filled in.
  pub fn params(&self) -> &Parameters {
    &self.params
  }

  pub fn step(&self) -> &Arc<dyn Step> {
    &self.step
  }

  /// Upstream node ids in declaration order.
  pub fn upstream(&self) -> &[String] {
    &self.upstream
  }

  /// Wait bound set on the binding with [`TIMEOUT_PARAMETER`].
  pub fn timeout_override(&self) -> Option<Duration> {
    self.timeout
  }

  /// Line of the binding in the specification.
  pub fn line(&self) -> usize {
    self.line
  }

  pub fn is_source(&self) -> bool {
    self.contract.is_source()
  }
}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Node")
      .field("id", &self.id)
      .field("step_name", &self.step_name)
      .field("params", &self.params)
      .field("upstream", &self.upstream)
      .field("timeout", &self.timeout)
      .field("line", &self.line)
      .finish_non_exhaustive()
  }
}
