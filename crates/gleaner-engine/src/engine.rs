//! Workflow execution engine.
//!
//! The [`Engine`] holds the step registry and run settings. Each run goes
//! through a [`WorkflowExecution`], which wires the graph into queues, spawns
//! one task per node and collects a [`RunReport`] once every node reaches a
//! terminal state.

use std::sync::Arc;

use gleaner_step::StepRegistry;
use gleaner_workflow::{ConfigurationError, WorkflowGraph};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::execution::WorkflowExecution;
use crate::report::RunReport;

/// The workflow execution engine.
///
/// Generic over `N: ExecutionNotifier` to allow different notification
/// strategies. Use `Engine::new()` for an engine with no-op notifications,
/// or `Engine::with_notifier()` to observe events.
pub struct Engine<N: ExecutionNotifier = NoopNotifier> {
  registry: Arc<StepRegistry>,
  config: EngineConfig,
  notifier: Arc<N>,
}

impl Engine<NoopNotifier> {
  /// Create an engine with no-op notifications.
  pub fn new(registry: Arc<StepRegistry>, config: EngineConfig) -> Self {
    Self::with_notifier(registry, config, NoopNotifier)
  }
}

impl<N: ExecutionNotifier + 'static> Engine<N> {
  /// Create an engine with a custom notifier.
  pub fn with_notifier(registry: Arc<StepRegistry>, config: EngineConfig, notifier: N) -> Self {
    Self {
      registry,
      config,
      notifier: Arc::new(notifier),
    }
  }

  pub fn registry(&self) -> &StepRegistry {
    &self.registry
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Parse and validate a workflow specification against the registry.
  pub fn load(&self, spec: &str) -> Result<WorkflowGraph, ConfigurationError> {
    WorkflowGraph::parse(spec, &self.registry)
  }

  /// Load a specification and run it.
  pub async fn run_spec(
    &self,
    spec: &str,
    cancel: CancellationToken,
  ) -> Result<RunReport, ConfigurationError> {
    let graph = self.load(spec)?;
    Ok(self.run(graph, cancel).await)
  }

  /// Prepare a run of the graph without starting it.
  ///
  /// The graph is consumed: nodes belong to exactly one run.
  pub fn execute(
    &self,
    graph: WorkflowGraph,
    cancel: CancellationToken,
  ) -> WorkflowExecution<'_, N> {
    WorkflowExecution::new(self, graph, cancel)
  }

  /// Run every node of the graph concurrently.
  ///
  /// Node failures are reported per node; the run itself always produces a
  /// report.
  pub async fn run(&self, graph: WorkflowGraph, cancel: CancellationToken) -> RunReport {
    self.execute(graph, cancel).wait().await
  }

  pub(crate) fn notifier(&self) -> &Arc<N> {
    &self.notifier
  }
}
