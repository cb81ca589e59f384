//! Workflow runner with channel-based triggering.
//!
//! The `WorkflowRunner` owns an mpsc channel for receiving triggers and
//! re-runs a workflow each time one arrives, or on a fixed interval. Every
//! run re-reads the workflow source and builds a fresh graph.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::error::RunnerError;
use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::report::RunReport;

/// Where a runner reads its workflow specification from.
#[derive(Debug, Clone)]
pub enum WorkflowSource {
  Text(String),
  File(PathBuf),
}

impl WorkflowSource {
  async fn load(&self) -> Result<String, RunnerError> {
    match self {
      WorkflowSource::Text(text) => Ok(text.clone()),
      WorkflowSource::File(path) => {
        tokio::fs::read_to_string(path)
          .await
          .map_err(|source| RunnerError::Io {
            path: path.clone(),
            source,
          })
      }
    }
  }

  fn describe(&self) -> String {
    match self {
      WorkflowSource::Text(_) => "<inline>".to_string(),
      WorkflowSource::File(path) => path.display().to_string(),
    }
  }
}

/// A runner that executes a workflow in response to triggers.
///
/// # Usage
///
/// ```ignore
/// let runner = WorkflowRunner::new(engine, WorkflowSource::File(path))
///   .with_interval(Duration::from_secs(60));
///
/// // Get sender for external triggers
/// let sender = runner.sender();
///
/// // Start the execution loop
/// let cancel = CancellationToken::new();
/// runner.start(cancel).await?;
/// ```
pub struct WorkflowRunner<N: ExecutionNotifier = NoopNotifier> {
  sender: mpsc::Sender<()>,
  receiver: mpsc::Receiver<()>,
  engine: Arc<Engine<N>>,
  source: WorkflowSource,
  interval: Option<Duration>,
  reports: Option<mpsc::UnboundedSender<RunReport>>,
}

impl<N: ExecutionNotifier + 'static> WorkflowRunner<N> {
  pub fn new(engine: Arc<Engine<N>>, source: WorkflowSource) -> Self {
    Self::with_buffer_size(engine, source, 16)
  }

  /// Create a new workflow runner with a custom trigger buffer size.
  pub fn with_buffer_size(engine: Arc<Engine<N>>, source: WorkflowSource, buffer_size: usize) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size.max(1));
    Self {
      sender,
      receiver,
      engine,
      source,
      interval: None,
      reports: None,
    }
  }

  /// Re-run the workflow every `interval` in addition to explicit triggers.
  ///
  /// The first run happens immediately. Ticks missed while a run is still in
  /// progress are skipped.
  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = Some(interval);
    self
  }

  /// Forward every completed run's report to `reports`.
  pub fn with_reports(mut self, reports: mpsc::UnboundedSender<RunReport>) -> Self {
    self.reports = Some(reports);
    self
  }

  /// Get a sender handle for triggering workflow executions.
  pub fn sender(&self) -> mpsc::Sender<()> {
    self.sender.clone()
  }

  /// Trigger a workflow execution through the channel.
  pub async fn trigger(&self) -> Result<(), RunnerError> {
    self
      .sender
      .send(())
      .await
      .map_err(|_| RunnerError::ChannelClosed)
  }

  /// Start the execution loop.
  ///
  /// Blocks until the cancellation token is triggered or the trigger
  /// channel closes. A failing run is logged and does not stop the loop.
  pub async fn start(self, cancel: CancellationToken) -> Result<(), RunnerError> {
    let Self {
      sender,
      mut receiver,
      engine,
      source,
      interval,
      reports,
    } = self;
    // Only external senders keep the channel open.
    drop(sender);

    let mut ticker = interval.map(|period| {
      let mut ticker = tokio::time::interval(period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
      ticker
    });

    info!(source = %source.describe(), interval = ?interval, "runner_started");

    let mut triggers_open = true;
    loop {
      let has_ticker = ticker.is_some();
      let tick = async {
        match ticker.as_mut() {
          Some(ticker) => {
            ticker.tick().await;
          }
          None => std::future::pending::<()>().await,
        }
      };

      tokio::select! {
        _ = cancel.cancelled() => {
          info!(source = %source.describe(), "runner_cancelled");
          break;
        }
        trigger = receiver.recv(), if triggers_open => {
          if trigger.is_none() {
            triggers_open = false;
            if !has_ticker {
              info!(source = %source.describe(), "runner_channel_closed");
              break;
            }
            // The interval keeps driving runs without external triggers.
            continue;
          }
        }
        _ = tick => {}
      }

      match execute(&engine, &source, cancel.child_token()).await {
        Ok(report) => {
          if let Some(reports) = &reports {
            if reports.send(report).is_err() {
              warn!("runner_report_receiver_dropped");
            }
          }
        }
        Err(e) => {
          error!(source = %source.describe(), error = %e, "runner_execution_failed");
        }
      }
    }

    Ok(())
  }

  /// Execute a single workflow run without the loop.
  pub async fn execute_once(&self, cancel: CancellationToken) -> Result<RunReport, RunnerError> {
    execute(&self.engine, &self.source, cancel).await
  }

  pub fn engine(&self) -> &Engine<N> {
    &self.engine
  }

  pub fn source(&self) -> &WorkflowSource {
    &self.source
  }
}

async fn execute<N: ExecutionNotifier + 'static>(
  engine: &Engine<N>,
  source: &WorkflowSource,
  cancel: CancellationToken,
) -> Result<RunReport, RunnerError> {
  let text = source.load().await?;
  let report = engine.run_spec(&text, cancel).await?;
  info!(
    execution_id = %report.execution_id,
    succeeded = report.succeeded(),
    outputs = report.outputs.len(),
    "runner_execution_finished"
  );
  Ok(report)
}
