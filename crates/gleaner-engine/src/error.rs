//! Runner error types.

use std::path::PathBuf;

use gleaner_workflow::ConfigurationError;
use thiserror::Error;

/// Errors raised by the [`crate::WorkflowRunner`].
#[derive(Debug, Error)]
pub enum RunnerError {
  /// The workflow file could not be read.
  #[error("failed to read workflow '{}': {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The workflow specification is invalid.
  #[error(transparent)]
  Configuration(#[from] ConfigurationError),

  /// The trigger channel is closed.
  #[error("workflow runner channel closed")]
  ChannelClosed,
}
