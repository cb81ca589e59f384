//! Step error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while validating step parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParameterError {
  /// The step does not recognize this parameter.
  #[error("unrecognized parameter '{name}'")]
  Unrecognized { name: String },

  /// A required parameter was not supplied.
  #[error("missing required parameter '{name}'")]
  MissingRequired { name: String },

  /// The parameter was supplied but its value is unusable.
  #[error("invalid value for parameter '{name}': {message}")]
  Invalid { name: String, message: String },
}

/// Errors raised while a node runs.
#[derive(Debug, Clone, Error)]
pub enum StepError {
  /// Collaborator logic failed: malformed input, failed external
  /// invocation, sink failure.
  #[error("step execution failed: {message}")]
  Execution { message: String },

  /// A required input did not arrive within the wait bound.
  #[error("timed out after {after:?} waiting for input '{waiting_for}'")]
  Timeout { waiting_for: String, after: Duration },

  /// An upstream node failed, so this node cannot run.
  #[error("unmet dependency: upstream '{upstream}' failed: {reason}")]
  UnmetDependency { upstream: String, reason: String },

  /// The step emitted a document type it does not declare.
  #[error("step emitted undeclared document type '{doc_type}'")]
  UndeclaredOutput { doc_type: String },

  /// The run was cancelled while the node was waiting.
  #[error("execution cancelled")]
  Cancelled,
}

/// Coarse classification of a [`StepError`] for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Execution,
  Timeout,
  UnmetDependency,
  Cancelled,
}

impl StepError {
  /// Shorthand for an [`StepError::Execution`] error.
  pub fn execution(message: impl Into<String>) -> Self {
    Self::Execution {
      message: message.into(),
    }
  }

  /// Classify the error.
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Execution { .. } | Self::UndeclaredOutput { .. } => ErrorKind::Execution,
      Self::Timeout { .. } => ErrorKind::Timeout,
      Self::UnmetDependency { .. } => ErrorKind::UnmetDependency,
      Self::Cancelled => ErrorKind::Cancelled,
    }
  }
}

impl From<ParameterError> for StepError {
  fn from(e: ParameterError) -> Self {
    Self::execution(e.to_string())
  }
}

impl From<gleaner_document::DocumentError> for StepError {
  fn from(e: gleaner_document::DocumentError) -> Self {
    Self::execution(e.to_string())
  }
}

impl From<gleaner_document::SerializationError> for StepError {
  fn from(e: gleaner_document::SerializationError) -> Self {
    Self::execution(e.to_string())
  }
}
