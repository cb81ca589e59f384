//! Document error types.

use thiserror::Error;

/// Errors raised while constructing a document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
  /// A mandatory field was left empty.
  #[error("document is missing its {field}")]
  Incomplete { field: &'static str },
}

/// Errors raised when a representation cannot encode a document.
#[derive(Debug, Error)]
pub enum SerializationError {
  /// The body lacks a field the representation requires.
  #[error("document of type '{doc_type}' is missing required field '{field}'")]
  MissingField { doc_type: String, field: String },

  /// The body has a shape the representation cannot express.
  #[error("cannot encode document of type '{doc_type}': {message}")]
  UnsupportedBody { doc_type: String, message: String },

  /// JSON encoding failed.
  #[error("json encoding failed: {0}")]
  Json(#[from] serde_json::Error),
}
