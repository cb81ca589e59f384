//! The document type.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// A document shared between every consumer that receives it.
pub type SharedDocument = Arc<Document>;

/// An immutable, typed payload produced by one step and consumed by others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  id: String,
  #[serde(rename = "type")]
  doc_type: String,
  body: serde_json::Value,
  source: String,
}

impl Document {
  /// Create a document. `id` and `doc_type` must be non-empty.
  pub fn new(
    id: impl Into<String>,
    doc_type: impl Into<String>,
    body: serde_json::Value,
    source: impl Into<String>,
  ) -> Result<Self, DocumentError> {
    let id = id.into();
    let doc_type = doc_type.into();

    if id.trim().is_empty() {
      return Err(DocumentError::Incomplete { field: "id" });
    }
    if doc_type.trim().is_empty() {
      return Err(DocumentError::Incomplete { field: "type" });
    }

    Ok(Self {
      id,
      doc_type,
      body,
      source: source.into(),
    })
  }

  /// Content identifier, stable across runs for the same logical entity.
  pub fn id(&self) -> &str {
    &self.id
  }

  /// Opaque schema tag used to wire producers to consumers.
  pub fn doc_type(&self) -> &str {
    &self.doc_type
  }

  /// Producer-defined payload.
  pub fn body(&self) -> &serde_json::Value {
    &self.body
  }

  /// Provenance tag, usually the id of the producing node.
  pub fn source(&self) -> &str {
    &self.source
  }

  /// Wrap the document for sharing across queues.
  pub fn into_shared(self) -> SharedDocument {
    Arc::new(self)
  }
}

impl fmt::Display for Document {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.id, self.doc_type)
  }
}

/// Helpers for building stable document identifiers.
pub struct DocumentId;

impl DocumentId {
  /// Build `urn:gleaner:<type>:<part>:<part>...`.
  ///
  /// Parts are trimmed and any `:` inside a part is replaced with `_` so the
  /// segments stay unambiguous.
  pub fn urn<I, S>(doc_type: &str, parts: I) -> String
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut urn = format!("urn:gleaner:{}", doc_type);
    for part in parts {
      urn.push(':');
      urn.push_str(&part.as_ref().trim().replace(':', "_"));
    }
    urn
  }
}
