//! Serialization views of a document.
//!
//! Representations are pure: encoding the same document twice yields
//! byte-identical output and nothing is cached between calls.

use std::sync::Arc;

use crate::document::Document;
use crate::error::SerializationError;

/// Encoded form of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
  /// MIME-style tag, e.g. `application/json`.
  pub mime_type: &'static str,
  /// Serialized bytes.
  pub bytes: Vec<u8>,
}

/// A stateless encoder from [`Document`] to one output format.
pub trait Representation: Send + Sync {
  /// Short format name used in workflow parameters (`json`, `text`).
  fn name(&self) -> &'static str;

  /// MIME-style tag of the encoded output.
  fn mime_type(&self) -> &'static str;

  /// File extension for the encoded output.
  fn extension(&self) -> &'static str;

  /// Encode the document.
  fn encode(&self, document: &Document) -> Result<Encoded, SerializationError>;
}

/// Look up a built-in representation by format name.
pub fn representation_for(name: &str) -> Option<Arc<dyn Representation>> {
  match name {
    "json" => Some(Arc::new(JsonRepresentation::default())),
    "text" => Some(Arc::new(KeyValueRepresentation)),
    _ => None,
  }
}

/// Pretty-printed JSON of the full document (id, type, source, body).
#[derive(Debug, Clone, Default)]
pub struct JsonRepresentation {
  required_fields: Vec<String>,
}

impl JsonRepresentation {
  /// Require the given top-level body fields to be present.
  pub fn with_required_fields<I, S>(fields: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      required_fields: fields.into_iter().map(Into::into).collect(),
    }
  }
}

impl Representation for JsonRepresentation {
  fn name(&self) -> &'static str {
    "json"
  }

  fn mime_type(&self) -> &'static str {
    "application/json"
  }

  fn extension(&self) -> &'static str {
    "json"
  }

  fn encode(&self, document: &Document) -> Result<Encoded, SerializationError> {
    for field in &self.required_fields {
      let present = document
        .body()
        .as_object()
        .is_some_and(|body| body.get(field).is_some_and(|v| !v.is_null()));
      if !present {
        return Err(SerializationError::MissingField {
          doc_type: document.doc_type().to_string(),
          field: field.clone(),
        });
      }
    }

    let bytes = serde_json::to_vec_pretty(document)?;
    Ok(Encoded {
      mime_type: self.mime_type(),
      bytes,
    })
  }
}

/// Plain text, one `key: value` line per top-level body field in key order.
///
/// Only objects with scalar values can be expressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValueRepresentation;

impl Representation for KeyValueRepresentation {
  fn name(&self) -> &'static str {
    "text"
  }

  fn mime_type(&self) -> &'static str {
    "text/plain"
  }

  fn extension(&self) -> &'static str {
    "txt"
  }

  fn encode(&self, document: &Document) -> Result<Encoded, SerializationError> {
    let body = document
      .body()
      .as_object()
      .ok_or_else(|| SerializationError::UnsupportedBody {
        doc_type: document.doc_type().to_string(),
        message: "body is not an object".to_string(),
      })?;

    let mut fields: Vec<(&String, &serde_json::Value)> = body.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = format!("id: {}\ntype: {}\n", document.id(), document.doc_type());
    for (key, value) in fields {
      let rendered = match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
          return Err(SerializationError::UnsupportedBody {
            doc_type: document.doc_type().to_string(),
            message: format!("field '{}' is not a scalar", key),
          });
        }
      };
      out.push_str(key);
      out.push_str(": ");
      out.push_str(&rendered);
      out.push('\n');
    }

    Ok(Encoded {
      mime_type: self.mime_type(),
      bytes: out.into_bytes(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn share() -> Document {
    Document::new(
      "urn:gleaner:computing_share:batch",
      "computing_share",
      json!({"name": "batch", "running_jobs": 4, "waiting_jobs": 1, "enabled": true}),
      "shares",
    )
    .unwrap()
  }

  #[test]
  fn test_json_encoding_is_idempotent() {
    let doc = share();
    let repr = JsonRepresentation::default();
    let first = repr.encode(&doc).unwrap();
    let second = repr.encode(&doc).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.mime_type, "application/json");
  }

  #[test]
  fn test_json_missing_required_field() {
    let repr = JsonRepresentation::with_required_fields(["name", "max_jobs"]);
    let err = repr.encode(&share()).unwrap_err();
    assert!(matches!(
      err,
      SerializationError::MissingField { ref field, .. } if field == "max_jobs"
    ));
  }

  #[test]
  fn test_json_roundtrips_document() {
    let doc = share();
    let encoded = JsonRepresentation::default().encode(&doc).unwrap();
    let decoded: Document = serde_json::from_slice(&encoded.bytes).unwrap();
    assert_eq!(decoded, doc);
  }

  #[test]
  fn test_key_value_sorted_lines() {
    let encoded = KeyValueRepresentation.encode(&share()).unwrap();
    let text = String::from_utf8(encoded.bytes).unwrap();
    assert_eq!(
      text,
      "id: urn:gleaner:computing_share:batch\ntype: computing_share\n\
       enabled: true\nname: batch\nrunning_jobs: 4\nwaiting_jobs: 1\n"
    );
  }

  #[test]
  fn test_key_value_rejects_nested_values() {
    let doc = Document::new("h1", "host", json!({"cpus": [1, 2]}), "hosts").unwrap();
    let err = KeyValueRepresentation.encode(&doc).unwrap_err();
    assert!(matches!(err, SerializationError::UnsupportedBody { .. }));
  }

  #[test]
  fn test_key_value_rejects_non_object() {
    let doc = Document::new("h1", "host", json!("raw"), "hosts").unwrap();
    assert!(KeyValueRepresentation.encode(&doc).is_err());
  }

  #[test]
  fn test_representation_lookup() {
    assert_eq!(representation_for("json").unwrap().mime_type(), "application/json");
    assert_eq!(representation_for("text").unwrap().extension(), "txt");
    assert!(representation_for("xml").is_none());
  }
}
