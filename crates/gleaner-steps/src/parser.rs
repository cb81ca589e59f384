//! Parsers turning raw collector output into records.
//!
//! A record is a flat JSON object. Parsers only check structure; the step
//! using them decides which fields a record must carry.

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

/// One parsed record.
pub type Record = Map<String, Value>;

/// Errors raised while parsing collector output.
#[derive(Debug, Error)]
pub enum ParseError {
  #[error("line {line}: expected 'key: value' or 'key=value', found '{text}'")]
  Malformed { line: usize, text: String },

  #[error("invalid JSON output: {0}")]
  Json(#[from] serde_json::Error),

  #[error("expected a JSON object or an array of objects, found {found}")]
  NotRecords { found: &'static str },
}

/// Raw text in, records out.
pub trait RecordParser: Send + Sync {
  /// Name used by the `format` parameter.
  fn name(&self) -> &'static str;

  fn parse(&self, text: &str) -> Result<Vec<Record>, ParseError>;
}

/// Look up a parser by its `format` name.
pub fn parser_for(name: &str) -> Option<Arc<dyn RecordParser>> {
  match name {
    "key_value" => Some(Arc::new(KeyValueParser)),
    "json" => Some(Arc::new(JsonParser)),
    _ => None,
  }
}

/// Blank-line separated blocks of `key: value` or `key=value` lines.
///
/// Lines starting with `#` are ignored. A repeated key keeps its last value.
/// Values are kept as strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyValueParser;

impl RecordParser for KeyValueParser {
  fn name(&self) -> &'static str {
    "key_value"
  }

  fn parse(&self, text: &str) -> Result<Vec<Record>, ParseError> {
    let mut records = Vec::new();
    let mut current = Record::new();

    for (index, raw) in text.lines().enumerate() {
      let line = raw.trim();
      if line.is_empty() {
        if !current.is_empty() {
          records.push(std::mem::take(&mut current));
        }
        continue;
      }
      if line.starts_with('#') {
        continue;
      }

      let split = line.find([':', '=']);
      let (key, value) = match split {
        Some(at) => (line[..at].trim(), line[at + 1..].trim()),
        None => ("", ""),
      };
      if key.is_empty() {
        return Err(ParseError::Malformed {
          line: index + 1,
          text: line.to_string(),
        });
      }
      current.insert(key.to_string(), Value::String(value.to_string()));
    }

    if !current.is_empty() {
      records.push(current);
    }
    Ok(records)
  }
}

/// A JSON object, or an array of JSON objects.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl RecordParser for JsonParser {
  fn name(&self) -> &'static str {
    "json"
  }

  fn parse(&self, text: &str) -> Result<Vec<Record>, ParseError> {
    match serde_json::from_str(text)? {
      Value::Object(record) => Ok(vec![record]),
      Value::Array(items) => items
        .into_iter()
        .map(|item| match item {
          Value::Object(record) => Ok(record),
          other => Err(ParseError::NotRecords {
            found: kind(&other),
          }),
        })
        .collect(),
      other => Err(ParseError::NotRecords {
        found: kind(&other),
      }),
    }
  }
}

fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
