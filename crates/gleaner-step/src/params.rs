//! Step parameters and their declared schema.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// One recognized parameter of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
  pub name: String,
  pub description: String,
  pub required: bool,
  /// Value used when the parameter is omitted.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub default: Option<String>,
}

impl ParameterSpec {
  /// A parameter that must be supplied.
  pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      description: description.into(),
      required: true,
      default: None,
    }
  }

  /// A parameter that may be omitted.
  pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      description: description.into(),
      required: false,
      default: None,
    }
  }

  /// Set the default value used when the parameter is omitted.
  pub fn with_default(mut self, value: impl Into<String>) -> Self {
    self.default = Some(value.into());
    self
  }
}

/// Parameter values bound to a node, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, String>);

impl Parameters {
  pub fn new() -> Self {
    Self::default()
  }

  /// Set a value, returning the previous one.
  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
    self.0.insert(name.into(), value.into())
  }

  /// Remove a value.
  pub fn remove(&mut self, name: &str) -> Option<String> {
    self.0.remove(name)
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.get(name).map(String::as_str)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  /// Get a value that validation guarantees to be present.
  pub fn require(&self, name: &str) -> Result<&str, ParameterError> {
    self.get(name).ok_or_else(|| ParameterError::MissingRequired {
      name: name.to_string(),
    })
  }

  /// Parse a value with [`FromStr`], `None` when absent.
  pub fn parse<T>(&self, name: &str) -> Result<Option<T>, ParameterError>
  where
    T: FromStr,
    T::Err: std::fmt::Display,
  {
    match self.get(name) {
      None => Ok(None),
      Some(raw) => raw
        .parse::<T>()
        .map(Some)
        .map_err(|e| ParameterError::Invalid {
          name: name.to_string(),
          message: e.to_string(),
        }),
    }
  }

  /// Check these values against a schema.
  ///
  /// Unknown names and missing required parameters are rejected. Omitted
  /// optional parameters with a default are filled in on the returned copy.
  pub fn validate(&self, schema: &[ParameterSpec]) -> Result<Parameters, ParameterError> {
    if let Some(name) = self
      .0
      .keys()
      .find(|name| !schema.iter().any(|spec| &spec.name == *name))
    {
      return Err(ParameterError::Unrecognized { name: name.clone() });
    }

    let mut validated = self.clone();
    for spec in schema {
      if validated.contains(&spec.name) {
        continue;
      }
      if spec.required {
        return Err(ParameterError::MissingRequired {
          name: spec.name.clone(),
        });
      }
      if let Some(default) = &spec.default {
        validated.insert(spec.name.clone(), default.clone());
      }
    }

    Ok(validated)
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
  fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
    Self(
      iter
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn schema() -> Vec<ParameterSpec> {
    vec![
      ParameterSpec::required("type", "document type to emit"),
      ParameterSpec::optional("format", "output format").with_default("json"),
      ParameterSpec::optional("comment", "free text"),
    ]
  }

  #[test]
  fn test_validate_fills_defaults() {
    let params: Parameters = [("type", "x")].into_iter().collect();
    let validated = params.validate(&schema()).unwrap();
    assert_eq!(validated.get("format"), Some("json"));
    assert_eq!(validated.get("comment"), None);
    assert_eq!(validated.len(), 2);
  }

  #[test]
  fn test_validate_rejects_unknown() {
    let params: Parameters = [("type", "x"), ("colour", "red")].into_iter().collect();
    let err = params.validate(&schema()).unwrap_err();
    assert_eq!(
      err,
      ParameterError::Unrecognized {
        name: "colour".to_string()
      }
    );
  }

  #[test]
  fn test_validate_rejects_missing_required() {
    let err = Parameters::new().validate(&schema()).unwrap_err();
    assert_eq!(
      err,
      ParameterError::MissingRequired {
        name: "type".to_string()
      }
    );
  }

  #[test]
  fn test_parse_values() {
    let params: Parameters = [("deadline_ms", "250"), ("bad", "x1")].into_iter().collect();
    assert_eq!(params.parse::<u64>("deadline_ms").unwrap(), Some(250));
    assert_eq!(params.parse::<u64>("absent").unwrap(), None);
    assert!(matches!(
      params.parse::<u64>("bad"),
      Err(ParameterError::Invalid { .. })
    ));
  }
}
