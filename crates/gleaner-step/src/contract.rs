//! Declared interface of a step.

use std::time::Duration;

use serde::Serialize;

use crate::params::ParameterSpec;

/// Input type tag that accepts documents of any type.
pub const ANY_TYPE: &str = "*";

/// One required input of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputSpec {
  /// Document type tag, or [`ANY_TYPE`].
  pub doc_type: String,
  /// Receive the whole stream at once instead of one document per run.
  pub aggregate: bool,
}

impl InputSpec {
  /// Consume one document of this type per run.
  pub fn one(doc_type: impl Into<String>) -> Self {
    Self {
      doc_type: doc_type.into(),
      aggregate: false,
    }
  }

  /// Drain the stream to its end and receive the full ordered sequence.
  pub fn all(doc_type: impl Into<String>) -> Self {
    Self {
      doc_type: doc_type.into(),
      aggregate: true,
    }
  }

  /// Whether this input accepts documents of any type.
  pub fn is_wildcard(&self) -> bool {
    self.doc_type == ANY_TYPE
  }

  /// Whether a document of `doc_type` can feed this input.
  pub fn accepts(&self, doc_type: &str) -> bool {
    self.is_wildcard() || self.doc_type == doc_type
  }
}

/// Everything the engine needs to know about a step without running it.
#[derive(Debug, Clone, Serialize)]
pub struct StepContract {
  pub name: String,
  pub description: String,
  pub requires: Vec<InputSpec>,
  pub produces: Vec<String>,
  pub parameters: Vec<ParameterSpec>,
  /// Wait bound for each required input. The engine default applies when
  /// unset.
  #[serde(skip_serializing_if = "Option::is_none", serialize_with = "opt_millis::serialize")]
  pub timeout: Option<Duration>,
}

impl StepContract {
  pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      description: description.into(),
      requires: Vec::new(),
      produces: Vec::new(),
      parameters: Vec::new(),
      timeout: None,
    }
  }

  pub fn requires(mut self, input: InputSpec) -> Self {
    self.requires.push(input);
    self
  }

  pub fn produces(mut self, doc_type: impl Into<String>) -> Self {
    self.produces.push(doc_type.into());
    self
  }

  pub fn parameter(mut self, spec: ParameterSpec) -> Self {
    self.parameters.push(spec);
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  /// Steps with no required inputs run unconditionally.
  pub fn is_source(&self) -> bool {
    self.requires.is_empty()
  }

  /// Steps that emit nothing write to an external sink.
  pub fn is_publisher(&self) -> bool {
    self.produces.is_empty()
  }

  pub fn declares_output(&self, doc_type: &str) -> bool {
    self.produces.iter().any(|t| t == doc_type)
  }
}

mod opt_millis {
  use std::time::Duration;

  use serde::Serializer;

  pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match value {
      Some(d) => s.serialize_u64(d.as_millis() as u64),
      None => s.serialize_none(),
    }
  }
}
