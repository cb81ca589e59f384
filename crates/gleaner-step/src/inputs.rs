//! Documents handed to one invocation of a step.

use gleaner_document::SharedDocument;

use crate::error::StepError;

/// Received documents, grouped by the required input they satisfy.
///
/// A non-aggregating input holds exactly one document; an aggregating input
/// holds the full ordered stream, possibly empty.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
  slots: Vec<(String, Vec<SharedDocument>)>,
}

impl Inputs {
  /// Inputs for a source step.
  pub fn empty() -> Self {
    Self::default()
  }

  /// Append the documents delivered for the input declared as `doc_type`.
  pub fn push(&mut self, doc_type: impl Into<String>, documents: Vec<SharedDocument>) {
    self.slots.push((doc_type.into(), documents));
  }

  /// The single document delivered for `doc_type`.
  pub fn one(&self, doc_type: &str) -> Result<&SharedDocument, StepError> {
    self
      .all(doc_type)
      .first()
      .ok_or_else(|| StepError::execution(format!("no input document of type '{}'", doc_type)))
  }

  /// Every document delivered for `doc_type`, in arrival order.
  pub fn all(&self, doc_type: &str) -> &[SharedDocument] {
    self
      .slots
      .iter()
      .find(|(t, _)| t == doc_type)
      .map(|(_, docs)| docs.as_slice())
      .unwrap_or(&[])
  }

  /// Every delivered document across all inputs.
  pub fn documents(&self) -> impl Iterator<Item = &SharedDocument> {
    self.slots.iter().flat_map(|(_, docs)| docs.iter())
  }

  /// Total number of delivered documents.
  pub fn len(&self) -> usize {
    self.slots.iter().map(|(_, docs)| docs.len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
