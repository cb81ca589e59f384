//! The `static` source step: emits one fixed document per run.

use std::sync::Arc;

use async_trait::async_trait;
use gleaner_document::{Document, DocumentError};
use gleaner_step::{
  ANY_TYPE, Inputs, ParameterError, ParameterSpec, Parameters, Step, StepContext, StepContract,
  StepError, StepFactory,
};
use serde_json::Value;

use crate::narrow_produces;

pub struct StaticFactory;

impl StepFactory for StaticFactory {
  fn contract(&self) -> StepContract {
    StepContract::new("static", "Emit one fixed document")
      .produces(ANY_TYPE)
      .parameter(ParameterSpec::required("type", "Document type"))
      .parameter(ParameterSpec::required("id", "Document id"))
      .parameter(ParameterSpec::optional("body", "JSON body").with_default("{}"))
      .parameter(ParameterSpec::optional("source", "Recorded source").with_default("static"))
  }

  fn bound_contract(&self, params: &Parameters) -> StepContract {
    narrow_produces(self.contract(), params)
  }

  fn create(&self, params: &Parameters) -> Result<Arc<dyn Step>, ParameterError> {
    let body: Value = serde_json::from_str(params.require("body")?).map_err(|e| {
      ParameterError::Invalid {
        name: "body".to_string(),
        message: e.to_string(),
      }
    })?;

    // Validate eagerly so a bad binding fails at load time.
    let document = Document::new(
      params.require("id")?,
      params.require("type")?,
      body,
      params.require("source")?,
    )
    .map_err(|e| {
      let DocumentError::Incomplete { field } = &e;
      ParameterError::Invalid {
        name: field.to_string(),
        message: e.to_string(),
      }
    })?;

    Ok(Arc::new(StaticStep { document }))
  }
}

/// Emits a clone of the configured document on every run.
pub struct StaticStep {
  document: Document,
}

#[async_trait]
impl Step for StaticStep {
  async fn run(&self, _ctx: &StepContext, _inputs: Inputs) -> Result<Vec<Document>, StepError> {
    Ok(vec![self.document.clone()])
  }
}
