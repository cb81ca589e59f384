//! The `envelope` step: wraps a whole input stream into one document.

use std::sync::Arc;

use async_trait::async_trait;
use gleaner_document::Document;
use gleaner_step::{
  ANY_TYPE, InputSpec, Inputs, ParameterError, ParameterSpec, Parameters, Step, StepContext,
  StepContract, StepError, StepFactory,
};
use serde_json::{Value, json};

use crate::narrow_produces;

pub struct EnvelopeFactory;

impl StepFactory for EnvelopeFactory {
  fn contract(&self) -> StepContract {
    StepContract::new("envelope", "Wrap every received document into one")
      .requires(InputSpec::all(ANY_TYPE))
      .produces(ANY_TYPE)
      .parameter(ParameterSpec::optional("type", "Envelope type").with_default("envelope"))
      .parameter(ParameterSpec::required("id", "Envelope id"))
  }

  fn bound_contract(&self, params: &Parameters) -> StepContract {
    narrow_produces(self.contract(), params)
  }

  fn create(&self, params: &Parameters) -> Result<Arc<dyn Step>, ParameterError> {
    Ok(Arc::new(EnvelopeStep {
      doc_type: params.require("type")?.to_string(),
      id: params.require("id")?.to_string(),
    }))
  }
}

pub struct EnvelopeStep {
  doc_type: String,
  id: String,
}

#[async_trait]
impl Step for EnvelopeStep {
  async fn run(&self, ctx: &StepContext, inputs: Inputs) -> Result<Vec<Document>, StepError> {
    let documents: Vec<Value> = inputs
      .documents()
      .map(|d| {
        json!({
          "id": d.id(),
          "type": d.doc_type(),
          "source": d.source(),
          "body": d.body(),
        })
      })
      .collect();

    let body = json!({
      "count": documents.len(),
      "documents": documents,
    });
    Ok(vec![Document::new(
      self.id.as_str(),
      self.doc_type.as_str(),
      body,
      ctx.node_id.as_str(),
    )?])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio_util::sync::CancellationToken;

  #[tokio::test]
  async fn test_wraps_in_order() {
    let step = EnvelopeStep {
      doc_type: "envelope".to_string(),
      id: "all".to_string(),
    };
    let mut inputs = Inputs::empty();
    inputs.push(
      ANY_TYPE,
      vec![
        Document::new("q1", "queue", json!({"n": 1}), "a").unwrap().into_shared(),
        Document::new("h1", "host", json!({"n": 2}), "b").unwrap().into_shared(),
      ],
    );
    let ctx = StepContext::new("exec", "wrap", CancellationToken::new());

    let out = step.run(&ctx, inputs).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].source(), "wrap");
    let body = out[0].body();
    assert_eq!(body["count"], 2);
    assert_eq!(body["documents"][0]["id"], "q1");
    assert_eq!(body["documents"][1]["type"], "host");
    assert_eq!(body["documents"][1]["body"]["n"], 2);
  }

  #[tokio::test]
  async fn test_empty_stream() {
    let step = EnvelopeStep {
      doc_type: "envelope".to_string(),
      id: "all".to_string(),
    };
    let ctx = StepContext::new("exec", "wrap", CancellationToken::new());
    let out = step.run(&ctx, Inputs::empty()).await.unwrap();
    assert_eq!(out[0].body()["count"], 0);
  }
}
