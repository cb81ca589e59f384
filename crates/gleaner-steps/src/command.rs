//! The `command` source step.
//!
//! Runs an external collector program, parses its standard output into
//! records and turns each record into a document. The program runs under its
//! own deadline and is killed if the deadline passes or the run is cancelled.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gleaner_document::{Document, DocumentId};
use gleaner_step::{
  ANY_TYPE, Inputs, ParameterError, ParameterSpec, Parameters, Step, StepContext, StepContract,
  StepError, StepFactory,
};
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::narrow_produces;
use crate::parser::{RecordParser, parser_for};

/// Default deadline for the external program in milliseconds.
const DEFAULT_DEADLINE_MS: &str = "10000";

pub struct CommandFactory;

impl StepFactory for CommandFactory {
  fn contract(&self) -> StepContract {
    StepContract::new("command", "Run a collector program and parse its output")
      .produces(ANY_TYPE)
      .parameter(ParameterSpec::required("program", "Program to execute"))
      .parameter(ParameterSpec::optional("args", "Whitespace separated arguments"))
      .parameter(ParameterSpec::required("type", "Type of the emitted documents"))
      .parameter(
        ParameterSpec::optional("format", "Output format: key_value or json")
          .with_default("key_value"),
      )
      .parameter(ParameterSpec::required("id_field", "Record field identifying a document"))
      .parameter(
        ParameterSpec::optional("deadline_ms", "Deadline for the program")
          .with_default(DEFAULT_DEADLINE_MS),
      )
  }

  fn bound_contract(&self, params: &Parameters) -> StepContract {
    narrow_produces(self.contract(), params)
  }

  fn create(&self, params: &Parameters) -> Result<Arc<dyn Step>, ParameterError> {
    let format = params.require("format")?;
    let parser = parser_for(format).ok_or_else(|| ParameterError::Invalid {
      name: "format".to_string(),
      message: format!("unknown format '{}'", format),
    })?;

    let deadline_ms: u64 = params.parse("deadline_ms")?.unwrap_or_default();
    if deadline_ms == 0 {
      return Err(ParameterError::Invalid {
        name: "deadline_ms".to_string(),
        message: "must be positive".to_string(),
      });
    }

    Ok(Arc::new(CommandStep {
      program: params.require("program")?.to_string(),
      args: params
        .get("args")
        .map(|a| a.split_whitespace().map(String::from).collect())
        .unwrap_or_default(),
      doc_type: params.require("type")?.to_string(),
      id_field: params.require("id_field")?.to_string(),
      parser,
      deadline: Duration::from_millis(deadline_ms),
    }))
  }
}

pub struct CommandStep {
  program: String,
  args: Vec<String>,
  doc_type: String,
  id_field: String,
  parser: Arc<dyn RecordParser>,
  deadline: Duration,
}

impl CommandStep {
  async fn output(&self, ctx: &StepContext) -> Result<String, StepError> {
    let child = Command::new(&self.program)
      .args(&self.args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| StepError::execution(format!("failed to spawn '{}': {}", self.program, e)))?;

    // Dropping the wait future drops the child, which kills it.
    let output = tokio::select! {
      biased;
      _ = ctx.cancel.cancelled() => return Err(StepError::Cancelled),
      result = tokio::time::timeout(self.deadline, child.wait_with_output()) => match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
          return Err(StepError::execution(format!("failed to wait for '{}': {}", self.program, e)));
        }
        Err(_) => {
          return Err(StepError::execution(format!(
            "'{}' exceeded its deadline of {}ms",
            self.program,
            self.deadline.as_millis()
          )));
        }
      }
    };

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(StepError::execution(format!(
        "'{}' exited with {}: {}",
        self.program,
        output.status,
        stderr.trim()
      )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }

  fn record_id(&self, index: usize, record: &serde_json::Map<String, Value>) -> Result<String, StepError> {
    let value = record.get(&self.id_field).ok_or_else(|| {
      StepError::execution(format!("record {} has no field '{}'", index, self.id_field))
    })?;
    let id = match value {
      Value::String(s) => s.clone(),
      Value::Number(n) => n.to_string(),
      Value::Bool(b) => b.to_string(),
      _ => {
        return Err(StepError::execution(format!(
          "record {}: field '{}' is not a scalar",
          index, self.id_field
        )));
      }
    };
    if id.trim().is_empty() {
      return Err(StepError::execution(format!(
        "record {}: field '{}' is empty",
        index, self.id_field
      )));
    }
    Ok(id)
  }
}

#[async_trait]
impl Step for CommandStep {
  async fn run(&self, ctx: &StepContext, _inputs: Inputs) -> Result<Vec<Document>, StepError> {
    let stdout = self.output(ctx).await?;
    let records = self
      .parser
      .parse(&stdout)
      .map_err(|e| StepError::execution(format!("'{}' output: {}", self.program, e)))?;
    debug!(
      program = %self.program,
      parser = self.parser.name(),
      records = records.len(),
      "collector_output_parsed"
    );

    records
      .into_iter()
      .enumerate()
      .map(|(index, record)| -> Result<Document, StepError> {
        let id = DocumentId::urn(&self.doc_type, [self.record_id(index, &record)?]);
        Ok(Document::new(
          id,
          self.doc_type.as_str(),
          Value::Object(record),
          ctx.node_id.as_str(),
        )?)
      })
      .collect()
  }
}
