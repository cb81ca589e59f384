//! Publishing steps. They consume any document type and emit nothing.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use gleaner_document::{Document, Representation, representation_for};
use gleaner_step::{
  ANY_TYPE, InputSpec, Inputs, ParameterError, ParameterSpec, Parameters, Step, StepContext,
  StepContract, StepError, StepFactory,
};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Registered name of the step that writes documents to standard output.
pub const STDOUT_PUBLISHER: &str = "stdout_publisher";

fn representation(params: &Parameters) -> Result<Arc<dyn Representation>, ParameterError> {
  let format = params.require("format")?;
  representation_for(format).ok_or_else(|| ParameterError::Invalid {
    name: "format".to_string(),
    message: format!("unknown format '{}'", format),
  })
}

fn format_parameter() -> ParameterSpec {
  ParameterSpec::optional("format", "Representation: json or text").with_default("json")
}

/// Turn a document id into a safe file stem.
pub fn sanitize_id(id: &str) -> String {
  id.chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
        c
      } else {
        '_'
      }
    })
    .collect()
}

pub struct FilePublisherFactory;

impl StepFactory for FilePublisherFactory {
  fn contract(&self) -> StepContract {
    StepContract::new("file_publisher", "Write each document to a directory")
      .requires(InputSpec::one(ANY_TYPE))
      .parameter(ParameterSpec::required("dir", "Target directory"))
      .parameter(format_parameter())
  }

  fn create(&self, params: &Parameters) -> Result<Arc<dyn Step>, ParameterError> {
    Ok(Arc::new(FilePublisher {
      dir: PathBuf::from(params.require("dir")?),
      representation: representation(params)?,
    }))
  }
}

/// Writes `<dir>/<sanitized id>.<ext>` per document.
pub struct FilePublisher {
  dir: PathBuf,
  representation: Arc<dyn Representation>,
}

#[async_trait]
impl Step for FilePublisher {
  async fn run(&self, _ctx: &StepContext, inputs: Inputs) -> Result<Vec<Document>, StepError> {
    fs::create_dir_all(&self.dir).await.map_err(|e| {
      StepError::execution(format!("failed to create '{}': {}", self.dir.display(), e))
    })?;

    for document in inputs.documents() {
      let encoded = self.representation.encode(document)?;
      let path = self.dir.join(format!(
        "{}.{}",
        sanitize_id(document.id()),
        self.representation.extension()
      ));
      fs::write(&path, &encoded.bytes)
        .await
        .map_err(|e| StepError::execution(format!("failed to write '{}': {}", path.display(), e)))?;
      debug!(document_id = %document.id(), path = %path.display(), "document_published");
    }
    Ok(Vec::new())
  }
}

pub struct StdoutPublisherFactory;

impl StepFactory for StdoutPublisherFactory {
  fn contract(&self) -> StepContract {
    StepContract::new(STDOUT_PUBLISHER, "Write each document to standard output")
      .requires(InputSpec::one(ANY_TYPE))
      .parameter(format_parameter())
  }

  fn create(&self, params: &Parameters) -> Result<Arc<dyn Step>, ParameterError> {
    Ok(Arc::new(StdoutPublisher {
      representation: representation(params)?,
    }))
  }
}

pub struct StdoutPublisher {
  representation: Arc<dyn Representation>,
}

#[async_trait]
impl Step for StdoutPublisher {
  async fn run(&self, _ctx: &StepContext, inputs: Inputs) -> Result<Vec<Document>, StepError> {
    let mut stdout = tokio::io::stdout();
    for document in inputs.documents() {
      let encoded = self.representation.encode(document)?;
      let mut bytes = encoded.bytes;
      if !bytes.ends_with(b"\n") {
        bytes.push(b'\n');
      }
      stdout
        .write_all(&bytes)
        .await
        .map_err(|e| StepError::execution(format!("failed to write to stdout: {}", e)))?;
    }
    stdout
      .flush()
      .await
      .map_err(|e| StepError::execution(format!("failed to flush stdout: {}", e)))?;
    Ok(Vec::new())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sanitize_id() {
    assert_eq!(sanitize_id("urn:gleaner:queue:short"), "urn_gleaner_queue_short");
    assert_eq!(sanitize_id("../etc/passwd"), ".._etc_passwd");
    assert_eq!(sanitize_id("host-01.example"), "host-01.example");
  }

  #[test]
  fn test_unknown_format_rejected() {
    let params: Parameters = [("dir", "/tmp"), ("format", "xml")].into_iter().collect();
    let err = FilePublisherFactory.create(&params).err().unwrap();
    assert!(matches!(err, ParameterError::Invalid { ref name, .. } if name == "format"));
  }
}
