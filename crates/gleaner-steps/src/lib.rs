//! Gleaner Steps
//!
//! Built-in steps that are useful in any workflow:
//!
//! - `static`: a source emitting one fixed document
//! - `command`: a source running an external collector and parsing its output
//! - `envelope`: aggregates a whole stream into one composite document
//! - `file_publisher` and `stdout_publisher`: write documents out
//!
//! [`builtin_registry`] returns a registry holding all of them.

mod command;
mod constant;
mod envelope;
mod parser;
mod publish;

use std::sync::Arc;

use gleaner_step::{Parameters, RegistryError, StepContract, StepRegistry};

pub use command::{CommandFactory, CommandStep};
pub use constant::{StaticFactory, StaticStep};
pub use envelope::{EnvelopeFactory, EnvelopeStep};
pub use parser::{JsonParser, KeyValueParser, ParseError, Record, RecordParser, parser_for};
pub use publish::{
  FilePublisher, FilePublisherFactory, STDOUT_PUBLISHER, StdoutPublisher, StdoutPublisherFactory,
  sanitize_id,
};

/// Replace a wildcard `produces` with the bound `type` parameter.
pub(crate) fn narrow_produces(mut contract: StepContract, params: &Parameters) -> StepContract {
  if let Some(doc_type) = params.get("type") {
    contract.produces = vec![doc_type.to_string()];
  }
  contract
}

/// A registry holding every built-in step.
pub fn builtin_registry() -> Result<StepRegistry, RegistryError> {
  let mut registry = StepRegistry::new();
  registry.register(Arc::new(StaticFactory))?;
  registry.register(Arc::new(CommandFactory))?;
  registry.register(Arc::new(EnvelopeFactory))?;
  registry.register(Arc::new(FilePublisherFactory))?;
  registry.register(Arc::new(StdoutPublisherFactory))?;
  Ok(registry)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_builtin_names() {
    let registry = builtin_registry().unwrap();
    let names: Vec<&str> = registry.names().collect();
    assert_eq!(
      names,
      ["command", "envelope", "file_publisher", "static", "stdout_publisher"]
    );
  }
}
