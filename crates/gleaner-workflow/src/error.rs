use gleaner_step::ParameterError;
use thiserror::Error;

/// Errors that make a workflow specification unusable.
///
/// All of these are raised at load time, before any step executes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
  /// A statement could not be parsed.
  #[error("line {line}: {message}")]
  Syntax { line: usize, message: String },

  /// A dependency references an id with no prior binding.
  #[error("line {line}: undefined node '{id}'")]
  UndefinedNode { id: String, line: usize },

  /// The same id is bound twice.
  #[error("line {line}: duplicate node '{id}' (first bound on line {first_line})")]
  DuplicateNode {
    id: String,
    line: usize,
    first_line: usize,
  },

  /// The dependencies form a cycle. The first id is repeated at the end.
  #[error("cyclic dependency: {}", cycle.join(" -> "))]
  CyclicDependency { cycle: Vec<String> },

  /// A binding names a step that is not registered.
  #[error("line {line}: node '{id}' uses unknown step '{step}'")]
  UnknownStep {
    id: String,
    step: String,
    line: usize,
  },

  /// A binding supplies parameters the step rejects.
  #[error("line {line}: node '{id}': {source}")]
  InvalidParameter {
    id: String,
    line: usize,
    #[source]
    source: ParameterError,
  },

  /// No upstream of the node produces a type it requires.
  #[error("node '{id}' requires '{doc_type}' but no upstream node produces it")]
  UnsatisfiedInput { id: String, doc_type: String },

  /// The node accepts no inputs but has upstream nodes.
  #[error("node '{id}' accepts no inputs but depends on '{upstream}'")]
  UnconsumedInput { id: String, upstream: String },

  /// The specification binds no nodes.
  #[error("workflow has no nodes")]
  EmptyWorkflow,
}

impl ConfigurationError {
  pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
    Self::Syntax {
      line,
      message: message.into(),
    }
  }
}
