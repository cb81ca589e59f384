//! Workflow specification parser.
//!
//! Produces a flat list of statements; reference checks happen when the
//! statements are assembled into a [`crate::WorkflowGraph`].

use gleaner_step::Parameters;

use crate::error::ConfigurationError;

/// One statement of a workflow specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
  /// `id: step_name key=value ...`
  Binding {
    line: usize,
    id: String,
    step: String,
    params: Parameters,
  },
  /// `source1, source2 -> target`
  Dependency {
    line: usize,
    sources: Vec<String>,
    target: String,
  },
}

impl Statement {
  pub fn line(&self) -> usize {
    match self {
      Statement::Binding { line, .. } | Statement::Dependency { line, .. } => *line,
    }
  }
}

/// Whether `s` is a valid node id or parameter name.
pub(crate) fn is_identifier(s: &str) -> bool {
  !s.is_empty()
    && s
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Parse a specification into statements. Line numbers are 1-based.
pub fn parse_statements(text: &str) -> Result<Vec<Statement>, ConfigurationError> {
  let mut statements = Vec::new();

  for (index, raw) in text.lines().enumerate() {
    let line = index + 1;
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
      continue;
    }

    let binding_id = trimmed
      .split_once(':')
      .map(|(id, rest)| (id.trim(), rest))
      .filter(|(id, _)| is_identifier(id));

    let statement = match binding_id {
      Some((id, rest)) => parse_binding(line, id, rest)?,
      None if trimmed.contains("->") => parse_dependency(line, trimmed)?,
      None => {
        return Err(ConfigurationError::syntax(
          line,
          format!("expected 'id: step ...' or 'a, b -> c', found '{}'", trimmed),
        ));
      }
    };
    statements.push(statement);
  }

  Ok(statements)
}

fn parse_binding(line: usize, id: &str, rest: &str) -> Result<Statement, ConfigurationError> {
  let mut tokens = tokenize(line, rest)?.into_iter();
  let step = tokens
    .next()
    .ok_or_else(|| ConfigurationError::syntax(line, format!("node '{}' names no step", id)))?;
  if !is_identifier(&step) {
    return Err(ConfigurationError::syntax(
      line,
      format!("invalid step name '{}'", step),
    ));
  }

  let mut params = Parameters::new();
  for token in tokens {
    let (name, value) = token.split_once('=').ok_or_else(|| {
      ConfigurationError::syntax(line, format!("expected key=value, found '{}'", token))
    })?;
    if !is_identifier(name) {
      return Err(ConfigurationError::syntax(
        line,
        format!("invalid parameter name '{}'", name),
      ));
    }
    if params.insert(name, value).is_some() {
      return Err(ConfigurationError::syntax(
        line,
        format!("parameter '{}' given twice", name),
      ));
    }
  }

  Ok(Statement::Binding {
    line,
    id: id.to_string(),
    step,
    params,
  })
}

fn parse_dependency(line: usize, text: &str) -> Result<Statement, ConfigurationError> {
  let mut sides = text.split("->");
  let (Some(left), Some(right), None) = (sides.next(), sides.next(), sides.next()) else {
    return Err(ConfigurationError::syntax(
      line,
      "dependency must contain exactly one '->'",
    ));
  };

  let target = right.trim();
  if !is_identifier(target) {
    return Err(ConfigurationError::syntax(
      line,
      format!("invalid dependency target '{}'", target),
    ));
  }

  let mut sources = Vec::new();
  for source in left.split(',').map(str::trim) {
    if !is_identifier(source) {
      return Err(ConfigurationError::syntax(
        line,
        format!("invalid dependency source '{}'", source),
      ));
    }
    sources.push(source.to_string());
  }

  Ok(Statement::Dependency {
    line,
    sources,
    target: target.to_string(),
  })
}

/// Split on whitespace. Double quotes group characters, with `\"` and `\\`
/// escapes inside quotes.
fn tokenize(line: usize, text: &str) -> Result<Vec<String>, ConfigurationError> {
  let mut tokens = Vec::new();
  let mut current = String::new();
  let mut in_token = false;
  let mut quoted = false;
  let mut chars = text.chars();

  while let Some(c) = chars.next() {
    match c {
      '"' => {
        quoted = !quoted;
        in_token = true;
      }
      '\\' if quoted => match chars.next() {
        Some(escaped @ ('"' | '\\')) => current.push(escaped),
        Some(other) => {
          current.push('\\');
          current.push(other);
        }
        None => current.push('\\'),
      },
      c if c.is_whitespace() && !quoted => {
        if in_token {
          tokens.push(std::mem::take(&mut current));
          in_token = false;
        }
      }
      c => {
        current.push(c);
        in_token = true;
      }
    }
  }

  if quoted {
    return Err(ConfigurationError::syntax(line, "unterminated quote"));
  }
  if in_token {
    tokens.push(current);
  }

  Ok(tokens)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_binding_and_dependency() {
    let text = "# collectors\n\na: source_step\nb: sink_step\na -> b\n";
    let statements = parse_statements(text).unwrap();
    assert_eq!(statements.len(), 3);
    assert_eq!(
      statements[0],
      Statement::Binding {
        line: 3,
        id: "a".to_string(),
        step: "source_step".to_string(),
        params: Parameters::new(),
      }
    );
    assert_eq!(
      statements[2],
      Statement::Dependency {
        line: 5,
        sources: vec!["a".to_string()],
        target: "b".to_string(),
      }
    );
  }

  #[test]
  fn test_parse_parameters_with_quotes() {
    let text = r#"s: static type=x id=x1 body="{\"name\": \"batch queue\"}""#;
    let statements = parse_statements(text).unwrap();
    let Statement::Binding { params, .. } = &statements[0] else {
      panic!("expected binding");
    };
    assert_eq!(params.get("type"), Some("x"));
    assert_eq!(params.get("body"), Some(r#"{"name": "batch queue"}"#));
  }

  #[test]
  fn test_parse_multiple_sources() {
    let statements = parse_statements("q, h -> wrap").unwrap();
    assert_eq!(
      statements[0],
      Statement::Dependency {
        line: 1,
        sources: vec!["q".to_string(), "h".to_string()],
        target: "wrap".to_string(),
      }
    );
  }

  #[test]
  fn test_arrow_inside_quoted_parameter_is_a_binding() {
    let statements = parse_statements(r#"c: command program=echo args="a -> b""#).unwrap();
    assert!(matches!(statements[0], Statement::Binding { .. }));
  }

  #[test]
  fn test_rejects_chained_arrows() {
    let err = parse_statements("a -> b -> c").unwrap_err();
    assert!(matches!(err, ConfigurationError::Syntax { line: 1, .. }));
  }

  #[test]
  fn test_rejects_garbage_line() {
    let err = parse_statements("a: s\nthis is not a statement").unwrap_err();
    assert!(matches!(err, ConfigurationError::Syntax { line: 2, .. }));
  }

  #[test]
  fn test_rejects_bare_token_parameter() {
    let err = parse_statements("a: s verbose").unwrap_err();
    assert!(matches!(err, ConfigurationError::Syntax { .. }));
  }

  #[test]
  fn test_rejects_repeated_parameter() {
    let err = parse_statements("a: s k=1 k=2").unwrap_err();
    assert!(matches!(err, ConfigurationError::Syntax { .. }));
  }

  #[test]
  fn test_rejects_unterminated_quote() {
    let err = parse_statements("a: s k=\"open").unwrap_err();
    assert_eq!(
      err,
      ConfigurationError::Syntax {
        line: 1,
        message: "unterminated quote".to_string()
      }
    );
  }

  #[test]
  fn test_rejects_missing_step_name() {
    assert!(parse_statements("a:").is_err());
  }

  #[test]
  fn test_rejects_empty_source() {
    assert!(parse_statements(", a -> b").is_err());
  }
}
