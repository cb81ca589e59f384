//! Integration tests for loading workflow specifications.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gleaner_document::Document;
use gleaner_step::{
  ANY_TYPE, InputSpec, Inputs, ParameterError, ParameterSpec, Step, StepContext, StepContract,
  StepError, StepRegistry,
};
use gleaner_workflow::{ConfigurationError, WorkflowGraph};

struct Nothing;

#[async_trait]
impl Step for Nothing {
  async fn run(&self, _ctx: &StepContext, _inputs: Inputs) -> Result<Vec<Document>, StepError> {
    Ok(Vec::new())
  }
}

fn nothing(_: &gleaner_step::Parameters) -> Result<Arc<dyn Step>, ParameterError> {
  Ok(Arc::new(Nothing))
}

fn test_registry() -> StepRegistry {
  let mut registry = StepRegistry::new();
  registry
    .register_fn(
      StepContract::new("source_step", "emits x")
        .produces("x")
        .parameter(ParameterSpec::optional("count", "how many")),
      nothing,
    )
    .unwrap();
  registry
    .register_fn(
      StepContract::new("sink_step", "x to y")
        .requires(InputSpec::one("x"))
        .produces("y")
        .timeout(Duration::from_secs(3)),
      nothing,
    )
    .unwrap();
  registry
    .register_fn(
      StepContract::new("needs_z", "requires z")
        .requires(InputSpec::one("z"))
        .produces("y"),
      nothing,
    )
    .unwrap();
  registry
    .register_fn(
      StepContract::new("publish", "writes anything").requires(InputSpec::one(ANY_TYPE)),
      nothing,
    )
    .unwrap();
  registry
    .register_fn(
      StepContract::new("wrap", "envelope")
        .requires(InputSpec::all(ANY_TYPE))
        .produces("envelope")
        .parameter(ParameterSpec::required("id", "envelope id")),
      nothing,
    )
    .unwrap();
  registry
}

#[test]
fn test_end_to_end_spec_loads() {
  let graph = WorkflowGraph::parse("a: source_step\nb: sink_step\na -> b", &test_registry())
    .expect("valid workflow");

  assert_eq!(graph.len(), 2);
  assert_eq!(graph.topological_order(), ["a", "b"]);
  assert_eq!(graph.upstream("b"), ["a"]);
  assert_eq!(graph.terminal_nodes(), ["b"]);
  assert_eq!(graph.source_nodes(), ["a"]);
  assert_eq!(graph.node("b").unwrap().upstream(), ["a"]);
  assert_eq!(graph.edges(), [("a".to_string(), "b".to_string())]);
}

#[test]
fn test_undefined_node_reports_id_and_line() {
  let err = WorkflowGraph::parse("a: source_step\n\na -> b\nb: sink_step", &test_registry())
    .unwrap_err();
  assert_eq!(
    err,
    ConfigurationError::UndefinedNode {
      id: "b".to_string(),
      line: 3
    }
  );
}

#[test]
fn test_duplicate_node() {
  let err = WorkflowGraph::parse("a: source_step\na: source_step", &test_registry()).unwrap_err();
  assert_eq!(
    err,
    ConfigurationError::DuplicateNode {
      id: "a".to_string(),
      line: 2,
      first_line: 1
    }
  );
}

#[test]
fn test_cycle_names_participants() {
  let spec = "\
s: source_step
a: publish
b: publish
c: publish
s -> a
a -> b
b -> c
c -> a
";
  let err = WorkflowGraph::parse(spec, &test_registry()).unwrap_err();
  let ConfigurationError::CyclicDependency { cycle } = err else {
    panic!("expected cycle error, got {err:?}");
  };
  assert_eq!(cycle, vec!["a", "b", "c", "a"]);
}

#[test]
fn test_self_loop_is_a_cycle() {
  let err = WorkflowGraph::parse("s: source_step\na: publish\ns -> a\na -> a", &test_registry())
    .unwrap_err();
  assert!(matches!(err, ConfigurationError::CyclicDependency { ref cycle } if cycle == &["a", "a"]));
}

#[test]
fn test_topological_order_breaks_ties_by_declaration() {
  let spec = "\
late: source_step
early: source_step
p2: publish
p1: publish
w: wrap id=all
early -> p1
late -> p2
p1, p2 -> w
";
  let graph = WorkflowGraph::parse(spec, &test_registry()).unwrap();
  assert_eq!(graph.topological_order(), ["late", "early", "p2", "p1", "w"]);
  assert_eq!(graph.upstream("w"), ["p1", "p2"]);
}

#[test]
fn test_duplicate_edge_is_ignored() {
  let graph = WorkflowGraph::parse("a: source_step\nb: sink_step\na -> b\na -> b", &test_registry())
    .unwrap();
  assert_eq!(graph.edges().len(), 1);
  assert_eq!(graph.node("b").unwrap().upstream().len(), 1);
}

#[test]
fn test_unknown_step() {
  let err = WorkflowGraph::parse("a: teleport", &test_registry()).unwrap_err();
  assert_eq!(
    err,
    ConfigurationError::UnknownStep {
      id: "a".to_string(),
      step: "teleport".to_string(),
      line: 1
    }
  );
}

#[test]
fn test_unrecognized_parameter() {
  let err = WorkflowGraph::parse("a: source_step colour=red", &test_registry()).unwrap_err();
  assert!(matches!(
    err,
    ConfigurationError::InvalidParameter {
      source: ParameterError::Unrecognized { .. },
      ..
    }
  ));
}

#[test]
fn test_missing_required_parameter() {
  let err = WorkflowGraph::parse("s: source_step\nw: wrap\ns -> w", &test_registry()).unwrap_err();
  assert!(matches!(
    err,
    ConfigurationError::InvalidParameter {
      source: ParameterError::MissingRequired { .. },
      line: 2,
      ..
    }
  ));
}

#[test]
fn test_timeout_parameter_is_reserved() {
  let graph = WorkflowGraph::parse(
    "a: source_step\nb: sink_step timeout_ms=250\na -> b",
    &test_registry(),
  )
  .unwrap();
  let node = graph.node("b").unwrap();
  assert_eq!(node.timeout_override(), Some(Duration::from_millis(250)));
  assert!(node.params().get("timeout_ms").is_none());
  assert_eq!(node.contract().timeout, Some(Duration::from_secs(3)));
}

#[test]
fn test_invalid_timeout_parameter() {
  let err = WorkflowGraph::parse("a: source_step timeout_ms=0", &test_registry()).unwrap_err();
  assert!(matches!(err, ConfigurationError::InvalidParameter { .. }));
}

#[test]
fn test_unsatisfied_input_type() {
  let err = WorkflowGraph::parse("a: source_step\nb: needs_z\na -> b", &test_registry())
    .unwrap_err();
  assert_eq!(
    err,
    ConfigurationError::UnsatisfiedInput {
      id: "b".to_string(),
      doc_type: "z".to_string()
    }
  );
}

#[test]
fn test_consumer_without_upstream() {
  let err = WorkflowGraph::parse("b: sink_step", &test_registry()).unwrap_err();
  assert!(matches!(err, ConfigurationError::UnsatisfiedInput { .. }));
}

#[test]
fn test_source_with_upstream() {
  let err = WorkflowGraph::parse("a: source_step\nb: source_step\na -> b", &test_registry())
    .unwrap_err();
  assert_eq!(
    err,
    ConfigurationError::UnconsumedInput {
      id: "b".to_string(),
      upstream: "a".to_string()
    }
  );
}

#[test]
fn test_empty_workflow() {
  let err = WorkflowGraph::parse("# nothing here\n\n", &test_registry()).unwrap_err();
  assert_eq!(err, ConfigurationError::EmptyWorkflow);
}

#[test]
fn test_into_parts_yields_topological_nodes() {
  let graph = WorkflowGraph::parse(
    "b0: source_step\na0: source_step\nx: sink_step\nb0 -> x\na0 -> x",
    &test_registry(),
  )
  .unwrap();
  let (adjacency, nodes) = graph.into_parts();
  let ids: Vec<&str> = nodes.iter().map(|n| n.id()).collect();
  assert_eq!(ids, vec!["b0", "a0", "x"]);
  assert_eq!(adjacency.downstream("a0"), ["x"]);
}
