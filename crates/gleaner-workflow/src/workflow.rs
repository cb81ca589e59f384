//! Validated workflow graph.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use gleaner_step::{RegistryError, StepRegistry};
use tracing::debug;

use crate::error::ConfigurationError;
use crate::graph::Graph;
use crate::node::{Node, TIMEOUT_PARAMETER};
use crate::parser::{Statement, parse_statements};

/// A validated, acyclic workflow of bound nodes.
///
/// Read-only once built. The engine consumes it for one run.
#[derive(Debug)]
pub struct WorkflowGraph {
  nodes: HashMap<String, Node>,
  /// Node ids in declaration order.
  declared: Vec<String>,
  edges: Vec<(String, String)>,
  graph: Graph,
  topological: Vec<String>,
}

impl WorkflowGraph {
  /// Parse and validate a workflow specification.
  pub fn parse(text: &str, registry: &StepRegistry) -> Result<Self, ConfigurationError> {
    Self::from_statements(parse_statements(text)?, registry)
  }

  /// Assemble a graph from parsed statements, processed in order.
  pub fn from_statements(
    statements: Vec<Statement>,
    registry: &StepRegistry,
  ) -> Result<Self, ConfigurationError> {
    let mut nodes: HashMap<String, Node> = HashMap::new();
    let mut declared: Vec<String> = Vec::new();
    let mut edges: Vec<(String, String)> = Vec::new();

    for statement in statements {
      match statement {
        Statement::Binding {
          line,
          id,
          step,
          mut params,
        } => {
          if let Some(first) = nodes.get(&id) {
            return Err(ConfigurationError::DuplicateNode {
              id,
              line,
              first_line: first.line,
            });
          }

          let timeout = match params.remove(TIMEOUT_PARAMETER) {
            Some(raw) => Some(parse_timeout(&id, line, &raw)?),
            None => None,
          };

          let (contract, params, bound) =
            registry
              .bind(&step, &params)
              .map_err(|e| match e {
                RegistryError::Parameter { source, .. } => ConfigurationError::InvalidParameter {
                  id: id.clone(),
                  line,
                  source,
                },
                _ => ConfigurationError::UnknownStep {
                  id: id.clone(),
                  step: step.clone(),
                  line,
                },
              })?;

          debug!(node_id = %id, step = %step, line, "node bound");

          declared.push(id.clone());
          nodes.insert(
            id.clone(),
            Node {
              id,
              step_name: step,
              contract,
              params,
              step: bound,
              upstream: Vec::new(),
              timeout,
              line,
            },
          );
        }
        Statement::Dependency {
          line,
          sources,
          target,
        } => {
          for id in sources.iter().chain(std::iter::once(&target)) {
            if !nodes.contains_key(id) {
              return Err(ConfigurationError::UndefinedNode {
                id: id.clone(),
                line,
              });
            }
          }

          for source in sources {
            let edge = (source, target.clone());
            if edges.contains(&edge) {
              continue;
            }
            if let Some(node) = nodes.get_mut(&target) {
              node.upstream.push(edge.0.clone());
            }
            edges.push(edge);
          }
        }
      }
    }

    if declared.is_empty() {
      return Err(ConfigurationError::EmptyWorkflow);
    }

    let graph = Graph::new(&declared, &edges);
    detect_cycle(&declared, &graph)?;
    validate_wiring(&declared, &nodes)?;
    let topological = topological_sort(&declared, &graph);

    Ok(Self {
      nodes,
      declared,
      edges,
      graph,
      topological,
    })
  }

  /// Look up a node by id.
  pub fn node(&self, id: &str) -> Option<&Node> {
    self.nodes.get(id)
  }

  /// Nodes in declaration order.
  pub fn nodes(&self) -> impl Iterator<Item = &Node> {
    self.declared.iter().filter_map(|id| self.nodes.get(id))
  }

  /// Dependency edges `(from, to)` in declaration order.
  pub fn edges(&self) -> &[(String, String)] {
    &self.edges
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  /// A topological order; ties are broken by declaration order.
  pub fn topological_order(&self) -> &[String] {
    &self.topological
  }

  pub fn upstream(&self, id: &str) -> &[String] {
    self.graph.upstream(id)
  }

  pub fn downstream(&self, id: &str) -> &[String] {
    self.graph.downstream(id)
  }

  /// Nodes with no upstream edge, in declaration order.
  pub fn source_nodes(&self) -> &[String] {
    self.graph.entry_points()
  }

  /// Nodes with no downstream edge, in declaration order.
  pub fn terminal_nodes(&self) -> &[String] {
    self.graph.terminal_points()
  }

  pub fn len(&self) -> usize {
    self.declared.len()
  }

  pub fn is_empty(&self) -> bool {
    self.declared.is_empty()
  }

  /// Split into the adjacency structure and the nodes in topological order.
  pub fn into_parts(mut self) -> (Graph, Vec<Node>) {
    let nodes = self
      .topological
      .iter()
      .filter_map(|id| self.nodes.remove(id))
      .collect();
    (self.graph, nodes)
  }
}

fn parse_timeout(id: &str, line: usize, raw: &str) -> Result<Duration, ConfigurationError> {
  match raw.parse::<u64>() {
    Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
    _ => Err(ConfigurationError::InvalidParameter {
      id: id.to_string(),
      line,
      source: gleaner_step::ParameterError::Invalid {
        name: TIMEOUT_PARAMETER.to_string(),
        message: format!("expected a positive number of milliseconds, found '{}'", raw),
      },
    }),
  }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  OnStack,
  Done,
}

/// Depth-first search with a recursion stack.
fn detect_cycle(declared: &[String], graph: &Graph) -> Result<(), ConfigurationError> {
  fn visit<'a>(
    id: &'a str,
    graph: &'a Graph,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
  ) -> Result<(), ConfigurationError> {
    marks.insert(id, Mark::OnStack);
    stack.push(id);

    for next in graph.downstream(id) {
      match marks.get(next.as_str()).copied().unwrap_or(Mark::Unvisited) {
        Mark::OnStack => {
          let start = stack.iter().position(|s| *s == next.as_str()).unwrap_or(0);
          let mut cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
          cycle.push(next.clone());
          return Err(ConfigurationError::CyclicDependency { cycle });
        }
        Mark::Unvisited => visit(next, graph, marks, stack)?,
        Mark::Done => {}
      }
    }

    stack.pop();
    marks.insert(id, Mark::Done);
    Ok(())
  }

  let mut marks: HashMap<&str, Mark> = HashMap::new();
  let mut stack = Vec::new();
  for id in declared {
    if marks.get(id.as_str()).is_none() {
      visit(id, graph, &mut marks, &mut stack)?;
    }
  }
  Ok(())
}

/// Check declared input types against what upstream nodes produce.
fn validate_wiring(
  declared: &[String],
  nodes: &HashMap<String, Node>,
) -> Result<(), ConfigurationError> {
  for id in declared {
    let Some(node) = nodes.get(id) else { continue };

    if node.contract.is_source() {
      if let Some(upstream) = node.upstream.first() {
        return Err(ConfigurationError::UnconsumedInput {
          id: id.clone(),
          upstream: upstream.clone(),
        });
      }
      continue;
    }

    for input in &node.contract.requires {
      let satisfied = node.upstream.iter().any(|up| {
        nodes
          .get(up)
          .is_some_and(|u| input.is_wildcard() || u.contract.declares_output(&input.doc_type))
      });
      if !satisfied {
        return Err(ConfigurationError::UnsatisfiedInput {
          id: id.clone(),
          doc_type: input.doc_type.clone(),
        });
      }
    }
  }
  Ok(())
}

/// Kahn's algorithm, always taking the earliest-declared ready node.
fn topological_sort(declared: &[String], graph: &Graph) -> Vec<String> {
  let index: HashMap<&str, usize> = declared
    .iter()
    .enumerate()
    .map(|(i, id)| (id.as_str(), i))
    .collect();
  let mut in_degree: Vec<usize> = declared
    .iter()
    .map(|id| graph.upstream(id).len())
    .collect();

  let mut ready: BinaryHeap<Reverse<usize>> = in_degree
    .iter()
    .enumerate()
    .filter(|(_, d)| **d == 0)
    .map(|(i, _)| Reverse(i))
    .collect();

  let mut order = Vec::with_capacity(declared.len());
  while let Some(Reverse(i)) = ready.pop() {
    let id = &declared[i];
    order.push(id.clone());
    for next in graph.downstream(id) {
      if let Some(&j) = index.get(next.as_str()) {
        in_degree[j] -= 1;
        if in_degree[j] == 0 {
          ready.push(Reverse(j));
        }
      }
    }
  }
  order
}
