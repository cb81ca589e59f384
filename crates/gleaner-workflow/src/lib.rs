//! Gleaner Workflow
//!
//! This crate turns a workflow specification into a validated
//! [`WorkflowGraph`] ready for the engine.
//!
//! The specification has two statement kinds; lines starting with `#` are
//! comments:
//!
//! ```text
//! # bindings: id, step name, parameters
//! shares: command program=qstat type=computing_share id_field=name
//! wrap: envelope id=shares
//! out: file_publisher dir=/var/spool/gleaner
//!
//! # dependencies: sources on the left, consumer on the right
//! shares -> wrap
//! wrap -> out
//! ```
//!
//! Loading is all-or-nothing: undefined ids, duplicate bindings, cycles,
//! unknown steps, bad parameters and unsatisfiable input types are all
//! reported as a [`ConfigurationError`] before any step executes.

mod error;
mod graph;
mod node;
mod parser;
mod workflow;

pub use error::ConfigurationError;
pub use graph::Graph;
pub use node::{Node, TIMEOUT_PARAMETER};
pub use parser::{Statement, parse_statements};
pub use workflow::WorkflowGraph;
