//! Gleaner Step
//!
//! This crate defines what the engine needs from a processing unit:
//!
//! - [`StepContract`]: the name, required and produced document types,
//!   recognized parameters and an optional input wait bound
//! - [`Step`]: the `run` entry point taking received documents and returning
//!   produced documents
//! - [`StepFactory`] and [`StepRegistry`]: an explicit name to implementation
//!   lookup handed to the engine at construction
//!
//! Collaborator logic (scheduler text parsers, schema serializers, sinks)
//! lives behind [`Step`] so the engine never depends on it directly.

mod contract;
mod error;
mod inputs;
mod params;
mod registry;
mod step;

pub use contract::{ANY_TYPE, InputSpec, StepContract};
pub use error::{ErrorKind, ParameterError, StepError};
pub use inputs::Inputs;
pub use params::{ParameterSpec, Parameters};
pub use registry::{RegistryError, StepFactory, StepRegistry};
pub use step::{Step, StepContext};
