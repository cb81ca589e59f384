//! Step registry.
//!
//! The registry maps step names, as written in workflow bindings, to the
//! factories that construct them. It is built explicitly and handed to the
//! engine; there is no process-wide registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::contract::StepContract;
use crate::error::ParameterError;
use crate::params::Parameters;
use crate::step::Step;

/// Errors raised by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// No factory is registered under this name.
  #[error("unknown step '{name}'")]
  UnknownStep { name: String },

  /// A factory is already registered under this name.
  #[error("step '{name}' is already registered")]
  AlreadyRegistered { name: String },

  /// The step rejected its parameters.
  #[error("step '{name}': {source}")]
  Parameter {
    name: String,
    #[source]
    source: ParameterError,
  },
}

/// Builds bound step instances from validated parameters.
pub trait StepFactory: Send + Sync {
  /// The declared interface of steps built by this factory.
  fn contract(&self) -> StepContract;

  /// The contract of an instance bound with `params`.
  ///
  /// Steps whose output type is picked by a parameter narrow `produces`
  /// here so the graph can check wiring against the concrete type.
  fn bound_contract(&self, params: &Parameters) -> StepContract {
    let _ = params;
    self.contract()
  }

  /// Build a step. `params` has already been validated against
  /// [`StepContract::parameters`] with defaults filled in.
  fn create(&self, params: &Parameters) -> Result<Arc<dyn Step>, ParameterError>;
}

struct FnFactory<F> {
  contract: StepContract,
  build: F,
}

impl<F> StepFactory for FnFactory<F>
where
  F: Fn(&Parameters) -> Result<Arc<dyn Step>, ParameterError> + Send + Sync,
{
  fn contract(&self) -> StepContract {
    self.contract.clone()
  }

  fn create(&self, params: &Parameters) -> Result<Arc<dyn Step>, ParameterError> {
    (self.build)(params)
  }
}

/// Registry of step factories keyed by step name.
#[derive(Default, Clone)]
pub struct StepRegistry {
  factories: BTreeMap<String, Arc<dyn StepFactory>>,
}

impl StepRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a factory under its contract name.
  pub fn register(&mut self, factory: Arc<dyn StepFactory>) -> Result<(), RegistryError> {
    let name = factory.contract().name;
    if self.factories.contains_key(&name) {
      return Err(RegistryError::AlreadyRegistered { name });
    }
    self.factories.insert(name, factory);
    Ok(())
  }

  /// Register a closure as the factory for `contract`.
  pub fn register_fn<F>(&mut self, contract: StepContract, build: F) -> Result<(), RegistryError>
  where
    F: Fn(&Parameters) -> Result<Arc<dyn Step>, ParameterError> + Send + Sync + 'static,
  {
    self.register(Arc::new(FnFactory { contract, build }))
  }

  pub fn get(&self, name: &str) -> Option<&Arc<dyn StepFactory>> {
    self.factories.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.factories.contains_key(name)
  }

  /// Registered step names in sorted order.
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.factories.keys().map(String::as_str)
  }

  /// Contracts of every registered step in name order.
  pub fn contracts(&self) -> Vec<StepContract> {
    self.factories.values().map(|f| f.contract()).collect()
  }

  /// Validate `params` against the step's schema and build an instance.
  ///
  /// Returns the contract, the validated parameters and the step.
  pub fn bind(
    &self,
    name: &str,
    params: &Parameters,
  ) -> Result<(StepContract, Parameters, Arc<dyn Step>), RegistryError> {
    let factory = self.get(name).ok_or_else(|| RegistryError::UnknownStep {
      name: name.to_string(),
    })?;
    let contract = factory.contract();

    let validated = params
      .validate(&contract.parameters)
      .map_err(|source| RegistryError::Parameter {
        name: name.to_string(),
        source,
      })?;

    let step = factory
      .create(&validated)
      .map_err(|source| RegistryError::Parameter {
        name: name.to_string(),
        source,
      })?;

    Ok((factory.bound_contract(&validated), validated, step))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::contract::InputSpec;
  use crate::error::StepError;
  use crate::inputs::Inputs;
  use crate::params::ParameterSpec;
  use crate::step::StepContext;
  use async_trait::async_trait;
  use gleaner_document::Document;
  use tokio_util::sync::CancellationToken;

  struct Echo {
    doc_type: String,
  }

  #[async_trait]
  impl Step for Echo {
    async fn run(&self, ctx: &StepContext, _inputs: Inputs) -> Result<Vec<Document>, StepError> {
      Ok(vec![Document::new(
        "e1",
        self.doc_type.clone(),
        serde_json::Value::Null,
        ctx.node_id.clone(),
      )?])
    }
  }

  fn echo_registry() -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry
      .register_fn(
        StepContract::new("echo", "emit one document")
          .produces("x")
          .parameter(ParameterSpec::optional("type", "doc type").with_default("x")),
        |params| {
          let doc_type = params.require("type")?.to_string();
          if doc_type.is_empty() {
            return Err(ParameterError::Invalid {
              name: "type".to_string(),
              message: "must not be empty".to_string(),
            });
          }
          Ok(Arc::new(Echo { doc_type }) as Arc<dyn Step>)
        },
      )
      .unwrap();
    registry
  }

  #[test]
  fn test_register_twice_fails() {
    let mut registry = echo_registry();
    let err = registry
      .register_fn(StepContract::new("echo", ""), |_| {
        Err(ParameterError::Invalid {
          name: "x".to_string(),
          message: "unused".to_string(),
        })
      })
      .unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
  }

  #[test]
  fn test_bind_unknown_step() {
    let registry = echo_registry();
    let err = registry.bind("missing", &Parameters::new()).err().unwrap();
    assert!(matches!(err, RegistryError::UnknownStep { ref name } if name == "missing"));
  }

  #[test]
  fn test_bind_rejects_unrecognized_parameter() {
    let registry = echo_registry();
    let params: Parameters = [("colour", "red")].into_iter().collect();
    let err = registry.bind("echo", &params).err().unwrap();
    assert!(matches!(
      err,
      RegistryError::Parameter {
        source: ParameterError::Unrecognized { .. },
        ..
      }
    ));
  }

  #[test]
  fn test_bind_factory_rejection() {
    let registry = echo_registry();
    let params: Parameters = [("type", "")].into_iter().collect();
    let err = registry.bind("echo", &params).err().unwrap();
    assert!(matches!(
      err,
      RegistryError::Parameter {
        source: ParameterError::Invalid { .. },
        ..
      }
    ));
  }

  #[tokio::test]
  async fn test_bound_step_runs() {
    let registry = echo_registry();
    let (contract, params, step) = registry.bind("echo", &Parameters::new()).unwrap();
    assert_eq!(contract.name, "echo");
    assert_eq!(params.get("type"), Some("x"));
    assert!(contract.requires.iter().all(|i: &InputSpec| !i.aggregate));

    let ctx = StepContext::new("exec", "n1", CancellationToken::new());
    let docs = step.run(&ctx, Inputs::empty()).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].source(), "n1");
  }

  struct Typed;

  impl StepFactory for Typed {
    fn contract(&self) -> StepContract {
      StepContract::new("typed", "emits the configured type")
        .produces(crate::contract::ANY_TYPE)
        .parameter(ParameterSpec::required("type", "doc type"))
    }

    fn bound_contract(&self, params: &Parameters) -> StepContract {
      let mut contract = self.contract();
      contract.produces = params.get("type").map(String::from).into_iter().collect();
      contract
    }

    fn create(&self, params: &Parameters) -> Result<Arc<dyn Step>, ParameterError> {
      Ok(Arc::new(Echo {
        doc_type: params.require("type")?.to_string(),
      }))
    }
  }

  #[test]
  fn test_bind_narrows_contract() {
    let mut registry = StepRegistry::new();
    registry.register(Arc::new(Typed)).unwrap();
    let params: Parameters = [("type", "queue")].into_iter().collect();

    let (contract, _, _) = registry.bind("typed", &params).unwrap();
    assert_eq!(contract.produces, ["queue"]);
    assert!(contract.declares_output("queue"));
    assert_eq!(registry.contracts()[0].produces, ["*"]);
  }

  #[test]
  fn test_names_sorted() {
    let mut registry = echo_registry();
    registry
      .register_fn(StepContract::new("alpha", ""), |_| {
        Ok(Arc::new(Echo {
          doc_type: "a".to_string(),
        }) as Arc<dyn Step>)
      })
      .unwrap();
    let names: Vec<&str> = registry.names().collect();
    assert_eq!(names, vec!["alpha", "echo"]);
    assert_eq!(registry.contracts().len(), 2);
  }
}
