//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wait bound for a required input.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Configuration for the engine.
///
/// Loaded from JSON; every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Wait bound for steps that declare none and carry no `timeout_ms`.
  pub default_timeout_ms: u64,
  /// Capacity of every edge queue. `None` means unbounded, so `send` never
  /// blocks; with a capacity a producer waits for its consumer to drain.
  pub queue_capacity: Option<usize>,
  /// Keep the documents of every node in the report, not only terminal ones.
  pub collect_all_outputs: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      default_timeout_ms: DEFAULT_TIMEOUT_MS,
      queue_capacity: None,
      collect_all_outputs: false,
    }
  }
}

impl EngineConfig {
  pub fn default_timeout(&self) -> Duration {
    Duration::from_millis(self.default_timeout_ms)
  }

  /// Parse a JSON configuration document.
  pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text)
  }
}
