//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendFactory, BackendRegistry};
use crate::error::ConfigError;
use crate::state::WeightTable;

/// Seconds a grouped backend call may take before it is abandoned.
pub const DEFAULT_QUERY_TIMEOUT: u64 = 10;

/// One configured monitoring backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Id objects use to reference this backend.
    pub id: String,
    /// Adapter type tag, e.g. `"static"`.
    pub backend_type: String,
    /// Adapter specific settings, passed through untouched.
    #[serde(default)]
    pub options: serde_json::Value,
}

impl BackendConfig {
    pub fn new(id: &str, backend_type: &str) -> Self {
        Self {
            id: id.to_string(),
            backend_type: backend_type.to_string(),
            options: serde_json::Value::Null,
        }
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-call timeout in seconds.
    pub query_timeout: u64,
    pub backends: Vec<BackendConfig>,
    pub weights: WeightTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            backends: Vec::new(),
            weights: WeightTable::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.weights.validate()?;
        Ok(config)
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn with_query_timeout(mut self, seconds: u64) -> Self {
        self.query_timeout = seconds;
        self
    }

    pub fn with_weights(mut self, weights: WeightTable) -> Self {
        self.weights = weights;
        self
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Registry for the configured backends. Adapters are not constructed yet.
    pub fn build_registry(&self, factory: &BackendFactory) -> Result<BackendRegistry, ConfigError> {
        BackendRegistry::new(factory, self.backends.iter().cloned())
    }
}
