//! Error types.
//!
//! Backend adapters report [`AdapterError`]. The registry and the query batcher
//! wrap those into [`BackendError`], which is what ends up attached to objects as
//! a [`Problem`]. Weight table lookups that fail produce an [`AggregationError`].

use std::time::Duration;

use thiserror::Error;

/// Errors a backend adapter can return from construction or a fetch call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// Operation not provided by this backend.
    #[error("Feature not supported: {0}")]
    Unsupported(String),

    /// The backend rejected or failed the query.
    #[error("Query failed: {0}")]
    Query(String),
}

/// Backend failures as seen by the registry and the query batcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// No backend with this id was configured.
    #[error("Backend {backend_id} is not configured")]
    NotConfigured { backend_id: String },

    /// Adapter construction failed. Cached and re-raised for the registry's lifetime.
    #[error("Backend {backend_id} could not be initialized: {source}")]
    Init {
        backend_id: String,
        #[source]
        source: AdapterError,
    },

    /// A grouped fetch call failed at runtime.
    #[error("Connection Problem (Backend: {backend_id}): {source}")]
    Query {
        backend_id: String,
        #[source]
        source: AdapterError,
    },

    /// A grouped fetch call did not finish in time.
    #[error("Connection Problem (Backend: {backend_id}): no response within {timeout:?}")]
    Timeout {
        backend_id: String,
        timeout: Duration,
    },

    /// The adapter does not provide the operation a query needs.
    #[error("The requested feature {feature} is not provided by backend {backend_id}")]
    Unsupported { backend_id: String, feature: String },
}

impl BackendError {
    /// Id of the backend this error belongs to.
    pub fn backend_id(&self) -> &str {
        match self {
            BackendError::NotConfigured { backend_id }
            | BackendError::Init { backend_id, .. }
            | BackendError::Query { backend_id, .. }
            | BackendError::Timeout { backend_id, .. }
            | BackendError::Unsupported { backend_id, .. } => backend_id,
        }
    }

    /// Wrap an adapter error raised by a fetch call.
    pub fn query(backend_id: &str, source: AdapterError) -> Self {
        match source {
            AdapterError::Unsupported(feature) => BackendError::Unsupported {
                backend_id: backend_id.to_string(),
                feature,
            },
            source => BackendError::Query {
                backend_id: backend_id.to_string(),
                source,
            },
        }
    }
}

/// A state or substate has no entry in the weight table.
///
/// This is a configuration defect. It aborts aggregation of the object it was
/// found on and nothing else.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("Invalid state {state:?} found on {object}")]
    UnknownState { object: String, state: String },

    #[error("Invalid state+substate ({state}, {substate}) found on {object}")]
    UnknownWeight {
        object: String,
        state: String,
        substate: String,
    },
}

/// Annotation attached to an object whose state could not be determined.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Problem {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The backend answered but did not know the object.
    #[error("The object \"{object}\" does not exist ({kind}).")]
    Missing { object: String, kind: String },

    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

/// Configuration rejected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Backend {backend_id} uses unknown backend type {backend_type:?}")]
    UnknownBackendType {
        backend_id: String,
        backend_type: String,
    },

    #[error("Backend {0} is defined more than once")]
    DuplicateBackend(String),

    #[error("State {0} has no normal weight")]
    MissingNormalWeight(String),

    #[error("Weight table has no entry for the {0} fallback state")]
    MissingFallbackState(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_message_names_backend() {
        let err = BackendError::query("live_1", AdapterError::Connection("refused".into()));
        assert_eq!(
            err.to_string(),
            "Connection Problem (Backend: live_1): Connection failed: refused"
        );
        assert_eq!(err.backend_id(), "live_1");
    }

    #[test]
    fn test_unsupported_adapter_error_maps_to_unsupported() {
        let err = BackendError::query("live_1", AdapterError::Unsupported("groups".into()));
        assert!(matches!(
            err,
            BackendError::Unsupported { ref feature, .. } if feature == "groups"
        ));
    }

    #[test]
    fn test_missing_problem_text() {
        let problem = Problem::Missing {
            object: "web01".into(),
            kind: "hostState".into(),
        };
        assert_eq!(
            problem.to_string(),
            "The object \"web01\" does not exist (hostState)."
        );
    }
}
