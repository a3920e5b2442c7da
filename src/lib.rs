//! statemap library
//!
//! Aggregates host and service states from monitoring backends into one
//! summary state per object of a map hierarchy.
//!
//! A request builds an object tree, enqueues the queries the tree needs into a
//! [`QueryBatcher`], runs them against a [`BackendRegistry`] and then
//! summarizes the tree with a [`WeightTable`]:
//!
//! ```no_run
//! use statemap::{summarize_tree, BackendFactory, EngineConfig, MonitoredObject, QueryBatcher};
//!
//! # async fn run() -> Result<(), statemap::ConfigError> {
//! let config = EngineConfig::from_json(
//!     r#"{"backends": [{"id": "fixture", "backend_type": "static"}]}"#,
//! )?;
//! let registry = config.build_registry(&BackendFactory::with_builtin())?;
//!
//! let root = MonitoredObject::map("overview")
//!     .with_member(MonitoredObject::host("fixture", "web01").into_ref())
//!     .into_ref();
//!
//! let mut batcher = QueryBatcher::from_config(&config);
//! batcher.enqueue_tree(&root);
//! batcher.execute(&registry).await;
//! summarize_tree(&root, &config.weights);
//!
//! println!("{:?}", root.borrow().summary_state());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod object;
pub mod query;
pub mod state;

pub use backend::{BackendAdapter, BackendFactory, BackendRegistry, StaticBackend};
pub use config::{BackendConfig, EngineConfig};
pub use error::{AdapterError, AggregationError, BackendError, ConfigError, Problem};
pub use object::{
    summarize_tree, MonitoredObject, ObjectConfig, ObjectRef, ObjectType, StateInformation,
};
pub use query::{ExecutionReport, OptionMask, QueryBatcher, QueryKind, QueueKey};
pub use state::{StateCounts, SubState, Summary, WeightTable};
