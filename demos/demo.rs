//! statemap demo application.
//!
//! Builds a small map against an in-memory backend and a backend that cannot
//! be initialized, runs one query batch and prints the resulting snapshot.
//!
//! Run with `RUST_LOG=statemap=debug cargo run --example demo` to watch the
//! batcher at work.

use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use statemap::{
    summarize_tree, AdapterError, BackendConfig, BackendFactory, EngineConfig, MonitoredObject,
    ObjectConfig, QueryBatcher, StaticBackend,
};

const SNAPSHOT: &str = r#"{
    "hosts": [
        {"host_name": "web01", "state": "UP", "output": "PING OK"},
        {"host_name": "web02", "state": "DOWN", "output": "PING CRITICAL", "acknowledged": true},
        {"host_name": "db01", "state": "UP", "output": "PING OK"}
    ],
    "services": [
        {"host_name": "web01", "service_description": "HTTP", "state": "OK", "output": "200 OK"},
        {"host_name": "web02", "service_description": "HTTP", "state": "CRITICAL", "output": "connection refused"},
        {"host_name": "db01", "service_description": "Replication", "state": "WARNING",
         "state_type": "SOFT", "last_hard_state": "OK", "output": "lag 30s"}
    ],
    "hostgroups": {"web": ["web01", "web02"]},
    "servicegroups": {"frontend": ["web01~~HTTP", "web02~~HTTP"]}
}"#;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let snapshot: serde_json::Value = serde_json::from_str(SNAPSHOT)?;
    let config = EngineConfig::new()
        .with_query_timeout(5)
        .with_backend(
            BackendConfig::new("fixture", StaticBackend::TYPE)
                .with_options(serde_json::json!({ "snapshot": snapshot })),
        )
        .with_backend(BackendConfig::new("legacy", "unreachable"));

    let mut factory = BackendFactory::with_builtin();
    factory.register("unreachable", |config| {
        Err(AdapterError::Connection(format!("{}: no route to host", config.id)))
    });
    let registry = config.build_registry(&factory)?;

    let details = ObjectConfig {
        member_details: true,
        iconset: Some("std_medium".into()),
        ..Default::default()
    };
    let hard_only = ObjectConfig {
        only_hard_states: true,
        ..Default::default()
    };

    let root = MonitoredObject::map("datacenter")
        .with_member(MonitoredObject::hostgroup("fixture", "web").with_config(details).into_ref())
        .with_member(MonitoredObject::servicegroup("fixture", "frontend").into_ref())
        .with_member(MonitoredObject::host("fixture", "db01").with_config(hard_only).into_ref())
        .with_member(MonitoredObject::host("legacy", "mainframe").into_ref())
        .into_ref();

    let mut batcher = QueryBatcher::from_config(&config);
    batcher.enqueue_tree(&root);
    let report = batcher.execute(&registry).await;
    println!("{report:?}");

    let errors = summarize_tree(&root, &config.weights);
    if !errors.is_empty() {
        eyre::bail!("{} objects could not be aggregated", errors.len());
    }

    let root = root.borrow();
    println!("{}", serde_json::to_string_pretty(&root.state_information(true))?);

    Ok(())
}
