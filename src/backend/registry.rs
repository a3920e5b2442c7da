//! Lazy construction and caching of backend adapters.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::{debug, error};

use super::{BackendAdapter, Feature, StaticBackend};
use crate::config::BackendConfig;
use crate::error::{AdapterError, BackendError, ConfigError};

/// Builds an adapter from its configuration.
pub type AdapterConstructor =
    Arc<dyn Fn(&BackendConfig) -> Result<Arc<dyn BackendAdapter>, AdapterError> + Send + Sync>;

/// Maps backend type tags to adapter constructors.
#[derive(Clone, Default)]
pub struct BackendFactory {
    constructors: HashMap<String, AdapterConstructor>,
}

impl BackendFactory {
    /// A factory without any backend types.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory that knows the backend types shipped with this crate.
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register(StaticBackend::TYPE, StaticBackend::from_config);
        factory
    }

    /// Register `constructor` for configurations of type `backend_type`.
    pub fn register<F>(&mut self, backend_type: &str, constructor: F) -> &mut Self
    where
        F: Fn(&BackendConfig) -> Result<Arc<dyn BackendAdapter>, AdapterError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(backend_type.to_string(), Arc::new(constructor));
        self
    }

    pub fn knows(&self, backend_type: &str) -> bool {
        self.constructors.contains_key(backend_type)
    }
}

/// A configured backend and its adapter, built at most once.
struct Slot {
    config: BackendConfig,
    constructor: AdapterConstructor,
    adapter: OnceLock<Result<Arc<dyn BackendAdapter>, BackendError>>,
}

/// Owns every configured backend and hands out adapters by id.
///
/// Adapters are constructed on first use. A failed construction is cached
/// and the same [`BackendError::Init`] is returned for that id from then on,
/// so a broken backend costs one connection attempt per registry, not one per
/// query. The registry is `Send + Sync` and may be shared across requests.
pub struct BackendRegistry {
    slots: HashMap<String, Slot>,
}

impl BackendRegistry {
    /// Validate `configs` against `factory`. Unknown backend types and
    /// duplicate ids are rejected here rather than at first use.
    pub fn new<I>(factory: &BackendFactory, configs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = BackendConfig>,
    {
        let mut slots = HashMap::new();
        for config in configs {
            let constructor = factory
                .constructors
                .get(&config.backend_type)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownBackendType {
                    backend_id: config.id.clone(),
                    backend_type: config.backend_type.clone(),
                })?;

            if slots.contains_key(&config.id) {
                return Err(ConfigError::DuplicateBackend(config.id));
            }

            slots.insert(
                config.id.clone(),
                Slot {
                    config,
                    constructor,
                    adapter: OnceLock::new(),
                },
            );
        }
        Ok(Self { slots })
    }

    /// Adapter for `backend_id`, constructing it on first use.
    pub fn get(&self, backend_id: &str) -> Result<Arc<dyn BackendAdapter>, BackendError> {
        let slot = self
            .slots
            .get(backend_id)
            .ok_or_else(|| BackendError::NotConfigured {
                backend_id: backend_id.to_string(),
            })?;

        slot.adapter
            .get_or_init(|| Self::initialize(slot))
            .clone()
    }

    /// Whether `backend_id` has a working adapter. Tries to construct it if
    /// that has not happened yet; never fails.
    pub fn is_initialized(&self, backend_id: &str) -> bool {
        self.get(backend_id).is_ok()
    }

    /// Whether `backend_id` is usable and provides `feature`.
    pub fn supports_feature(&self, backend_id: &str, feature: Feature) -> bool {
        self.get(backend_id)
            .map(|adapter| adapter.supports(feature))
            .unwrap_or(false)
    }

    /// Ids of all configured backends.
    pub fn backend_ids(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    fn initialize(slot: &Slot) -> Result<Arc<dyn BackendAdapter>, BackendError> {
        let config = &slot.config;
        debug!(backend = %config.id, backend_type = %config.backend_type, "initializing backend");

        (slot.constructor)(config).map_err(|source| {
            error!(backend = %config.id, error = %source, "backend initialization failed");
            BackendError::Init {
                backend_id: config.id.clone(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failing_factory(calls: Arc<AtomicUsize>) -> BackendFactory {
        let mut factory = BackendFactory::with_builtin();
        factory.register("broken", move |_config| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AdapterError::Connection("connection refused".into()))
        });
        factory
    }

    #[test]
    fn test_unknown_type_fails_at_startup() {
        let err = BackendRegistry::new(
            &BackendFactory::with_builtin(),
            [BackendConfig::new("live_1", "mklivestatus")],
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            ConfigError::UnknownBackendType { backend_type, .. } if backend_type == "mklivestatus"
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = BackendRegistry::new(
            &BackendFactory::with_builtin(),
            [
                BackendConfig::new("a", StaticBackend::TYPE),
                BackendConfig::new("a", StaticBackend::TYPE),
            ],
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::DuplicateBackend(id) if id == "a"));
    }

    #[test]
    fn test_adapter_constructed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut factory = BackendFactory::new();
        factory.register("counting", move |_config| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StaticBackend::default()) as Arc<dyn BackendAdapter>)
        });

        let registry =
            BackendRegistry::new(&factory, [BackendConfig::new("one", "counting")]).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let first = registry.get("one").unwrap();
        let second = registry.get("one").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_init_failure_cached_and_reraised() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = BackendRegistry::new(
            &failing_factory(Arc::clone(&calls)),
            [BackendConfig::new("down", "broken")],
        )
        .unwrap();

        let first = registry.get("down").err().unwrap();
        let second = registry.get("down").err().unwrap();

        assert_eq!(first, second);
        assert!(matches!(first, BackendError::Init { ref backend_id, .. } if backend_id == "down"));
        assert!(!registry.is_initialized("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_is_initialized_probes_lazily() {
        let registry = BackendRegistry::new(
            &BackendFactory::with_builtin(),
            [BackendConfig::new("fixture", StaticBackend::TYPE)],
        )
        .unwrap();

        assert!(registry.is_initialized("fixture"));
        assert!(!registry.is_initialized("nope"));
    }

    #[test]
    fn test_not_configured() {
        let registry = BackendRegistry::new(&BackendFactory::with_builtin(), Vec::new()).unwrap();
        let err = registry.get("ghost").err().unwrap();
        assert_eq!(
            err,
            BackendError::NotConfigured {
                backend_id: "ghost".into()
            }
        );
    }

    #[test]
    fn test_supports_feature() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = BackendRegistry::new(
            &failing_factory(calls),
            [
                BackendConfig::new("fixture", StaticBackend::TYPE),
                BackendConfig::new("down", "broken"),
            ],
        )
        .unwrap();

        assert!(registry.supports_feature("fixture", Feature::ServicegroupStateCounts));
        assert!(!registry.supports_feature("down", Feature::HostState));
        assert_eq!(registry.backend_ids().count(), 2);
    }
}
