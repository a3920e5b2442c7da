//! Monitoring backends.
//!
//! A backend is anything that can answer state questions about hosts and
//! services: a livestatus socket, a database, a REST API. Each one is wrapped
//! in a [`BackendAdapter`] and looked up by id through the [`BackendRegistry`].
//!
//! Every fetch operation takes a batch of requested object keys plus filters
//! that say how a key relates to the records to return, and answers with a map
//! keyed by the requested keys. A key the backend does not know is simply
//! absent from the answer.

pub mod record;
pub mod registry;
pub mod static_backend;

pub use record::{Downtime, StateRecord};
pub use registry::{AdapterConstructor, BackendFactory, BackendRegistry};
pub use static_backend::{StaticBackend, StaticSnapshot};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::query::OptionMask;
use crate::state::StateCounts;

/// Separator between host name and service description in service keys.
pub const SERVICE_KEY_SEPARATOR: &str = "~~";

/// Filter keys understood by the built-in queries.
pub mod keys {
    pub const HOST_NAME: &str = "host_name";
    pub const SERVICE_DESCRIPTION: &str = "service_description";
    pub const HOST_GROUPS: &str = "host_groups";
    pub const SERVICE_GROUPS: &str = "service_groups";
    pub const GROUPS: &str = "groups";
}

/// Key of a service: `host~~description`.
pub fn service_key(host_name: &str, service_description: &str) -> String {
    format!("{host_name}{SERVICE_KEY_SEPARATOR}{service_description}")
}

/// Split a requested key into its name and optional service description.
pub fn split_key(key: &str) -> (&str, Option<&str>) {
    match key.split_once(SERVICE_KEY_SEPARATOR) {
        Some((name, description)) => (name, Some(description)),
        None => (key, None),
    }
}

/// Operations a backend may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    HostState,
    ServiceState,
    HostStateCounts,
    HostgroupStateCounts,
    ServicegroupStateCounts,
}

impl Feature {
    /// Features every adapter must provide.
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            Feature::HostState | Feature::ServiceState | Feature::HostStateCounts
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::HostState => "fetchHostState",
            Feature::ServiceState => "fetchServiceState",
            Feature::HostStateCounts => "fetchHostStateCounts",
            Feature::HostgroupStateCounts => "fetchHostgroupStateCounts",
            Feature::ServicegroupStateCounts => "fetchServicegroupStateCounts",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a filter compares a record field with the requested key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Field equals the key part.
    Equals,
    /// Field is a list that contains the key part.
    MemberOf,
}

impl std::fmt::Display for FilterOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterOp::Equals => write!(f, "="),
            FilterOp::MemberOf => write!(f, ">="),
        }
    }
}

/// Which part of the requested key a filter compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterValue {
    Name,
    ServiceDescription,
}

/// One `{key, operator, value}` predicate. All filters of a query must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pub key: &'static str,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    pub const fn new(key: &'static str, op: FilterOp, value: FilterValue) -> Self {
        Self { key, op, value }
    }

    pub const fn equals(key: &'static str, value: FilterValue) -> Self {
        Self::new(key, FilterOp::Equals, value)
    }

    pub const fn member_of(key: &'static str, value: FilterValue) -> Self {
        Self::new(key, FilterOp::MemberOf, value)
    }

    /// The part of `requested_key` this filter compares with.
    pub fn operand<'k>(&self, requested_key: &'k str) -> Option<&'k str> {
        let (name, description) = split_key(requested_key);
        match self.value {
            FilterValue::Name => Some(name),
            FilterValue::ServiceDescription => description,
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self.value {
            FilterValue::Name => "name",
            FilterValue::ServiceDescription => "service_description",
        };
        write!(f, "{} {} {}", self.key, self.op, value)
    }
}

/// Records per requested key.
pub type StateMap = HashMap<String, Vec<StateRecord>>;

/// Counts per requested key.
pub type CountsMap = HashMap<String, StateCounts>;

/// Connection to one monitoring backend.
///
/// Fetch calls must fail with an [`AdapterError`] on transport, auth or query
/// problems instead of returning partial data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Whether this adapter provides `feature`. Defaults to the required set.
    fn supports(&self, feature: Feature) -> bool {
        feature.is_required()
    }

    /// Host records matching each requested key.
    async fn fetch_host_state(
        &self,
        keys: &[String],
        options: OptionMask,
        filters: &[Filter],
    ) -> Result<StateMap, AdapterError>;

    /// Service records matching each requested key.
    async fn fetch_service_state(
        &self,
        keys: &[String],
        options: OptionMask,
        filters: &[Filter],
    ) -> Result<StateMap, AdapterError>;

    /// Service state counts of the hosts matching each requested key.
    async fn fetch_host_state_counts(
        &self,
        keys: &[String],
        options: OptionMask,
        filters: &[Filter],
    ) -> Result<CountsMap, AdapterError>;

    /// Host and service state counts of each requested host group.
    async fn fetch_hostgroup_state_counts(
        &self,
        _keys: &[String],
        _options: OptionMask,
        _filters: &[Filter],
    ) -> Result<CountsMap, AdapterError> {
        Err(AdapterError::Unsupported(
            Feature::HostgroupStateCounts.to_string(),
        ))
    }

    /// Service state counts of each requested service group.
    async fn fetch_servicegroup_state_counts(
        &self,
        _keys: &[String],
        _options: OptionMask,
        _filters: &[Filter],
    ) -> Result<CountsMap, AdapterError> {
        Err(AdapterError::Unsupported(
            Feature::ServicegroupStateCounts.to_string(),
        ))
    }
}
