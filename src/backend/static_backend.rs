//! In-memory backend serving a fixed snapshot.
//!
//! Useful for demos, tests and for feeding states exported from elsewhere.
//! The snapshot is plain JSON:
//!
//! ```json
//! {
//!   "hosts": [{"host_name": "web01", "state": "UP"}],
//!   "services": [{"host_name": "web01", "service_description": "HTTP", "state": "OK"}],
//!   "hostgroups": {"web": ["web01"]},
//!   "servicegroups": {"frontend": ["web01~~HTTP"]}
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::{keys, BackendAdapter, CountsMap, Feature, Filter, FilterOp, StateMap, StateRecord};
use crate::config::BackendConfig;
use crate::error::AdapterError;
use crate::query::OptionMask;
use crate::state::StateCounts;

/// Hosts, services and group memberships served by a [`StaticBackend`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaticSnapshot {
    pub hosts: Vec<StateRecord>,
    pub services: Vec<StateRecord>,
    /// Host group name to member host names.
    pub hostgroups: BTreeMap<String, Vec<String>>,
    /// Service group name to member service keys (`host~~description`).
    pub servicegroups: BTreeMap<String, Vec<String>>,
}

/// Backend answering every query from a [`StaticSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct StaticBackend {
    snapshot: StaticSnapshot,
}

impl StaticBackend {
    /// Backend type tag used in configuration.
    pub const TYPE: &'static str = "static";

    pub fn new(snapshot: StaticSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_json(json: &str) -> Result<Self, AdapterError> {
        let snapshot = serde_json::from_str(json).map_err(|e| AdapterError::Parse(e.to_string()))?;
        Ok(Self::new(snapshot))
    }

    /// Constructor registered under [`StaticBackend::TYPE`]. Reads the
    /// snapshot from the `snapshot` option; no option means an empty backend.
    pub fn from_config(config: &BackendConfig) -> Result<Arc<dyn BackendAdapter>, AdapterError> {
        let snapshot = match config.options.get("snapshot") {
            Some(value) => StaticSnapshot::deserialize(value)
                .map_err(|e| AdapterError::Parse(e.to_string()))?,
            None => StaticSnapshot::default(),
        };
        Ok(Arc::new(Self::new(snapshot)))
    }

    fn in_hostgroup(&self, group: &str, host_name: &str) -> bool {
        self.snapshot
            .hostgroups
            .get(group)
            .is_some_and(|members| members.iter().any(|m| m == host_name))
    }

    fn in_servicegroup(&self, group: &str, record: &StateRecord) -> bool {
        let key = record.key();
        self.snapshot
            .servicegroups
            .get(group)
            .is_some_and(|members| members.iter().any(|m| *m == key))
    }

    fn group_exists(&self, filter_key: &str, group: &str) -> bool {
        match filter_key {
            keys::HOST_GROUPS => self.snapshot.hostgroups.contains_key(group),
            keys::SERVICE_GROUPS => self.snapshot.servicegroups.contains_key(group),
            _ => false,
        }
    }

    /// Whether `record` satisfies `filter` for `requested_key`.
    fn matches(
        &self,
        record: &StateRecord,
        requested_key: &str,
        filter: &Filter,
    ) -> Result<bool, AdapterError> {
        let Some(operand) = filter.operand(requested_key) else {
            return Ok(false);
        };
        let matched = match (filter.key, filter.op) {
            (keys::HOST_NAME, FilterOp::Equals) => record.host_name == operand,
            (keys::SERVICE_DESCRIPTION, FilterOp::Equals) => {
                record.service_description.as_deref() == Some(operand)
            }
            (keys::HOST_GROUPS, FilterOp::MemberOf) => {
                self.in_hostgroup(operand, &record.host_name)
            }
            (keys::SERVICE_GROUPS, FilterOp::MemberOf) => self.in_servicegroup(operand, record),
            _ => {
                return Err(AdapterError::Query(format!("unsupported filter: {filter}")));
            }
        };
        Ok(matched)
    }

    /// Records of `records` selected by `filters` for each requested key.
    ///
    /// A key is answered when it names an existing group (membership filters)
    /// or when at least one record matched.
    fn select(
        &self,
        records: &[StateRecord],
        keys: &[String],
        options: OptionMask,
        filters: &[Filter],
    ) -> Result<BTreeMap<String, Vec<StateRecord>>, AdapterError> {
        let mut result = BTreeMap::new();
        for key in keys {
            let mut selected = Vec::new();
            for record in records {
                let mut keep = true;
                for filter in filters {
                    if !self.matches(record, key, filter)? {
                        keep = false;
                        break;
                    }
                }
                if keep {
                    selected.push(if options.only_hard_states() {
                        record.hard_state()
                    } else {
                        record.clone()
                    });
                }
            }

            let group_query = filters.iter().find(|f| f.op == FilterOp::MemberOf);
            let known = match group_query {
                Some(filter) => filter
                    .operand(key)
                    .is_some_and(|group| self.group_exists(filter.key, group)),
                None => !selected.is_empty(),
            };
            if known {
                result.insert(key.clone(), selected);
            }
        }
        Ok(result)
    }

    fn services_of(&self, host_name: &str, options: OptionMask) -> StateCounts {
        let mut counts = StateCounts::new();
        for service in self.snapshot.services.iter().filter(|s| s.host_name == host_name) {
            count_record(&mut counts, service, options);
        }
        counts
    }

    fn host(&self, host_name: &str) -> Option<&StateRecord> {
        self.snapshot.hosts.iter().find(|h| h.host_name == host_name)
    }
}

fn count_record(counts: &mut StateCounts, record: &StateRecord, options: OptionMask) {
    let record = if options.only_hard_states() {
        record.hard_state()
    } else {
        record.clone()
    };
    counts.add(&record.state, record.substate(), 1);
}

#[async_trait]
impl BackendAdapter for StaticBackend {
    fn supports(&self, _feature: Feature) -> bool {
        true
    }

    async fn fetch_host_state(
        &self,
        keys: &[String],
        options: OptionMask,
        filters: &[Filter],
    ) -> Result<StateMap, AdapterError> {
        Ok(self
            .select(&self.snapshot.hosts, keys, options, filters)?
            .into_iter()
            .collect())
    }

    async fn fetch_service_state(
        &self,
        keys: &[String],
        options: OptionMask,
        filters: &[Filter],
    ) -> Result<StateMap, AdapterError> {
        Ok(self
            .select(&self.snapshot.services, keys, options, filters)?
            .into_iter()
            .collect())
    }

    async fn fetch_host_state_counts(
        &self,
        keys: &[String],
        options: OptionMask,
        filters: &[Filter],
    ) -> Result<CountsMap, AdapterError> {
        let hosts = self.select(&self.snapshot.hosts, keys, OptionMask::default(), filters)?;
        Ok(hosts
            .into_iter()
            .map(|(key, hosts)| {
                let mut counts = StateCounts::new();
                for host in &hosts {
                    counts.merge(&self.services_of(&host.host_name, options));
                }
                (key, counts)
            })
            .collect())
    }

    async fn fetch_hostgroup_state_counts(
        &self,
        keys: &[String],
        options: OptionMask,
        _filters: &[Filter],
    ) -> Result<CountsMap, AdapterError> {
        let mut result = CountsMap::new();
        for key in keys {
            let Some(members) = self.snapshot.hostgroups.get(key) else {
                continue;
            };
            let mut counts = StateCounts::new();
            for member in members {
                if let Some(host) = self.host(member) {
                    count_record(&mut counts, host, options);
                }
                counts.merge(&self.services_of(member, options));
            }
            result.insert(key.clone(), counts);
        }
        Ok(result)
    }

    async fn fetch_servicegroup_state_counts(
        &self,
        keys: &[String],
        options: OptionMask,
        _filters: &[Filter],
    ) -> Result<CountsMap, AdapterError> {
        let mut result = CountsMap::new();
        for key in keys {
            if !self.snapshot.servicegroups.contains_key(key) {
                continue;
            }
            let mut counts = StateCounts::new();
            for service in self
                .snapshot
                .services
                .iter()
                .filter(|s| self.in_servicegroup(key, s))
            {
                count_record(&mut counts, service, options);
            }
            result.insert(key.clone(), counts);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FilterValue;
    use crate::state::SubState;
    use pretty_assertions::assert_eq;

    const HOST_NAME: [Filter; 1] = [Filter::equals(keys::HOST_NAME, FilterValue::Name)];

    fn backend() -> StaticBackend {
        StaticBackend::from_json(
            r#"{
                "hosts": [
                    {"host_name": "web01", "state": "UP"},
                    {"host_name": "web02", "state": "DOWN", "acknowledged": true},
                    {"host_name": "db01", "state": "UP"}
                ],
                "services": [
                    {"host_name": "web01", "service_description": "HTTP", "state": "OK"},
                    {"host_name": "web01", "service_description": "Load", "state": "CRITICAL",
                     "state_type": "SOFT", "last_hard_state": "WARNING"},
                    {"host_name": "web02", "service_description": "HTTP", "state": "CRITICAL", "in_downtime": true}
                ],
                "hostgroups": {"web": ["web01", "web02"], "empty": []},
                "servicegroups": {"http": ["web01~~HTTP", "web02~~HTTP"]}
            }"#,
        )
        .unwrap()
    }

    fn requested(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_host_state_by_name() {
        let states = backend()
            .fetch_host_state(&requested(&["web02", "ghost"]), OptionMask::default(), &HOST_NAME)
            .await
            .unwrap();

        assert_eq!(states.len(), 1);
        assert_eq!(states["web02"][0].state, "DOWN");
        assert!(!states.contains_key("ghost"));
    }

    #[tokio::test]
    async fn test_service_state_by_key() {
        let filters = [
            Filter::equals(keys::HOST_NAME, FilterValue::Name),
            Filter::equals(keys::SERVICE_DESCRIPTION, FilterValue::ServiceDescription),
        ];
        let states = backend()
            .fetch_service_state(&requested(&["web01~~Load"]), OptionMask::default(), &filters)
            .await
            .unwrap();
        assert_eq!(states["web01~~Load"].len(), 1);
        assert_eq!(states["web01~~Load"][0].state, "CRITICAL");
    }

    #[tokio::test]
    async fn test_hard_states_only() {
        let filters = [
            Filter::equals(keys::HOST_NAME, FilterValue::Name),
            Filter::equals(keys::SERVICE_DESCRIPTION, FilterValue::ServiceDescription),
        ];
        let states = backend()
            .fetch_service_state(
                &requested(&["web01~~Load"]),
                OptionMask::default().with_only_hard_states(true),
                &filters,
            )
            .await
            .unwrap();
        assert_eq!(states["web01~~Load"][0].state, "WARNING");
    }

    #[tokio::test]
    async fn test_hostgroup_members() {
        let filters = [Filter::member_of(keys::HOST_GROUPS, FilterValue::Name)];
        let states = backend()
            .fetch_host_state(
                &requested(&["web", "empty", "ghost"]),
                OptionMask::default(),
                &filters,
            )
            .await
            .unwrap();

        let members: Vec<&str> = states["web"].iter().map(|h| h.host_name.as_str()).collect();
        assert_eq!(members, vec!["web01", "web02"]);
        assert!(states["empty"].is_empty());
        assert!(!states.contains_key("ghost"));
    }

    #[tokio::test]
    async fn test_host_state_counts() {
        let counts = backend()
            .fetch_host_state_counts(
                &requested(&["web01", "db01"]),
                OptionMask::default(),
                &HOST_NAME,
            )
            .await
            .unwrap();

        assert_eq!(counts["web01"].get("OK", SubState::Normal), 1);
        assert_eq!(counts["web01"].get("CRITICAL", SubState::Normal), 1);
        assert!(counts["db01"].is_empty());
    }

    #[tokio::test]
    async fn test_group_counts() {
        let backend = backend();
        let hostgroups = backend
            .fetch_hostgroup_state_counts(&requested(&["web"]), OptionMask::default(), &[])
            .await
            .unwrap();
        let web = &hostgroups["web"];
        assert_eq!(web.get("UP", SubState::Normal), 1);
        assert_eq!(web.get("DOWN", SubState::Ack), 1);
        assert_eq!(web.get("CRITICAL", SubState::Downtime), 1);
        assert_eq!(web.total(), 5);

        let servicegroups = backend
            .fetch_servicegroup_state_counts(
                &requested(&["http", "ghost"]),
                OptionMask::default(),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(servicegroups["http"].total(), 2);
        assert!(!servicegroups.contains_key("ghost"));
    }

    #[tokio::test]
    async fn test_unsupported_filter_is_an_error() {
        let filters = [Filter::member_of("contacts", FilterValue::Name)];
        let err = backend()
            .fetch_host_state(&requested(&["web01"]), OptionMask::default(), &filters)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Query(_)));
    }

    #[test]
    fn test_from_config() {
        let config = BackendConfig::new("fixture", StaticBackend::TYPE).with_options(
            serde_json::json!({"snapshot": {"hosts": [{"host_name": "a", "state": "UP"}]}}),
        );
        assert!(StaticBackend::from_config(&config).is_ok());

        let bad = BackendConfig::new("fixture", StaticBackend::TYPE)
            .with_options(serde_json::json!({"snapshot": {"hosts": 3}}));
        assert!(matches!(
            StaticBackend::from_config(&bad).err().unwrap(),
            AdapterError::Parse(_)
        ));
    }
}
