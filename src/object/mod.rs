//! Monitored object hierarchy.
//!
//! A request builds a tree of [`MonitoredObject`]s (a map containing hosts,
//! groups, other maps), lets the [`QueryBatcher`](crate::query::QueryBatcher)
//! fill in backend state, then calls [`summarize_tree`] to compute every
//! object's summary. Renderers only read the result.
//!
//! Trees live for one request on one thread, so nodes are shared as
//! `Rc<RefCell<_>>` like the rest of the per-request state.

pub mod snapshot;
pub mod summarize;

pub use snapshot::{CheckInformation, StateInformation};
pub use summarize::summarize_tree;

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::backend::{service_key, StateRecord};
use crate::error::{AggregationError, Problem};
use crate::query::QueryKind;
use crate::state::{compute_from_counts, merge_children, StateCounts, Summary, WeightTable};

/// Shared handle to a node of the object tree.
pub type ObjectRef = Rc<RefCell<MonitoredObject>>;

/// Kind of monitored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Host,
    Service,
    HostGroup,
    ServiceGroup,
    Map,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Host => "host",
            ObjectType::Service => "service",
            ObjectType::HostGroup => "hostgroup",
            ObjectType::ServiceGroup => "servicegroup",
            ObjectType::Map => "map",
        }
    }

    /// Whether objects of this type carry a check result of their own.
    pub fn has_check(&self) -> bool {
        matches!(self, ObjectType::Host | ObjectType::Service)
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-object settings that influence which queries run and how the object
/// is drawn. Copied onto members created from backend data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    /// Ask backends for hard states only.
    pub only_hard_states: bool,
    /// Include a host's services in its summary.
    pub recognize_services: bool,
    /// Expand groups (and hosts) into concrete member objects.
    pub member_details: bool,
    pub iconset: Option<String>,
    pub label_show: bool,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            only_hard_states: false,
            recognize_services: true,
            member_details: false,
            iconset: None,
            label_show: false,
        }
    }
}

/// One node of the object tree.
#[derive(Debug, Clone)]
pub struct MonitoredObject {
    object_type: ObjectType,
    name: String,
    service_description: Option<String>,
    backend_id: String,
    config: ObjectConfig,

    state: Option<StateRecord>,
    summary: Summary,
    state_counts: Option<StateCounts>,
    members: Vec<ObjectRef>,
    problem: Option<Problem>,
}

impl MonitoredObject {
    fn new(object_type: ObjectType, name: &str, backend_id: &str) -> Self {
        Self {
            object_type,
            name: name.to_string(),
            service_description: None,
            backend_id: backend_id.to_string(),
            config: ObjectConfig::default(),
            state: None,
            summary: Summary::default(),
            state_counts: None,
            members: Vec::new(),
            problem: None,
        }
    }

    pub fn host(backend_id: &str, name: &str) -> Self {
        Self::new(ObjectType::Host, name, backend_id)
    }

    pub fn service(backend_id: &str, host_name: &str, service_description: &str) -> Self {
        let mut object = Self::new(ObjectType::Service, host_name, backend_id);
        object.service_description = Some(service_description.to_string());
        object
    }

    pub fn hostgroup(backend_id: &str, name: &str) -> Self {
        Self::new(ObjectType::HostGroup, name, backend_id)
    }

    pub fn servicegroup(backend_id: &str, name: &str) -> Self {
        Self::new(ObjectType::ServiceGroup, name, backend_id)
    }

    /// A map has no backend of its own; its summary comes from its members.
    pub fn map(name: &str) -> Self {
        Self::new(ObjectType::Map, name, "")
    }

    /// Host or service object for a record returned by a member query,
    /// configured like `parent_config`.
    pub fn from_record(
        backend_id: &str,
        record: &StateRecord,
        parent_config: &ObjectConfig,
    ) -> Self {
        let object = match &record.service_description {
            Some(description) => Self::service(backend_id, &record.host_name, description),
            None => Self::host(backend_id, &record.host_name),
        };
        let mut object = object.with_config(parent_config.clone());
        object.state = Some(record.clone());
        object
    }

    pub fn with_config(mut self, config: ObjectConfig) -> Self {
        self.config = config;
        self
    }

    pub fn into_ref(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }

    /// Append a configured member. Used for maps and hand-built trees.
    pub fn add_member(&mut self, member: ObjectRef) {
        self.members.push(member);
    }

    pub fn with_member(mut self, member: ObjectRef) -> Self {
        self.add_member(member);
        self
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_description(&self) -> Option<&str> {
        self.service_description.as_deref()
    }

    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    pub fn config(&self) -> &ObjectConfig {
        &self.config
    }

    /// Human readable identity used in logs and errors.
    pub fn label(&self) -> String {
        match &self.service_description {
            Some(description) => {
                format!("{} {}", self.object_type, service_key(&self.name, description))
            }
            None => format!("{} {}", self.object_type, self.name),
        }
    }

    /// Key identifying this object towards its backend.
    pub fn object_key(&self) -> String {
        match &self.service_description {
            Some(description) => service_key(&self.name, description),
            None => self.name.clone(),
        }
    }

    /// Raw check result, for hosts and services once fetched.
    pub fn record(&self) -> Option<&StateRecord> {
        self.state.as_ref()
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_ref().map(|record| record.state.as_str())
    }

    pub fn output(&self) -> &str {
        self.state.as_ref().map_or("", |record| record.output.as_str())
    }

    pub fn acknowledged(&self) -> bool {
        self.state.as_ref().is_some_and(|record| record.acknowledged)
    }

    pub fn in_downtime(&self) -> bool {
        self.state.as_ref().is_some_and(|record| record.in_downtime)
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn summary_state(&self) -> Option<&str> {
        self.summary.state()
    }

    pub fn summary_output(&self) -> &str {
        &self.summary.output
    }

    pub fn summary_acknowledged(&self) -> bool {
        self.summary.acknowledged
    }

    pub fn summary_in_downtime(&self) -> bool {
        self.summary.in_downtime
    }

    pub fn state_counts(&self) -> Option<&StateCounts> {
        self.state_counts.as_ref()
    }

    pub fn members(&self) -> &[ObjectRef] {
        &self.members
    }

    pub fn problem(&self) -> Option<&Problem> {
        self.problem.as_ref()
    }

    /// Query kinds this object needs answered before it can be summarized.
    ///
    /// Objects with configured members summarize from those members, so no
    /// member state counts are requested for them.
    pub fn required_queries(&self) -> Vec<QueryKind> {
        let mut kinds = self.queries_for_type();
        if !self.members.is_empty() {
            kinds.retain(|kind| !kind.yields_counts());
        }
        kinds
    }

    fn queries_for_type(&self) -> Vec<QueryKind> {
        match self.object_type {
            ObjectType::Host if self.config.member_details => {
                vec![QueryKind::HostState, QueryKind::HostMemberDetails]
            }
            ObjectType::Host if self.config.recognize_services => {
                vec![QueryKind::HostState, QueryKind::HostMemberState]
            }
            ObjectType::Host => vec![QueryKind::HostState],
            ObjectType::Service => vec![QueryKind::ServiceState],
            ObjectType::HostGroup if self.config.member_details => {
                vec![QueryKind::HostgroupMemberDetails]
            }
            ObjectType::HostGroup => vec![QueryKind::HostgroupMemberState],
            ObjectType::ServiceGroup if self.config.member_details => {
                vec![QueryKind::ServicegroupMemberDetails]
            }
            ObjectType::ServiceGroup => vec![QueryKind::ServicegroupMemberState],
            ObjectType::Map => Vec::new(),
        }
    }

    pub(crate) fn set_state(&mut self, record: StateRecord) {
        self.state = Some(record);
        self.problem = None;
    }

    /// Counts drive aggregation from now on, so members are dropped.
    pub(crate) fn set_state_counts(&mut self, counts: StateCounts) {
        self.state_counts = Some(counts);
        self.members.clear();
        self.problem = None;
    }

    /// Replace the members with ones built from backend data. Members drive
    /// aggregation from now on, so stale counts are dropped.
    pub(crate) fn set_members(&mut self, members: Vec<ObjectRef>) {
        self.members = members;
        self.state_counts = None;
        self.problem = None;
    }

    pub(crate) fn set_problem(&mut self, problem: Problem) {
        self.problem = Some(problem);
    }

    /// Summary of the object's own check result, before members count in.
    fn own_summary(&self) -> Summary {
        match &self.state {
            Some(record) => Summary::new(
                &record.state,
                &record.output,
                record.acknowledged,
                record.in_downtime,
            ),
            None => Summary::default(),
        }
    }

    /// Recompute the summary from the object's own state and either its
    /// members or its state counts. Members must be summarized first.
    ///
    /// On error the previous summary is kept.
    pub fn refresh_summary(&mut self, weights: &WeightTable) -> Result<(), AggregationError> {
        let label = self.label();
        let current = self.own_summary();

        let mut summary = if !self.members.is_empty() {
            let children: Vec<Summary> = self
                .members
                .iter()
                .map(|member| member.borrow().summary.clone())
                .collect();
            merge_children(&label, &current, &children, weights)?
        } else {
            let empty = StateCounts::new();
            let counts = self.state_counts.as_ref().unwrap_or(&empty);
            compute_from_counts(&label, &current, counts, weights)?
        };

        if let Some(problem) = &self.problem {
            summary.output = problem.to_string();
        }
        self.summary = summary;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::state::SubState;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(ObjectConfig::default(), vec![QueryKind::HostState, QueryKind::HostMemberState])]
    #[case(
        ObjectConfig { recognize_services: false, ..Default::default() },
        vec![QueryKind::HostState]
    )]
    #[case(
        ObjectConfig { member_details: true, ..Default::default() },
        vec![QueryKind::HostState, QueryKind::HostMemberDetails]
    )]
    fn test_host_queries(#[case] config: ObjectConfig, #[case] expected: Vec<QueryKind>) {
        let host = MonitoredObject::host("live_1", "web01").with_config(config);
        assert_eq!(host.required_queries(), expected);
    }

    #[test]
    fn test_group_and_map_queries() {
        let details = ObjectConfig {
            member_details: true,
            ..Default::default()
        };
        assert_eq!(
            MonitoredObject::hostgroup("live_1", "web").required_queries(),
            vec![QueryKind::HostgroupMemberState]
        );
        assert_eq!(
            MonitoredObject::servicegroup("live_1", "http")
                .with_config(details)
                .required_queries(),
            vec![QueryKind::ServicegroupMemberDetails]
        );
        assert!(MonitoredObject::map("overview").required_queries().is_empty());
    }

    #[test]
    fn test_keys_and_labels() {
        let service = MonitoredObject::service("live_1", "web01", "HTTP");
        assert_eq!(service.object_key(), "web01~~HTTP");
        assert_eq!(service.label(), "service web01~~HTTP");
        assert_eq!(MonitoredObject::hostgroup("live_1", "web").label(), "hostgroup web");
    }

    #[test]
    fn test_from_record_inherits_config() {
        let config = ObjectConfig {
            iconset: Some("std_small".into()),
            only_hard_states: true,
            ..Default::default()
        };
        let record = StateRecord::service("web01", "HTTP", "WARNING").acknowledged();
        let object = MonitoredObject::from_record("live_1", &record, &config);

        assert_eq!(object.object_type(), ObjectType::Service);
        assert_eq!(object.config(), &config);
        assert_eq!(object.state(), Some("WARNING"));
        assert!(object.acknowledged());
    }

    #[test]
    fn test_leaf_summary_is_own_state() {
        let weights = WeightTable::default();
        let mut host = MonitoredObject::host("live_1", "web01");
        host.set_state(StateRecord::host("web01", "DOWN").with_output("PING CRITICAL"));

        host.refresh_summary(&weights).unwrap();
        assert_eq!(host.summary(), &Summary::new("DOWN", "PING CRITICAL", false, false));
    }

    #[test]
    fn test_host_with_service_counts() {
        let weights = WeightTable::default();
        let mut host = MonitoredObject::host("live_1", "web01");
        host.set_state(StateRecord::host("web01", "UP"));
        host.set_state_counts(
            StateCounts::new()
                .with("OK", SubState::Normal, 4)
                .with("CRITICAL", SubState::Ack, 1),
        );

        host.refresh_summary(&weights).unwrap();
        assert_eq!(host.summary_state(), Some("CRITICAL"));
        assert!(host.summary_acknowledged());
        assert_eq!(host.summary_output(), "4 OK, 1 CRITICAL");
    }

    #[test]
    fn test_nothing_known_is_error() {
        let mut group = MonitoredObject::hostgroup("live_1", "web");
        group.refresh_summary(&WeightTable::default()).unwrap();
        assert_eq!(group.summary_state(), Some("ERROR"));
    }

    #[test]
    fn test_problem_replaces_output() {
        let mut host = MonitoredObject::host("live_1", "web01");
        host.set_state(StateRecord::host("web01", "UP").with_output("PING OK"));
        host.set_problem(Problem::Backend(BackendError::NotConfigured {
            backend_id: "live_1".into(),
        }));

        host.refresh_summary(&WeightTable::default()).unwrap();
        assert_eq!(host.summary_state(), Some("UP"));
        assert_eq!(host.summary_output(), "Backend live_1 is not configured");
    }

    #[test]
    fn test_unknown_state_keeps_previous_summary() {
        let weights = WeightTable::default();
        let mut host = MonitoredObject::host("live_1", "web01");
        host.set_state(StateRecord::host("web01", "UP"));
        host.refresh_summary(&weights).unwrap();

        host.set_state(StateRecord::host("web01", "EXPLODED"));
        let err = host.refresh_summary(&weights).unwrap_err();

        assert!(matches!(
            err,
            AggregationError::UnknownState { ref state, .. } if state == "EXPLODED"
        ));
        assert_eq!(host.summary_state(), Some("UP"));
    }

    #[test]
    fn test_set_members_drops_counts() {
        let mut group = MonitoredObject::hostgroup("live_1", "web");
        group.set_state_counts(StateCounts::new().with("UP", SubState::Normal, 1));
        group.set_members(vec![MonitoredObject::host("live_1", "web01").into_ref()]);

        assert!(group.state_counts().is_none());
        assert_eq!(group.members().len(), 1);
    }

    #[test]
    fn test_set_counts_drops_members() {
        let mut group = MonitoredObject::hostgroup("live_1", "web");
        group.set_members(vec![MonitoredObject::host("live_1", "web01").into_ref()]);
        group.set_state_counts(StateCounts::new().with("UP", SubState::Normal, 1));

        assert!(group.members().is_empty());
        assert_eq!(group.state_counts().map(StateCounts::total), Some(1));
    }

    #[test]
    fn test_configured_members_skip_count_queries() {
        let group = MonitoredObject::hostgroup("live_1", "web")
            .with_member(MonitoredObject::host("live_1", "web01").into_ref());
        assert!(group.required_queries().is_empty());

        let host = MonitoredObject::host("live_1", "web01")
            .with_member(MonitoredObject::service("live_1", "web01", "HTTP").into_ref());
        assert_eq!(host.required_queries(), vec![QueryKind::HostState]);
    }
}
