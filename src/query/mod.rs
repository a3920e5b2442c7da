//! Query batching.
//!
//! Objects do not talk to backends themselves. They are enqueued into a
//! [`QueryBatcher`] under a [`QueueKey`]; identical keys collapse into one
//! requested key, and all keys sharing backend, [`QueryKind`] and
//! [`OptionMask`] are answered by a single backend call.

pub mod batcher;
mod dispatch;

pub use batcher::{ExecutionReport, QueryBatcher};

use crate::backend::{keys, Feature, Filter, FilterValue};
use crate::object::{MonitoredObject, ObjectConfig};

const BY_HOST_NAME: [Filter; 1] = [Filter::equals(keys::HOST_NAME, FilterValue::Name)];
const BY_SERVICE: [Filter; 2] = [
    Filter::equals(keys::HOST_NAME, FilterValue::Name),
    Filter::equals(keys::SERVICE_DESCRIPTION, FilterValue::ServiceDescription),
];
const BY_GROUP: [Filter; 1] = [Filter::member_of(keys::GROUPS, FilterValue::Name)];
const BY_HOSTGROUP: [Filter; 1] = [Filter::member_of(keys::HOST_GROUPS, FilterValue::Name)];
const BY_SERVICEGROUP: [Filter; 1] = [Filter::member_of(keys::SERVICE_GROUPS, FilterValue::Name)];

/// What a queued request asks the backend for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKind {
    /// State of a host.
    HostState,
    /// State of a service.
    ServiceState,
    /// Service state counts of a host.
    HostMemberState,
    /// Host and service state counts of a host group.
    HostgroupMemberState,
    /// Service state counts of a service group.
    ServicegroupMemberState,
    /// A host's services as member objects.
    HostMemberDetails,
    /// A host group's hosts as member objects, with their service counts.
    HostgroupMemberDetails,
    /// A service group's services as member objects.
    ServicegroupMemberDetails,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::HostState => "hostState",
            QueryKind::ServiceState => "serviceState",
            QueryKind::HostMemberState => "hostMemberState",
            QueryKind::HostgroupMemberState => "hostgroupMemberState",
            QueryKind::ServicegroupMemberState => "servicegroupMemberState",
            QueryKind::HostMemberDetails => "hostMemberDetails",
            QueryKind::HostgroupMemberDetails => "hostgroupMemberDetails",
            QueryKind::ServicegroupMemberDetails => "servicegroupMemberDetails",
        }
    }

    /// Backend operation answering this kind.
    pub fn feature(&self) -> Feature {
        match self {
            QueryKind::HostState | QueryKind::HostgroupMemberDetails => Feature::HostState,
            QueryKind::ServiceState
            | QueryKind::HostMemberDetails
            | QueryKind::ServicegroupMemberDetails => Feature::ServiceState,
            QueryKind::HostMemberState => Feature::HostStateCounts,
            QueryKind::HostgroupMemberState => Feature::HostgroupStateCounts,
            QueryKind::ServicegroupMemberState => Feature::ServicegroupStateCounts,
        }
    }

    /// Filters relating a requested key to the records to return.
    pub fn filters(&self) -> &'static [Filter] {
        match self {
            QueryKind::HostState | QueryKind::HostMemberState | QueryKind::HostMemberDetails => {
                &BY_HOST_NAME
            }
            QueryKind::ServiceState => &BY_SERVICE,
            QueryKind::HostgroupMemberState | QueryKind::ServicegroupMemberState => &BY_GROUP,
            QueryKind::HostgroupMemberDetails => &BY_HOSTGROUP,
            QueryKind::ServicegroupMemberDetails => &BY_SERVICEGROUP,
        }
    }

    /// Whether the answer is a table of member state counts.
    pub fn yields_counts(&self) -> bool {
        matches!(
            self,
            QueryKind::HostMemberState
                | QueryKind::HostgroupMemberState
                | QueryKind::ServicegroupMemberState
        )
    }

    /// Whether an unknown key means "no members" rather than a missing object.
    pub fn tolerates_missing(&self) -> bool {
        matches!(self, QueryKind::HostMemberState | QueryKind::HostMemberDetails)
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitset of query options. Part of the queue key, so objects with different
/// options are never answered by the same call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionMask(u8);

impl OptionMask {
    /// Report the last hard state instead of a soft one.
    pub const ONLY_HARD_STATES: u8 = 1;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn for_config(config: &ObjectConfig) -> Self {
        Self::default().with_only_hard_states(config.only_hard_states)
    }

    pub fn only_hard_states(&self) -> bool {
        self.0 & Self::ONLY_HARD_STATES != 0
    }

    pub fn with_only_hard_states(self, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | Self::ONLY_HARD_STATES)
        } else {
            Self(self.0 & !Self::ONLY_HARD_STATES)
        }
    }
}

impl std::fmt::Display for OptionMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04b}", self.0)
    }
}

/// Identity of one queued request. Objects with equal keys share a result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueKey {
    pub backend_id: String,
    pub kind: QueryKind,
    pub options: OptionMask,
    /// `name`, or `name~~description` for services.
    pub object_key: String,
}

impl QueueKey {
    pub fn for_object(object: &MonitoredObject, kind: QueryKind) -> Self {
        let object_key = match kind {
            QueryKind::ServiceState => object.object_key(),
            _ => object.name().to_string(),
        };
        Self {
            backend_id: object.backend_id().to_string(),
            kind,
            options: OptionMask::for_config(object.config()),
            object_key,
        }
    }
}
