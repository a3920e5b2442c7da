//! Serializable state snapshot for renderers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{MonitoredObject, ObjectType};
use crate::backend::StateRecord;
use crate::state::StateType;

/// Read-only view of an object's state, as handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateInformation {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_description: Option<String>,

    pub state: Option<String>,
    pub output: String,
    pub problem_has_been_acknowledged: bool,
    pub in_downtime: bool,

    pub summary_state: Option<String>,
    pub summary_output: String,
    pub summary_problem_has_been_acknowledged: bool,
    pub summary_in_downtime: bool,

    /// Problem text when the state could not be determined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,

    /// Check details, hosts and services only.
    #[serde(flatten)]
    pub check: Option<CheckInformation>,

    /// One level of member snapshots, without their own members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<StateInformation>>,
}

/// Check result details of a host or service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInformation {
    pub downtime_author: Option<String>,
    pub downtime_data: Option<String>,
    pub downtime_start: Option<DateTime<Utc>>,
    pub downtime_end: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
    pub next_check: Option<DateTime<Utc>>,
    pub state_type: Option<StateType>,
    pub current_check_attempt: Option<u32>,
    pub max_check_attempts: Option<u32>,
    pub last_state_change: Option<DateTime<Utc>>,
    pub last_hard_state_change: Option<DateTime<Utc>>,
    /// Seconds since the last state change.
    pub state_duration: Option<i64>,
    pub perfdata: String,
}

impl CheckInformation {
    fn from_record(record: &StateRecord, now: DateTime<Utc>) -> Self {
        let downtime = record.downtime.as_ref();
        Self {
            downtime_author: downtime.map(|d| d.author.clone()),
            downtime_data: downtime.map(|d| d.comment.clone()),
            downtime_start: downtime.map(|d| d.start),
            downtime_end: downtime.map(|d| d.end),
            last_check: record.last_check,
            next_check: record.next_check,
            state_type: record.state_type,
            current_check_attempt: record.current_check_attempt,
            max_check_attempts: record.max_check_attempts,
            last_state_change: record.last_state_change,
            last_hard_state_change: record.last_hard_state_change,
            state_duration: record
                .last_state_change
                .map(|changed| (now - changed).num_seconds()),
            perfdata: record.perfdata.clone(),
        }
    }
}

impl MonitoredObject {
    /// Snapshot of this object's state.
    ///
    /// With `include_members` the direct members are included, each without
    /// its own members.
    pub fn state_information(&self, include_members: bool) -> StateInformation {
        self.state_information_at(include_members, Utc::now())
    }

    /// Same as [`MonitoredObject::state_information`] with an explicit clock.
    pub fn state_information_at(
        &self,
        include_members: bool,
        now: DateTime<Utc>,
    ) -> StateInformation {
        let check = if self.object_type.has_check() {
            self.record()
                .map(|record| CheckInformation::from_record(record, now))
        } else {
            None
        };

        let members = (include_members && !self.members().is_empty()).then(|| {
            self.members()
                .iter()
                .map(|member| member.borrow().state_information_at(false, now))
                .collect()
        });

        StateInformation {
            object_type: self.object_type,
            name: self.name.clone(),
            service_description: self.service_description.clone(),
            state: self.state().map(str::to_string),
            output: self.output().to_string(),
            problem_has_been_acknowledged: self.acknowledged(),
            in_downtime: self.in_downtime(),
            summary_state: self.summary_state().map(str::to_string),
            summary_output: self.summary_output().to_string(),
            summary_problem_has_been_acknowledged: self.summary_acknowledged(),
            summary_in_downtime: self.summary_in_downtime(),
            problem: self.problem().map(ToString::to_string),
            check,
            members,
        }
    }
}
