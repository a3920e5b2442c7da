//! Check results as reported by a backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{StateType, SubState};

/// Scheduled downtime attached to a check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Downtime {
    pub author: String,
    #[serde(default)]
    pub comment: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Current state of one host or service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateRecord {
    pub host_name: String,
    /// `None` for host records.
    pub service_description: Option<String>,
    pub state: String,
    pub output: String,
    pub acknowledged: bool,
    pub in_downtime: bool,
    pub downtime: Option<Downtime>,
    pub state_type: Option<StateType>,
    /// State at the last hard state change, used for hard-state-only queries.
    pub last_hard_state: Option<String>,
    pub current_check_attempt: Option<u32>,
    pub max_check_attempts: Option<u32>,
    pub last_check: Option<DateTime<Utc>>,
    pub next_check: Option<DateTime<Utc>>,
    pub last_state_change: Option<DateTime<Utc>>,
    pub last_hard_state_change: Option<DateTime<Utc>>,
    pub perfdata: String,
}

impl StateRecord {
    pub fn host(host_name: &str, state: &str) -> Self {
        Self {
            host_name: host_name.to_string(),
            state: state.to_string(),
            ..Default::default()
        }
    }

    pub fn service(host_name: &str, service_description: &str, state: &str) -> Self {
        Self {
            host_name: host_name.to_string(),
            service_description: Some(service_description.to_string()),
            state: state.to_string(),
            ..Default::default()
        }
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.output = output.to_string();
        self
    }

    pub fn acknowledged(mut self) -> Self {
        self.acknowledged = true;
        self
    }

    pub fn in_downtime(mut self) -> Self {
        self.in_downtime = true;
        self
    }

    /// Mark the record as a soft state that was `last_hard_state` when it last hardened.
    pub fn soft(mut self, last_hard_state: &str) -> Self {
        self.state_type = Some(StateType::Soft);
        self.last_hard_state = Some(last_hard_state.to_string());
        self
    }

    pub fn is_service(&self) -> bool {
        self.service_description.is_some()
    }

    /// Queue key of the object this record describes.
    pub fn key(&self) -> String {
        match &self.service_description {
            Some(description) => super::service_key(&self.host_name, description),
            None => self.host_name.clone(),
        }
    }

    pub fn substate(&self) -> SubState {
        SubState::from_flags(self.acknowledged, self.in_downtime)
    }

    /// The record as seen by a hard-states-only query: a soft state is
    /// replaced by the last hard state when one is known.
    pub fn hard_state(&self) -> StateRecord {
        let mut record = self.clone();
        if record.state_type == Some(StateType::Soft) {
            if let Some(hard) = &self.last_hard_state {
                record.state = hard.clone();
                record.state_type = Some(StateType::Hard);
            }
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keys() {
        assert_eq!(StateRecord::host("web01", "UP").key(), "web01");
        assert_eq!(
            StateRecord::service("web01", "HTTP", "OK").key(),
            "web01~~HTTP"
        );
    }

    #[test]
    fn test_hard_state() {
        let record = StateRecord::service("web01", "HTTP", "CRITICAL").soft("OK");
        let hard = record.hard_state();
        assert_eq!(hard.state, "OK");
        assert_eq!(hard.state_type, Some(StateType::Hard));

        let plain = StateRecord::host("web01", "DOWN");
        assert_eq!(plain.hard_state().state, "DOWN");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let record: StateRecord = serde_json::from_str(
            r#"{"host_name": "db01", "state": "DOWN", "acknowledged": true, "state_type": "HARD"}"#,
        )
        .unwrap();
        assert_eq!(record.substate(), SubState::Ack);
        assert_eq!(record.state_type, Some(StateType::Hard));
        assert!(!record.is_service());
    }
}
