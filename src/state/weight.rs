//! Severity weights per state and substate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{SubState, ERROR_STATE};
use crate::error::ConfigError;

/// Severity weight of every known state in each substate. Higher is worse.
///
/// Serialized as a plain mapping, e.g. `{"CRITICAL": {"normal": 8, "ack": 6}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable {
    states: BTreeMap<String, BTreeMap<SubState, i32>>,
}

impl WeightTable {
    /// An empty table. Use [`WeightTable::default`] for the built-in weights.
    pub fn new() -> Self {
        Self {
            states: BTreeMap::new(),
        }
    }

    /// Parse a table from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let table: WeightTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn insert(&mut self, state: &str, substate: SubState, weight: i32) {
        self.states
            .entry(state.to_string())
            .or_default()
            .insert(substate, weight);
    }

    /// Builder form of [`WeightTable::insert`].
    pub fn with(mut self, state: &str, substate: SubState, weight: i32) -> Self {
        self.insert(state, substate, weight);
        self
    }

    pub fn contains_state(&self, state: &str) -> bool {
        self.states.contains_key(state)
    }

    pub fn weight(&self, state: &str, substate: SubState) -> Option<i32> {
        self.states.get(state)?.get(&substate).copied()
    }

    /// Substate to rank `state` in: `ack` when acknowledged and the state
    /// defines an ack weight, else `downtime` when in downtime and defined,
    /// else `normal`.
    pub fn effective_substate(
        &self,
        state: &str,
        acknowledged: bool,
        in_downtime: bool,
    ) -> SubState {
        let defined = |sub| self.weight(state, sub).is_some();
        if acknowledged && defined(SubState::Ack) {
            SubState::Ack
        } else if in_downtime && defined(SubState::Downtime) {
            SubState::Downtime
        } else {
            SubState::Normal
        }
    }

    /// Every state needs a normal weight, and the error fallback must exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (state, weights) in &self.states {
            if !weights.contains_key(&SubState::Normal) {
                return Err(ConfigError::MissingNormalWeight(state.clone()));
            }
        }
        if !self.contains_state(ERROR_STATE) {
            return Err(ConfigError::MissingFallbackState(ERROR_STATE.to_string()));
        }
        Ok(())
    }

    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        use SubState::{Ack, Downtime, Normal};

        let mut table = WeightTable::new();
        let defaults: [(&str, &[(SubState, i32)]); 9] = [
            ("UNREACHABLE", &[(Normal, 9), (Ack, 6), (Downtime, 6)]),
            ("DOWN", &[(Normal, 10), (Ack, 6), (Downtime, 6)]),
            ("CRITICAL", &[(Normal, 8), (Ack, 6), (Downtime, 6)]),
            ("WARNING", &[(Normal, 7), (Ack, 5), (Downtime, 5)]),
            ("UNKNOWN", &[(Normal, 4), (Ack, 3), (Downtime, 3)]),
            ("ERROR", &[(Normal, 4), (Ack, 3), (Downtime, 3)]),
            ("UP", &[(Normal, 2), (Downtime, 2)]),
            ("OK", &[(Normal, 1), (Downtime, 1)]),
            ("PENDING", &[(Normal, 0), (Downtime, 0)]),
        ];
        for (state, weights) in defaults {
            for &(substate, weight) in weights {
                table.insert(state, substate, weight);
            }
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_table_is_valid() {
        let table = WeightTable::default();
        assert!(table.validate().is_ok());
        assert_eq!(table.weight("DOWN", SubState::Normal), Some(10));
        assert_eq!(table.weight("OK", SubState::Ack), None);
    }

    #[rstest]
    #[case(false, false, SubState::Normal)]
    #[case(true, false, SubState::Ack)]
    #[case(false, true, SubState::Downtime)]
    #[case(true, true, SubState::Ack)]
    fn test_effective_substate_critical(
        #[case] ack: bool,
        #[case] downtime: bool,
        #[case] expected: SubState,
    ) {
        let table = WeightTable::default();
        assert_eq!(table.effective_substate("CRITICAL", ack, downtime), expected);
    }

    #[test]
    fn test_effective_substate_falls_back_when_undefined() {
        let table = WeightTable::default();
        // OK has no ack weight, UP has a downtime weight.
        assert_eq!(table.effective_substate("OK", true, false), SubState::Normal);
        assert_eq!(table.effective_substate("UP", true, true), SubState::Downtime);
    }

    #[test]
    fn test_from_json() {
        let table = WeightTable::from_json(
            r#"{"OK": {"normal": 0}, "CRITICAL": {"normal": 3, "ack": 1}, "ERROR": {"normal": 2}}"#,
        )
        .unwrap();
        assert_eq!(table.weight("CRITICAL", SubState::Ack), Some(1));
        assert_eq!(table.states().count(), 3);
    }

    #[test]
    fn test_validate_rejects_missing_normal() {
        let err = WeightTable::from_json(r#"{"ERROR": {"normal": 1}, "WARNING": {"ack": 1}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingNormalWeight(state) if state == "WARNING"));
    }

    #[test]
    fn test_validate_requires_error_state() {
        let table = WeightTable::new().with("OK", SubState::Normal, 0);
        assert!(matches!(
            table.validate(),
            Err(ConfigError::MissingFallbackState(_))
        ));
    }
}
