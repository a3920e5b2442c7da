//! State vocabulary and summary-state aggregation.
//!
//! States themselves are plain strings (`"UP"`, `"CRITICAL"`, ...) exactly as a
//! backend reports them. What makes one state worse than another is the
//! [`WeightTable`], which ranks every state in each of its substates.
//!
//! - [`counts`]: per-state/per-substate member counts reported by backends
//! - [`weight`]: the severity table and substate selection
//! - [`aggregate`]: reduction of counts or child summaries into one [`Summary`]

pub mod aggregate;
pub mod counts;
pub mod weight;

pub use aggregate::{compute_from_counts, counts_output, merge_child_state, merge_children, Summary};
pub use counts::{StateBucket, StateCounts};
pub use weight::WeightTable;

use serde::{Deserialize, Serialize};

/// Summary state of an object that has no state source and no members.
pub const ERROR_STATE: &str = "ERROR";

/// Modifier applied to a state. Acknowledged and downtimed problems usually
/// weigh less than the same state without modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubState {
    Normal,
    Ack,
    Downtime,
}

impl SubState {
    /// All substates in iteration order.
    pub const ALL: [SubState; 3] = [SubState::Normal, SubState::Ack, SubState::Downtime];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubState::Normal => "normal",
            SubState::Ack => "ack",
            SubState::Downtime => "downtime",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            SubState::Normal => 0,
            SubState::Ack => 1,
            SubState::Downtime => 2,
        }
    }

    /// Substate of a check result with the given flags. Acknowledgement wins
    /// over downtime.
    pub fn from_flags(acknowledged: bool, in_downtime: bool) -> Self {
        if acknowledged {
            SubState::Ack
        } else if in_downtime {
            SubState::Downtime
        } else {
            SubState::Normal
        }
    }
}

impl std::fmt::Display for SubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a check result is confirmed or still settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StateType {
    Soft,
    Hard,
}

impl std::fmt::Display for StateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateType::Soft => write!(f, "SOFT"),
            StateType::Hard => write!(f, "HARD"),
        }
    }
}
