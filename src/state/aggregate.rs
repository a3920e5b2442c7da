//! Summary state aggregation.
//!
//! Two reductions produce the summary of a parent object: one from raw member
//! counts, one from the summaries of already aggregated children. Both are a
//! max-by-weight selection where a candidate only replaces the running
//! summary when it is *strictly* heavier, so equal weights keep the earliest
//! candidate.

use itertools::Itertools;
use serde::Serialize;
use tracing::warn;

use super::{StateCounts, SubState, WeightTable, ERROR_STATE};
use crate::error::AggregationError;

/// Worst-case state of an object and everything below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// `None` until a state source has been aggregated.
    pub state: Option<String>,
    pub output: String,
    pub acknowledged: bool,
    pub in_downtime: bool,
}

impl Summary {
    pub fn new(state: &str, output: &str, acknowledged: bool, in_downtime: bool) -> Self {
        Self {
            state: Some(state.to_string()),
            output: output.to_string(),
            acknowledged,
            in_downtime,
        }
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }
}

/// Weight of the summary's current state, `None` if it has no state yet.
fn current_weight(
    object: &str,
    summary: &Summary,
    weights: &WeightTable,
) -> Result<Option<i32>, AggregationError> {
    let Some(state) = summary.state() else {
        return Ok(None);
    };
    if !weights.contains_state(state) {
        return Err(AggregationError::UnknownState {
            object: object.to_string(),
            state: state.to_string(),
        });
    }
    let substate = weights.effective_substate(state, summary.acknowledged, summary.in_downtime);
    weights
        .weight(state, substate)
        .map(Some)
        .ok_or_else(|| AggregationError::UnknownWeight {
            object: object.to_string(),
            state: state.to_string(),
            substate: substate.to_string(),
        })
}

/// Reduce member counts into a summary, starting from `current`.
///
/// `object` only labels errors. Returns [`ERROR_STATE`] when there is neither
/// a prior state nor a single counted member.
pub fn compute_from_counts(
    object: &str,
    current: &Summary,
    counts: &StateCounts,
    weights: &WeightTable,
) -> Result<Summary, AggregationError> {
    let mut summary = current.clone();
    let mut max_weight = current_weight(object, current, weights)?;
    let mut members = 0u64;

    for (state, substate, count) in counts.iter().filter(|(_, _, count)| *count > 0) {
        members += count;

        let weight = weights
            .weight(state, substate)
            .ok_or_else(|| AggregationError::UnknownWeight {
                object: object.to_string(),
                state: state.to_string(),
                substate: substate.to_string(),
            })?;

        if max_weight.map_or(true, |max| max < weight) {
            max_weight = Some(weight);
            summary.state = Some(state.to_string());
            summary.acknowledged = substate == SubState::Ack;
            summary.in_downtime = substate == SubState::Downtime;
        }
    }

    if summary.state.is_none() && members == 0 {
        summary.state = Some(ERROR_STATE.to_string());
    }

    let output = counts_output(counts);
    if !output.is_empty() {
        summary.output = output;
    }

    Ok(summary)
}

/// Fold one child's summary into the parent's.
///
/// The child replaces the parent's state and flags when the parent has no
/// state yet or the child is strictly heavier. Output is left alone. A child
/// without a summary state contributes nothing.
pub fn merge_child_state(
    object: &str,
    current: &Summary,
    child: &Summary,
    weights: &WeightTable,
) -> Result<Summary, AggregationError> {
    let Some(child_state) = child.state() else {
        return Ok(current.clone());
    };
    if !weights.contains_state(child_state) {
        return Err(AggregationError::UnknownState {
            object: object.to_string(),
            state: child_state.to_string(),
        });
    }

    let replace = match current_weight(object, current, weights)? {
        None => true,
        Some(parent_weight) => match current_weight(object, child, weights)? {
            Some(child_weight) => parent_weight < child_weight,
            None => false,
        },
    };

    let mut summary = current.clone();
    if replace {
        summary.state = Some(child_state.to_string());
        summary.acknowledged = child.acknowledged;
        summary.in_downtime = child.in_downtime;
    }
    Ok(summary)
}

/// Fold an ordered list of children into `current`, left to right.
///
/// The resulting output joins the children's non-empty outputs.
pub fn merge_children<'a, I>(
    object: &str,
    current: &Summary,
    children: I,
    weights: &WeightTable,
) -> Result<Summary, AggregationError>
where
    I: IntoIterator<Item = &'a Summary>,
{
    let mut summary = current.clone();
    let mut outputs = Vec::new();

    for child in children {
        if child.state.is_none() {
            warn!(object, "skipping child without summary state");
            continue;
        }
        summary = merge_child_state(object, &summary, child, weights)?;
        let output = child.output.trim();
        if !output.is_empty() {
            outputs.push(output);
        }
    }

    if !outputs.is_empty() {
        summary.output = outputs.iter().join("; ");
    }
    Ok(summary)
}

/// Human readable `"<count> <STATE>"` fragments for every non-empty state.
pub fn counts_output(counts: &StateCounts) -> String {
    counts
        .buckets()
        .iter()
        .filter(|bucket| bucket.total() > 0)
        .map(|bucket| format!("{} {}", bucket.total(), bucket.state))
        .join(", ")
}
