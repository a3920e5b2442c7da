//! Member state counts.

use super::SubState;

/// Counts for one state, split by substate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBucket {
    pub state: String,
    counts: [u64; 3],
}

impl StateBucket {
    fn new(state: &str) -> Self {
        Self {
            state: state.to_string(),
            counts: [0; 3],
        }
    }

    pub fn get(&self, substate: SubState) -> u64 {
        self.counts[substate.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Number of members per state and substate.
///
/// States keep the order in which they were first added, which is the order
/// the backend declared them in. Aggregation walks buckets in this order, so
/// it decides which of two equally weighted states wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateCounts {
    buckets: Vec<StateBucket>,
}

impl StateCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` members in `state`/`substate`.
    pub fn add(&mut self, state: &str, substate: SubState, count: u64) {
        let idx = match self.buckets.iter().position(|b| b.state == state) {
            Some(idx) => idx,
            None => {
                self.buckets.push(StateBucket::new(state));
                self.buckets.len() - 1
            }
        };
        self.buckets[idx].counts[substate.index()] += count;
    }

    /// Builder form of [`StateCounts::add`].
    pub fn with(mut self, state: &str, substate: SubState, count: u64) -> Self {
        self.add(state, substate, count);
        self
    }

    pub fn get(&self, state: &str, substate: SubState) -> u64 {
        self.buckets
            .iter()
            .find(|b| b.state == state)
            .map_or(0, |b| b.get(substate))
    }

    /// Total number of members across all buckets.
    pub fn total(&self) -> u64 {
        self.buckets.iter().map(StateBucket::total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn buckets(&self) -> &[StateBucket] {
        &self.buckets
    }

    /// All (state, substate, count) triples, zero counts included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, SubState, u64)> + '_ {
        self.buckets.iter().flat_map(|bucket| {
            SubState::ALL
                .into_iter()
                .map(move |sub| (bucket.state.as_str(), sub, bucket.get(sub)))
        })
    }

    /// Fold another set of counts into this one.
    pub fn merge(&mut self, other: &StateCounts) {
        for (state, substate, count) in other.iter() {
            if count > 0 {
                self.add(state, substate, count);
            }
        }
    }
}

impl<'a> FromIterator<(&'a str, SubState, u64)> for StateCounts {
    fn from_iter<T: IntoIterator<Item = (&'a str, SubState, u64)>>(iter: T) -> Self {
        let mut counts = StateCounts::new();
        for (state, substate, count) in iter {
            counts.add(state, substate, count);
        }
        counts
    }
}
