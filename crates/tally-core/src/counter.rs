//! The persisted counter record.

use serde::{Deserialize, Serialize};

use crate::ids::CounterId;

/// A shared counter.
///
/// Serialized in camelCase so full snapshots match the field names used in
/// the partial update payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    /// Externally provisioned identifier.
    pub id: CounterId,
    /// Current value.
    pub count: u64,
    /// Highest `count` ever observed.
    pub all_time_high: u64,
    /// Parties that signaled a first load since the last reset.
    pub player_count: u64,
    /// Number of resets. Never decreases.
    pub reset_count: u64,
    /// Number of regrets. Never decreases.
    pub regret_count: u64,
}

impl Counter {
    /// A freshly provisioned counter with every tally at zero.
    pub fn new(id: CounterId) -> Self {
        Self {
            id,
            count: 0,
            all_time_high: 0,
            player_count: 0,
            reset_count: 0,
            regret_count: 0,
        }
    }

    /// Whether the record satisfies `allTimeHigh >= count`.
    pub fn is_consistent(&self) -> bool {
        self.all_time_high >= self.count
    }

    /// Whether `self` is a legal successor of `previous`: the high-water mark
    /// and the reset/regret tallies never move backwards.
    pub fn follows(&self, previous: &Counter) -> bool {
        self.id == previous.id
            && self.is_consistent()
            && self.all_time_high >= previous.all_time_high
            && self.reset_count >= previous.reset_count
            && self.regret_count >= previous.regret_count
    }
}
