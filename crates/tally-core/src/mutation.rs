//! The four counter mutations.
//!
//! [`Mutation::apply`] is the reference semantics. The store executes the same
//! transformation atomically in SQL; tests in `tally-store` check the two agree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::counter::Counter;

/// A defined transformation of a single counter record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutation {
    /// `count += 1`, raising `allTimeHigh` if it is exceeded.
    Increment,
    /// `count = 0`, `playerCount = 0`, `resetCount += 1`.
    Reset,
    /// `playerCount += 1`.
    FirstLoad,
    /// `regretCount += 1`.
    Regret,
}

/// An inbound event name that is not one of the four mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown counter event: {0}")]
pub struct UnknownMutation(pub String);

impl Mutation {
    /// Every mutation, in protocol order.
    pub const ALL: [Mutation; 4] = [
        Mutation::Increment,
        Mutation::Reset,
        Mutation::FirstLoad,
        Mutation::Regret,
    ];

    /// Wire name of the inbound event that triggers this mutation.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Increment => "increment",
            Self::Reset => "reset",
            Self::FirstLoad => "firstLoad",
            Self::Regret => "regret",
        }
    }

    /// Compute the post-mutation record from the current one.
    pub fn apply(self, current: &Counter) -> Counter {
        let mut next = current.clone();
        match self {
            Self::Increment => {
                next.count = current.count.saturating_add(1);
                next.all_time_high = current.all_time_high.max(next.count);
            }
            Self::Reset => {
                next.count = 0;
                next.player_count = 0;
                next.reset_count = current.reset_count.saturating_add(1);
            }
            Self::FirstLoad => {
                next.player_count = current.player_count.saturating_add(1);
            }
            Self::Regret => {
                next.regret_count = current.regret_count.saturating_add(1);
            }
        }
        next
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

impl FromStr for Mutation {
    type Err = UnknownMutation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.event_name() == s)
            .ok_or_else(|| UnknownMutation(s.to_owned()))
    }
}
