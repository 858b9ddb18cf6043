//! Post-mutation payloads.
//!
//! Each mutation broadcasts a fixed subset of the counter's fields. The
//! subsets are encoded as one variant per mutation so the wire contract
//! cannot drift by building field maps inline.

use serde::Serialize;

use crate::counter::Counter;
use crate::mutation::Mutation;

/// Fields broadcast after `increment` and `firstLoad`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayState {
    pub count: u64,
    pub all_time_high: u64,
    pub player_count: u64,
}

/// Fields broadcast after `reset`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetState {
    pub count: u64,
    pub reset_count: u64,
}

/// Fields broadcast after `regret`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegretState {
    pub count: u64,
    pub regret_count: u64,
}

/// The partial snapshot published after a successful mutation.
///
/// Serialized untagged: the JSON object carries exactly the variant's fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CounterUpdate {
    Incremented(PlayState),
    Reset(ResetState),
    FirstLoaded(PlayState),
    Regretted(RegretState),
}

impl CounterUpdate {
    /// Project the post-mutation record onto the mutation's field set.
    pub fn project(mutation: Mutation, counter: &Counter) -> Self {
        let play = || PlayState {
            count: counter.count,
            all_time_high: counter.all_time_high,
            player_count: counter.player_count,
        };
        match mutation {
            Mutation::Increment => Self::Incremented(play()),
            Mutation::FirstLoad => Self::FirstLoaded(play()),
            Mutation::Reset => Self::Reset(ResetState {
                count: counter.count,
                reset_count: counter.reset_count,
            }),
            Mutation::Regret => Self::Regretted(RegretState {
                count: counter.count,
                regret_count: counter.regret_count,
            }),
        }
    }

    /// The mutation this update reports.
    pub fn mutation(&self) -> Mutation {
        match self {
            Self::Incremented(_) => Mutation::Increment,
            Self::Reset(_) => Mutation::Reset,
            Self::FirstLoaded(_) => Mutation::FirstLoad,
            Self::Regretted(_) => Mutation::Regret,
        }
    }
}
