use alloc::{collections::BTreeMap, string::String};
use serde::{Deserialize, Serialize};

/// Cumulative quiz points of a single user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Score {
    pub points: u64,
    /// Display name seen at the time of the last award.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Persisted document keyed by user ID.
pub type Scoreboard = BTreeMap<u64, Score>;

/// One row of the leaderboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub user_id: u64,
    pub points: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
