use alloc::{collections::BTreeMap, string::String, vec::Vec};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Totals {
    pub messages: u64,
    pub commands: u64,
    pub jokes: u64,
    pub quizzes_played: u64,
    pub unique_users: u64,
}

/// Activity of a single user. Timestamps are milliseconds since the Unix epoch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub first_seen_at: u64,
    pub last_seen_at: u64,
    pub count: u64,
}

/// One entry of the bounded activity log.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    Message {
        ts: u64,
        user_id: u64,
        channel_id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guild_id: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    Command { ts: u64, user_id: u64, command_name: String },
    #[serde(rename_all = "camelCase")]
    Joke { ts: u64, user_id: u64, joke_id: String },
}

/// Persisted usage statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Stats {
    pub totals: Totals,
    pub users: BTreeMap<u64, Activity>,
    pub messages_per_channel: BTreeMap<u64, u64>,
    pub commands_used: BTreeMap<String, u64>,
    pub jokes: BTreeMap<String, u64>,
    /// Oldest first.
    pub events: Vec<Event>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCount {
    pub user_id: u64,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandCount {
    pub name: String,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JokeCount {
    pub id: String,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DayCount {
    /// `YYYY-MM-DD` in UTC.
    pub day: String,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: u64,
    pub first_seen_at: u64,
    pub last_seen_at: u64,
    pub messages: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserList {
    pub total: usize,
    pub top: Vec<UserSummary>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaders {
    pub users_by_messages: Vec<UserCount>,
    pub commands: Vec<CommandCount>,
    pub jokes: Vec<JokeCount>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub totals: Totals,
    pub top: Leaders,
}

/// Filter over the logged message events. Bounds are inclusive milliseconds since the Unix epoch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageQuery {
    pub from: Option<u64>,
    pub to: Option<u64>,
    pub channel_id: Option<u64>,
    pub user_id: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReport {
    pub count: usize,
    pub by_user: Vec<UserCount>,
    pub by_day: Vec<DayCount>,
}

#[cfg(test)]
mod tests {
    use super::{Event, Stats};

    #[test]
    fn events_are_tagged_by_type() {
        let event = Event::Command { ts: 5, user_id: 7, command_name: "quiz".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "command", "ts": 5, "userId": 7, "commandName": "quiz" }));

        let parsed: Event =
            serde_json::from_str(r#"{ "type": "message", "ts": 1, "userId": 2, "channelId": 3 }"#).unwrap();
        assert_eq!(parsed, Event::Message { ts: 1, user_id: 2, channel_id: 3, guild_id: None });
    }

    #[test]
    fn older_documents_still_load() {
        let stats: Stats = serde_json::from_str(r#"{ "totals": { "messages": 4 } }"#).unwrap();
        assert_eq!(stats.totals.messages, 4);
        assert!(stats.events.is_empty());
        assert!(stats.jokes.is_empty());
    }
}
