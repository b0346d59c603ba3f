use crate::{error::Result, store::JsonStore};
use chrono::{DateTime, Utc};
use core::num::NonZeroU64;
use model::stats::{
    Activity, CommandCount, DayCount, Event, JokeCount, Leaders, MessageQuery, MessageReport, Overview, UserCount,
    UserList, UserSummary,
};
use std::{collections::BTreeMap, path::Path};

/// Where a message was seen.
#[derive(Clone, Copy, Debug)]
pub struct Origin {
    pub user: NonZeroU64,
    pub channel: NonZeroU64,
    pub guild: Option<NonZeroU64>,
}

/// Usage counters. Updates stay in memory until [`UsageStats::flush`] is called.
pub struct UsageStats(JsonStore<model::Stats>);

impl UsageStats {
    pub const FILE_NAME: &'static str = "stats";
    /// The event log keeps only the most recent entries.
    pub const MAX_EVENTS: usize = 10_000;
    const OVERVIEW_SIZE: usize = 10;

    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self(JsonStore::new(dir, Self::FILE_NAME))
    }

    pub async fn record_message(&self, origin: Origin, timestamp: u64) {
        let Origin { user, channel, guild } = origin;
        self.0
            .modify(|stats| {
                let activity = stats.users.entry(user.get()).or_insert_with(|| Activity {
                    first_seen_at: timestamp,
                    last_seen_at: timestamp,
                    count: 0,
                });
                activity.last_seen_at = activity.last_seen_at.max(timestamp);
                activity.count += 1;
                stats.totals.unique_users = stats.users.len() as u64;
                stats.totals.messages += 1;
                *stats.messages_per_channel.entry(channel.get()).or_default() += 1;
                push_event(
                    &mut stats.events,
                    Event::Message {
                        ts: timestamp,
                        user_id: user.get(),
                        channel_id: channel.get(),
                        guild_id: guild.map(NonZeroU64::get),
                    },
                );
            })
            .await;
    }

    pub async fn record_command(&self, name: &str, user: NonZeroU64, timestamp: u64) {
        self.0
            .modify(|stats| {
                stats.totals.commands += 1;
                *stats.commands_used.entry(name.into()).or_default() += 1;
                push_event(
                    &mut stats.events,
                    Event::Command { ts: timestamp, user_id: user.get(), command_name: name.into() },
                );
            })
            .await;
    }

    pub async fn record_joke(&self, id: &str, user: NonZeroU64, timestamp: u64) {
        self.0
            .modify(|stats| {
                stats.totals.jokes += 1;
                *stats.jokes.entry(id.into()).or_default() += 1;
                push_event(&mut stats.events, Event::Joke { ts: timestamp, user_id: user.get(), joke_id: id.into() });
            })
            .await;
    }

    pub async fn record_quiz(&self) {
        self.0.modify(|stats| stats.totals.quizzes_played += 1).await;
    }

    pub async fn flush(&self) -> Result<()> {
        self.0.flush().await
    }

    pub async fn overview(&self) -> Overview {
        let stats = self.0.read().await;
        let mut users_by_messages: Vec<_> = stats
            .users
            .iter()
            .map(|(&user_id, activity)| UserCount { user_id, count: activity.count })
            .collect();
        sort_users(&mut users_by_messages);
        users_by_messages.truncate(Self::OVERVIEW_SIZE);

        let mut commands = rank_commands(&stats);
        commands.truncate(Self::OVERVIEW_SIZE);
        let mut jokes = rank_jokes(&stats);
        jokes.truncate(Self::OVERVIEW_SIZE);

        Overview { totals: stats.totals, top: Leaders { users_by_messages, commands, jokes } }
    }

    /// Aggregates the logged message events that pass `query`.
    pub async fn messages(&self, query: &MessageQuery) -> MessageReport {
        let stats = self.0.read().await;
        let from = query.from.unwrap_or(0);
        let to = query.to.unwrap_or(u64::MAX);

        let mut count = 0;
        let mut by_user = BTreeMap::<u64, u64>::new();
        let mut by_day = BTreeMap::<String, u64>::new();
        for event in &stats.events {
            let &Event::Message { ts, user_id, channel_id, .. } = event else {
                continue;
            };
            if ts < from || ts > to {
                continue;
            }
            if query.channel_id.is_some_and(|id| id != channel_id) || query.user_id.is_some_and(|id| id != user_id) {
                continue;
            }

            count += 1;
            *by_user.entry(user_id).or_default() += 1;
            *by_day.entry(day_of(ts)).or_default() += 1;
        }

        let mut by_user: Vec<_> = by_user.into_iter().map(|(user_id, count)| UserCount { user_id, count }).collect();
        sort_users(&mut by_user);
        let by_day = by_day.into_iter().map(|(day, count)| DayCount { day, count }).collect();
        MessageReport { count, by_user, by_day }
    }

    pub async fn users(&self, top: usize) -> UserList {
        let stats = self.0.read().await;
        let mut list: Vec<_> = stats
            .users
            .iter()
            .map(|(&user_id, activity)| UserSummary {
                user_id,
                first_seen_at: activity.first_seen_at,
                last_seen_at: activity.last_seen_at,
                messages: activity.count,
            })
            .collect();
        list.sort_unstable_by(|a, b| b.messages.cmp(&a.messages).then(a.user_id.cmp(&b.user_id)));
        let total = list.len();
        list.truncate(top);
        UserList { total, top: list }
    }

    pub async fn commands(&self, top: usize) -> Vec<CommandCount> {
        let mut commands = rank_commands(&self.0.read().await);
        commands.truncate(top);
        commands
    }

    pub async fn jokes(&self, top: usize) -> Vec<JokeCount> {
        let mut jokes = rank_jokes(&self.0.read().await);
        jokes.truncate(top);
        jokes
    }
}

fn push_event(events: &mut Vec<Event>, event: Event) {
    events.push(event);
    if let Some(excess) = events.len().checked_sub(UsageStats::MAX_EVENTS) {
        events.drain(..excess);
    }
}

fn sort_users(users: &mut [UserCount]) {
    users.sort_unstable_by(|a, b| b.count.cmp(&a.count).then(a.user_id.cmp(&b.user_id)));
}

fn rank_commands(stats: &model::Stats) -> Vec<CommandCount> {
    let mut commands: Vec<_> =
        stats.commands_used.iter().map(|(name, &count)| CommandCount { name: name.clone(), count }).collect();
    commands.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    commands
}

fn rank_jokes(stats: &model::Stats) -> Vec<JokeCount> {
    let mut jokes: Vec<_> = stats.jokes.iter().map(|(id, &count)| JokeCount { id: id.clone(), count }).collect();
    jokes.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.id.cmp(&b.id)));
    jokes
}

/// UTC calendar day of a millisecond timestamp.
fn day_of(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(|| String::from("unknown"), |time| time.format("%Y-%m-%d").to_string())
}
