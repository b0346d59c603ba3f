use crate::gateway::UserId;
use core::time::Duration;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::time::Instant;

/// Per-user cooldown between quiz starts. The cooldown spans every channel.
pub struct Limiter {
    cooldown: Duration,
    last_start: DashMap<UserId, Instant>,
}

impl Limiter {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, last_start: DashMap::new() }
    }

    /// Records `now` as the user's latest start if the cooldown has elapsed. Otherwise, nothing is recorded
    /// and the remaining wait is returned.
    pub fn check_and_record(&self, user: UserId, now: Instant) -> Result<(), Duration> {
        match self.last_start.entry(user) {
            Entry::Vacant(entry) => {
                entry.insert(now);
                Ok(())
            }
            Entry::Occupied(mut entry) => {
                let elapsed = now.saturating_duration_since(*entry.get());
                if elapsed < self.cooldown {
                    return Err(self.cooldown - elapsed);
                }
                entry.insert(now);
                Ok(())
            }
        }
    }
}
