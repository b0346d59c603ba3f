use crate::{error::Result, store::JsonStore};
use core::num::NonZeroU64;
use model::{memory::Interaction, Memories, Profile};
use std::path::Path;

/// Per-user assistant memory. Every change is written through.
pub struct UserMemory(JsonStore<Memories>);

impl UserMemory {
    pub const FILE_NAME: &'static str = "user-memory";

    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self(JsonStore::new(dir, Self::FILE_NAME))
    }

    pub async fn profile(&self, user: NonZeroU64) -> Option<Profile> {
        self.0.read().await.remove(&user.get())
    }

    /// Stores an exchange and refreshes the cached username when one is given.
    pub async fn record(&self, user: NonZeroU64, username: Option<&str>, interaction: Interaction) -> Result<()> {
        self.0
            .update(|memories| {
                let profile = memories.entry(user.get()).or_default();
                if let Some(name) = username {
                    profile.username = Some(name.into());
                }
                profile.push(interaction);
            })
            .await
    }

    /// Returns how many of `facts` were new.
    pub async fn learn<S: AsRef<str>>(&self, user: NonZeroU64, facts: &[S]) -> Result<usize> {
        if facts.is_empty() {
            return Ok(0);
        }
        self.0
            .update(|memories| {
                let profile = memories.entry(user.get()).or_default();
                facts.iter().filter(|fact| profile.learn(fact.as_ref())).count()
            })
            .await
    }

    pub async fn set_preference(&self, user: NonZeroU64, key: &str, value: &str) -> Result<()> {
        self.0
            .update(|memories| {
                memories.entry(user.get()).or_default().preferences.insert(key.into(), value.into());
            })
            .await
    }

    /// Drops everything stored about `user`. Returns whether anything existed.
    pub async fn forget(&self, user: NonZeroU64) -> Result<bool> {
        self.0.update(|memories| memories.remove(&user.get()).is_some()).await
    }
}

#[cfg(test)]
mod tests {
    use super::{Interaction, NonZeroU64, UserMemory};

    fn id(raw: u64) -> NonZeroU64 {
        NonZeroU64::new(raw).unwrap()
    }

    fn exchange(timestamp: u64, message: &str) -> Interaction {
        Interaction { timestamp, message: message.into(), response: String::from("ok") }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn remembers_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let memory = UserMemory::new(dir.path());
        assert!(memory.profile(id(4)).await.is_none());

        memory.record(id(4), Some("ada"), exchange(10, "hello")).await.unwrap();
        memory.record(id(4), None, exchange(20, "again")).await.unwrap();
        assert_eq!(memory.learn(id(4), &["User likes tea", "User likes tea", "User lives in Bern"]).await.unwrap(), 2);
        memory.set_preference(id(4), "language", "German").await.unwrap();

        let reopened = UserMemory::new(dir.path());
        let profile = reopened.profile(id(4)).await.unwrap();
        assert_eq!(profile.username.as_deref(), Some("ada"));
        assert_eq!(profile.last_interaction, 20);
        assert_eq!(profile.interactions.len(), 2);
        assert_eq!(profile.facts, ["User likes tea", "User lives in Bern"]);
        assert_eq!(profile.preferences["language"], "German");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn forgetting_is_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let memory = UserMemory::new(dir.path());
        memory.record(id(1), Some("one"), exchange(1, "a")).await.unwrap();
        memory.record(id(2), Some("two"), exchange(2, "b")).await.unwrap();

        assert!(memory.forget(id(1)).await.unwrap());
        assert!(!memory.forget(id(1)).await.unwrap());
        assert!(memory.profile(id(1)).await.is_none());
        assert!(memory.profile(id(2)).await.is_some());
    }
}
