use alloc::{collections::BTreeMap, string::String, vec::Vec};
use serde::{Deserialize, Serialize};

/// One assistant exchange. Timestamps are milliseconds since the Unix epoch.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Interaction {
    pub timestamp: u64,
    pub message: String,
    pub response: String,
}

/// What the assistant remembers about a user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub username: Option<String>,
    pub last_interaction: u64,
    /// Oldest first.
    pub interactions: Vec<Interaction>,
    pub facts: Vec<String>,
    pub preferences: BTreeMap<String, String>,
}

impl Profile {
    pub const MAX_INTERACTIONS: usize = 10;

    /// Appends an exchange, keeping only the most recent ones.
    pub fn push(&mut self, interaction: Interaction) {
        self.last_interaction = interaction.timestamp;
        self.interactions.push(interaction);
        if let Some(excess) = self.interactions.len().checked_sub(Self::MAX_INTERACTIONS) {
            self.interactions.drain(..excess);
        }
    }

    /// Records a fact unless it is already known. Returns whether it was new.
    pub fn learn(&mut self, fact: &str) -> bool {
        let fact = fact.trim();
        if fact.is_empty() || self.facts.iter().any(|known| known == fact) {
            return false;
        }
        self.facts.push(fact.into());
        true
    }

    pub fn recent(&self, count: usize) -> &[Interaction] {
        let start = self.interactions.len().saturating_sub(count);
        &self.interactions[start..]
    }
}

pub type Memories = BTreeMap<u64, Profile>;
