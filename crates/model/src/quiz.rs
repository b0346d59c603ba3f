use alloc::{string::String, vec::Vec};
use serde::{Deserialize, Serialize};

/// Fewest choices a question may offer.
pub const MIN_CHOICES: usize = 2;
/// Most choices a question may offer. Choices are lettered `A` through `F`.
pub const MAX_CHOICES: usize = 6;

/// Acceptable schema for entries of the question bank.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Question to be displayed in chat.
    #[serde(alias = "question")]
    pub text: String,
    /// Possible answers to select from.
    pub choices: Vec<String>,
    /// Index of the choice with the correct answer.
    #[serde(alias = "answer", alias = "correct_index")]
    pub correct_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Question {
    /// Whether this question may be surfaced in a quiz at all.
    pub fn is_valid(&self) -> bool {
        (MIN_CHOICES..=MAX_CHOICES).contains(&self.choices.len())
            && self.correct_index < self.choices.len()
            && !self.text.trim().is_empty()
            && self.choices.iter().all(|choice| !choice.trim().is_empty())
    }

    pub fn correct_choice(&self) -> Option<&str> {
        self.choices.get(self.correct_index).map(String::as_str)
    }
}
