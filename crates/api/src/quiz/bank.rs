use model::Question;
use rand::seq::SliceRandom;
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::OnceCell;

/// Hard cap on the number of questions in one session.
pub const MAX_QUESTIONS: u32 = 5;

/// Validated questions read from a JSON file. The first successful load is kept for the rest of the
/// process lifetime; failed loads are retried on the next call.
pub struct Bank {
    path: PathBuf,
    questions: OnceCell<Arc<[Question]>>,
}

impl Bank {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), questions: OnceCell::new() }
    }

    /// A bank that never touches the file system.
    pub fn from_questions(questions: Vec<Question>) -> Self {
        let valid: Arc<[Question]> = questions.into_iter().filter(Question::is_valid).collect();
        Self { path: PathBuf::new(), questions: OnceCell::new_with(Some(valid)) }
    }

    /// Returns the cached questions. Unreadable or malformed files yield an empty bank.
    pub async fn load(&self) -> Arc<[Question]> {
        let result = self
            .questions
            .get_or_try_init(|| async {
                let bytes = tokio::fs::read(&self.path).await.map_err(|err| {
                    log::warn!("cannot read question bank {}: {err}", self.path.display());
                })?;
                let questions = parse(&bytes).ok_or_else(|| {
                    log::warn!("question bank {} is malformed", self.path.display());
                })?;
                log::info!("loaded {} questions from {}", questions.len(), self.path.display());
                Ok::<_, ()>(Arc::from(questions))
            })
            .await;
        match result {
            Ok(questions) => Arc::clone(questions),
            Err(()) => Arc::from(Vec::new()),
        }
    }
}

/// Parses a JSON list of questions. Entries that do not decode as a question or fail validation are
/// dropped one by one. Returns `None` if the document is not a list.
pub fn parse(bytes: &[u8]) -> Option<Vec<Question>> {
    let entries: Vec<Value> = serde_json::from_slice(bytes).ok()?;
    let total = entries.len();
    let valid: Vec<_> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<Question>(entry).ok())
        .filter(Question::is_valid)
        .collect();
    if valid.len() < total {
        log::warn!("dropped {} invalid questions", total - valid.len());
    }
    Some(valid)
}

/// Draws `clamp(requested, 1, MAX_QUESTIONS)` distinct questions (fewer if the bank is smaller) in
/// uniformly random order.
pub fn draw(bank: &[Question], requested: u32) -> Vec<Question> {
    let count = requested.clamp(1, MAX_QUESTIONS) as usize;
    let mut picked: Vec<_> = bank.iter().collect();
    picked.shuffle(&mut rand::thread_rng());
    picked.into_iter().take(count).cloned().collect()
}
