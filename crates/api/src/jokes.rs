use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::OnceCell;

/// Statistics key used when no joke could be told.
pub const GENERIC: &str = "generic";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Joke {
    pub id: String,
    pub text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Text(String),
    Record {
        #[serde(default)]
        id: Option<Value>,
        #[serde(alias = "joke")]
        text: String,
    },
}

/// Jokes read from a JSON list of strings or `{ "id", "text" }` records. Loaded on first use.
pub struct Jokes {
    path: PathBuf,
    jokes: OnceCell<Arc<[Joke]>>,
}

impl Jokes {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), jokes: OnceCell::new() }
    }

    pub fn from_jokes(jokes: Vec<Joke>) -> Self {
        Self { path: PathBuf::new(), jokes: OnceCell::new_with(Some(jokes.into())) }
    }

    pub async fn load(&self) -> Arc<[Joke]> {
        let result = self
            .jokes
            .get_or_try_init(|| async {
                let bytes = tokio::fs::read(&self.path).await.map_err(|err| {
                    log::warn!("cannot read jokes {}: {err}", self.path.display());
                })?;
                let jokes = parse(&bytes).ok_or_else(|| {
                    log::warn!("jokes file {} is not a list", self.path.display());
                })?;
                log::info!("loaded {} jokes from {}", jokes.len(), self.path.display());
                Ok::<_, ()>(Arc::from(jokes))
            })
            .await;
        match result {
            Ok(jokes) => Arc::clone(jokes),
            Err(()) => Arc::from(Vec::new()),
        }
    }

    pub async fn random(&self) -> Option<Joke> {
        self.load().await.choose(&mut rand::thread_rng()).cloned()
    }
}

/// Entries without an id are keyed by their position in the list. Unreadable entries are skipped.
pub fn parse(bytes: &[u8]) -> Option<Vec<Joke>> {
    let entries: Vec<Value> = serde_json::from_slice(bytes).ok()?;
    let jokes = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let (id, text) = match serde_json::from_value(entry).ok()? {
                Entry::Text(text) => (None, text),
                Entry::Record { id, text } => (id, text),
            };
            let id = match id {
                Some(Value::String(id)) => id,
                Some(Value::Number(id)) => id.to_string(),
                _ => index.to_string(),
            };
            let text = text.trim();
            (!text.is_empty()).then(|| Joke { id, text: text.into() })
        })
        .collect();
    Some(jokes)
}
