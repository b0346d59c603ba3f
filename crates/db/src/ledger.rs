use crate::{error::Result, store::JsonStore};
use core::num::NonZeroU64;
use model::{Score, Scoreboard, Standing};
use std::path::Path;

/// Points earned by one user in a finished quiz.
#[derive(Clone, Copy, Debug)]
pub struct Award<'a> {
    pub user: NonZeroU64,
    pub name: Option<&'a str>,
    pub points: u64,
}

/// Durable, cumulative quiz points per user.
pub struct ScoreLedger(JsonStore<Scoreboard>);

impl ScoreLedger {
    pub const FILE_NAME: &'static str = "quiz-scores";

    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self(JsonStore::new(dir, Self::FILE_NAME))
    }

    /// Adds every award to the running totals in a single write. Entries are created on first award and
    /// their cached name refreshed whenever a new one is known.
    pub async fn award(&self, awards: &[Award<'_>]) -> Result<()> {
        self.0
            .update(|board| {
                for &Award { user, name, points } in awards {
                    let Score { points: total, name: cached } = board.entry(user.get()).or_default();
                    *total = total.saturating_add(points);
                    if let Some(name) = name {
                        *cached = Some(name.into());
                    }
                }
            })
            .await
    }

    pub async fn get(&self, user: NonZeroU64) -> Option<Score> {
        self.0.read().await.remove(&user.get())
    }

    /// Top `n` users by cumulative points. Ties go to the lower user ID.
    pub async fn top(&self, n: usize) -> Vec<Standing> {
        let mut standings: Vec<_> = self
            .0
            .read()
            .await
            .into_iter()
            .map(|(user_id, Score { points, name })| Standing { user_id, points, name })
            .collect();
        standings.sort_unstable_by(|a, b| b.points.cmp(&a.points).then(a.user_id.cmp(&b.user_id)));
        standings.truncate(n);
        standings
    }
}
