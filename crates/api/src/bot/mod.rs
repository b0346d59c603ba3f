pub mod status;

use crate::{
    assistant::{self, Assistant, Completions, OpenAi},
    gateway::{ChannelId, Gateway, Incoming},
    jokes::{self, Jokes},
    quiz::{bank::MAX_QUESTIONS, text, Lobby},
};
use core::{num::NonZeroU64, ops::RangeInclusive};
use db::{Origin, UsageStats};
use status::Status;
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

const DEFAULT_TOP: usize = 10;
const TOP_RANGE: RangeInclusive<usize> = 3..=25;
const QUIZ_RANGE: RangeInclusive<usize> = 1..=MAX_QUESTIONS as usize;

const NO_JOKES: &str = "I'm out of jokes right now.";

const HELP: &str = "**Commands**\n\
    `!quiz [n]`: start a quiz of up to 5 questions in this channel\n\
    `!quiztop [n]`: show the all-time quiz leaderboard\n\
    `!joke` or `!witz`: tell a joke\n\
    `!llm <prompt>`: ask the assistant\n\
    `!memory [delete]`: show or delete what the assistant remembers about you\n\
    `!help`: show this message";

/// Milliseconds since the Unix epoch.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_millis() as u64)
}

/// Reads an optional integer argument. Integers are clamped into `range`; anything else yields `default`.
fn count_arg(arg: Option<&str>, default: usize, range: RangeInclusive<usize>) -> usize {
    let Some(n) = arg.and_then(|arg| arg.parse::<i64>().ok()) else {
        return default;
    };
    let (min, max) = range.into_inner();
    n.clamp(min as i64, max as i64) as usize
}

/// Chat command front-end. Every message the gateway sees passes through here.
pub struct Bot<G, L = OpenAi> {
    lobby: Lobby<G>,
    stats: Arc<UsageStats>,
    status: Arc<Status>,
    jokes: Jokes,
    assistant: Option<Assistant<L>>,
    count_when_disabled: bool,
}

impl<G: Gateway, L: Completions> Bot<G, L> {
    pub fn new(lobby: Lobby<G>, stats: Arc<UsageStats>, status: Arc<Status>, count_when_disabled: bool) -> Self {
        Self { lobby, stats, status, jokes: Jokes::from_jokes(Vec::new()), assistant: None, count_when_disabled }
    }

    pub fn with_jokes(self, jokes: Jokes) -> Self {
        Self { jokes, ..self }
    }

    pub fn with_assistant(self, assistant: Assistant<L>) -> Self {
        Self { assistant: Some(assistant), ..self }
    }

    pub fn gateway(&self) -> &G {
        self.lobby.gateway()
    }

    pub fn lobby(&self) -> &Lobby<G> {
        &self.lobby
    }

    pub async fn on_message(&self, message: Incoming) {
        if message.bot {
            return;
        }

        let now = unix_millis();
        let author = message.author.into_nonzero();
        let enabled = self.status.is_enabled();
        if enabled || self.count_when_disabled {
            let origin = Origin {
                user: author,
                channel: message.channel.into_nonzero(),
                guild: message.guild.map(|guild| guild.into_nonzero()),
            };
            self.stats.record_message(origin, now).await;
        }

        if !enabled {
            return;
        }

        let Some(rest) = message.content.strip_prefix('!') else {
            return;
        };
        let rest = rest.trim();
        let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if name.is_empty() {
            return;
        }
        let name = name.to_ascii_lowercase();
        self.stats.record_command(&name, author, now).await;

        let reply = match name.as_str() {
            "quiz" => {
                let requested = count_arg(args.split_whitespace().next(), MAX_QUESTIONS as usize, QUIZ_RANGE);
                match self.lobby.start(message.channel, message.author, requested as u32).await {
                    Ok(_) => {
                        self.stats.record_quiz().await;
                        return;
                    }
                    Err(err) => err.to_string(),
                }
            }
            "quiztop" => {
                let top = count_arg(args.split_whitespace().next(), DEFAULT_TOP, TOP_RANGE);
                text::leaderboard(&self.lobby.ledger().top(top).await)
            }
            "joke" | "witz" => self.joke(author, now).await,
            "llm" => match &self.assistant {
                Some(assistant) => {
                    assistant.relay(self.gateway(), &message, args.trim()).await;
                    return;
                }
                None => String::from(assistant::text::NOT_CONFIGURED),
            },
            "memory" => match &self.assistant {
                Some(assistant) => assistant.memory_command(&message, args).await,
                None => String::from(assistant::text::NOT_CONFIGURED),
            },
            "help" => String::from(HELP),
            _ => return,
        };

        self.reply(message.channel, &reply).await;
    }

    async fn joke(&self, author: NonZeroU64, now: u64) -> String {
        match self.jokes.random().await {
            Some(joke) => {
                self.stats.record_joke(&joke.id, author, now).await;
                joke.text
            }
            None => {
                self.stats.record_joke(jokes::GENERIC, author, now).await;
                String::from(NO_JOKES)
            }
        }
    }

    async fn reply(&self, channel: ChannelId, text: &str) {
        if let Err(err) = self.gateway().send_message(channel, text).await {
            log::warn!("cannot reply in channel {channel}: {err}");
        }
    }
}
