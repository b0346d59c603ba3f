pub mod facts;
pub mod openai;
pub mod text;

pub use openai::OpenAi;

use crate::{
    bot::unix_millis,
    gateway::{ChannelId, Gateway, Incoming, MessageId},
};
use core::{
    fmt::{self, Display},
    future::Future,
    time::Duration,
};
use db::{Interaction, UserMemory};
use futures_util::{stream::BoxStream, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

/// Minimum time between two progressive edits of a streamed reply.
const EDIT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Clone, Debug, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug)]
pub enum Error {
    /// The model endpoint could not be reached.
    Request,
    /// The endpoint answered with a non-success status code.
    Status(u16),
    /// The reply stream broke off.
    Stream,
    /// The endpoint sent something we could not decode.
    Response,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("the model endpoint is unreachable"),
            Self::Status(code) => write!(f, "the model endpoint answered with status {code}"),
            Self::Stream => f.write_str("the reply stream broke off"),
            Self::Response => f.write_str("the model endpoint sent an unexpected response"),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Incremental pieces of a reply, in order.
pub type Deltas = BoxStream<'static, Result<String>>;

/// A chat completion backend.
pub trait Completions: Send + Sync + 'static {
    fn stream(&self, turns: &[Turn]) -> impl Future<Output = Result<Deltas>> + Send;

    fn complete(&self, turns: &[Turn]) -> impl Future<Output = Result<String>> + Send;
}

pub struct Settings {
    /// Opening system message, followed by whatever is remembered about the user.
    pub system_prompt: String,
    /// Whether the backend is a local LM Studio server.
    pub local: bool,
    /// Ask the model for user facts instead of matching patterns.
    pub facts_via_llm: bool,
}

/// The `!llm` relay and the per-user memory behind it.
pub struct Assistant<L> {
    llm: L,
    memory: Arc<UserMemory>,
    settings: Settings,
}

impl<L: Completions> Assistant<L> {
    pub fn new(llm: L, memory: Arc<UserMemory>, settings: Settings) -> Self {
        Self { llm, memory, settings }
    }

    pub fn memory(&self) -> &UserMemory {
        &self.memory
    }

    /// Streams the model's answer to `prompt` into a single chat message, editing it as text arrives.
    pub async fn relay<G: Gateway>(&self, gateway: &G, message: &Incoming, prompt: &str) {
        let channel = message.channel;
        if prompt.is_empty() {
            send(gateway, channel, text::USAGE).await;
            return;
        }

        log::info!("relaying a prompt from user {} in channel {channel}", message.author);
        let Some(reply) = send(gateway, channel, text::PROCESSING).await else {
            return;
        };

        let turns = self.turns(message, prompt).await;
        let content = match self.stream_into(gateway, channel, reply, &turns).await {
            Ok(content) => content,
            Err(err) => {
                log::warn!("assistant request from user {} failed: {err}", message.author);
                let mut apology = String::from(text::APOLOGY);
                if self.settings.local {
                    apology.push_str(text::LOCAL_HINT);
                }
                send(gateway, channel, &apology).await;
                return;
            }
        };

        if content.is_empty() {
            edit(gateway, channel, reply, text::NO_RESPONSE).await;
            return;
        }

        edit(gateway, channel, reply, text::truncate(&content, text::MAX_MESSAGE_CHARS)).await;
        self.remember(message, prompt, &content).await;
    }

    /// Renders or deletes what is stored about the author.
    pub async fn memory_command(&self, message: &Incoming, args: &str) -> String {
        let user = message.author.into_nonzero();
        if args.trim().eq_ignore_ascii_case("delete") {
            return match self.memory.forget(user).await {
                Ok(true) => String::from(text::FORGOTTEN),
                Ok(false) => String::from(text::NO_MEMORY),
                Err(err) => {
                    log::error!("cannot delete the memory of user {}: {err}", message.author);
                    String::from(text::FORGET_FAILED)
                }
            };
        }

        match self.memory.profile(user).await {
            Some(profile) => text::profile(&profile),
            None => String::from(text::NO_MEMORY),
        }
    }

    async fn turns(&self, message: &Incoming, prompt: &str) -> Vec<Turn> {
        let mut system = self.settings.system_prompt.clone();
        if let Some(profile) = self.memory.profile(message.author.into_nonzero()).await {
            let context = text::context(&profile);
            if !context.is_empty() {
                system.push_str("\n\n");
                system.push_str(&context);
            }
        }
        vec![Turn { role: Role::System, content: system }, Turn { role: Role::User, content: prompt.into() }]
    }

    async fn stream_into<G: Gateway>(
        &self,
        gateway: &G,
        channel: ChannelId,
        reply: MessageId,
        turns: &[Turn],
    ) -> Result<String> {
        let mut deltas = self.llm.stream(turns).await?;
        let mut content = String::new();
        let mut last_edit = Instant::now();

        while let Some(delta) = deltas.try_next().await? {
            if delta.is_empty() {
                continue;
            }
            content.push_str(&delta);

            if last_edit.elapsed() > EDIT_INTERVAL || delta.contains('\n') {
                edit(gateway, channel, reply, text::truncate(&content, text::MAX_MESSAGE_CHARS)).await;
                last_edit = Instant::now();
            }
        }

        Ok(content)
    }

    async fn remember(&self, message: &Incoming, prompt: &str, response: &str) {
        let user = message.author.into_nonzero();
        let interaction = Interaction { timestamp: unix_millis(), message: prompt.into(), response: response.into() };
        if let Err(err) = self.memory.record(user, Some(&message.author_name), interaction).await {
            log::error!("cannot remember the exchange with user {}: {err}", message.author);
            return;
        }

        let facts = self.extract_facts(message, prompt, response).await;
        match self.memory.learn(user, &facts).await {
            Ok(0) => {}
            Ok(learned) => log::debug!("learned {learned} facts about user {}", message.author),
            Err(err) => log::error!("cannot store facts about user {}: {err}", message.author),
        }
    }

    async fn extract_facts(&self, message: &Incoming, prompt: &str, response: &str) -> Vec<String> {
        if self.settings.facts_via_llm {
            let known = self.memory.profile(message.author.into_nonzero()).await.unwrap_or_default();
            match self.llm.complete(&facts::request(&known, prompt, response)).await {
                Ok(reply) => {
                    let found = facts::parse_list(&reply);
                    if !found.is_empty() {
                        return found;
                    }
                }
                Err(err) => log::warn!("model fact extraction failed, matching patterns instead: {err}"),
            }
        }
        facts::from_patterns(prompt)
    }
}

async fn send<G: Gateway>(gateway: &G, channel: ChannelId, text: &str) -> Option<MessageId> {
    match gateway.send_message(channel, text).await {
        Ok(id) => Some(id),
        Err(err) => {
            log::warn!("cannot send to channel {channel}: {err}");
            None
        }
    }
}

async fn edit<G: Gateway>(gateway: &G, channel: ChannelId, message: MessageId, text: &str) {
    if let Err(err) = gateway.edit_message(channel, message, text).await {
        log::warn!("cannot update reply {message}: {err}");
    }
}
