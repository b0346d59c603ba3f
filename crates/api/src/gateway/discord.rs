use super::{ChannelId, Collectors, Error, Gateway, Incoming, MessageId, Result, UserId};
use crate::bot::{status::Status, Bot};
use std::sync::Arc;
use tokio::sync::mpsc;
use twilight_gateway::{CloseFrame, Shard, ShardId};
use twilight_http::request::channel::reaction::RequestReactionType;
use twilight_model::gateway::{event::Event, payload::incoming::MessageCreate, Intents};

/// Chat gateway backed by the Discord REST API and a single gateway shard.
pub struct Discord {
    client: twilight_http::Client,
    collectors: Collectors,
}

impl Discord {
    pub fn new(token: String) -> Self {
        Self { client: twilight_http::Client::new(token), collectors: Collectors::default() }
    }

    /// Opens a shard subscribed to guild and direct messages (with their content).
    pub fn shard(token: String) -> Shard {
        let intents = Intents::GUILDS | Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES | Intents::MESSAGE_CONTENT;
        Shard::new(ShardId::ONE, token, intents)
    }

    pub fn dispatch(&self, message: &Incoming) {
        self.collectors.dispatch(message);
    }
}

impl Gateway for Discord {
    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<MessageId> {
        let response = self
            .client
            .create_message(channel)
            .content(text)
            .map_err(|_| Error::Validation)?
            .await
            .map_err(|err| {
                log::warn!("cannot send message to channel {channel}: {err}");
                Error::Request
            })?;
        let message = response.model().await.map_err(|_| Error::Response)?;
        Ok(message.id)
    }

    async fn edit_message(&self, channel: ChannelId, message: MessageId, text: &str) -> Result<()> {
        self.client
            .update_message(channel, message)
            .content(Some(text))
            .map_err(|_| Error::Validation)?
            .await
            .map_err(|err| {
                log::warn!("cannot edit message {message}: {err}");
                Error::Request
            })?;
        Ok(())
    }

    async fn add_reaction(&self, channel: ChannelId, message: MessageId, emoji: &str) -> Result<()> {
        let emoji = RequestReactionType::Unicode { name: emoji };
        self.client.create_reaction(channel, message, &emoji).await.map_err(|err| {
            log::warn!("cannot react to message {message}: {err}");
            Error::Request
        })?;
        Ok(())
    }

    async fn resolve_display_name(&self, user: UserId) -> Option<String> {
        let response = match self.client.user(user).await {
            Ok(response) => response,
            Err(err) => {
                log::debug!("cannot look up user {user}: {err}");
                return None;
            }
        };
        let user = response.model().await.ok()?;
        Some(user.name)
    }

    fn subscribe(&self, channel: ChannelId) -> mpsc::UnboundedReceiver<Incoming> {
        self.collectors.subscribe(channel)
    }
}

/// Pumps gateway events into the bot until the shard fails fatally. A soft restart request closes the
/// current session and logs in again with a fresh shard.
pub async fn listen(token: String, bot: Arc<Bot<Discord>>, status: Arc<Status>) {
    let mut shard = Discord::shard(token.clone());
    loop {
        let next = tokio::select! {
            biased;
            _ = status.reconnect_requested() => None,
            event = shard.next_event() => Some(event),
        };

        let Some(next) = next else {
            log::info!("reconnecting to the gateway");
            if let Err(err) = shard.close(CloseFrame::NORMAL).await {
                log::warn!("cannot close gateway session: {err}");
            }
            shard = Discord::shard(token.clone());
            continue;
        };

        let event = match next {
            Ok(event) => event,
            Err(err) => {
                log::warn!("gateway error: {err}");
                if err.is_fatal() {
                    log::error!("gateway connection lost for good");
                    return;
                }
                continue;
            }
        };

        match event {
            Event::Ready(ready) => log::info!("logged in as {}", ready.user.name),
            Event::MessageCreate(message) => {
                let MessageCreate(message) = *message;
                let incoming = Incoming::from(message);

                // Answer collectors see messages in arrival order.
                bot.gateway().dispatch(&incoming);

                let bot = Arc::clone(&bot);
                tokio::spawn(async move { bot.on_message(incoming).await });
            }
            _ => {}
        }
    }
}
