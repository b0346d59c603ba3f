pub mod discord;

use core::{
    fmt::{self, Display},
    future::Future,
};
use dashmap::DashMap;
use tokio::sync::mpsc;
use twilight_model::{
    channel::Message,
    id::{
        marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker},
        Id,
    },
};

pub type ChannelId = Id<ChannelMarker>;
pub type GuildId = Id<GuildMarker>;
pub type MessageId = Id<MessageMarker>;
pub type UserId = Id<UserMarker>;

/// A chat message as seen by the bot.
#[derive(Clone, Debug)]
pub struct Incoming {
    pub id: MessageId,
    pub channel: ChannelId,
    /// `None` in direct messages.
    pub guild: Option<GuildId>,
    pub author: UserId,
    pub author_name: String,
    /// Whether the author is a bot account (including ourselves).
    pub bot: bool,
    pub content: String,
}

impl From<Message> for Incoming {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            channel: message.channel_id,
            guild: message.guild_id,
            author: message.author.id,
            author_name: message.author.name,
            bot: message.author.bot,
            content: message.content,
        }
    }
}

#[derive(Debug)]
pub enum Error {
    /// The outgoing payload was rejected before it was sent.
    Validation,
    /// The chat platform could not be reached or refused the request.
    Request,
    /// The chat platform replied with something we could not decode.
    Response,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validation => "the message failed validation",
            Self::Request => "the request to the chat platform failed",
            Self::Response => "the chat platform sent an unexpected response",
        })
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Everything the quiz engine and the command handlers need from the chat platform.
pub trait Gateway: Send + Sync + 'static {
    fn send_message(&self, channel: ChannelId, text: &str) -> impl Future<Output = Result<MessageId>> + Send;

    fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        text: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Best-effort lookup of a user's display name.
    fn resolve_display_name(&self, user: UserId) -> impl Future<Output = Option<String>> + Send;

    /// Opens a feed of the messages posted in `channel` from now on. Dropping the receiver closes the feed.
    fn subscribe(&self, channel: ChannelId) -> mpsc::UnboundedReceiver<Incoming>;
}

/// Per-channel fan-out of incoming messages to whoever is currently listening.
#[derive(Default)]
pub struct Collectors(DashMap<ChannelId, mpsc::UnboundedSender<Incoming>>);

impl Collectors {
    /// Replaces any previous listener of `channel`.
    pub fn subscribe(&self, channel: ChannelId) -> mpsc::UnboundedReceiver<Incoming> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.0.insert(channel, tx);
        rx
    }

    /// Forwards the message to the channel's listener, if any. Listeners that hung up are pruned.
    pub fn dispatch(&self, message: &Incoming) {
        let closed = match self.0.get(&message.channel) {
            Some(tx) => tx.send(message.clone()).is_err(),
            None => return,
        };

        if closed {
            self.0.remove_if(&message.channel, |_, tx| tx.is_closed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelId, Collectors, Incoming, MessageId, UserId};

    fn message(channel: u64, id: u64, content: &str) -> Incoming {
        Incoming {
            id: MessageId::new(id),
            channel: ChannelId::new(channel),
            guild: None,
            author: UserId::new(42),
            author_name: String::from("ada"),
            bot: false,
            content: content.into(),
        }
    }

    #[test]
    fn routes_only_to_the_subscribed_channel() {
        let collectors = Collectors::default();
        let mut rx = collectors.subscribe(ChannelId::new(1));

        collectors.dispatch(&message(2, 10, "A"));
        collectors.dispatch(&message(1, 11, "B"));

        let got = rx.try_recv().unwrap();
        assert_eq!(got.id, MessageId::new(11));
        assert_eq!(got.content, "B");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn prunes_listeners_that_hung_up() {
        let collectors = Collectors::default();
        let rx = collectors.subscribe(ChannelId::new(1));
        drop(rx);

        collectors.dispatch(&message(1, 10, "A"));
        assert!(!collectors.0.contains_key(&ChannelId::new(1)));
    }

    #[test]
    fn ignores_messages_before_subscription() {
        let collectors = Collectors::default();
        collectors.dispatch(&message(1, 10, "A"));
        let mut rx = collectors.subscribe(ChannelId::new(1));
        assert!(rx.try_recv().is_err());
    }
}
