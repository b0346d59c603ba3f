pub mod bank;
pub mod limiter;
pub mod registry;
pub mod session;
pub mod text;

use crate::gateway::{ChannelId, Gateway, Incoming, MessageId, UserId};
use bank::Bank;
use core::{
    fmt::{self, Display},
    time::Duration,
};
use db::{Award, ScoreLedger};
use limiter::Limiter;
use registry::{Registry, Slot};
use session::{Session, Standing};
use std::sync::Arc;
use tokio::{task::JoinHandle, time};

/// Reaction placed on accepted answers.
const ACCEPTED: &str = "✅";

/// Tunables of the quiz engine.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// How long each question stays open for answers.
    pub window: Duration,
    /// Minimum time between two quiz starts by the same user.
    pub cooldown: Duration,
}

impl Config {
    pub const MIN_WINDOW_SECS: u64 = 5;
    pub const MIN_COOLDOWN_MINS: u64 = 1;

    /// Builds a configuration, raising each value to its minimum where necessary.
    pub fn new(window_secs: u64, cooldown_mins: u64) -> Self {
        let window = window_secs.max(Self::MIN_WINDOW_SECS);
        let cooldown = cooldown_mins.max(Self::MIN_COOLDOWN_MINS);
        Self { window: Duration::from_secs(window), cooldown: Duration::from_secs(cooldown * 60) }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(20, 60)
    }
}

/// Reasons a quiz could not be started. None of these are failures of the bot itself.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    NoQuestions,
    Busy,
    Cooldown(Duration),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoQuestions => f.write_str("No quiz questions are available right now."),
            Self::Busy => f.write_str("A quiz is already running in this channel."),
            Self::Cooldown(wait) => {
                let mins = wait.as_secs().div_ceil(60);
                write!(f, "You recently started a quiz. Please try again in {mins} min.")
            }
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// What a finished session reports back.
#[derive(Debug)]
pub struct Outcome {
    pub total: usize,
    pub standings: Vec<Standing>,
}

/// Container for all running quizzes and the state shared between them.
pub struct Lobby<G> {
    gateway: Arc<G>,
    bank: Bank,
    limiter: Limiter,
    registry: Arc<Registry>,
    ledger: Arc<ScoreLedger>,
    config: Config,
}

impl<G: Gateway> Lobby<G> {
    pub fn new(gateway: Arc<G>, bank: Bank, ledger: Arc<ScoreLedger>, config: Config) -> Self {
        Self {
            gateway,
            bank,
            limiter: Limiter::new(config.cooldown),
            registry: Arc::default(),
            ledger,
            config,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    /// Starts a quiz of `requested` questions (clamped to `1..=5`) in `channel` on behalf of `host`.
    /// The session runs in its own task; the returned handle resolves once its slot is released.
    pub async fn start(&self, channel: ChannelId, host: UserId, requested: u32) -> Result<JoinHandle<Outcome>> {
        let bank = self.bank.load().await;
        if bank.is_empty() {
            return Err(Error::NoQuestions);
        }

        // Dropping the slot on rejection frees the channel again.
        let slot = self.registry.try_acquire(channel).ok_or(Error::Busy)?;
        self.limiter.check_and_record(host, time::Instant::now()).map_err(Error::Cooldown)?;

        let session = Session::new(channel, bank::draw(&bank, requested));
        log::info!("user {host} started a quiz of {} questions in channel {channel}", session.len());

        let runner = Runner {
            gateway: Arc::clone(&self.gateway),
            ledger: Arc::clone(&self.ledger),
            window: self.config.window,
        };
        Ok(tokio::spawn(runner.run(session, slot)))
    }
}

/// Drives a single session from announcement to summary.
struct Runner<G> {
    gateway: Arc<G>,
    ledger: Arc<ScoreLedger>,
    window: Duration,
}

impl<G: Gateway> Runner<G> {
    async fn run(self, mut session: Session, slot: Slot) -> Outcome {
        let channel = session.channel();
        let total = session.len();
        self.say(channel, &text::announcement(total)).await;

        while let Some(question) = session.current().cloned() {
            let number = session.position() + 1;
            let prompt = text::question(&question, number, total, self.window);
            let posted = self.say(channel, &prompt).await;

            self.collect(&mut session).await;

            if let Some(message) = posted {
                if let Err(err) = self.gateway.edit_message(channel, message, &text::closed(&prompt)).await {
                    log::warn!("cannot close question {number} in channel {channel}: {err}");
                }
            }

            let winners = session.reveal();
            self.say(channel, &text::reveal(&question, &winners)).await;
            session.advance();
        }

        let standings = session.standings();
        self.finalize(channel, total, &standings).await;

        drop(slot);
        log::info!("quiz in channel {channel} finished with {} participants", standings.len());
        Outcome { total, standings }
    }

    /// Accepts answers to the open question until the window elapses.
    async fn collect(&self, session: &mut Session) {
        let Some(choices) = session.current().map(|question| question.choices.len()) else {
            return;
        };

        let mut feed = self.gateway.subscribe(session.channel());
        let deadline = time::sleep(self.window);
        tokio::pin!(deadline);

        loop {
            let message = tokio::select! {
                biased;
                _ = &mut deadline => break,
                Some(message) = feed.recv() => message,
            };
            self.accept(session, choices, message);
        }

        // Answers already queued when the window closed still count. Anything later never reaches us.
        while let Ok(message) = feed.try_recv() {
            self.accept(session, choices, message);
        }
        drop(feed);
    }

    /// Records a valid first answer and acknowledges it in the background.
    fn accept(&self, session: &mut Session, choices: usize, message: Incoming) {
        if message.bot {
            return;
        }

        let Some(choice) = text::parse_answer(&message.content, choices) else {
            return;
        };

        if !session.record(message.author, choice) {
            return;
        }

        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            if let Err(err) = gateway.add_reaction(message.channel, message.id, ACCEPTED).await {
                log::warn!("cannot acknowledge answer {}: {err}", message.id);
            }
        });
    }

    async fn finalize(&self, channel: ChannelId, total: usize, standings: &[Standing]) {
        if standings.is_empty() {
            self.say(channel, text::NO_PARTICIPANTS).await;
            return;
        }

        let mut names = Vec::with_capacity(standings.len());
        for standing in standings {
            let name = self.gateway.resolve_display_name(standing.user).await;
            if name.is_none() {
                log::debug!("falling back to a generic label for user {}", standing.user);
            }
            names.push(name);
        }

        let awards: Vec<_> = standings
            .iter()
            .zip(&names)
            .map(|(standing, name)| Award {
                user: standing.user.into_nonzero(),
                name: name.as_deref(),
                points: standing.points.into(),
            })
            .collect();
        if let Err(err) = self.ledger.award(&awards).await {
            log::error!("cannot persist quiz scores for channel {channel}: {err}");
        }

        let rows = standings.iter().zip(names.iter().map(|name| name.as_deref().unwrap_or(text::UNKNOWN_PLAYER)));
        self.say(channel, &text::summary(rows, total)).await;
    }

    /// Sends a message, logging instead of failing.
    async fn say(&self, channel: ChannelId, text: &str) -> Option<MessageId> {
        match self.gateway.send_message(channel, text).await {
            Ok(id) => Some(id),
            Err(err) => {
                log::warn!("cannot send to channel {channel}: {err}");
                None
            }
        }
    }
}
