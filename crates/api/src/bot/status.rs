use core::{
    fmt::{self, Display},
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How the bot comes back after a restart request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartMode {
    /// Drop the gateway session and log in again. The process keeps running.
    #[default]
    Soft,
    /// Flush state and exit so that a supervisor can start a fresh process.
    Hard,
}

impl RestartMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Hard => "hard",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidMode;

impl Display for InvalidMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid mode")
    }
}

impl std::error::Error for InvalidMode {}

impl FromStr for RestartMode {
    type Err = InvalidMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("soft") {
            Ok(Self::Soft)
        } else if s.eq_ignore_ascii_case("hard") {
            Ok(Self::Hard)
        } else {
            Err(InvalidMode)
        }
    }
}

/// Process-wide switch for the chat commands, plus the restart signals.
pub struct Status {
    enabled: AtomicBool,
    started: Instant,
    restart_mode: RestartMode,
    reconnect: Notify,
    shutdown: Notify,
}

impl Default for Status {
    fn default() -> Self {
        Self::new(RestartMode::default())
    }
}

impl Status {
    /// `restart_mode` applies to restart requests that do not name a mode.
    pub fn new(restart_mode: RestartMode) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            started: Instant::now(),
            restart_mode,
            reconnect: Notify::new(),
            shutdown: Notify::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Returns the previous value.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn restart_mode(&self) -> RestartMode {
        self.restart_mode
    }

    /// Signals whoever owns the affected resource. A request made while nobody waits is kept for the
    /// next waiter.
    pub fn request_restart(&self, mode: RestartMode) {
        log::info!("{} restart requested", mode.as_str());
        match mode {
            RestartMode::Soft => self.reconnect.notify_one(),
            RestartMode::Hard => self.shutdown.notify_one(),
        }
    }

    pub async fn reconnect_requested(&self) {
        self.reconnect.notified().await;
    }

    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }
}
