pub mod assistant;
pub mod bot;
pub mod control;
pub mod gateway;
pub mod jokes;
pub mod quiz;

pub use assistant::{Assistant, OpenAi, Settings};
pub use bot::{
    status::{RestartMode, Status},
    Bot,
};
pub use control::Control;
pub use gateway::discord::{self, Discord};
pub use jokes::Jokes;
pub use quiz::{bank::Bank, Config, Lobby};
