pub mod error;

mod ledger;
mod memory;
mod stats;
mod store;

pub use ledger::{Award, ScoreLedger};
pub use memory::UserMemory;
pub use model::{memory::Interaction, Profile, Score, Standing};
pub use stats::{Origin, UsageStats};
pub use store::JsonStore;
