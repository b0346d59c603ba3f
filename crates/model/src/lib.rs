#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod memory;
pub mod quiz;
pub mod score;
pub mod stats;

pub use memory::{Memories, Profile};
pub use quiz::Question;
pub use score::{Score, Scoreboard, Standing};
pub use stats::Stats;
