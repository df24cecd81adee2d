//! Multi-turn conversation: listen, speak, wait, repeat.

pub mod machine;
pub mod state;

pub use machine::{RunReport, TurnMachine};
pub use state::{CycleConfig, Opening, Phase, Recovered, TurnState, next_phase};
