//! Single-shot audio pipeline.
//!
//! `audio_in` runs capture-or-load, then transcribe, then optional persist.
//! `audio_out` runs resolve-text, then synthesize, then persist, then
//! optional play. Both fail fast.

pub mod orchestrator;
pub mod retry;
pub mod types;

pub use orchestrator::Pipeline;
pub use retry::RetryPolicy;
pub use types::{AudioInOutput, AudioInRequest, AudioOutRequest, AudioOutResult, TextSource};
