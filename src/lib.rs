//! voxloop - turn-taking voice loop
//!
//! Record speech, transcribe it with Whisper, synthesize a reply and play
//! it back, either once (`audio-in` / `audio-out`) or as a multi-turn
//! conversation.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod conversation;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod store;
pub mod stt;
pub mod tts;

// Composition root - needs everything
#[cfg(feature = "cli")]
pub mod app;

// Adapter traits (capture → transcribe → synthesize → play)
pub use audio::{AudioPlayer, AudioRecorder};
pub use stt::Transcriber;
pub use tts::Synthesizer;

// Pipeline and conversation
pub use conversation::{CycleConfig, Opening, Phase, RunReport, TurnMachine};
pub use pipeline::{AudioInRequest, AudioOutRequest, AudioOutResult, Pipeline, RetryPolicy};

// Storage
pub use store::PathStore;

// Error handling
pub use error::{ErrorCode, ErrorKind, Result, VoxError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
