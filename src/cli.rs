//! Command-line interface for voxloop
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Voice loop: record, transcribe, speak back
#[derive(Parser, Debug)]
#[command(name = "voxloop", version, about = "Record, transcribe and speak back")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: progress, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device name (overrides config)
    #[arg(long, global = true, value_name = "DEVICE")]
    pub device: Option<String>,
}

/// Parse a wait duration.
///
/// Bare numbers are milliseconds; anything else goes through `humantime`
/// (`500ms`, `2s`, `1m30s`).
fn parse_wait(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<u64>() {
        return Ok(Duration::from_millis(ms));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record (or load) audio and transcribe it
    AudioIn {
        /// Transcribe this WAV file instead of recording
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Recording length in seconds
        #[arg(short = 't', long, value_name = "SECS")]
        duration: Option<u64>,

        /// Whisper model size (tiny, base, small, medium, large)
        #[arg(short, long, value_name = "MODEL")]
        model: Option<String>,

        /// Language code (default: auto-detect)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Write the transcript here
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Save the transcript under a generated name in the output directory
        #[arg(long)]
        save_transcript: bool,
    },

    /// Synthesize text (or a text file) and play it
    AudioOut {
        /// Literal text or path to a text file (default: latest transcript)
        #[arg(short, long, value_name = "TEXT|PATH")]
        data_source: Option<String>,

        /// Write the audio here
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Save without playing
        #[arg(long)]
        no_play: bool,

        /// Print the resolved text instead of the output path
        #[arg(long)]
        return_text_output: bool,

        /// Do not fall back to the latest transcript
        #[arg(long)]
        no_latest: bool,

        /// Voice name for the synthesis engine
        #[arg(long, value_name = "VOICE")]
        voice: Option<String>,
    },

    /// Run a listen/speak conversation for a number of turns
    Conversation {
        /// Number of turns (odd values round up to even)
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        turns: Option<i64>,

        /// Recording length per turn in seconds
        #[arg(short = 't', long, value_name = "SECS")]
        duration: Option<u64>,

        /// Pause between turns (e.g. 500ms, 2s)
        #[arg(long, value_name = "DURATION", value_parser = parse_wait)]
        wait: Option<Duration>,

        /// Whisper model size
        #[arg(short, long, value_name = "MODEL")]
        model: Option<String>,

        /// Language code (default: auto-detect)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Open the conversation by speaking
        #[arg(long)]
        speak_first: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the most recent transcript
    Latest,

    /// List available audio input devices
    Devices,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
