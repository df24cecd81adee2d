//! Command runners.
//!
//! Builds the adapters named in [`Config`] and wires them into a
//! [`Pipeline`] or [`TurnMachine`]: configuration → adapters → pipeline.
//! Results go to stdout, status lines to stderr.

use crate::audio::capture::{CpalRecorder, list_devices};
use crate::audio::playback::RodioPlayer;
use crate::config::{Config, TtsEngine};
use crate::conversation::{Opening, RunReport, TurnMachine};
use crate::error::{Result, VoxError};
use crate::pipeline::{AudioInOutput, AudioInRequest, AudioOutRequest, AudioOutResult, Pipeline};
use crate::store::PathStore;
use crate::stt::{Transcriber, WhisperConfig, WhisperTranscriber};
use crate::tts::{KokoroConfig, KokoroSynthesizer, Synthesizer, ToneSynthesizer};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/voxloop/config.toml)
/// 3. Built-in defaults
///
/// Environment overrides are applied on top, then the result is validated.
pub fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    }
    .with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Artifact store rooted at `base_dir`.
pub fn build_store(config: &Config, base_dir: &Path) -> Arc<PathStore> {
    Arc::new(PathStore::new(config.store_config(base_dir)))
}

pub fn build_synthesizer(config: &Config) -> Result<Arc<dyn Synthesizer>> {
    let synthesizer: Arc<dyn Synthesizer> = match config.tts.engine {
        TtsEngine::Tone => Arc::new(ToneSynthesizer::new(config.tts.tone_secs)),
        TtsEngine::Kokoro => {
            let mut kokoro = KokoroConfig {
                url: config.tts.kokoro_url.clone(),
                speed: config.tts.speed,
                ..KokoroConfig::default()
            };
            if let Some(voice) = &config.tts.voice {
                kokoro.voice = voice.clone();
            }
            Arc::new(KokoroSynthesizer::new(kokoro)?)
        }
    };
    Ok(synthesizer)
}

/// Whisper transcriber for `config`. With `preload`, the default model is
/// loaded now so a missing model fails before anything is recorded.
pub async fn build_transcriber(config: &Config, preload: bool) -> Result<Arc<dyn Transcriber>> {
    let transcriber = Arc::new(WhisperTranscriber::new(WhisperConfig {
        models_dir: config.models_dir(),
        model: config.stt.model.clone(),
        language: config.stt.language.clone(),
        threads: config.stt.threads,
    })?);
    if preload {
        info!(model = %transcriber.model_name(), "Loading model");
        let loader = Arc::clone(&transcriber);
        tokio::task::spawn_blocking(move || loader.preload())
            .await
            .map_err(|e| VoxError::transcription(format!("model loading task failed: {}", e)))??;
    }
    if !transcriber.is_ready() {
        warn!(
            model = %transcriber.model_name(),
            "Transcriber unavailable in this build; audio-in will fail"
        );
    }
    Ok(transcriber)
}

/// Full pipeline over the real devices.
pub async fn build_pipeline(
    config: &Config,
    store: Arc<PathStore>,
    preload_model: bool,
) -> Result<Pipeline> {
    let recorder = Arc::new(CpalRecorder::new(
        config.audio.device.as_deref(),
        Arc::clone(&store),
    )?);
    let transcriber = build_transcriber(config, preload_model).await?;
    let synthesizer = build_synthesizer(config)?;
    Ok(Pipeline::new(
        recorder,
        transcriber,
        synthesizer,
        Arc::new(RodioPlayer::new()),
        store,
    )
    .with_retry(config.retry_policy()))
}

/// Run audio-in and print the transcript.
pub async fn run_audio_in(
    config: &Config,
    store: Arc<PathStore>,
    request: AudioInRequest,
    quiet: bool,
) -> Result<AudioInOutput> {
    let pipeline = build_pipeline(config, store, true).await?;
    if !quiet && request.audio_path.is_none() {
        eprintln!(
            "{} {}s...",
            "Recording".bold(),
            request.duration.as_secs()
        );
    }

    let output = pipeline.audio_in(&request).await?;
    println!("{}", output.text);
    if !quiet && let Some(path) = &output.transcript_path {
        eprintln!("{} {}", "Saved transcript to".dimmed(), path.display());
    }
    Ok(output)
}

/// Run audio-out and print the output path (or the text, when asked).
pub async fn run_audio_out(
    config: &Config,
    store: Arc<PathStore>,
    request: AudioOutRequest,
    quiet: bool,
) -> Result<AudioOutResult> {
    let pipeline = build_pipeline(config, store, false).await?;
    let result = pipeline.audio_out(&request).await?;
    match &result {
        AudioOutResult::Path(path) => println!("{}", path.display()),
        AudioOutResult::Text { text, saved_to } => {
            println!("{}", text);
            if !quiet {
                eprintln!("{} {}", "Saved audio to".dimmed(), saved_to.display());
            }
        }
    }
    Ok(result)
}

/// Command-line overrides for a conversation run.
#[derive(Debug, Clone, Default)]
pub struct ConversationOptions {
    pub turns: Option<i64>,
    pub duration_secs: Option<u64>,
    pub wait: Option<Duration>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub speak_first: bool,
}

impl ConversationOptions {
    pub fn apply(&self, config: &mut Config) {
        if let Some(turns) = self.turns {
            config.conversation.cycles = turns;
        }
        if let Some(secs) = self.duration_secs {
            config.conversation.duration_secs = secs;
        }
        if let Some(wait) = self.wait {
            config.conversation.wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        }
        if let Some(model) = &self.model {
            config.stt.model = model.clone();
        }
        if let Some(language) = &self.language {
            config.stt.language = Some(language.clone());
        }
        if self.speak_first {
            config.conversation.opening = Opening::Speaking;
        }
    }
}

/// Run the listen/speak loop until it finishes or `cancel` fires.
pub async fn run_conversation(
    mut config: Config,
    store: Arc<PathStore>,
    options: &ConversationOptions,
    cancel: CancellationToken,
    json: bool,
    quiet: bool,
) -> Result<RunReport> {
    options.apply(&mut config);
    config.validate()?;
    let cycles = config.cycle_config()?;
    let pipeline = Arc::new(build_pipeline(&config, store, true).await?);

    if !quiet && !json {
        eprintln!(
            "{} {} turns. Press Ctrl+C to stop.",
            "Conversation:".bold(),
            cycles.target_cycles()
        );
    }

    let mut machine = TurnMachine::new(pipeline, cycles);
    let report = machine.run(&cancel).await;

    if json {
        let rendered = serde_json::to_string_pretty(&report).map_err(|e| VoxError::SaveFailed {
            path: "<stdout>".to_string(),
            message: e.to_string(),
        })?;
        println!("{}", rendered);
    } else {
        print_report(&report);
    }
    Ok(report)
}

fn print_report(report: &RunReport) {
    let summary = format!(
        "Completed {}/{} turns ({} degraded listens, {} failed speaks)",
        report.cycles_completed,
        report.target_cycles,
        report.degraded_listens,
        report.failed_speaks
    );
    if report.is_complete() && report.degraded_listens == 0 && report.failed_speaks == 0 {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.yellow());
    }
    if report.cancelled {
        println!("{}", "Stopped early by request".yellow());
    }
    if !report.last_recognized_text.is_empty() {
        println!("Last heard: \"{}\"", report.last_recognized_text);
    }
}

/// Print the newest transcript.
pub fn run_latest(store: &PathStore) -> Result<String> {
    match store.load_latest_transcription()? {
        Some(text) => {
            println!("{}", text);
            Ok(text)
        }
        None => Err(VoxError::SourceFailed {
            message: format!("no transcripts found in {}", store.output_dir().display()),
        }),
    }
}

/// List available audio input devices.
pub fn run_devices() -> Result<()> {
    let devices = list_devices()?;
    if devices.is_empty() {
        return Err(VoxError::AudioDeviceNotFound {
            device: "any input".to_string(),
        });
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }
    Ok(())
}
