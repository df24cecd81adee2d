//! Single-shot audio-in and audio-out operations.
//!
//! Every adapter failure is returned to the caller with its own error code.
//! Deciding whether a failure is survivable belongs to the caller (see
//! [`crate::conversation::TurnMachine`]).

use crate::audio::buffer::AudioBuffer;
use crate::audio::playback::AudioPlayer;
use crate::audio::recorder::AudioRecorder;
use crate::error::{ErrorKind, Result, VoxError};
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::types::{
    AudioInOutput, AudioInRequest, AudioOutRequest, AudioOutResult, TextSource,
};
use crate::store::PathStore;
use crate::stt::transcriber::{Transcriber, validate_language_hint, validate_model_hint};
use crate::tts::synthesizer::Synthesizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Run a blocking adapter call on the blocking pool.
///
/// A panicked worker becomes `on_panic(message)` so it carries the code of
/// the phase it happened in.
async fn offload<T, F, P>(on_panic: P, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
    P: FnOnce(String) -> VoxError,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| on_panic(format!("worker task failed: {}", e)))?
}

/// Keep errors of `kind` (and security violations) as they are; rewrap the
/// rest with `wrap`.
fn confine<F>(err: VoxError, kind: ErrorKind, wrap: F) -> VoxError
where
    F: FnOnce(String) -> VoxError,
{
    if err.kind() == kind || err.kind() == ErrorKind::Security {
        err
    } else {
        wrap(err.to_string())
    }
}

fn save_failed(path: &Path, err: VoxError) -> VoxError {
    match err {
        VoxError::SaveFailed { .. } | VoxError::Security { .. } => err,
        other => VoxError::SaveFailed {
            path: path.display().to_string(),
            message: other.to_string(),
        },
    }
}

/// Audio pipeline built on the four adapters and the path store.
pub struct Pipeline {
    recorder: Arc<dyn AudioRecorder>,
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    player: Arc<dyn AudioPlayer>,
    store: Arc<PathStore>,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        recorder: Arc<dyn AudioRecorder>,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
        player: Arc<dyn AudioPlayer>,
        store: Arc<PathStore>,
    ) -> Self {
        Self {
            recorder,
            transcriber,
            synthesizer,
            player,
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Retry policy for the transcription call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &PathStore {
        &self.store
    }

    /// Capture (or load) audio, transcribe it, and optionally save the text.
    pub async fn audio_in(&self, request: &AudioInRequest) -> Result<AudioInOutput> {
        if let Some(model) = &request.model_hint {
            validate_model_hint(model)?;
        }
        if let Some(language) = &request.language_hint {
            validate_language_hint(language)?;
        }

        let source = match &request.audio_path {
            Some(path) => {
                debug!(path = %path.display(), "Using existing recording");
                path.clone()
            }
            None => self.capture(request.duration).await?,
        };

        let text = self
            .transcribe(
                &source,
                request.model_hint.as_deref(),
                request.language_hint.as_deref(),
            )
            .await?;

        let target = match (&request.output_path, request.save_transcript) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => Some(self.store.transcript_path_for(&source)),
            (None, false) => None,
        };
        let transcript_path = match target {
            Some(path) => Some(self.save_text(text.clone(), path).await?),
            None => None,
        };

        info!(
            chars = text.len(),
            saved = transcript_path.is_some(),
            "audio-in complete"
        );
        Ok(AudioInOutput {
            text,
            transcript_path,
            source,
        })
    }

    /// Resolve text, synthesize it, save the audio and optionally play it.
    pub async fn audio_out(&self, request: &AudioOutRequest) -> Result<AudioOutResult> {
        let source = self
            .resolve_text_source(request.data_source.as_deref(), request.use_latest_transcript)
            .await?;
        let text = match source.text() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => {
                return Err(VoxError::EmptyText {
                    message: "no text found to synthesize".to_string(),
                });
            }
        };

        let audio = self.synthesize(&text, request.voice.clone()).await?;

        let target = request
            .output_path
            .clone()
            .unwrap_or_else(|| self.store.generate_output_path());
        let saved = {
            let store = Arc::clone(&self.store);
            let audio = audio.clone();
            let target_for_err = target.clone();
            offload(VoxError::synthesis, move || store.save_audio(&audio, &target))
                .await
                .map_err(|e| save_failed(&target_for_err, e))?
        };

        if request.play_audio {
            self.play(audio).await?;
        } else {
            debug!("Playback skipped");
        }

        info!(path = %saved.display(), "audio-out complete");
        Ok(if request.return_text_output {
            AudioOutResult::Text {
                text,
                saved_to: saved,
            }
        } else {
            AudioOutResult::Path(saved)
        })
    }

    /// Synthesize and play `text` without persisting anything.
    pub async fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(VoxError::EmptyText {
                message: "refusing to speak empty text".to_string(),
            });
        }
        let audio = self.synthesize(text, None).await?;
        self.play(audio).await
    }

    /// Decide where audio-out's text comes from.
    ///
    /// A `data_source` naming an existing file is read; any other non-blank
    /// value is literal text. A blank source falls back to the newest
    /// transcript when `use_latest` is set. [`TextSource::NotFound`] is not
    /// an error.
    pub async fn resolve_text_source(
        &self,
        data_source: Option<&str>,
        use_latest: bool,
    ) -> Result<TextSource> {
        let requested = data_source.map(str::trim).filter(|s| !s.is_empty());

        if let Some(source) = requested {
            let path = PathBuf::from(source);
            if !self.store.resolve(&path).is_file() {
                return Ok(TextSource::Literal(source.to_string()));
            }
            let store = Arc::clone(&self.store);
            let read_path = path.clone();
            let text = offload(source_failed, move || store.read_text(&read_path))
                .await
                .map_err(|e| match e {
                    VoxError::ReadFailed { .. } | VoxError::Security { .. } => e,
                    other => source_failed(other.to_string()),
                })?;
            debug!(path = %path.display(), chars = text.len(), "Read text source");
            return Ok(TextSource::File { path, text });
        }

        if !use_latest {
            return Ok(TextSource::NotFound);
        }

        let store = Arc::clone(&self.store);
        let latest = offload(source_failed, move || store.load_latest_transcription())
            .await
            .map_err(|e| match e {
                VoxError::ReadFailed { .. } | VoxError::Security { .. } => e,
                other => source_failed(other.to_string()),
            })?;
        Ok(match latest {
            Some(text) => {
                debug!(chars = text.len(), "Using latest transcript");
                TextSource::Latest(text)
            }
            None => TextSource::NotFound,
        })
    }

    async fn capture(&self, duration: Duration) -> Result<PathBuf> {
        info!(secs = duration.as_secs_f32(), "Recording");
        let recorder = Arc::clone(&self.recorder);
        offload(VoxError::capture, move || recorder.record(duration))
            .await
            .map_err(|e| confine(e, ErrorKind::Capture, VoxError::capture))
    }

    async fn transcribe(
        &self,
        source: &Path,
        model_hint: Option<&str>,
        language_hint: Option<&str>,
    ) -> Result<String> {
        let validated = {
            let store = Arc::clone(&self.store);
            let source = source.to_path_buf();
            offload(VoxError::transcription, move || store.validate_audio_file(&source))
                .await
                .map_err(|e| confine(e, ErrorKind::Transcription, VoxError::transcription))?
        };
        debug!(
            path = %validated.path.display(),
            secs = validated.info.duration_secs(),
            "Transcribing"
        );

        let model_hint = model_hint.map(str::to_string);
        let language_hint = language_hint.map(str::to_string);
        let text = self
            .retry
            .run("transcribe", || {
                let transcriber = Arc::clone(&self.transcriber);
                let path = validated.path.clone();
                let model = model_hint.clone();
                let language = language_hint.clone();
                async move {
                    offload(VoxError::transcription, move || {
                        transcriber.transcribe(&path, model.as_deref(), language.as_deref())
                    })
                    .await
                    .map_err(|e| confine(e, ErrorKind::Transcription, VoxError::transcription))
                }
            })
            .await?;
        Ok(text.trim().to_string())
    }

    async fn synthesize(&self, text: &str, voice: Option<String>) -> Result<AudioBuffer> {
        let synthesizer = Arc::clone(&self.synthesizer);
        let text = text.to_string();
        debug!(engine = synthesizer.name(), chars = text.len(), "Synthesizing");
        offload(VoxError::synthesis, move || {
            synthesizer.synthesize(&text, voice.as_deref())
        })
        .await
        .map_err(|e| confine(e, ErrorKind::Synthesis, VoxError::synthesis))
    }

    async fn play(&self, audio: AudioBuffer) -> Result<()> {
        let player = Arc::clone(&self.player);
        offload(VoxError::playback, move || player.play(&audio))
            .await
            .map_err(|e| confine(e, ErrorKind::Playback, VoxError::playback))
    }

    async fn save_text(&self, text: String, path: PathBuf) -> Result<PathBuf> {
        let store = Arc::clone(&self.store);
        let target = path.clone();
        offload(VoxError::transcription, move || store.save_text(&text, &target))
            .await
            .map_err(|e| save_failed(&path, e))
    }
}

fn source_failed(message: String) -> VoxError {
    VoxError::SourceFailed { message }
}
