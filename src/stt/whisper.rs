//! Whisper-based speech-to-text transcription.
//!
//! Models are `ggml-<size>.bin` files in one directory. Each size is loaded
//! on first use (or up front via `preload`) and kept for later calls.
//!
//! # Feature Gate
//!
//! Real inference requires the `whisper` feature (and cmake at build time).

use crate::audio::wav;
use crate::defaults;
use crate::error::{Result, VoxError};
use crate::stt::transcriber::{Transcriber, validate_language_hint, validate_model_hint};
use std::path::{Path, PathBuf};

#[cfg(feature = "whisper")]
use std::collections::HashMap;
#[cfg(feature = "whisper")]
use std::sync::{Arc, Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for Whisper transcriber.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Directory holding `ggml-<model>.bin` files
    pub models_dir: PathBuf,
    /// Model size used when no hint is given
    pub model: String,
    /// Language used when no hint is given (None = auto-detect)
    pub language: Option<String>,
    /// Number of threads for inference (None = whisper's default)
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            model: defaults::DEFAULT_MODEL.to_string(),
            language: None,
            threads: None,
        }
    }
}

impl WhisperConfig {
    pub fn model_path(&self, model: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{}.bin", model))
    }
}

/// Convert i16 audio samples to f32 normalized to [-1.0, 1.0]
pub fn convert_audio(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

/// Resolve the hints against the configured defaults.
fn resolve_hints<'a>(
    config: &'a WhisperConfig,
    model_hint: Option<&'a str>,
    language_hint: Option<&'a str>,
) -> Result<(&'a str, Option<&'a str>)> {
    let model = model_hint.unwrap_or(&config.model);
    validate_model_hint(model)?;
    let language = language_hint.or(config.language.as_deref());
    if let Some(language) = language {
        validate_language_hint(language)?;
    }
    let language = language.filter(|l| *l != defaults::AUTO_LANGUAGE);
    Ok((model, language))
}

fn load_samples(audio_path: &Path) -> Result<Vec<f32>> {
    let samples = wav::read_mono_16k(audio_path)
        .map_err(|e| VoxError::transcription(format!("Failed to decode audio: {}", e)))?;
    if samples.is_empty() {
        return Err(VoxError::transcription("audio file contains no samples"));
    }
    Ok(convert_audio(&samples))
}

/// Whisper-based transcriber implementation.
#[cfg(feature = "whisper")]
pub struct WhisperTranscriber {
    config: WhisperConfig,
    contexts: Mutex<HashMap<String, Arc<WhisperContext>>>,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("config", &self.config)
            .field("contexts", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper-based transcriber placeholder (without whisper feature).
///
/// Enable the `whisper` feature to use real transcription.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
}

fn require_model_file(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(VoxError::TranscriptionModelNotFound {
            path: path.to_string_lossy().to_string(),
        })
    }
}

#[cfg(feature = "whisper")]
impl WhisperTranscriber {
    /// Create a transcriber. Models load on first use or on [`Self::preload`].
    pub fn new(config: WhisperConfig) -> Result<Self> {
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        validate_model_hint(&config.model)?;
        Ok(Self {
            config,
            contexts: Mutex::new(HashMap::new()),
        })
    }

    /// Load the default model now. Blocks; call off the async runtime.
    ///
    /// # Errors
    /// Returns `VoxError::TranscriptionModelNotFound` if the model file doesn't exist
    /// and `VoxError::Transcription` if the model fails to load.
    pub fn preload(&self) -> Result<()> {
        self.context_for(&self.config.model).map(|_| ())
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }

    fn context_for(&self, model: &str) -> Result<Arc<WhisperContext>> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|e| VoxError::transcription(format!("Failed to acquire context lock: {}", e)))?;
        if let Some(context) = contexts.get(model) {
            return Ok(Arc::clone(context));
        }

        let path = self.config.model_path(model);
        require_model_file(&path)?;
        tracing::info!(
            model,
            path = %path.display(),
            backend = defaults::gpu_backend(),
            "Loading Whisper model"
        );

        let mut context_params = WhisperContextParameters::default();
        context_params.flash_attn(true);
        let context = WhisperContext::new_with_params(
            path.to_str()
                .ok_or_else(|| VoxError::transcription("Invalid UTF-8 in model path"))?,
            context_params,
        )
        .map_err(|e| VoxError::transcription(format!("Failed to load Whisper model: {}", e)))?;

        let context = Arc::new(context);
        contexts.insert(model.to_string(), Arc::clone(&context));
        Ok(context)
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperTranscriber {
    /// Create a transcriber (stub implementation).
    pub fn new(config: WhisperConfig) -> Result<Self> {
        validate_model_hint(&config.model)?;
        Ok(Self { config })
    }

    /// Only checks that the default model file exists.
    pub fn preload(&self) -> Result<()> {
        require_model_file(&self.config.model_path(&self.config.model))
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl Transcriber for WhisperTranscriber {
    fn transcribe(
        &self,
        audio_path: &Path,
        model_hint: Option<&str>,
        language_hint: Option<&str>,
    ) -> Result<String> {
        let (model, language) = resolve_hints(&self.config, model_hint, language_hint)?;
        let audio = load_samples(audio_path)?;
        let context = self.context_for(model)?;

        let mut state = context
            .create_state()
            .map_err(|e| VoxError::transcription(format!("Failed to create Whisper state: {}", e)))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language);
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &audio)
            .map_err(|e| VoxError::transcription(format!("Whisper inference failed: {}", e)))?;

        let mut transcription = String::new();
        for segment in state.as_iter() {
            transcription.push_str(&segment.to_string());
        }
        let text = transcription.trim().to_string();
        tracing::debug!(model, chars = text.len(), "Transcribed");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl Transcriber for WhisperTranscriber {
    fn transcribe(
        &self,
        audio_path: &Path,
        model_hint: Option<&str>,
        language_hint: Option<&str>,
    ) -> Result<String> {
        resolve_hints(&self.config, model_hint, language_hint)?;
        load_samples(audio_path)?;
        Err(VoxError::transcription(concat!(
            "voxloop was built without the `whisper` feature, so it cannot transcribe.\n",
            "Rebuild with default features (whisper-rs needs cmake and a C++ compiler)."
        )))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn is_ready(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::AudioBuffer;
    use tempfile::TempDir;

    #[test]
    fn test_whisper_config_default() {
        let config = WhisperConfig::default();
        assert_eq!(config.model, "tiny");
        assert_eq!(config.language, None);
        assert_eq!(config.model_path("base"), PathBuf::from("models/ggml-base.bin"));
    }

    #[test]
    fn test_preload_fails_for_missing_model() {
        let config = WhisperConfig {
            models_dir: PathBuf::from("/nonexistent"),
            ..WhisperConfig::default()
        };
        let transcriber = WhisperTranscriber::new(config).unwrap();
        match transcriber.preload() {
            Err(VoxError::TranscriptionModelNotFound { path }) => {
                assert_eq!(path, "/nonexistent/ggml-tiny.bin");
            }
            other => panic!("Expected TranscriptionModelNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_new_rejects_unknown_default_model() {
        let config = WhisperConfig {
            model: "colossal".to_string(),
            ..WhisperConfig::default()
        };
        assert!(matches!(
            WhisperTranscriber::new(config),
            Err(VoxError::InvalidHint { .. })
        ));
    }

    #[test]
    fn test_resolve_hints_prefers_hints_and_drops_auto() {
        let config = WhisperConfig {
            language: Some("en".to_string()),
            ..WhisperConfig::default()
        };
        assert_eq!(
            resolve_hints(&config, None, None).unwrap(),
            ("tiny", Some("en"))
        );
        assert_eq!(
            resolve_hints(&config, Some("base"), Some("auto")).unwrap(),
            ("base", None)
        );
        assert!(resolve_hints(&config, Some("giant"), None).is_err());
        assert!(resolve_hints(&config, None, Some("x")).is_err());
    }

    #[test]
    fn test_load_samples_rejects_non_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, "nope").unwrap();
        let err = load_samples(&path).unwrap_err();
        assert_eq!(err.code().as_str(), "TRANSCRIBE_FAILED");
    }

    #[test]
    fn test_load_samples_rejects_empty_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wav");
        wav::write_wav(&path, &AudioBuffer::mono(Vec::new(), 16000)).unwrap();
        assert!(load_samples(&path).is_err());
    }

    #[test]
    fn test_convert_audio_i16_to_f32() {
        let samples = vec![0i16, 16384, -16384, 32767, -32768];
        let converted = convert_audio(&samples);

        assert_eq!(converted.len(), samples.len());
        assert_eq!(converted[0], 0.0);
        assert!((converted[1] - 0.5).abs() < 0.01);
        assert!((converted[2] + 0.5).abs() < 0.01);
        assert!((converted[3] - 0.999969).abs() < 0.01);
        assert_eq!(converted[4], -1.0);
    }

    #[test]
    fn test_convert_audio_empty() {
        assert!(convert_audio(&[]).is_empty());
    }
}
