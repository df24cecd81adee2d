use crate::conversation::state::{CycleConfig, Opening};
use crate::defaults;
use crate::error::{Result, VoxError};
use crate::pipeline::retry::RetryPolicy;
use crate::store::StoreConfig;
use crate::stt::transcriber::{validate_language_hint, validate_model_hint};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub limits: LimitsConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub audio: AudioConfig,
    pub conversation: ConversationConfig,
    pub retry: RetryConfig,
}

/// Where artifacts live and which directories may be touched
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub allowed_dirs: Vec<PathBuf>,
    /// Directory holding `ggml-<model>.bin` files.
    pub models_dir: Option<PathBuf>,
}

/// Size ceilings enforced by the artifact store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_audio_file_mb: u64,
    pub max_text_file_mb: u64,
    pub max_text_content_kb: u64,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub model: String,
    /// `None` or `"auto"` lets Whisper detect the language.
    pub language: Option<String>,
    pub threads: Option<usize>,
}

/// Text-to-speech engine selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TtsEngine {
    #[default]
    Tone,
    Kokoro,
}

/// Text-to-speech configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TtsConfig {
    pub engine: TtsEngine,
    pub voice: Option<String>,
    pub kokoro_url: String,
    pub speed: f32,
    pub tone_secs: f32,
}

/// Audio device configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
}

/// Turn-taking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConversationConfig {
    pub cycles: i64,
    pub duration_secs: u64,
    pub wait_ms: u64,
    pub opening: Opening,
    pub opening_line: String,
}

/// Retry policy for the transcription call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub transcribe_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(defaults::INPUT_DIR),
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
            allowed_dirs: defaults::ALLOWED_DIRS.iter().map(PathBuf::from).collect(),
            models_dir: None,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_audio_file_mb: defaults::MAX_AUDIO_FILE_MB,
            max_text_file_mb: defaults::MAX_TEXT_FILE_MB,
            max_text_content_kb: defaults::MAX_TEXT_CONTENT_KB,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: None,
            threads: None,
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            engine: TtsEngine::Tone,
            voice: None,
            kokoro_url: defaults::KOKORO_URL.to_string(),
            speed: 1.0,
            tone_secs: defaults::TONE_SECS,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            cycles: defaults::CONVERSATION_CYCLES,
            duration_secs: defaults::RECORD_SECS,
            wait_ms: defaults::WAIT_BETWEEN_TURNS_MS,
            opening: Opening::Listening,
            opening_line: defaults::OPENING_LINE.to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            transcribe_attempts: defaults::RETRY_ATTEMPTS,
            initial_delay_ms: defaults::RETRY_INITIAL_DELAY_MS,
            backoff_factor: defaults::RETRY_BACKOFF_FACTOR,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                VoxError::Io(e)
            }
        })?;
        toml::from_str(&contents).map_err(|e| VoxError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(VoxError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXLOOP_INPUT_DIR → paths.input_dir
    /// - VOXLOOP_OUTPUT_DIR → paths.output_dir
    /// - VOXLOOP_ALLOWED_DIRS → paths.allowed_dirs (comma-separated)
    /// - VOXLOOP_MODEL → stt.model
    /// - VOXLOOP_LANGUAGE → stt.language
    /// - VOXLOOP_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("VOXLOOP_INPUT_DIR")
            && !dir.is_empty()
        {
            self.paths.input_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("VOXLOOP_OUTPUT_DIR")
            && !dir.is_empty()
        {
            self.paths.output_dir = PathBuf::from(dir);
        }

        if let Ok(dirs) = std::env::var("VOXLOOP_ALLOWED_DIRS")
            && !dirs.trim().is_empty()
        {
            self.paths.allowed_dirs = dirs
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        if let Ok(model) = std::env::var("VOXLOOP_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("VOXLOOP_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = Some(language);
        }

        if let Ok(device) = std::env::var("VOXLOOP_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        self
    }

    /// Reject values that would only fail later, deep inside a run.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: String| VoxError::ConfigInvalidValue {
            key: key.to_string(),
            message,
        };

        validate_model_hint(&self.stt.model).map_err(|e| invalid("stt.model", e.to_string()))?;
        if let Some(language) = &self.stt.language {
            validate_language_hint(language)
                .map_err(|e| invalid("stt.language", e.to_string()))?;
        }
        for (key, value, unit) in [
            ("limits.max_audio_file_mb", self.limits.max_audio_file_mb, MIB),
            ("limits.max_text_file_mb", self.limits.max_text_file_mb, MIB),
            ("limits.max_text_content_kb", self.limits.max_text_content_kb, KIB),
        ] {
            if value == 0 {
                return Err(invalid(key, "must be positive".into()));
            }
            if value.checked_mul(unit).is_none() {
                return Err(invalid(key, "too large to express in bytes".into()));
            }
        }
        if self.paths.allowed_dirs.is_empty() {
            return Err(invalid("paths.allowed_dirs", "must not be empty".into()));
        }
        if self.tts.speed.is_nan() || self.tts.speed <= 0.0 {
            return Err(invalid("tts.speed", "must be positive".into()));
        }
        if self.retry.transcribe_attempts == 0 {
            return Err(invalid("retry.transcribe_attempts", "must be at least 1".into()));
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(invalid(
                "retry.backoff_factor",
                "must be a finite number of at least 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Store settings with relative directories resolved against `base_dir`.
    pub fn store_config(&self, base_dir: &Path) -> StoreConfig {
        StoreConfig {
            base_dir: base_dir.to_path_buf(),
            input_dir: self.paths.input_dir.clone(),
            output_dir: self.paths.output_dir.clone(),
            allowed_dirs: self.paths.allowed_dirs.clone(),
            max_audio_bytes: self.limits.max_audio_file_mb.saturating_mul(MIB),
            max_text_file_bytes: self.limits.max_text_file_mb.saturating_mul(MIB),
            max_text_content_bytes: self.limits.max_text_content_kb.saturating_mul(KIB),
        }
    }

    /// Turn-taking settings for the conversation loop.
    pub fn cycle_config(&self) -> Result<CycleConfig> {
        Ok(CycleConfig::new(self.conversation.cycles)?
            .with_record_duration(Duration::from_secs(self.conversation.duration_secs))
            .with_wait_between_turns(Duration::from_millis(self.conversation.wait_ms))
            .with_model_hint(Some(self.stt.model.clone()))
            .with_language_hint(self.stt.language.clone())
            .with_opening(self.conversation.opening)
            .with_opening_line(self.conversation.opening_line.clone()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.transcribe_attempts,
            Duration::from_millis(self.retry.initial_delay_ms),
            self.retry.backoff_factor,
        )
    }

    /// Directory holding Whisper models.
    ///
    /// Defaults to ~/.local/share/voxloop/models on Linux.
    pub fn models_dir(&self) -> PathBuf {
        self.paths
            .models_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("voxloop").join("models")))
            .unwrap_or_else(|| PathBuf::from("models"))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxloop/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voxloop")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_voxloop_env() {
        for key in [
            "VOXLOOP_INPUT_DIR",
            "VOXLOOP_OUTPUT_DIR",
            "VOXLOOP_ALLOWED_DIRS",
            "VOXLOOP_MODEL",
            "VOXLOOP_LANGUAGE",
            "VOXLOOP_AUDIO_DEVICE",
        ] {
            remove_env(key);
        }
    }

    fn write_toml(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.paths.input_dir, PathBuf::from("input"));
        assert_eq!(config.paths.output_dir, PathBuf::from("output"));
        assert_eq!(config.paths.allowed_dirs.len(), 4);
        assert_eq!(config.limits.max_audio_file_mb, 100);
        assert_eq!(config.limits.max_text_file_mb, 10);
        assert_eq!(config.limits.max_text_content_kb, 1024);
        assert_eq!(config.stt.model, "tiny");
        assert_eq!(config.stt.language, None);
        assert_eq!(config.tts.engine, TtsEngine::Tone);
        assert_eq!(config.conversation.cycles, 2);
        assert_eq!(config.conversation.duration_secs, 5);
        assert_eq!(config.conversation.wait_ms, 100);
        assert_eq!(config.conversation.opening, Opening::Listening);
        assert_eq!(config.retry.transcribe_attempts, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_toml(
            r#"
            [paths]
            input_dir = "/tmp/vox/in"
            output_dir = "/tmp/vox/out"
            allowed_dirs = ["/tmp/vox"]

            [stt]
            model = "small"
            language = "de"

            [tts]
            engine = "kokoro"
            voice = "af_sky"

            [conversation]
            cycles = 3
            opening = "speaking"
            opening_line = "Hi there"
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.paths.input_dir, PathBuf::from("/tmp/vox/in"));
        assert_eq!(config.paths.allowed_dirs, vec![PathBuf::from("/tmp/vox")]);
        assert_eq!(config.stt.model, "small");
        assert_eq!(config.stt.language.as_deref(), Some("de"));
        assert_eq!(config.tts.engine, TtsEngine::Kokoro);
        assert_eq!(config.tts.voice.as_deref(), Some("af_sky"));
        assert_eq!(config.conversation.cycles, 3);
        assert_eq!(config.conversation.opening, Opening::Speaking);
        assert_eq!(config.conversation.opening_line, "Hi there");
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_toml(
            r#"
            [stt]
            model = "base"
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.stt.model, "base");
        assert_eq!(config.paths, PathsConfig::default());
        assert_eq!(config.conversation, ConversationConfig::default());
        assert_eq!(config.tts, TtsConfig::default());
    }

    #[test]
    fn test_env_override_model() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxloop_env();

        set_env("VOXLOOP_MODEL", "medium");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.stt.model, "medium");
        assert_eq!(config.stt.language, None);

        clear_voxloop_env();
    }

    #[test]
    fn test_env_override_all() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxloop_env();

        set_env("VOXLOOP_INPUT_DIR", "/tmp/a");
        set_env("VOXLOOP_OUTPUT_DIR", "/tmp/b");
        set_env("VOXLOOP_ALLOWED_DIRS", "/tmp/a, /tmp/b,");
        set_env("VOXLOOP_LANGUAGE", "fr");
        set_env("VOXLOOP_AUDIO_DEVICE", "pulse");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.paths.input_dir, PathBuf::from("/tmp/a"));
        assert_eq!(config.paths.output_dir, PathBuf::from("/tmp/b"));
        assert_eq!(
            config.paths.allowed_dirs,
            vec![PathBuf::from("/tmp/a"), PathBuf::from("/tmp/b")]
        );
        assert_eq!(config.stt.language.as_deref(), Some("fr"));
        assert_eq!(config.audio.device.as_deref(), Some("pulse"));

        clear_voxloop_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxloop_env();

        set_env("VOXLOOP_MODEL", "");
        set_env("VOXLOOP_OUTPUT_DIR", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.stt.model, "tiny");
        assert_eq!(config.paths.output_dir, PathBuf::from("output"));

        clear_voxloop_env();
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let temp_file = write_toml(
            r#"
            [paths
            input_dir = "broken
        "#,
        );

        let result = Config::load(temp_file.path());
        assert!(matches!(result, Err(VoxError::ConfigParse { .. })));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_voxloop_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_rejects_invalid_toml() {
        let temp_file = write_toml("cycles = = 3");
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_model() {
        let mut config = Config::default();
        config.stt.model = "gigantic".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("stt.model"), "got: {}", err);
    }

    #[test]
    fn test_validate_rejects_bad_language_and_zero_limits() {
        let mut config = Config::default();
        config.stt.language = Some("e".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.max_text_content_kb = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.transcribe_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_config_converts_limits_to_bytes() {
        let config = Config::default();
        let store = config.store_config(Path::new("/srv/app"));
        assert_eq!(store.base_dir, PathBuf::from("/srv/app"));
        assert_eq!(store.max_audio_bytes, 100 * 1024 * 1024);
        assert_eq!(store.max_text_file_bytes, 10 * 1024 * 1024);
        assert_eq!(store.max_text_content_bytes, 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_limits_that_overflow_bytes() {
        let mut config = Config::default();
        config.limits.max_audio_file_mb = u64::MAX / 2;
        match config.validate() {
            Err(VoxError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "limits.max_audio_file_mb")
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }

        let mut config = Config::default();
        config.limits.max_text_content_kb = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_config_saturates_oversized_limits() {
        let mut config = Config::default();
        config.limits.max_audio_file_mb = u64::MAX / 2;
        let store = config.store_config(Path::new("/srv/app"));
        assert_eq!(store.max_audio_bytes, u64::MAX);
    }

    #[test]
    fn test_validate_rejects_non_finite_backoff() {
        for factor in [f64::INFINITY, f64::NAN, 0.5] {
            let mut config = Config::default();
            config.retry.backoff_factor = factor;
            let err = config.validate().unwrap_err();
            assert_eq!(err.code().as_str(), "INVALID_CONFIG");
        }
    }

    #[test]
    fn test_huge_backoff_passes_validation_with_capped_delay() {
        let mut config = Config::default();
        config.retry.transcribe_attempts = 3;
        config.retry.backoff_factor = 1e30;
        config.validate().unwrap();
        assert_eq!(
            config.retry_policy().delay_for(2),
            Duration::from_millis(defaults::RETRY_MAX_DELAY_MS)
        );
    }

    #[test]
    fn test_cycle_config_from_defaults() {
        let cycle = Config::default().cycle_config().unwrap();
        assert_eq!(cycle.target_cycles(), 2);
        assert_eq!(cycle.record_duration(), Duration::from_secs(5));
        assert_eq!(cycle.wait_between_turns(), Duration::from_millis(100));
        assert_eq!(cycle.model_hint(), Some("tiny"));
    }

    #[test]
    fn test_cycle_config_rejects_zero_cycles() {
        let mut config = Config::default();
        config.conversation.cycles = 0;
        assert!(config.cycle_config().is_err());
    }

    #[test]
    fn test_models_dir_prefers_configured_path() {
        let mut config = Config::default();
        config.paths.models_dir = Some(PathBuf::from("/opt/models"));
        assert_eq!(config.models_dir(), PathBuf::from("/opt/models"));
    }

    #[test]
    fn test_default_path_ends_with_voxloop_config() {
        let path = Config::default_path();
        assert!(path.ends_with("voxloop/config.toml"));
    }
}
