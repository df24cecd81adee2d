use crate::defaults;
use crate::error::{Result, VoxError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Trait for speech-to-text transcription of an audio file.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait Transcriber: Send + Sync {
    /// Transcribe the WAV file at `audio_path`.
    ///
    /// # Arguments
    /// * `model_hint` - Model size to use instead of the default (e.g. "base")
    /// * `language_hint` - Spoken language code; `None` or "auto" detects it
    fn transcribe(
        &self,
        audio_path: &Path,
        model_hint: Option<&str>,
        language_hint: Option<&str>,
    ) -> Result<String>;

    /// Get the name of the default model
    fn model_name(&self) -> &str;

    /// Check if the transcriber is ready
    fn is_ready(&self) -> bool;
}

/// Implement Transcriber for Arc<T> to allow sharing across sessions.
impl<T: Transcriber> Transcriber for Arc<T> {
    fn transcribe(
        &self,
        audio_path: &Path,
        model_hint: Option<&str>,
        language_hint: Option<&str>,
    ) -> Result<String> {
        (**self).transcribe(audio_path, model_hint, language_hint)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Accept only the known Whisper model sizes.
pub fn validate_model_hint(model: &str) -> Result<()> {
    if defaults::MODEL_SIZES.contains(&model) {
        Ok(())
    } else {
        Err(VoxError::InvalidHint {
            hint: model.to_string(),
            message: format!("unknown model, expected one of {}", defaults::MODEL_SIZES.join(", ")),
        })
    }
}

/// Accept "auto" or a 2-7 character code of letters, digits and hyphens.
pub fn validate_language_hint(language: &str) -> Result<()> {
    if language == defaults::AUTO_LANGUAGE {
        return Ok(());
    }
    let valid_len = (2..=7).contains(&language.len());
    let valid_chars = language
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(VoxError::InvalidHint {
            hint: language.to_string(),
            message: "language must be 2-7 letters, digits or hyphens".to_string(),
        })
    }
}

/// One recorded call to [`MockTranscriber::transcribe`].
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeCall {
    pub audio_path: PathBuf,
    pub model_hint: Option<String>,
    pub language_hint: Option<String>,
}

/// Mock transcriber for testing
#[derive(Debug)]
pub struct MockTranscriber {
    model_name: String,
    responses: Vec<String>,
    fail_on_calls: Vec<usize>,
    always_fail: bool,
    calls: AtomicUsize,
    history: Mutex<Vec<TranscribeCall>>,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            responses: vec!["mock transcription".to_string()],
            fail_on_calls: Vec::new(),
            always_fail: false,
            calls: AtomicUsize::new(0),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.responses = vec![response.to_string()];
        self
    }

    /// Return responses in order, repeating the last one once exhausted
    pub fn with_responses(mut self, responses: &[&str]) -> Self {
        self.responses = responses.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Fail on the given 1-based call number
    pub fn with_failure_on_call(mut self, call: usize) -> Self {
        self.fail_on_calls.push(call);
        self
    }

    /// Configure the mock to fail on every transcribe
    pub fn with_failure(mut self) -> Self {
        self.always_fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn history(&self) -> Vec<TranscribeCall> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(
        &self,
        audio_path: &Path,
        model_hint: Option<&str>,
        language_hint: Option<&str>,
    ) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut history) = self.history.lock() {
            history.push(TranscribeCall {
                audio_path: audio_path.to_path_buf(),
                model_hint: model_hint.map(str::to_string),
                language_hint: language_hint.map(str::to_string),
            });
        }

        if self.always_fail || self.fail_on_calls.contains(&call) {
            return Err(VoxError::transcription("mock transcription failure"));
        }
        let index = (call - 1).min(self.responses.len().saturating_sub(1));
        Ok(self.responses.get(index).cloned().unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.always_fail
    }
}
