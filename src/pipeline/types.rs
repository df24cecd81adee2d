//! Request and result types for the single-shot pipeline operations.

use std::path::PathBuf;
use std::time::Duration;

use crate::defaults;

/// Parameters for one audio-in run.
#[derive(Debug, Clone)]
pub struct AudioInRequest {
    /// Existing recording to transcribe; capture is skipped when set.
    pub audio_path: Option<PathBuf>,
    /// Capture length when recording.
    pub duration: Duration,
    pub model_hint: Option<String>,
    pub language_hint: Option<String>,
    /// Explicit transcript destination.
    pub output_path: Option<PathBuf>,
    /// Persist under a generated `<source>_<timestamp>.txt` name.
    pub save_transcript: bool,
}

impl Default for AudioInRequest {
    fn default() -> Self {
        Self {
            audio_path: None,
            duration: Duration::from_secs(defaults::RECORD_SECS),
            model_hint: None,
            language_hint: None,
            output_path: None,
            save_transcript: false,
        }
    }
}

impl AudioInRequest {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            audio_path: Some(path.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioInOutput {
    pub text: String,
    /// Where the transcript was written, if it was.
    pub transcript_path: Option<PathBuf>,
    /// The recording that was transcribed.
    pub source: PathBuf,
}

/// Parameters for one audio-out run.
#[derive(Debug, Clone)]
pub struct AudioOutRequest {
    /// Literal text, or a path to a text file.
    pub data_source: Option<String>,
    pub output_path: Option<PathBuf>,
    pub play_audio: bool,
    /// Return the resolved text instead of the output path. The audio is
    /// still written.
    pub return_text_output: bool,
    /// Fall back to the newest transcript when `data_source` is blank.
    pub use_latest_transcript: bool,
    pub voice: Option<String>,
}

impl Default for AudioOutRequest {
    fn default() -> Self {
        Self {
            data_source: None,
            output_path: None,
            play_audio: true,
            return_text_output: false,
            use_latest_transcript: true,
            voice: None,
        }
    }
}

impl AudioOutRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            data_source: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioOutResult {
    Path(PathBuf),
    Text { text: String, saved_to: PathBuf },
}

impl AudioOutResult {
    /// The audio file written, in either mode.
    pub fn saved_path(&self) -> &PathBuf {
        match self {
            AudioOutResult::Path(path) => path,
            AudioOutResult::Text { saved_to, .. } => saved_to,
        }
    }
}

/// Where audio-out found its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    Literal(String),
    File { path: PathBuf, text: String },
    Latest(String),
    /// Nothing to say. Callers must check for this explicitly.
    NotFound,
}

impl TextSource {
    /// The resolved text, or `None` for [`TextSource::NotFound`].
    pub fn text(&self) -> Option<&str> {
        match self {
            TextSource::Literal(text) | TextSource::Latest(text) => Some(text),
            TextSource::File { text, .. } => Some(text),
            TextSource::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, TextSource::NotFound)
    }
}
