//! Error types for voxloop.
//!
//! Every variant belongs to exactly one [`ErrorKind`] and carries a stable
//! [`ErrorCode`] so callers can tell which phase of a pipeline failed.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Invalid cycle configuration: {message}")]
    CycleConfiguration { message: String },

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Transcription errors
    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Invalid transcription hint {hint}: {message}")]
    InvalidHint { hint: String, message: String },

    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    // Synthesis errors
    #[error("No text to synthesize: {message}")]
    EmptyText { message: String },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Playback errors
    #[error("Audio playback failed: {message}")]
    Playback { message: String },

    // File operation errors
    #[error("Failed to save {path}: {message}")]
    SaveFailed { path: String, message: String },

    #[error("Failed to read {path}: {message}")]
    ReadFailed { path: String, message: String },

    #[error("Failed to resolve text source: {message}")]
    SourceFailed { message: String },

    #[error("Failed to prepare directory {path}: {message}")]
    DirectoryFailed { path: String, message: String },

    // Path safety errors
    #[error("Security violation for {path}: {message}")]
    Security { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad family an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Capture,
    Transcription,
    Synthesis,
    Playback,
    FileOperation,
    Security,
    CycleConfiguration,
    Configuration,
}

/// Stable machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    RecordFailed,
    TranscribeFailed,
    EmptyText,
    SynthesisFailed,
    PlaybackFailed,
    SaveFailed,
    ReadFailed,
    SourceFailed,
    DirectoryFailed,
    SecurityViolation,
    InvalidCycles,
    InvalidConfig,
    IoFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RecordFailed => "RECORD_FAILED",
            ErrorCode::TranscribeFailed => "TRANSCRIBE_FAILED",
            ErrorCode::EmptyText => "EMPTY_TEXT",
            ErrorCode::SynthesisFailed => "SYNTHESIS_FAILED",
            ErrorCode::PlaybackFailed => "PLAYBACK_FAILED",
            ErrorCode::SaveFailed => "SAVE_FAILED",
            ErrorCode::ReadFailed => "READ_FAILED",
            ErrorCode::SourceFailed => "SOURCE_FAILED",
            ErrorCode::DirectoryFailed => "DIRECTORY_FAILED",
            ErrorCode::SecurityViolation => "SECURITY_VIOLATION",
            ErrorCode::InvalidCycles => "INVALID_CYCLES",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::IoFailed => "IO_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VoxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VoxError::ConfigFileNotFound { .. }
            | VoxError::ConfigParse { .. }
            | VoxError::ConfigInvalidValue { .. } => ErrorKind::Configuration,
            VoxError::CycleConfiguration { .. } => ErrorKind::CycleConfiguration,
            VoxError::AudioDeviceNotFound { .. } | VoxError::AudioCapture { .. } => {
                ErrorKind::Capture
            }
            VoxError::TranscriptionModelNotFound { .. }
            | VoxError::InvalidHint { .. }
            | VoxError::Transcription { .. } => ErrorKind::Transcription,
            VoxError::EmptyText { .. } | VoxError::Synthesis { .. } => ErrorKind::Synthesis,
            VoxError::Playback { .. } => ErrorKind::Playback,
            VoxError::SaveFailed { .. }
            | VoxError::ReadFailed { .. }
            | VoxError::SourceFailed { .. }
            | VoxError::DirectoryFailed { .. }
            | VoxError::Io(_) => ErrorKind::FileOperation,
            VoxError::Security { .. } => ErrorKind::Security,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            VoxError::ConfigFileNotFound { .. }
            | VoxError::ConfigParse { .. }
            | VoxError::ConfigInvalidValue { .. } => ErrorCode::InvalidConfig,
            VoxError::CycleConfiguration { .. } => ErrorCode::InvalidCycles,
            VoxError::AudioDeviceNotFound { .. } | VoxError::AudioCapture { .. } => {
                ErrorCode::RecordFailed
            }
            VoxError::TranscriptionModelNotFound { .. }
            | VoxError::InvalidHint { .. }
            | VoxError::Transcription { .. } => ErrorCode::TranscribeFailed,
            VoxError::EmptyText { .. } => ErrorCode::EmptyText,
            VoxError::Synthesis { .. } => ErrorCode::SynthesisFailed,
            VoxError::Playback { .. } => ErrorCode::PlaybackFailed,
            VoxError::SaveFailed { .. } => ErrorCode::SaveFailed,
            VoxError::ReadFailed { .. } => ErrorCode::ReadFailed,
            VoxError::SourceFailed { .. } => ErrorCode::SourceFailed,
            VoxError::DirectoryFailed { .. } => ErrorCode::DirectoryFailed,
            VoxError::Security { .. } => ErrorCode::SecurityViolation,
            VoxError::Io(_) => ErrorCode::IoFailed,
        }
    }

    pub fn capture(message: impl Into<String>) -> Self {
        VoxError::AudioCapture {
            message: message.into(),
        }
    }

    pub fn transcription(message: impl Into<String>) -> Self {
        VoxError::Transcription {
            message: message.into(),
        }
    }

    pub fn synthesis(message: impl Into<String>) -> Self {
        VoxError::Synthesis {
            message: message.into(),
        }
    }

    pub fn playback(message: impl Into<String>) -> Self {
        VoxError::Playback {
            message: message.into(),
        }
    }

    pub fn security(path: impl fmt::Display, message: impl Into<String>) -> Self {
        VoxError::Security {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxError>;
