//! Default configuration constants for voxloop.
//!
//! Shared by the config layer, the artifact store and the adapters so that a
//! value only has one home.

/// Sample rate for recordings and synthesized placeholder audio, in Hz.
///
/// 16kHz is what Whisper expects, so recordings need no resampling before
/// transcription.
pub const SAMPLE_RATE: u32 = 16000;

/// Lowest sample rate accepted when validating an audio file.
pub const MIN_SAMPLE_RATE: u32 = 8000;

/// Highest sample rate accepted when validating an audio file.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Default Whisper model size.
pub const DEFAULT_MODEL: &str = "tiny";

/// Model sizes accepted as transcription hints.
pub const MODEL_SIZES: &[&str] = &["tiny", "base", "small", "medium", "large"];

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Directory that receives recordings.
pub const INPUT_DIR: &str = "input";

/// Directory that receives transcripts and synthesized audio.
pub const OUTPUT_DIR: &str = "output";

/// Directories the artifact store may read from or write to.
pub const ALLOWED_DIRS: &[&str] = &["input", "output", "tests", "/tmp"];

/// Size ceilings for files the store will touch.
pub const MAX_AUDIO_FILE_MB: u64 = 100;
pub const MAX_TEXT_FILE_MB: u64 = 10;
pub const MAX_TEXT_CONTENT_KB: u64 = 1024;

/// Extensions accepted for text files without a warning.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "json", "csv", "log"];

/// `chrono` format used in generated artifact names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Prefix of synthesized audio files.
pub const AUDIO_OUT_PREFIX: &str = "audio_out_";

/// Prefix of microphone recordings.
pub const RECORDING_PREFIX: &str = "recording_";

/// Base name used for transcripts when the source name has nothing usable.
pub const TRANSCRIPT_FALLBACK_NAME: &str = "transcription";

/// Spoken when a listening phase produced no usable text.
pub const FALLBACK_MESSAGE: &str = "I couldn't understand what you said.";

/// Prefix of the spoken reply to recognized text.
pub const REPLY_PREFIX: &str = "I heard you say: ";

/// Spoken when a conversation opens by speaking and nothing was heard yet.
pub const OPENING_LINE: &str = "Hello, I'm listening.";

/// Conversation defaults.
pub const CONVERSATION_CYCLES: i64 = 2;
pub const RECORD_SECS: u64 = 5;
pub const WAIT_BETWEEN_TURNS_MS: u64 = 100;

/// Upper bound on requested conversation cycles.
pub const MAX_CYCLES: i64 = 10_000;

/// Placeholder tone length in seconds.
pub const TONE_SECS: f32 = 2.0;

/// Kokoro server defaults.
pub const KOKORO_URL: &str = "http://127.0.0.1:8880";
pub const KOKORO_VOICE: &str = "af_heart";
pub const KOKORO_SAMPLE_RATE: u32 = 24000;

/// Retry defaults for the transcription call.
pub const RETRY_ATTEMPTS: u32 = 1;
pub const RETRY_INITIAL_DELAY_MS: u64 = 1000;
pub const RETRY_BACKOFF_FACTOR: f64 = 2.0;
/// Upper bound on any single wait between transcription attempts.
pub const RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Report the GPU backend compiled into this build.
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else {
        "CPU"
    }
}
