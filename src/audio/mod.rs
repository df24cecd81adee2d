//! Audio capture, playback and WAV handling.

pub mod buffer;
pub mod capture;
pub mod playback;
pub mod recorder;
pub mod wav;

pub use buffer::{AudioAsset, AudioBuffer};
pub use playback::{AudioPlayer, MockPlayer, RodioPlayer};
pub use recorder::{AudioRecorder, MockRecorder};
