//! Audio playback.
//!
//! # Feature Gate
//!
//! [`RodioPlayer`] needs the `playback` feature; without it, playing always
//! fails with a playback error.

use crate::audio::buffer::AudioBuffer;
use crate::error::{Result, VoxError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Trait for playing a buffer on an output device.
///
/// Implementations block until playback has finished.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, audio: &AudioBuffer) -> Result<()>;
}

impl<T: AudioPlayer> AudioPlayer for Arc<T> {
    fn play(&self, audio: &AudioBuffer) -> Result<()> {
        (**self).play(audio)
    }
}

/// Plays on the default output device through rodio.
///
/// The output stream is opened per call on the calling thread, since rodio's
/// `OutputStream` is `!Send`.
#[derive(Debug, Default)]
pub struct RodioPlayer;

impl RodioPlayer {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "playback")]
impl AudioPlayer for RodioPlayer {
    fn play(&self, audio: &AudioBuffer) -> Result<()> {
        if audio.is_empty() {
            return Err(VoxError::playback("nothing to play"));
        }
        if audio.channels == 0 || audio.sample_rate == 0 {
            return Err(VoxError::playback(format!(
                "unsupported format: {} channels at {} Hz",
                audio.channels, audio.sample_rate
            )));
        }

        let (_stream, handle) = rodio::OutputStream::try_default()
            .map_err(|e| VoxError::playback(format!("No output device: {}", e)))?;
        let sink = rodio::Sink::try_new(&handle)
            .map_err(|e| VoxError::playback(format!("Failed to create sink: {}", e)))?;

        tracing::debug!(secs = audio.duration_secs(), "Playing audio");
        sink.append(rodio::buffer::SamplesBuffer::new(
            audio.channels,
            audio.sample_rate,
            audio.samples.clone(),
        ));
        sink.sleep_until_end();
        Ok(())
    }
}

#[cfg(not(feature = "playback"))]
impl AudioPlayer for RodioPlayer {
    fn play(&self, _audio: &AudioBuffer) -> Result<()> {
        Err(VoxError::playback(
            "Playback not enabled. Rebuild with --features playback, or pass --no-play",
        ))
    }
}

/// Mock player for testing
///
/// Records every buffer it is asked to play.
#[derive(Debug, Default)]
pub struct MockPlayer {
    fail_on_calls: Vec<usize>,
    always_fail: bool,
    calls: AtomicUsize,
    played: Mutex<Vec<AudioBuffer>>,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on the given 1-based call number
    pub fn with_failure_on_call(mut self, call: usize) -> Self {
        self.fail_on_calls.push(call);
        self
    }

    /// Fail on every call
    pub fn with_failure(mut self) -> Self {
        self.always_fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Buffers that played successfully, in order
    pub fn played(&self) -> Vec<AudioBuffer> {
        self.played
            .lock()
            .map(|played| played.clone())
            .unwrap_or_default()
    }
}

impl AudioPlayer for MockPlayer {
    fn play(&self, audio: &AudioBuffer) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.always_fail || self.fail_on_calls.contains(&call) {
            return Err(VoxError::playback(format!(
                "mock playback failure on call {}",
                call
            )));
        }
        if let Ok(mut played) = self.played.lock() {
            played.push(audio.clone());
        }
        Ok(())
    }
}
