use crate::audio::buffer::AudioBuffer;
use crate::defaults;
use crate::error::{Result, VoxError};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Trait for text-to-speech synthesis.
///
/// This trait allows swapping implementations (Kokoro server, offline tone, mock).
pub trait Synthesizer: Send + Sync {
    /// Render `text` as audio. `voice` overrides the engine's default voice.
    fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<AudioBuffer>;

    /// Engine name for logs
    fn name(&self) -> &str;
}

impl<T: Synthesizer> Synthesizer for Arc<T> {
    fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<AudioBuffer> {
        (**self).synthesize(text, voice)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Offline placeholder engine: a two-tone 440/880 Hz signal of fixed length.
///
/// Useful for exercising the loop without a speech server.
#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    duration_secs: f32,
    sample_rate: u32,
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new(defaults::TONE_SECS)
    }
}

impl ToneSynthesizer {
    pub fn new(duration_secs: f32) -> Self {
        Self {
            duration_secs: duration_secs.max(0.1),
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl Synthesizer for ToneSynthesizer {
    fn synthesize(&self, text: &str, _voice: Option<&str>) -> Result<AudioBuffer> {
        if text.trim().is_empty() {
            return Err(VoxError::synthesis("text is empty"));
        }

        let len = (self.duration_secs * self.sample_rate as f32) as usize;
        let rate = self.sample_rate as f32;
        let raw: Vec<f32> = (0..len)
            .map(|i| {
                let t = i as f32 / rate;
                0.6 * (2.0 * PI * 440.0 * t).sin() + 0.4 * (2.0 * PI * 880.0 * t).sin()
            })
            .collect();

        let peak = raw.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let scale = if peak > 0.0 { 1.0 / peak } else { 0.0 };
        let samples = raw
            .iter()
            .map(|s| (s * scale * i16::MAX as f32) as i16)
            .collect();

        Ok(AudioBuffer::mono(samples, self.sample_rate))
    }

    fn name(&self) -> &str {
        "tone"
    }
}

/// Mock synthesizer for testing
///
/// Produces 100ms of silence per call and remembers what it was asked to say.
#[derive(Debug, Default)]
pub struct MockSynthesizer {
    fail_on_calls: Vec<usize>,
    always_fail: bool,
    calls: AtomicUsize,
    spoken: Mutex<Vec<String>>,
}

impl MockSynthesizer {
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

    /// Every text passed to `synthesize`, including failed calls
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Synthesizer for MockSynthesizer {
    fn synthesize(&self, text: &str, _voice: Option<&str>) -> Result<AudioBuffer> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(text.to_string());
        }
        if self.always_fail || self.fail_on_calls.contains(&call) {
            return Err(VoxError::synthesis(format!(
                "mock synthesis failure on call {}",
                call
            )));
        }
        Ok(AudioBuffer::mono(vec![0i16; 1600], defaults::SAMPLE_RATE))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_is_normalized_and_sized() {
        let buffer = ToneSynthesizer::default().synthesize("hello", None).unwrap();
        assert_eq!(buffer.sample_rate, 16000);
        assert_eq!(buffer.channels, 1);
        assert_eq!(buffer.samples.len(), 32000);
        let peak = buffer.samples.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!(peak > 32000, "peak {} should be near full scale", peak);
    }

    #[test]
    fn tone_rejects_blank_text() {
        let err = ToneSynthesizer::default().synthesize("  ", None).unwrap_err();
        assert_eq!(err.code().as_str(), "SYNTHESIS_FAILED");
    }

    #[test]
    fn tone_duration_has_floor() {
        let buffer = ToneSynthesizer::new(0.0).synthesize("x", None).unwrap();
        assert_eq!(buffer.samples.len(), 1600);
    }

    #[test]
    fn mock_records_spoken_text() {
        let synth = MockSynthesizer::new().with_failure_on_call(2);
        assert!(synth.synthesize("first", None).is_ok());
        assert!(synth.synthesize("second", None).is_err());
        assert_eq!(synth.spoken(), vec!["first", "second"]);
        assert_eq!(synth.calls(), 2);
    }
}
