use crate::audio::buffer::AudioBuffer;
use crate::audio::wav;
use crate::defaults;
use crate::error::{Result, VoxError};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Trait for capturing a fixed-length recording.
///
/// This trait allows swapping implementations (real microphone vs mock).
/// Implementations block for the whole recording; callers offload them to a
/// worker thread.
pub trait AudioRecorder: Send + Sync {
    /// Record for `duration` and return the path of the WAV file written.
    fn record(&self, duration: Duration) -> Result<PathBuf>;
}

impl<T: AudioRecorder> AudioRecorder for Arc<T> {
    fn record(&self, duration: Duration) -> Result<PathBuf> {
        (**self).record(duration)
    }
}

/// Mock recorder for testing
///
/// Writes a short WAV into its directory on every successful call so the
/// rest of the pipeline sees a real file.
#[derive(Debug)]
pub struct MockRecorder {
    dir: PathBuf,
    samples: Vec<i16>,
    fail_on_calls: Vec<usize>,
    always_fail: bool,
    calls: AtomicUsize,
}

impl MockRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            samples: vec![0i16; 1600],
            fail_on_calls: Vec::new(),
            always_fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Configure the samples written to each recording
    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.samples = samples;
        self
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

    /// Number of `record` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AudioRecorder for MockRecorder {
    fn record(&self, _duration: Duration) -> Result<PathBuf> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.always_fail || self.fail_on_calls.contains(&call) {
            return Err(VoxError::capture(format!("mock capture failure on call {}", call)));
        }

        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("mock_recording_{}.wav", call));
        wav::write_wav(
            &path,
            &AudioBuffer::mono(self.samples.clone(), defaults::SAMPLE_RATE),
        )
        .map_err(|e| VoxError::capture(e.to_string()))?;
        Ok(path)
    }
}
