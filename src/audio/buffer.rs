//! In-memory audio and the two shapes an audio artifact can take.

use std::path::PathBuf;

/// Interleaved 16-bit PCM samples with their format.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn mono(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f32 / self.sample_rate as f32
        }
    }
}

/// Audio that is either already on disk or still in memory.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioAsset {
    File(PathBuf),
    Buffer(AudioBuffer),
}

impl From<AudioBuffer> for AudioAsset {
    fn from(buffer: AudioBuffer) -> Self {
        AudioAsset::Buffer(buffer)
    }
}

impl From<PathBuf> for AudioAsset {
    fn from(path: PathBuf) -> Self {
        AudioAsset::File(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_frames_and_duration() {
        let buffer = AudioBuffer::new(vec![0; 32000], 16000, 2);
        assert_eq!(buffer.frames(), 16000);
        assert!((buffer.duration_secs() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn degenerate_formats_have_zero_duration() {
        assert_eq!(AudioBuffer::new(vec![1, 2], 16000, 0).frames(), 0);
        assert_eq!(AudioBuffer::new(vec![1, 2], 0, 1).duration_secs(), 0.0);
        assert!(AudioBuffer::mono(Vec::new(), 16000).is_empty());
    }

    #[test]
    fn asset_conversions() {
        let asset: AudioAsset = AudioBuffer::mono(vec![1], 16000).into();
        assert!(matches!(asset, AudioAsset::Buffer(_)));
        let asset: AudioAsset = PathBuf::from("/tmp/a.wav").into();
        assert_eq!(asset, AudioAsset::File(PathBuf::from("/tmp/a.wav")));
    }
}
