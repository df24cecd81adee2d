//! WAV encoding and decoding.
//!
//! Decoding supports arbitrary sample rates, channel counts and integer or
//! float sample formats; [`read_mono_16k`] normalises everything to the
//! 16kHz mono i16 stream Whisper expects.

use crate::audio::buffer::AudioBuffer;
use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, VoxError};
use std::io::{Read, Seek, Write};
use std::path::Path;

/// Header facts about a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub frames: u32,
}

impl WavInfo {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames as f32 / self.sample_rate as f32
        }
    }
}

fn read_failed(path: &Path, message: impl Into<String>) -> VoxError {
    VoxError::ReadFailed {
        path: path.display().to_string(),
        message: message.into(),
    }
}

fn save_failed(path: &Path, message: impl Into<String>) -> VoxError {
    VoxError::SaveFailed {
        path: path.display().to_string(),
        message: message.into(),
    }
}

/// Read only the header of a WAV file.
pub fn inspect(path: &Path) -> Result<WavInfo> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| read_failed(path, format!("Failed to parse WAV file: {}", e)))?;
    let spec = reader.spec();
    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        frames: reader.duration(),
    })
}

/// Decode a WAV file into an interleaved buffer at its native format.
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let file = std::fs::File::open(path).map_err(|e| read_failed(path, e.to_string()))?;
    decode(std::io::BufReader::new(file)).map_err(|message| read_failed(path, message))
}

/// Decode a WAV file and convert it to 16kHz mono.
pub fn read_mono_16k(path: &Path) -> Result<Vec<i16>> {
    let buffer = read_wav(path)?;
    let mono = downmix(&buffer.samples, buffer.channels);
    Ok(resample(&mono, buffer.sample_rate, SAMPLE_RATE))
}

/// Decode WAV data from any reader.
pub fn decode<R: Read>(reader: R) -> std::result::Result<AudioBuffer, String> {
    let mut wav_reader =
        hound::WavReader::new(reader).map_err(|e| format!("Failed to parse WAV file: {}", e))?;
    let spec = wav_reader.spec();
    if spec.channels == 0 {
        return Err("WAV file declares zero channels".to_string());
    }

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| format!("Failed to read WAV samples: {}", e))?,
        (hound::SampleFormat::Int, bits) => {
            let shift = i32::from(bits) - 16;
            wav_reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|v| {
                        if shift >= 0 {
                            (v >> shift) as i16
                        } else {
                            (v << -shift) as i16
                        }
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| format!("Failed to read WAV samples: {}", e))?
        }
        (hound::SampleFormat::Float, _) => wav_reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| format!("Failed to read WAV samples: {}", e))?,
    };

    Ok(AudioBuffer::new(samples, spec.sample_rate, spec.channels))
}

/// Encode a buffer as 16-bit PCM WAV into any writer.
pub fn encode<W: Write + Seek>(writer: W, buffer: &AudioBuffer) -> std::result::Result<(), String> {
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut wav_writer =
        hound::WavWriter::new(writer, spec).map_err(|e| format!("Failed to start WAV: {}", e))?;
    for &sample in &buffer.samples {
        wav_writer
            .write_sample(sample)
            .map_err(|e| format!("Failed to write sample: {}", e))?;
    }
    wav_writer
        .finalize()
        .map_err(|e| format!("Failed to finalize WAV: {}", e))
}

/// Write a buffer to a WAV file, replacing any existing file.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<()> {
    if buffer.channels == 0 || buffer.sample_rate == 0 {
        return Err(save_failed(
            path,
            format!(
                "unsupported format: {} channels at {} Hz",
                buffer.channels, buffer.sample_rate
            ),
        ));
    }
    let file = std::fs::File::create(path).map_err(|e| save_failed(path, e.to_string()))?;
    encode(std::io::BufWriter::new(file), buffer).map_err(|message| save_failed(path, message))
}

/// Average interleaved channels into one.
pub fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
