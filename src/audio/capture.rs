//! Microphone capture using CPAL (Cross-Platform Audio Library).
//!
//! # Feature Gate
//!
//! Real capture requires the `cpal-audio` feature. Without it,
//! [`CpalRecorder`] is a stub whose recordings always fail.

use crate::audio::recorder::AudioRecorder;
use crate::error::{Result, VoxError};
use crate::store::PathStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "cpal-audio")]
use crate::audio::buffer::AudioBuffer;
#[cfg(feature = "cpal-audio")]
use crate::defaults;
#[cfg(feature = "cpal-audio")]
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
#[cfg(feature = "cpal-audio")]
use std::sync::Mutex;
#[cfg(feature = "cpal-audio")]
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "cpal-audio")]
use tracing::{debug, info, warn};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// CPAL probing makes ALSA/JACK/PipeWire print harmless but alarming noise.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
#[cfg(feature = "cpal-audio")]
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Quiet JACK/ALSA/PipeWire before any audio backend is probed.
///
/// # Safety
/// Modifies environment variables; call at startup before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device names for PipeWire/PulseAudio desktops.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns that are never useful for voice input.
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

#[cfg_attr(not(feature = "cpal-audio"), allow(dead_code))]
fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

#[cfg_attr(not(feature = "cpal-audio"), allow(dead_code))]
fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List usable input devices, marking preferred ones with "\[recommended\]".
#[cfg(feature = "cpal-audio")]
pub fn list_devices() -> Result<Vec<String>> {
    let devices = with_suppressed_stderr(|| cpal::default_host().input_devices())
        .map_err(|e| VoxError::capture(format!("Failed to enumerate input devices: {}", e)))?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }
    Ok(device_names)
}

#[cfg(not(feature = "cpal-audio"))]
pub fn list_devices() -> Result<Vec<String>> {
    Err(VoxError::capture(
        "Audio capture not enabled. Rebuild with --features cpal-audio",
    ))
}

#[cfg(feature = "cpal-audio")]
fn find_device(device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let devices = host
                .input_devices()
                .map_err(|e| VoxError::capture(format!("Failed to enumerate devices: {}", e)))?;
            for dev in devices {
                if let Ok(dev_name) = dev.name()
                    && dev_name == name
                {
                    return Ok(dev);
                }
            }
            return Err(VoxError::AudioDeviceNotFound {
                device: name.to_string(),
            });
        }

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| VoxError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Records fixed-length clips from a microphone into the store's input
/// directory as 16kHz mono WAV.
#[cfg(feature = "cpal-audio")]
#[derive(Debug)]
pub struct CpalRecorder {
    device_name: Option<String>,
    store: Arc<PathStore>,
    sample_rate: u32,
}

#[cfg(not(feature = "cpal-audio"))]
#[derive(Debug)]
pub struct CpalRecorder {
    device_name: Option<String>,
}

/// Shared state written by the CPAL callback.
#[cfg(feature = "cpal-audio")]
#[derive(Clone, Default)]
struct CaptureSink {
    buffer: Arc<Mutex<Vec<i16>>>,
    callbacks: Arc<AtomicU64>,
}

#[cfg(feature = "cpal-audio")]
impl CaptureSink {
    fn push(&self, samples: &[i16]) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut buf) = self.buffer.lock() {
            buf.extend_from_slice(samples);
        }
    }

    fn callbacks(&self) -> u64 {
        self.callbacks.load(Ordering::Relaxed)
    }

    fn take(&self) -> Vec<i16> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }
}

#[cfg(feature = "cpal-audio")]
impl CpalRecorder {
    /// Record from `device_name`, or the best default input (PipeWire/Pulse
    /// first). The device is opened per recording.
    pub fn new(device_name: Option<&str>, store: Arc<PathStore>) -> Result<Self> {
        Ok(Self {
            device_name: device_name.map(str::to_string),
            store,
            sample_rate: defaults::SAMPLE_RATE,
        })
    }

    fn open_device(&self) -> Result<cpal::Device> {
        let device = find_device(self.device_name.as_deref())?;
        if let Ok(name) = device.name() {
            info!(device = %name, "Using input device");
        }
        Ok(device)
    }

    /// Try i16 then f32 at 16kHz mono, then the device's native format.
    fn build_stream(&self, device: &cpal::Device, sink: &CaptureSink) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let i16_sink = sink.clone();
        if let Ok(stream) = device.build_input_stream(
            &preferred_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| i16_sink.push(data),
            |err| warn!("Audio stream error: {}", err),
            None,
        ) {
            return Ok(stream);
        }

        let f32_sink = sink.clone();
        if let Ok(stream) = device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                f32_sink.push(&converted);
            },
            |err| warn!("Audio stream error: {}", err),
            None,
        ) {
            return Ok(stream);
        }

        self.build_stream_native(device, sink)
    }

    /// Capture at the device's native rate/channels and convert in software.
    fn build_stream_native(&self, device: &cpal::Device, sink: &CaptureSink) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config = device.default_input_config().map_err(|e| {
            VoxError::capture(format!("Failed to query default input config: {}", e))
        })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels();
        let target_rate = self.sample_rate;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        debug!(
            channels = native_channels,
            rate = native_rate,
            format = ?default_config.sample_format(),
            "Using native audio format, converting in software"
        );

        let sink = sink.clone();
        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        sink.push(&to_mono(data, native_channels, native_rate, target_rate));
                    },
                    |err| warn!("Audio stream error: {}", err),
                    None,
                )
                .map_err(|e| VoxError::capture(format!("Failed to build native i16 stream: {}", e))),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let i16_data: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                        sink.push(&to_mono(&i16_data, native_channels, native_rate, target_rate));
                    },
                    |err| warn!("Audio stream error: {}", err),
                    None,
                )
                .map_err(|e| VoxError::capture(format!("Failed to build native f32 stream: {}", e))),
            fmt => Err(VoxError::capture(format!(
                "Unsupported native sample format: {:?}. Try another device.",
                fmt
            ))),
        }
    }

    fn capture(&self, duration: Duration) -> Result<Vec<i16>> {
        let device = self.open_device()?;
        let sink = CaptureSink::default();
        let stream = self.build_stream(&device, &sink)?;
        stream
            .play()
            .map_err(|e| VoxError::capture(format!("Failed to start audio stream: {}", e)))?;

        // Some PipeWire-ALSA setups accept the preferred config but never
        // fire the callback; switch to the native format if that happens.
        let probe = Duration::from_millis(200).min(duration);
        std::thread::sleep(probe);
        let (stream, elapsed) = if sink.callbacks() == 0 {
            drop(stream);
            sink.take();
            let native = self.build_stream_native(&device, &sink)?;
            native.play().map_err(|e| {
                VoxError::capture(format!("Failed to start native audio stream: {}", e))
            })?;
            (native, Duration::ZERO)
        } else {
            (stream, probe)
        };

        std::thread::sleep(duration.saturating_sub(elapsed));
        stream
            .pause()
            .map_err(|e| VoxError::capture(format!("Failed to stop audio stream: {}", e)))?;
        drop(stream);
        Ok(sink.take())
    }
}

#[cfg(feature = "cpal-audio")]
impl AudioRecorder for CpalRecorder {
    fn record(&self, duration: Duration) -> Result<PathBuf> {
        if duration.is_zero() {
            return Err(VoxError::capture("recording duration must be positive"));
        }
        debug!(secs = duration.as_secs_f32(), "Opening capture stream");
        let samples = self.capture(duration)?;
        if samples.is_empty() {
            return Err(VoxError::capture("no audio was captured"));
        }

        let path = self.store.recording_path();
        let buffer = AudioBuffer::mono(samples, self.sample_rate);
        self.store
            .save_audio(&buffer, &path)
            .map_err(|e| VoxError::capture(format!("Failed to store recording: {}", e)))
    }
}

#[cfg(not(feature = "cpal-audio"))]
impl CpalRecorder {
    pub fn new(device_name: Option<&str>, _store: Arc<PathStore>) -> Result<Self> {
        Ok(Self {
            device_name: device_name.map(str::to_string),
        })
    }
}

#[cfg(not(feature = "cpal-audio"))]
impl AudioRecorder for CpalRecorder {
    fn record(&self, _duration: Duration) -> Result<PathBuf> {
        Err(VoxError::capture(format!(
            "Audio capture not enabled (device {}). Rebuild with --features cpal-audio, \
             or pass an existing recording with --file",
            self.device_name.as_deref().unwrap_or("default")
        )))
    }
}

#[cfg(feature = "cpal-audio")]
fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Mix multi-channel audio to mono and resample to the target rate.
#[cfg_attr(not(feature = "cpal-audio"), allow(dead_code))]
fn to_mono(samples: &[i16], channels: u16, source_rate: u32, target_rate: u32) -> Vec<i16> {
    let mono = crate::audio::wav::downmix(samples, channels);
    crate::audio::wav::resample(&mono, source_rate, target_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_filter_device() {
        assert!(should_filter_device("surround51"));
        assert!(should_filter_device("front:CARD=PCH"));
        assert!(should_filter_device("HDMI Output"));
        assert!(!should_filter_device("pipewire"));
        assert!(!should_filter_device("Built-in Audio"));
    }

    #[test]
    fn test_is_preferred_device() {
        assert!(is_preferred_device("PipeWire"));
        assert!(is_preferred_device("pulse"));
        assert!(!is_preferred_device("hw:0,0"));
        assert!(!is_preferred_device("default"));
    }

    #[test]
    fn test_to_mono_downmixes_and_resamples() {
        let stereo_48k: Vec<i16> = (0..4800).flat_map(|_| [100i16, 300]).collect();
        let mono = to_mono(&stereo_48k, 2, 48000, 16000);
        assert_eq!(mono.len(), 1600);
        assert!(mono.iter().all(|&s| s == 200));
    }

    #[cfg(feature = "cpal-audio")]
    #[test]
    fn test_record_with_invalid_device_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(PathStore::new(crate::store::StoreConfig::rooted_at(dir.path())));
        let recorder = CpalRecorder::new(Some("NonExistentDevice12345"), store).unwrap();
        match recorder.record(Duration::from_millis(100)) {
            Err(VoxError::AudioDeviceNotFound { device }) => {
                assert_eq!(device, "NonExistentDevice12345");
            }
            Err(VoxError::AudioCapture { .. }) => {} // no audio backend at all
            Err(other) => panic!("Expected device error, got {}", other),
            Ok(_) => panic!("Expected device error"),
        }
    }

    #[cfg(not(feature = "cpal-audio"))]
    #[test]
    fn test_stub_recorder_reports_missing_feature() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(PathStore::new(crate::store::StoreConfig::rooted_at(dir.path())));
        let recorder = CpalRecorder::new(None, store).unwrap();
        let err = recorder.record(Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.code().as_str(), "RECORD_FAILED");
    }

    #[cfg(feature = "cpal-audio")]
    #[test]
    #[ignore] // Requires audio hardware
    fn test_record_one_second() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(PathStore::new(crate::store::StoreConfig::rooted_at(dir.path())));
        let recorder = CpalRecorder::new(None, store).expect("no input device");
        let path = recorder.record(Duration::from_secs(1)).unwrap();
        assert!(path.exists());
    }
}
