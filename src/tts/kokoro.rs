//! Kokoro speech server client.
//!
//! Talks to the OpenAI-compatible `/v1/audio/speech` endpoint and asks for raw
//! 24kHz mono PCM, so no container decoding is needed.

use crate::audio::buffer::AudioBuffer;
use crate::defaults;
use crate::error::{Result, VoxError};
use crate::tts::synthesizer::Synthesizer;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct KokoroConfig {
    pub url: String,
    pub voice: String,
    pub speed: f32,
    pub timeout: Duration,
}

impl Default for KokoroConfig {
    fn default() -> Self {
        Self {
            url: defaults::KOKORO_URL.to_string(),
            voice: defaults::KOKORO_VOICE.to_string(),
            speed: 1.0,
            timeout: Duration::from_secs(60),
        }
    }
}

impl KokoroConfig {
    fn endpoint(&self) -> String {
        format!("{}/v1/audio/speech", self.url.trim_end_matches('/'))
    }
}

/// Little-endian i16 PCM bytes to samples; a trailing odd byte is dropped.
pub fn pcm_bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Blocking Kokoro client.
///
/// The HTTP client is built per request: a blocking reqwest client must be
/// created and dropped off the async runtime, and requests already run on a
/// blocking worker.
#[cfg(feature = "kokoro")]
#[derive(Debug)]
pub struct KokoroSynthesizer {
    config: KokoroConfig,
}

#[cfg(feature = "kokoro")]
impl KokoroSynthesizer {
    pub fn new(config: KokoroConfig) -> Result<Self> {
        Ok(Self { config })
    }

    fn client(&self, timeout: Duration) -> Result<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoxError::synthesis(format!("Failed to build HTTP client: {}", e)))
    }

    /// True if the server answers at all. Blocks; call off the async runtime.
    pub fn is_reachable(&self) -> bool {
        let Ok(client) = self.client(Duration::from_secs(2)) else {
            return false;
        };
        client
            .get(format!("{}/v1/audio/voices", self.config.url.trim_end_matches('/')))
            .send()
            .is_ok()
    }
}

#[cfg(feature = "kokoro")]
impl Synthesizer for KokoroSynthesizer {
    fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<AudioBuffer> {
        if text.trim().is_empty() {
            return Err(VoxError::synthesis("text is empty"));
        }

        let body = serde_json::json!({
            "input": text,
            "voice": voice.unwrap_or(&self.config.voice),
            "model": "kokoro",
            "response_format": "pcm",
            "stream": false,
            "speed": self.config.speed,
        });

        tracing::debug!(chars = text.len(), "POST to Kokoro");
        let resp = self
            .client(self.config.timeout)?
            .post(self.config.endpoint())
            .json(&body)
            .send()
            .map_err(|e| VoxError::synthesis(format!("Kokoro request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().unwrap_or_default();
            return Err(VoxError::synthesis(format!(
                "Kokoro error {}: {}",
                status, detail
            )));
        }

        let bytes = resp
            .bytes()
            .map_err(|e| VoxError::synthesis(format!("Failed to read Kokoro audio: {}", e)))?;
        let samples = pcm_bytes_to_i16(&bytes);
        if samples.is_empty() {
            return Err(VoxError::synthesis("Kokoro returned no audio"));
        }
        Ok(AudioBuffer::mono(samples, defaults::KOKORO_SAMPLE_RATE))
    }

    fn name(&self) -> &str {
        "kokoro"
    }
}

/// Kokoro placeholder (without the kokoro feature).
#[cfg(not(feature = "kokoro"))]
#[derive(Debug)]
pub struct KokoroSynthesizer {
    config: KokoroConfig,
}

#[cfg(not(feature = "kokoro"))]
impl KokoroSynthesizer {
    pub fn new(config: KokoroConfig) -> Result<Self> {
        Ok(Self { config })
    }

    pub fn is_reachable(&self) -> bool {
        false
    }
}

#[cfg(not(feature = "kokoro"))]
impl Synthesizer for KokoroSynthesizer {
    fn synthesize(&self, _text: &str, _voice: Option<&str>) -> Result<AudioBuffer> {
        Err(VoxError::synthesis(format!(
            "Kokoro support not enabled (server {}). Rebuild with --features kokoro",
            self.config.endpoint()
        )))
    }

    fn name(&self) -> &str {
        "kokoro"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_bytes_basic() {
        let bytes = [0x01, 0x00, 0xFF, 0x7F, 0x00, 0x80];
        assert_eq!(pcm_bytes_to_i16(&bytes), vec![1, i16::MAX, i16::MIN]);
    }

    #[test]
    fn pcm_bytes_drops_trailing_byte() {
        assert_eq!(pcm_bytes_to_i16(&[0x02, 0x00, 0x42]), vec![2]);
        assert!(pcm_bytes_to_i16(&[]).is_empty());
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let config = KokoroConfig {
            url: "http://localhost:8880/".to_string(),
            ..KokoroConfig::default()
        };
        assert_eq!(config.endpoint(), "http://localhost:8880/v1/audio/speech");
    }

    #[cfg(feature = "kokoro")]
    #[test]
    fn unreachable_server_is_synthesis_error() {
        let synth = KokoroSynthesizer::new(KokoroConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
            ..KokoroConfig::default()
        })
        .unwrap();
        let err = synth.synthesize("hello", None).unwrap_err();
        assert_eq!(err.code().as_str(), "SYNTHESIS_FAILED");
    }

    #[cfg(not(feature = "kokoro"))]
    #[test]
    fn stub_reports_missing_feature() {
        let synth = KokoroSynthesizer::new(KokoroConfig::default()).unwrap();
        assert!(!synth.is_reachable());
        let err = synth.synthesize("hello", None).unwrap_err();
        assert!(err.to_string().contains("--features kokoro"));
    }
}
