//! Text-to-speech.

pub mod kokoro;
pub mod synthesizer;

pub use kokoro::{KokoroConfig, KokoroSynthesizer};
pub use synthesizer::{MockSynthesizer, Synthesizer, ToneSynthesizer};
