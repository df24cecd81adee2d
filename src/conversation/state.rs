//! Turn-taking states, cycle configuration and the transition function.

use crate::defaults;
use crate::error::{Result, VoxError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Phase of a conversation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Capture and transcribe the user.
    Listening,
    /// Synthesize and play the reply.
    Speaking,
    /// Pause between turns.
    Waiting,
    /// Terminal.
    Stopped,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Listening => "listening",
            Phase::Speaking => "speaking",
            Phase::Waiting => "waiting",
            Phase::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Stopped)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who talks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opening {
    #[default]
    Listening,
    Speaking,
}

impl Opening {
    pub fn initial_phase(&self) -> Phase {
        match self {
            Opening::Listening => Phase::Listening,
            Opening::Speaking => Phase::Speaking,
        }
    }
}

/// Validated settings for one conversation run.
///
/// `target_cycles` is always even and positive; one listen plus one speak
/// counts as two.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    target_cycles: u32,
    record_duration: Duration,
    wait_between_turns: Duration,
    model_hint: Option<String>,
    language_hint: Option<String>,
    opening: Opening,
    opening_line: String,
}

impl CycleConfig {
    /// Validate `cycles`, rounding odd counts up to the next even number.
    ///
    /// Zero, negative and counts above [`defaults::MAX_CYCLES`] are rejected.
    pub fn new(cycles: i64) -> Result<Self> {
        if cycles <= 0 {
            return Err(VoxError::CycleConfiguration {
                message: format!("number of cycles must be greater than zero, got {}", cycles),
            });
        }
        if cycles > defaults::MAX_CYCLES {
            return Err(VoxError::CycleConfiguration {
                message: format!(
                    "number of cycles must be at most {}, got {}",
                    defaults::MAX_CYCLES,
                    cycles
                ),
            });
        }

        let target = if cycles % 2 == 0 {
            cycles
        } else {
            warn!(
                requested = cycles,
                adjusted = cycles + 1,
                "Cycle count must be even, rounding up"
            );
            cycles + 1
        };
        let target_cycles = u32::try_from(target).map_err(|_| VoxError::CycleConfiguration {
            message: format!("cycle count {} out of range", target),
        })?;

        Ok(Self {
            target_cycles,
            record_duration: Duration::from_secs(defaults::RECORD_SECS),
            wait_between_turns: Duration::from_millis(defaults::WAIT_BETWEEN_TURNS_MS),
            model_hint: None,
            language_hint: None,
            opening: Opening::Listening,
            opening_line: defaults::OPENING_LINE.to_string(),
        })
    }

    pub fn with_record_duration(mut self, duration: Duration) -> Self {
        self.record_duration = duration;
        self
    }

    pub fn with_wait_between_turns(mut self, wait: Duration) -> Self {
        self.wait_between_turns = wait;
        self
    }

    pub fn with_model_hint(mut self, model: Option<String>) -> Self {
        self.model_hint = model;
        self
    }

    pub fn with_language_hint(mut self, language: Option<String>) -> Self {
        self.language_hint = language;
        self
    }

    pub fn with_opening(mut self, opening: Opening) -> Self {
        self.opening = opening;
        self
    }

    pub fn with_opening_line(mut self, line: impl Into<String>) -> Self {
        self.opening_line = line.into();
        self
    }

    pub fn target_cycles(&self) -> u32 {
        self.target_cycles
    }

    pub fn record_duration(&self) -> Duration {
        self.record_duration
    }

    pub fn wait_between_turns(&self) -> Duration {
        self.wait_between_turns
    }

    pub fn model_hint(&self) -> Option<&str> {
        self.model_hint.as_deref()
    }

    pub fn language_hint(&self) -> Option<&str> {
        self.language_hint.as_deref()
    }

    pub fn opening(&self) -> Opening {
        self.opening
    }

    pub fn opening_line(&self) -> &str {
        &self.opening_line
    }

    /// Upper bound on handler dispatches for one run.
    pub fn transition_budget(&self) -> u32 {
        self.target_cycles.saturating_mul(3).saturating_add(2)
    }
}

/// Mutable state of one run. Owned by a single machine.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnState {
    pub phase: Phase,
    pub cycles_completed: u32,
    /// Written once per listen, read by the next speak.
    pub last_recognized_text: String,
}

impl TurnState {
    pub fn new(initial: Phase) -> Self {
        Self {
            phase: initial,
            cycles_completed: 0,
            last_recognized_text: String::new(),
        }
    }
}

/// A phase failure that was absorbed: `fallback` stands in for the result
/// and `cause` is what went wrong.
#[derive(Debug)]
pub struct Recovered<F> {
    pub fallback: F,
    pub cause: VoxError,
}

impl<F> Recovered<F> {
    pub fn new(fallback: F, cause: VoxError) -> Self {
        Self { fallback, cause }
    }
}

/// Outcome of one phase handler.
pub type PhaseOutcome<T> = std::result::Result<T, Recovered<T>>;

/// Reply spoken for a recognized utterance.
pub fn reply_for(recognized: &str) -> String {
    format!("{}{}", defaults::REPLY_PREFIX, recognized)
}

/// The phase that follows `phase`.
///
/// `cycles_completed` must already include the speak phase that just ended.
pub fn next_phase(phase: Phase, cycles_completed: u32, target_cycles: u32) -> Phase {
    match phase {
        Phase::Listening => Phase::Speaking,
        Phase::Speaking if cycles_completed < target_cycles => Phase::Waiting,
        Phase::Speaking => Phase::Stopped,
        Phase::Waiting => Phase::Listening,
        Phase::Stopped => Phase::Stopped,
    }
}
