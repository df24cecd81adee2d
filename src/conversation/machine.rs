//! The turn-taking run loop.
//!
//! Listen and speak failures are absorbed here: a failed listen substitutes
//! the fallback message, a failed speak still counts toward the target. Only
//! an invalid [`CycleConfig`] is fatal, and that is caught before a machine
//! exists.

use crate::conversation::state::{
    CycleConfig, Phase, PhaseOutcome, Recovered, TurnState, next_phase, reply_for,
};
use crate::defaults;
use crate::pipeline::{AudioInRequest, Pipeline};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub cycles_completed: u32,
    pub target_cycles: u32,
    /// Listens that fell back to the fixed message.
    pub degraded_listens: u32,
    /// Speaks whose synthesis or playback failed.
    pub failed_speaks: u32,
    pub cancelled: bool,
    pub last_recognized_text: String,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.cycles_completed == self.target_cycles
    }
}

pub struct TurnMachine {
    pipeline: Arc<Pipeline>,
    config: CycleConfig,
    state: TurnState,
    history: Vec<Phase>,
    listens: u32,
    degraded_listens: u32,
    failed_speaks: u32,
    cancelled: bool,
}

impl TurnMachine {
    pub fn new(pipeline: Arc<Pipeline>, config: CycleConfig) -> Self {
        let initial = config.opening().initial_phase();
        Self {
            pipeline,
            config,
            state: TurnState::new(initial),
            history: vec![initial],
            listens: 0,
            degraded_listens: 0,
            failed_speaks: 0,
            cancelled: false,
        }
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Every phase entered so far, starting with the initial one.
    pub fn phase_history(&self) -> &[Phase] {
        &self.history
    }

    /// Drive the machine until it stops.
    ///
    /// `cancel` is checked between phases and interrupts the wait between
    /// turns; a capture or playback already in flight runs to completion.
    pub async fn run(&mut self, cancel: &CancellationToken) -> RunReport {
        let budget = self.config.transition_budget();
        let mut dispatched = 0u32;
        info!(
            target_cycles = self.config.target_cycles(),
            opening = %self.state.phase,
            "Conversation started"
        );

        while !self.state.phase.is_terminal() {
            if cancel.is_cancelled() {
                info!(phase = %self.state.phase, "Cancellation requested");
                self.cancelled = true;
                self.enter(Phase::Stopped);
                break;
            }
            if dispatched >= budget {
                error!(
                    budget,
                    phase = %self.state.phase,
                    "Transition budget exhausted, forcing stop"
                );
                self.enter(Phase::Stopped);
                break;
            }
            dispatched += 1;

            let mut next = match self.state.phase {
                Phase::Listening => self.handle_listening().await,
                Phase::Speaking => self.handle_speaking().await,
                Phase::Waiting => self.handle_waiting(cancel).await,
                Phase::Stopped => Phase::Stopped,
            };
            if cancel.is_cancelled() && next != Phase::Stopped {
                info!(phase = %self.state.phase, "Cancellation requested");
                self.cancelled = true;
                next = Phase::Stopped;
            }
            self.enter(next);
        }

        info!(
            cycles_completed = self.state.cycles_completed,
            target_cycles = self.config.target_cycles(),
            degraded_listens = self.degraded_listens,
            failed_speaks = self.failed_speaks,
            cancelled = self.cancelled,
            "Conversation stopped"
        );
        self.report()
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            cycles_completed: self.state.cycles_completed,
            target_cycles: self.config.target_cycles(),
            degraded_listens: self.degraded_listens,
            failed_speaks: self.failed_speaks,
            cancelled: self.cancelled,
            last_recognized_text: self.state.last_recognized_text.clone(),
        }
    }

    fn enter(&mut self, next: Phase) {
        debug!(from = %self.state.phase, to = %next, "State transition");
        self.state.phase = next;
        self.history.push(next);
    }

    async fn listen(&self) -> PhaseOutcome<String> {
        let request = AudioInRequest {
            duration: self.config.record_duration(),
            model_hint: self.config.model_hint().map(str::to_string),
            language_hint: self.config.language_hint().map(str::to_string),
            ..AudioInRequest::default()
        };
        self.pipeline
            .audio_in(&request)
            .await
            .map(|output| output.text)
            .map_err(|e| Recovered::new(defaults::FALLBACK_MESSAGE.to_string(), e))
    }

    async fn handle_listening(&mut self) -> Phase {
        self.listens += 1;
        self.state.last_recognized_text = match self.listen().await {
            Ok(text) => {
                info!(text = %text, "Heard");
                text
            }
            Err(Recovered { fallback, cause }) => {
                warn!(code = %cause.code(), error = %cause, "Listen failed, using fallback");
                self.degraded_listens += 1;
                fallback
            }
        };
        next_phase(Phase::Listening, self.state.cycles_completed, self.config.target_cycles())
    }

    async fn speak(&self) -> PhaseOutcome<()> {
        let text = if self.listens == 0 {
            self.config.opening_line().to_string()
        } else {
            reply_for(&self.state.last_recognized_text)
        };
        info!(text = %text, "Speaking");
        self.pipeline
            .speak(&text)
            .await
            .map_err(|e| Recovered::new((), e))
    }

    async fn handle_speaking(&mut self) -> Phase {
        if let Err(Recovered { cause, .. }) = self.speak().await {
            error!(code = %cause.code(), error = %cause, "Speak failed");
            self.failed_speaks += 1;
        }
        self.state.cycles_completed += 1;
        next_phase(Phase::Speaking, self.state.cycles_completed, self.config.target_cycles())
    }

    async fn handle_waiting(&mut self, cancel: &CancellationToken) -> Phase {
        let wait = self.config.wait_between_turns();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                next_phase(Phase::Waiting, self.state.cycles_completed, self.config.target_cycles())
            }
            _ = cancel.cancelled() => {
                info!("Cancelled while waiting");
                self.cancelled = true;
                Phase::Stopped
            }
        }
    }
}
