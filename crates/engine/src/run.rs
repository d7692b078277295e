use thiserror::Error;

use tracing::{debug, info, warn};

use crate::events::{EventBus, GameEvent};
use crate::ledger::Outcome;

#[derive(Debug, Error)]
pub enum SceneLoadError {
    #[error("scene '{0}' is not registered with the host loader")]
    UnknownScene(String),
    #[error("scene loader rejected '{scene}': {reason}")]
    Rejected { scene: String, reason: String },
}

/// Host collaborator that performs the actual scene change at the end of a
/// run. The engine only ever asks for one of the two fixed ending scenes,
/// exactly once.
pub trait SceneDirector {
    fn load_scene(&mut self, scene_name: &str) -> Result<(), SceneLoadError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Playing,
    Ended(Outcome),
}

/// Read-only view of the controller flags, the single source of truth every
/// collaborator consults for idempotency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStateSnapshot {
    pub time_remaining: f32,
    pub time_expired: bool,
    pub decision_pause_active: bool,
    pub is_evaluating_outcome: bool,
    pub has_ended: bool,
}

/// What the context must do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunTick {
    /// The countdown just hit zero: force a loss.
    TimeExpired,
    /// The end-screen delay elapsed: request the scene transition now.
    SceneDue,
}

/// Countdown, decision-pause flag, and the exactly-once end-of-run
/// transition. `Playing -> Ended(..)` is the only phase change and nothing
/// leaves `Ended`.
#[derive(Debug)]
pub struct RunController {
    phase: RunPhase,
    time_remaining: f32,
    time_expired: bool,
    decision_pause_active: bool,
    evaluating: bool,
    end_screen_seconds: f32,
    end_screen_elapsed: f32,
    scene_requested: bool,
}

impl RunController {
    pub fn new(time_limit_seconds: f32, end_screen_seconds: f32) -> Self {
        Self {
            phase: RunPhase::Playing,
            time_remaining: time_limit_seconds,
            time_expired: false,
            decision_pause_active: false,
            evaluating: false,
            end_screen_seconds,
            end_screen_elapsed: 0.0,
            scene_requested: false,
        }
    }

    /// Advances the countdown (or, after the run ended, the end-screen delay)
    /// by one tick. The decision pause freezes the countdown only; it never
    /// blocks bookkeeping elsewhere.
    pub(crate) fn tick(&mut self, dt_seconds: f32, bus: &mut EventBus) -> Option<RunTick> {
        match self.phase {
            RunPhase::Playing => {
                if !self.decision_pause_active && !self.time_expired {
                    self.time_remaining = (self.time_remaining - dt_seconds).max(0.0);
                }
                bus.publish(&GameEvent::TimeUpdated {
                    remaining_seconds: self.time_remaining,
                });
                if !self.decision_pause_active && !self.time_expired && self.time_remaining <= 0.0 {
                    self.time_expired = true;
                    info!("time limit reached");
                    return Some(RunTick::TimeExpired);
                }
                None
            }
            RunPhase::Ended(_) => {
                if self.scene_requested {
                    return None;
                }
                self.end_screen_elapsed += dt_seconds;
                if self.end_screen_elapsed >= self.end_screen_seconds {
                    // One-shot: the request fires this tick and never again.
                    self.scene_requested = true;
                    Some(RunTick::SceneDue)
                } else {
                    None
                }
            }
        }
    }

    /// Gate for outcome evaluation. Returns false (and logs) when the run is
    /// already concluded or an evaluation is in flight; double-triggering is
    /// an expected race, never an error.
    pub(crate) fn begin_evaluation(&mut self) -> bool {
        if self.has_ended() || self.evaluating {
            warn!(
                has_ended = self.has_ended(),
                evaluating = self.evaluating,
                "outcome evaluation ignored"
            );
            return false;
        }
        self.evaluating = true;
        true
    }

    pub(crate) fn finish_evaluation(&mut self) {
        self.evaluating = false;
    }

    /// Concludes the run. Returns false if it had already concluded; the
    /// first conclusion wins and publishes `RunConcluded` exactly once.
    pub(crate) fn conclude(&mut self, outcome: Outcome, bus: &mut EventBus) -> bool {
        if self.has_ended() {
            return false;
        }
        self.phase = RunPhase::Ended(outcome);
        self.end_screen_elapsed = 0.0;
        info!(won = outcome.won(), "run concluded");
        bus.publish(&GameEvent::RunConcluded {
            won: outcome.won(),
        });
        true
    }

    /// Publishes the current countdown value, used for the initial UI sync.
    pub(crate) fn publish_time(&self, bus: &mut EventBus) {
        bus.publish(&GameEvent::TimeUpdated {
            remaining_seconds: self.time_remaining,
        });
    }

    pub fn set_decision_active(&mut self, active: bool) {
        self.decision_pause_active = active;
        debug!(active, "decision pause toggled");
    }

    pub fn has_ended(&self) -> bool {
        matches!(self.phase, RunPhase::Ended(_))
    }

    pub fn ended_outcome(&self) -> Option<Outcome> {
        match self.phase {
            RunPhase::Playing => None,
            RunPhase::Ended(outcome) => Some(outcome),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn time_remaining(&self) -> f32 {
        self.time_remaining
    }

    pub fn snapshot(&self) -> RunStateSnapshot {
        RunStateSnapshot {
            time_remaining: self.time_remaining,
            time_expired: self.time_expired,
            decision_pause_active: self.decision_pause_active,
            is_evaluating_outcome: self.evaluating,
            has_ended: self.has_ended(),
        }
    }
}
