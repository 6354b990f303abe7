//! Tap-and-hold interrupt
//!
//! Arms with a 5 s auto-dismiss. Pressing starts a linear progress run toward
//! a fixed hold duration (3 s default); keeping the press down for the full
//! duration completes the ritual. Releasing early resets progress to zero and
//! re-arms the dismiss. There is no credit for partial holds: every attempt
//! must reach the duration uninterrupted.

use serde::{Deserialize, Serialize};

use crate::delivery::ReactionLatch;
use crate::types::{DeliveryMode, InterventionInstance, ReactionAction, TelemetryEvent};

/// Auto-dismiss delay while armed
const ARM_DISMISS_MS: i64 = 5_000;

/// Default uninterrupted hold required for completion
pub const DEFAULT_HOLD_DURATION_MS: i64 = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TapState {
    Armed,
    Holding,
    Success,
    Dismissed,
}

#[derive(Debug)]
pub struct TapHoldMachine {
    instance: InterventionInstance,
    state: TapState,
    /// The single outstanding timer: dismiss deadline while armed, completion
    /// deadline while holding
    deadline: Option<i64>,
    hold_started_at: Option<i64>,
    hold_duration_ms: i64,
    latch: ReactionLatch,
}

impl TapHoldMachine {
    pub fn new(now_ms: i64) -> (Self, TelemetryEvent) {
        Self::with_duration(now_ms, DEFAULT_HOLD_DURATION_MS)
    }

    pub fn with_duration(now_ms: i64, hold_duration_ms: i64) -> (Self, TelemetryEvent) {
        let instance = InterventionInstance::new(DeliveryMode::Tap, now_ms);
        let shown = TelemetryEvent::shown(&instance);
        let machine = Self {
            instance,
            state: TapState::Armed,
            deadline: Some(now_ms + ARM_DISMISS_MS),
            hold_started_at: None,
            hold_duration_ms,
            latch: ReactionLatch::default(),
        };
        (machine, shown)
    }

    pub fn instance(&self) -> &InterventionInstance {
        &self.instance
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, TapState::Success | TapState::Dismissed)
    }

    /// Press cancels the dismiss timer and arms the completion deadline
    pub fn press(&mut self, now_ms: i64) {
        if self.state != TapState::Armed {
            return;
        }
        self.state = TapState::Holding;
        self.hold_started_at = Some(now_ms);
        self.deadline = Some(now_ms + self.hold_duration_ms);
    }

    /// Release before completion resets progress and re-arms the dismiss.
    ///
    /// A release arriving after the completion deadline (when no tick ran in
    /// between) still completes: the hold was uninterrupted for the full
    /// duration.
    pub fn release(&mut self, now_ms: i64) -> Option<TelemetryEvent> {
        if self.state != TapState::Holding {
            return None;
        }
        let done = self.deadline.map(|at| now_ms >= at).unwrap_or(false);
        if done {
            return self.complete(now_ms);
        }
        self.hold_started_at = None;
        self.state = TapState::Armed;
        self.deadline = Some(now_ms + ARM_DISMISS_MS);
        None
    }

    /// Advance timers: completion while holding, dismiss while armed
    pub fn tick(&mut self, now_ms: i64) -> Option<TelemetryEvent> {
        match (self.state, self.deadline) {
            (TapState::Holding, Some(at)) if now_ms >= at => self.complete(at),
            (TapState::Armed, Some(at)) if now_ms >= at => {
                self.deadline = None;
                self.state = TapState::Dismissed;
                self.latch.fire(&self.instance, ReactionAction::Ignored, now_ms)
            }
            _ => None,
        }
    }

    /// Hold progress, 0-100, linear over the configured duration
    pub fn progress(&self, now_ms: i64) -> f64 {
        match (self.state, self.hold_started_at) {
            (TapState::Holding, Some(at)) => {
                let elapsed = (now_ms - at).max(0) as f64;
                (elapsed / self.hold_duration_ms as f64 * 100.0).clamp(0.0, 100.0)
            }
            (TapState::Success, _) => 100.0,
            _ => 0.0,
        }
    }

    fn complete(&mut self, now_ms: i64) -> Option<TelemetryEvent> {
        self.state = TapState::Success;
        self.deadline = None;
        self.latch.fire(&self.instance, ReactionAction::Completed, now_ms)
    }
}
