//! Breath-hold interrupt
//!
//! The overlay arms with a 3 s auto-dismiss. Beginning a hold cancels the
//! dismiss timer; releasing after at least 4 s of hold succeeds, an earlier
//! release re-arms the dismiss. Multiple rapid press/release cycles are fine:
//! each release judges only the most recent hold. The hold-phase labels at
//! +4 s and +11 s are pure feedback and are derived from elapsed hold time
//! rather than timers.

use serde::{Deserialize, Serialize};

use crate::delivery::ReactionLatch;
use crate::types::{DeliveryMode, InterventionInstance, ReactionAction, TelemetryEvent};

/// Auto-dismiss delay while armed
const ARM_DISMISS_MS: i64 = 3_000;

/// Minimum hold for success (boundary inclusive)
const HOLD_SUCCESS_MS: i64 = 4_000;

/// Hold label switches at this elapsed hold time
const HOLD_LABEL_MS: i64 = 4_000;

/// Exhale label switches at this elapsed hold time
const EXHALE_LABEL_MS: i64 = 11_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreathState {
    Armed,
    Holding,
    Success,
    Dismissed,
}

/// On-screen guidance during the ritual
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreathLabel {
    Start,
    Inhale,
    Hold,
    Exhale,
}

#[derive(Debug)]
pub struct BreathMachine {
    instance: InterventionInstance,
    state: BreathState,
    /// The single outstanding timer: auto-dismiss deadline while armed
    deadline: Option<i64>,
    hold_started_at: Option<i64>,
    latch: ReactionLatch,
}

impl BreathMachine {
    /// Create the machine in `armed` and emit its `SHOWN` event
    pub fn new(now_ms: i64) -> (Self, TelemetryEvent) {
        let instance = InterventionInstance::new(DeliveryMode::Breath, now_ms);
        let shown = TelemetryEvent::shown(&instance);
        let machine = Self {
            instance,
            state: BreathState::Armed,
            deadline: Some(now_ms + ARM_DISMISS_MS),
            hold_started_at: None,
            latch: ReactionLatch::default(),
        };
        (machine, shown)
    }

    pub fn instance(&self) -> &InterventionInstance {
        &self.instance
    }

    pub fn state(&self) -> BreathState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, BreathState::Success | BreathState::Dismissed)
    }

    /// User begins a hold gesture
    pub fn press(&mut self, now_ms: i64) {
        if self.state != BreathState::Armed {
            return;
        }
        self.deadline = None;
        self.state = BreathState::Holding;
        self.hold_started_at = Some(now_ms);
    }

    /// User releases the hold; judged on this hold's duration only
    pub fn release(&mut self, now_ms: i64) -> Option<TelemetryEvent> {
        if self.state != BreathState::Holding {
            return None;
        }
        let held = self.hold_started_at.map(|at| now_ms - at).unwrap_or(0);
        self.hold_started_at = None;

        if held >= HOLD_SUCCESS_MS {
            self.state = BreathState::Success;
            self.deadline = None;
            self.latch.fire(&self.instance, ReactionAction::Completed, now_ms)
        } else {
            self.state = BreathState::Armed;
            self.deadline = Some(now_ms + ARM_DISMISS_MS);
            None
        }
    }

    /// Advance timers; fires the auto-dismiss when its deadline passes
    pub fn tick(&mut self, now_ms: i64) -> Option<TelemetryEvent> {
        if self.state != BreathState::Armed {
            return None;
        }
        match self.deadline {
            Some(at) if now_ms >= at => {
                self.deadline = None;
                self.state = BreathState::Dismissed;
                self.latch.fire(&self.instance, ReactionAction::Ignored, now_ms)
            }
            _ => None,
        }
    }

    /// Current guidance label, derived from elapsed hold time
    pub fn label(&self, now_ms: i64) -> BreathLabel {
        match (self.state, self.hold_started_at) {
            (BreathState::Holding, Some(at)) => {
                let held = now_ms - at;
                if held >= EXHALE_LABEL_MS {
                    BreathLabel::Exhale
                } else if held >= HOLD_LABEL_MS {
                    BreathLabel::Hold
                } else {
                    BreathLabel::Inhale
                }
            }
            _ => BreathLabel::Start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shown_emitted_on_entry() {
        let (machine, shown) = BreathMachine::new(1_000);
        assert!(matches!(shown, TelemetryEvent::Shown { mode: DeliveryMode::Breath, .. }));
        assert_eq!(machine.state(), BreathState::Armed);
    }

    #[test]
    fn test_auto_dismiss_after_3s() {
        let (mut machine, _) = BreathMachine::new(0);
        assert!(machine.tick(2_999).is_none());

        let reaction = machine.tick(3_000).expect("dismiss fires at deadline");
        assert!(matches!(
            reaction,
            TelemetryEvent::Reaction { action: ReactionAction::Ignored, .. }
        ));
        assert_eq!(machine.state(), BreathState::Dismissed);
    }

    #[test]
    fn test_press_cancels_dismiss() {
        let (mut machine, _) = BreathMachine::new(0);
        machine.press(2_000);
        assert!(machine.tick(10_000).is_none());
        assert_eq!(machine.state(), BreathState::Holding);
    }

    #[test]
    fn test_release_at_3999_fails() {
        let (mut machine, _) = BreathMachine::new(0);
        machine.press(1_000);
        assert!(machine.release(4_999).is_none());
        assert_eq!(machine.state(), BreathState::Armed);
    }

    #[test]
    fn test_release_at_4000_succeeds() {
        let (mut machine, _) = BreathMachine::new(0);
        machine.press(1_000);
        let reaction = machine.release(5_000).expect("boundary inclusive");
        assert!(matches!(
            reaction,
            TelemetryEvent::Reaction { action: ReactionAction::Completed, .. }
        ));
        assert_eq!(machine.state(), BreathState::Success);
    }

    #[test]
    fn test_failed_hold_rearms_dismiss() {
        let (mut machine, _) = BreathMachine::new(0);
        machine.press(1_000);
        machine.release(2_000);

        // New 3s dismiss window runs from the release
        assert!(machine.tick(4_999).is_none());
        assert!(machine.tick(5_000).is_some());
    }

    #[test]
    fn test_each_release_judges_latest_hold_only() {
        let (mut machine, _) = BreathMachine::new(0);
        machine.press(100);
        machine.release(2_100); // 2s hold, fail
        machine.press(2_500);
        let reaction = machine.release(6_500); // 4s hold, success
        assert!(reaction.is_some());
    }

    #[test]
    fn test_double_release_emits_one_reaction() {
        let (mut machine, _) = BreathMachine::new(0);
        machine.press(1_000);
        assert!(machine.release(5_000).is_some());
        assert!(machine.release(5_001).is_none());
        assert!(machine.tick(60_000).is_none());
    }

    #[test]
    fn test_labels_follow_hold_elapsed() {
        let (mut machine, _) = BreathMachine::new(0);
        assert_eq!(machine.label(1_000), BreathLabel::Start);

        machine.press(2_000);
        assert_eq!(machine.label(3_000), BreathLabel::Inhale);
        assert_eq!(machine.label(6_000), BreathLabel::Hold);
        assert_eq!(machine.label(13_000), BreathLabel::Exhale);
    }
}
