//! Stillness interrupt
//!
//! The user must keep the pointer still for 7 s of wall time. Any pointer
//! movement starts (or extends) a movement episode: the countdown re-anchors
//! immediately as a visible penalty, and an episode that spans more than 2 s
//! of continuous movement fails the whole attempt. Episodes close after
//! 300 ms of quiet, after which the countdown runs toward success again from
//! the last re-anchor.

use serde::{Deserialize, Serialize};

use crate::delivery::ReactionLatch;
use crate::types::{DeliveryMode, InterventionInstance, ReactionAction, TelemetryEvent};

/// Required stillness span
const TARGET_MS: i64 = 7_000;

/// A movement episode longer than this fails the attempt
const EPISODE_FAIL_MS: i64 = 2_000;

/// Quiet time that closes a movement episode
const QUIET_MS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StillnessState {
    CountingDown,
    Success,
    Failed,
}

#[derive(Debug)]
pub struct StillnessMachine {
    instance: InterventionInstance,
    state: StillnessState,
    /// Last countdown reset; success at `countdown_anchor + TARGET_MS`
    countdown_anchor: i64,
    episode_started_at: Option<i64>,
    last_move_at: Option<i64>,
    latch: ReactionLatch,
}

impl StillnessMachine {
    pub fn new(now_ms: i64) -> (Self, TelemetryEvent) {
        let instance = InterventionInstance::new(DeliveryMode::Stillness, now_ms);
        let shown = TelemetryEvent::shown(&instance);
        let machine = Self {
            instance,
            state: StillnessState::CountingDown,
            countdown_anchor: now_ms,
            episode_started_at: None,
            last_move_at: None,
            latch: ReactionLatch::default(),
        };
        (machine, shown)
    }

    pub fn instance(&self) -> &InterventionInstance {
        &self.instance
    }

    pub fn state(&self) -> StillnessState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, StillnessState::Success | StillnessState::Failed)
    }

    /// Milliseconds of stillness still required, for the visible countdown
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        (self.countdown_anchor + TARGET_MS - now_ms).max(0)
    }

    /// A pointer-move sample while counting down.
    ///
    /// Re-anchors the countdown, opens or extends the movement episode, and
    /// fails the attempt when the episode's continuous span exceeds 2 s.
    pub fn pointer_move(&mut self, now_ms: i64) -> Option<TelemetryEvent> {
        if self.state != StillnessState::CountingDown {
            return None;
        }

        self.close_episode_if_quiet(now_ms);

        match self.episode_started_at {
            None => {
                self.episode_started_at = Some(now_ms);
            }
            Some(started) => {
                if now_ms - started > EPISODE_FAIL_MS {
                    self.state = StillnessState::Failed;
                    return self.latch.fire(&self.instance, ReactionAction::Ignored, now_ms);
                }
            }
        }

        self.last_move_at = Some(now_ms);
        self.countdown_anchor = now_ms;
        None
    }

    /// Cooperative progress tick: closes quiet episodes and checks success
    pub fn tick(&mut self, now_ms: i64) -> Option<TelemetryEvent> {
        if self.state != StillnessState::CountingDown {
            return None;
        }

        self.close_episode_if_quiet(now_ms);

        if self.episode_started_at.is_none() && now_ms - self.countdown_anchor >= TARGET_MS {
            self.state = StillnessState::Success;
            return self.latch.fire(&self.instance, ReactionAction::Completed, now_ms);
        }
        None
    }

    fn close_episode_if_quiet(&mut self, now_ms: i64) {
        if let (Some(_), Some(last)) = (self.episode_started_at, self.last_move_at) {
            if now_ms - last >= QUIET_MS {
                self.episode_started_at = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Advance in 20ms steps, asserting no event fires before `until`
    fn run_quiet(machine: &mut StillnessMachine, from: i64, until: i64) {
        let mut t = from;
        while t < until {
            assert!(machine.tick(t).is_none(), "unexpected event at {t}");
            t += 20;
        }
    }

    #[test]
    fn test_undisturbed_countdown_succeeds_at_7s() {
        let (mut machine, _) = StillnessMachine::new(0);
        run_quiet(&mut machine, 0, 7_000);
        let reaction = machine.tick(7_000).expect("success at target");
        assert!(matches!(
            reaction,
            TelemetryEvent::Reaction { action: ReactionAction::Completed, .. }
        ));
    }

    #[test]
    fn test_movement_resets_countdown() {
        let (mut machine, _) = StillnessMachine::new(0);
        run_quiet(&mut machine, 0, 5_000);
        machine.pointer_move(5_000);

        // 7s must elapse from the reset, not from entry
        assert!(machine.tick(7_000).is_none());
        assert!(machine.tick(11_999).is_none());
        assert!(machine.tick(12_000).is_some());
        assert_eq!(machine.state(), StillnessState::Success);
    }

    #[test]
    fn test_remaining_reflects_reset_penalty() {
        let (mut machine, _) = StillnessMachine::new(0);
        assert_eq!(machine.remaining_ms(3_000), 4_000);
        machine.pointer_move(3_000);
        assert_eq!(machine.remaining_ms(3_000), 7_000);
    }

    #[test]
    fn test_episode_of_1999ms_does_not_fail() {
        let (mut machine, _) = StillnessMachine::new(0);
        // Continuous movement: samples every 100ms from 1000, final at 2999
        let mut t = 1_000;
        while t <= 2_900 {
            assert!(machine.pointer_move(t).is_none(), "failed early at {t}");
            t += 100;
        }
        // 1999ms into the episode: still counting down
        assert!(machine.pointer_move(2_999).is_none());
        assert_eq!(machine.state(), StillnessState::CountingDown);
    }

    #[test]
    fn test_episode_of_2001ms_fails() {
        let (mut machine, _) = StillnessMachine::new(0);
        let mut t = 1_000;
        while t <= 2_900 {
            assert!(machine.pointer_move(t).is_none(), "failed early at {t}");
            t += 100;
        }
        // 2001ms into the episode: the attempt fails
        let reaction = machine.pointer_move(3_001).expect("episode exceeded 2s");
        assert!(matches!(
            reaction,
            TelemetryEvent::Reaction { action: ReactionAction::Ignored, .. }
        ));
        assert_eq!(machine.state(), StillnessState::Failed);
    }

    #[test]
    fn test_quiet_closes_episode_and_countdown_resumes() {
        let (mut machine, _) = StillnessMachine::new(0);
        machine.pointer_move(1_000);
        machine.pointer_move(1_200);

        // 300ms of quiet closes the episode; anchor stays at the last move
        assert!(machine.tick(1_500).is_none());
        run_quiet(&mut machine, 1_520, 8_200);
        assert!(machine.tick(8_200).is_some());
    }

    #[test]
    fn test_separate_short_episodes_do_not_accumulate() {
        let (mut machine, _) = StillnessMachine::new(0);
        // Two 1.5s episodes separated by quiet; neither alone exceeds 2s
        let mut t = 1_000;
        while t <= 2_500 {
            assert!(machine.pointer_move(t).is_none());
            t += 100;
        }
        // Quiet gap > 300ms, then a second episode
        t = 3_000;
        while t <= 4_500 {
            assert!(machine.pointer_move(t).is_none());
            t += 100;
        }
        assert_eq!(machine.state(), StillnessState::CountingDown);
    }

    #[test]
    fn test_success_blocked_while_episode_open() {
        let (mut machine, _) = StillnessMachine::new(0);
        machine.pointer_move(100);
        // Tick 7s later: the 300ms quiet long since closed the episode and
        // the anchor sits at the move, so success lands at 7_100
        assert!(machine.tick(7_099).is_none());
        assert!(machine.tick(7_100).is_some());
    }

    #[test]
    fn test_single_reaction_after_terminal() {
        let (mut machine, _) = StillnessMachine::new(0);
        run_quiet(&mut machine, 0, 7_000);
        assert!(machine.tick(7_000).is_some());
        assert!(machine.tick(7_020).is_none());
        assert!(machine.pointer_move(7_040).is_none());
    }
}
