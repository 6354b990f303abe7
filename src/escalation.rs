//! Focus-mode escalation and cooldown tracking
//!
//! During a WORK phase, each blocked navigation attempt on a non-whitelisted
//! domain is rate-limited by a cooldown and escalates from no-op to a micro
//! nudge to a hard interrupt, cycling deterministically through the hard-mode
//! variants. Temporary allow-windows exempt a domain a bounded number of
//! times per phase. Nothing about one WORK phase leaks into the next: every
//! phase transition clears the attempt counters and allow-windows.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::HardMode;

/// Focus phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Work,
    Break,
}

/// Per-installation focus state, domain-scoped within the current phase.
///
/// Reads across the process boundary are snapshots; the tracker's operations
/// are idempotent under stale reads (a stale snapshot delays correction by at
/// most one enforcement check).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusState {
    pub enabled: bool,
    pub phase: Phase,
    pub phase_started_at_ms: i64,
    pub phase_ends_at_ms: i64,
    #[serde(default)]
    pub attempts: HashMap<String, u32>,
    #[serde(default)]
    pub last_attempt_at_ms: HashMap<String, i64>,
    #[serde(default)]
    pub allow_until_ms: HashMap<String, i64>,
    #[serde(default)]
    pub allow_used_count: u32,
}

impl FocusState {
    /// Fresh state entering `phase` at `now_ms` for `duration_ms`
    pub fn new(phase: Phase, now_ms: i64, duration_ms: i64) -> Self {
        Self {
            enabled: true,
            phase,
            phase_started_at_ms: now_ms,
            phase_ends_at_ms: now_ms + duration_ms,
            attempts: HashMap::new(),
            last_attempt_at_ms: HashMap::new(),
            allow_until_ms: HashMap::new(),
            allow_used_count: 0,
        }
    }

    fn clear_phase_scoped(&mut self) {
        self.attempts.clear();
        self.last_attempt_at_ms.clear();
        self.allow_until_ms.clear();
        self.allow_used_count = 0;
    }
}

/// Static per-session escalation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardModeConfig {
    /// Attempt count at which the micro tier starts
    pub micro_at: u32,
    /// Attempt count at which the hard tier starts
    pub hard_at: u32,
    /// Cyclic hard-mode sequence for attempts at or beyond `hard_at`
    pub hard_mode_cycle: Vec<HardMode>,
    /// Debounce between counted attempts per domain
    pub attempt_cooldown_ms: i64,
    /// Allow-window grants per WORK phase
    pub allow_max_per_work: u32,
    /// Default allow-window length in seconds
    pub allow_default_sec: u32,
}

impl Default for HardModeConfig {
    fn default() -> Self {
        Self {
            micro_at: 2,
            hard_at: 3,
            hard_mode_cycle: vec![HardMode::Breath, HardMode::Tap, HardMode::Stillness],
            attempt_cooldown_ms: 8_000,
            allow_max_per_work: 2,
            allow_default_sec: 300,
        }
    }
}

/// Escalation tier for a blocked-attempt count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationTier {
    None,
    Micro,
    Hard,
}

/// Outcome of registering one blocked-navigation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Domain is inside an active allow-window: not blocked, not counted
    Allowed,
    /// Inside the attempt cooldown: rejected without any state change
    CoolingDown,
    /// Counted; escalate per tier (`mode` set only for the hard tier)
    Escalate {
        tier: EscalationTier,
        attempts: u32,
        mode: Option<HardMode>,
    },
}

/// Escalation and cooldown bookkeeping over a `FocusState`
#[derive(Debug, Clone, Default)]
pub struct EscalationTracker {
    config: HardModeConfig,
}

impl EscalationTracker {
    pub fn new(config: HardModeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HardModeConfig {
        &self.config
    }

    /// Register a blocked-navigation attempt for `domain` at `now_ms`.
    pub fn register_attempt(
        &self,
        state: &mut FocusState,
        domain: &str,
        now_ms: i64,
    ) -> AttemptOutcome {
        if let Some(&until) = state.allow_until_ms.get(domain) {
            if now_ms < until {
                return AttemptOutcome::Allowed;
            }
        }

        if let Some(&last) = state.last_attempt_at_ms.get(domain) {
            if now_ms - last < self.config.attempt_cooldown_ms {
                return AttemptOutcome::CoolingDown;
            }
        }

        let attempts = state
            .attempts
            .entry(domain.to_string())
            .and_modify(|n| *n += 1)
            .or_insert(1);
        let attempts = *attempts;
        state.last_attempt_at_ms.insert(domain.to_string(), now_ms);

        let tier = self.tier_for(attempts);
        let mode = match tier {
            EscalationTier::Hard => Some(self.pick_hard_mode(attempts)),
            _ => None,
        };

        AttemptOutcome::Escalate { tier, attempts, mode }
    }

    /// Escalation tier for an attempt count
    pub fn tier_for(&self, attempts: u32) -> EscalationTier {
        if attempts < self.config.micro_at {
            EscalationTier::None
        } else if attempts < self.config.hard_at {
            EscalationTier::Micro
        } else {
            EscalationTier::Hard
        }
    }

    /// Hard mode for an attempt count at or beyond `hard_at`.
    ///
    /// `((attempts - hard_at) mod L + L) mod L` indexes the cycle; the double
    /// modulo keeps the index well-defined for any signed offset.
    pub fn pick_hard_mode(&self, attempts: u32) -> HardMode {
        let len = self.config.hard_mode_cycle.len() as i64;
        if len == 0 {
            return HardMode::Breath;
        }
        let offset = attempts as i64 - self.config.hard_at as i64;
        let idx = ((offset % len) + len) % len;
        self.config.hard_mode_cycle[idx as usize]
    }

    /// Grant a temporary allow-window for `domain`, if quota remains.
    ///
    /// Returns `false` without state change once `allow_max_per_work` grants
    /// have been used this phase.
    pub fn grant_allow(
        &self,
        state: &mut FocusState,
        domain: &str,
        sec: u32,
        now_ms: i64,
    ) -> bool {
        if state.allow_used_count >= self.config.allow_max_per_work {
            return false;
        }
        state
            .allow_until_ms
            .insert(domain.to_string(), now_ms + i64::from(sec) * 1_000);
        state.allow_used_count += 1;
        true
    }

    /// Transition to the next phase, clearing all phase-scoped state.
    pub fn transition_phase(
        &self,
        state: &mut FocusState,
        phase: Phase,
        now_ms: i64,
        duration_ms: i64,
    ) {
        state.phase = phase;
        state.phase_started_at_ms = now_ms;
        state.phase_ends_at_ms = now_ms + duration_ms;
        state.clear_phase_scoped();
    }

    /// Disable focus mode, resetting everything phase-scoped.
    pub fn disable(&self, state: &mut FocusState) {
        state.enabled = false;
        state.clear_phase_scoped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tracker() -> EscalationTracker {
        EscalationTracker::new(HardModeConfig::default())
    }

    fn work_state() -> FocusState {
        FocusState::new(Phase::Work, 0, 25 * 60 * 1_000)
    }

    fn escalate(outcome: AttemptOutcome) -> (EscalationTier, u32, Option<HardMode>) {
        match outcome {
            AttemptOutcome::Escalate { tier, attempts, mode } => (tier, attempts, mode),
            other => panic!("expected escalation, got {other:?}"),
        }
    }

    #[test]
    fn test_cooldown_rejects_without_increment() {
        let tracker = tracker();
        let mut state = work_state();

        let first = tracker.register_attempt(&mut state, "feed.example", 10_000);
        assert!(matches!(first, AttemptOutcome::Escalate { attempts: 1, .. }));

        // 5s later: inside the 8s cooldown
        let second = tracker.register_attempt(&mut state, "feed.example", 15_000);
        assert_eq!(second, AttemptOutcome::CoolingDown);
        assert_eq!(state.attempts["feed.example"], 1);
        assert_eq!(state.last_attempt_at_ms["feed.example"], 10_000);
    }

    #[test]
    fn test_cooldown_is_per_domain() {
        let tracker = tracker();
        let mut state = work_state();

        tracker.register_attempt(&mut state, "feed.example", 10_000);
        let other = tracker.register_attempt(&mut state, "video.example", 11_000);
        assert!(matches!(other, AttemptOutcome::Escalate { attempts: 1, .. }));
    }

    #[test]
    fn test_tier_progression() {
        let tracker = tracker();
        let mut state = work_state();
        let mut now = 0i64;

        let mut tiers = Vec::new();
        for _ in 0..4 {
            now += 10_000;
            let (tier, _, _) = escalate(tracker.register_attempt(&mut state, "d", now));
            tiers.push(tier);
        }
        assert_eq!(
            tiers,
            vec![
                EscalationTier::None,
                EscalationTier::Micro,
                EscalationTier::Hard,
                EscalationTier::Hard,
            ]
        );
    }

    #[test]
    fn test_hard_mode_cycle_is_pure_in_offset() {
        let tracker = tracker();
        // hard_at = 3, cycle [BREATH, TAP, STILLNESS]
        assert_eq!(tracker.pick_hard_mode(3), HardMode::Breath);
        assert_eq!(tracker.pick_hard_mode(4), HardMode::Tap);
        assert_eq!(tracker.pick_hard_mode(5), HardMode::Stillness);
        assert_eq!(tracker.pick_hard_mode(6), HardMode::Breath);
        assert_eq!(tracker.pick_hard_mode(7), HardMode::Tap);
    }

    #[test]
    fn test_hard_mode_cycle_handles_below_hard_at() {
        // attempts below hard_at would give a negative offset; the modulo
        // normalization must still land in range.
        let tracker = tracker();
        assert_eq!(tracker.pick_hard_mode(1), HardMode::Tap); // offset -2
        assert_eq!(tracker.pick_hard_mode(2), HardMode::Stillness); // offset -1
    }

    #[test]
    fn test_allow_window_skips_blocking_and_counting() {
        let tracker = tracker();
        let mut state = work_state();

        assert!(tracker.grant_allow(&mut state, "docs.example", 300, 0));
        let outcome = tracker.register_attempt(&mut state, "docs.example", 100_000);
        assert_eq!(outcome, AttemptOutcome::Allowed);
        assert!(state.attempts.get("docs.example").is_none());

        // Window expired: attempts count again
        let after = tracker.register_attempt(&mut state, "docs.example", 400_000);
        assert!(matches!(after, AttemptOutcome::Escalate { attempts: 1, .. }));
    }

    #[test]
    fn test_allow_quota_per_phase() {
        let tracker = tracker();
        let mut state = work_state();

        assert!(tracker.grant_allow(&mut state, "a.example", 60, 0));
        assert!(tracker.grant_allow(&mut state, "b.example", 60, 0));
        assert!(!tracker.grant_allow(&mut state, "c.example", 60, 0));
        assert_eq!(state.allow_used_count, 2);
    }

    #[test]
    fn test_phase_transition_resets_everything() {
        let tracker = tracker();
        let mut state = work_state();

        tracker.register_attempt(&mut state, "feed.example", 10_000);
        tracker.grant_allow(&mut state, "docs.example", 300, 10_000);

        tracker.transition_phase(&mut state, Phase::Break, 1_500_000, 5 * 60 * 1_000);

        assert_eq!(state.phase, Phase::Break);
        assert!(state.attempts.is_empty());
        assert!(state.last_attempt_at_ms.is_empty());
        assert!(state.allow_until_ms.is_empty());
        assert_eq!(state.allow_used_count, 0);

        // Next WORK phase starts from scratch
        tracker.transition_phase(&mut state, Phase::Work, 1_800_000, 25 * 60 * 1_000);
        let outcome = tracker.register_attempt(&mut state, "feed.example", 1_810_000);
        assert!(matches!(outcome, AttemptOutcome::Escalate { attempts: 1, .. }));
    }

    #[test]
    fn test_disable_clears_state() {
        let tracker = tracker();
        let mut state = work_state();
        tracker.register_attempt(&mut state, "feed.example", 10_000);

        tracker.disable(&mut state);
        assert!(!state.enabled);
        assert!(state.attempts.is_empty());
    }

    #[test]
    fn test_focus_state_round_trips_json() {
        let mut state = work_state();
        state.attempts.insert("feed.example".into(), 3);
        let json = serde_json::to_string(&state).unwrap();
        let parsed: FocusState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
