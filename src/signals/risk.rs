//! Risk scoring and intervention quota
//!
//! Turns an observation frame into the boolean risk flags consumed by the
//! decision gate. The score is a weighted combination of velocity pressure,
//! scroll continuity, re-reading, and passivity, amplified on likely
//! infinite-scroll surfaces. Malformed or empty frames yield no risk: the
//! pipeline fails open toward `safe_to_scroll`.

use serde::{Deserialize, Serialize};

use crate::signals::frame::{DecisionSignals, ObservationFrame};

/// Score at or above which `attention_risk` is set
const HARD_RISK_THRESHOLD: f64 = 0.75;

/// Score at or above which `approaching_risk` is set
const SOFT_RISK_THRESHOLD: f64 = 0.45;

/// px/s at which velocity pressure reaches ~63%
const VELOCITY_SATURATION_PX_PER_SEC: f64 = 120.0;

/// Scroll-back + direction-change count at which re-read pressure reaches ~63%
const RE_READ_SATURATION_COUNT: f64 = 6.0;

/// Window scroll travel at which passivity starts to matter
const PASSIVITY_MIN_TRAVEL_PX: f64 = 1_500.0;

/// Daily intervention cap default
pub const DEFAULT_DAILY_CAP: u32 = 6;

const MS_PER_DAY: i64 = 86_400_000;

/// Risk flags plus the underlying composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub attention_risk: bool,
    pub approaching_risk: bool,
    /// Composite 0-1 compulsion score
    pub score: f64,
}

/// Stateless risk evaluator over observation frames
pub struct RiskEvaluator;

impl RiskEvaluator {
    /// Score a frame and derive the risk flags
    pub fn evaluate(frame: &ObservationFrame) -> RiskAssessment {
        let behavior = &frame.behavior_60s;

        // A fully idle window carries no risk regardless of stale counters
        if behavior.idle_sec >= 60.0 || behavior.scroll_px_total <= 0.0 {
            return RiskAssessment {
                attention_risk: false,
                approaching_risk: false,
                score: 0.0,
            };
        }

        let velocity = saturate(behavior.scroll_px_per_sec, VELOCITY_SATURATION_PX_PER_SEC);
        let continuity = (behavior.continuous_scroll_sec / 60.0).clamp(0.0, 1.0);
        let re_read = saturate(
            (behavior.scroll_back_events + behavior.direction_changes) as f64,
            RE_READ_SATURATION_COUNT,
        );
        let passivity = compute_passivity(
            behavior.scroll_px_total,
            frame.actions_60s.total(),
        );

        let base = 0.40 * velocity + 0.25 * continuity + 0.20 * re_read + 0.15 * passivity;
        let amplified = base * (1.0 + 0.2 * frame.page.infinite_scroll_likelihood.clamp(0.0, 1.0));
        let score = amplified.clamp(0.0, 1.0);

        RiskAssessment {
            attention_risk: score >= HARD_RISK_THRESHOLD,
            approaching_risk: score >= SOFT_RISK_THRESHOLD,
            score,
        }
    }
}

/// Exponential saturation: reaches ~63% at `scale`, approaching 1.0 beyond
fn saturate(value: f64, scale: f64) -> f64 {
    if scale <= 0.0 {
        return 0.0;
    }
    (1.0 - (-value.max(0.0) / scale).exp()).clamp(0.0, 1.0)
}

/// Passivity: heavy scroll travel with few deliberate actions.
///
/// Below the travel floor the user has not consumed enough to call passive;
/// each deliberate action halves the remaining passivity.
fn compute_passivity(scroll_px_total: f64, action_total: u32) -> f64 {
    if scroll_px_total < PASSIVITY_MIN_TRAVEL_PX {
        return 0.0;
    }
    let travel = saturate(scroll_px_total - PASSIVITY_MIN_TRAVEL_PX, 3_000.0);
    travel * 0.5f64.powi(action_total as i32)
}

/// Per-day intervention quota, keyed on the injected timestamp.
///
/// The engine never reads a clock; day boundaries are UTC days of the
/// host-provided epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaTracker {
    daily_cap: u32,
    day_key: Option<i64>,
    shown_today: u32,
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_CAP)
    }
}

impl QuotaTracker {
    pub fn new(daily_cap: u32) -> Self {
        Self {
            daily_cap,
            day_key: None,
            shown_today: 0,
        }
    }

    /// Whether another intervention may be shown today
    pub fn cap_ok(&mut self, now_ms: i64) -> bool {
        self.roll_day(now_ms);
        self.shown_today < self.daily_cap
    }

    /// Count one shown intervention against today's quota
    pub fn record_shown(&mut self, now_ms: i64) {
        self.roll_day(now_ms);
        self.shown_today = self.shown_today.saturating_add(1);
    }

    pub fn shown_today(&self) -> u32 {
        self.shown_today
    }

    fn roll_day(&mut self, now_ms: i64) {
        let key = now_ms.div_euclid(MS_PER_DAY);
        if self.day_key != Some(key) {
            self.day_key = Some(key);
            self.shown_today = 0;
        }
    }
}

/// Derive the gate inputs from a frame and the quota state
pub fn derive_signals(
    frame: &ObservationFrame,
    quota: &mut QuotaTracker,
    now_ms: i64,
) -> DecisionSignals {
    let assessment = RiskEvaluator::evaluate(frame);
    DecisionSignals {
        attention_risk: assessment.attention_risk,
        approaching_risk: assessment.approaching_risk,
        cap_ok: quota.cap_ok(now_ms),
        scroll_depth: frame.behavior_60s.scroll_px_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::frame::{ActionWindow, BehaviorWindow, ObservationFrame, PageMeta};

    fn frame_with(behavior: BehaviorWindow, actions: ActionWindow, infinite: f64) -> ObservationFrame {
        ObservationFrame {
            behavior_60s: behavior,
            actions_60s: actions,
            page: PageMeta {
                infinite_scroll_likelihood: infinite,
                ..PageMeta::default()
            },
            text_snippets: None,
            captured_at_ms: 0,
        }
    }

    fn doomscroll_window() -> BehaviorWindow {
        BehaviorWindow {
            dwell_mean_ms: 400.0,
            dwell_p90_ms: 900.0,
            scroll_px_total: 18_000.0,
            scroll_px_per_sec: 300.0,
            continuous_scroll_sec: 50.0,
            direction_changes: 4,
            scroll_back_events: 3,
            idle_sec: 0.0,
        }
    }

    #[test]
    fn test_empty_frame_has_no_risk() {
        let assessment = RiskEvaluator::evaluate(&ObservationFrame::empty(0));
        assert!(!assessment.attention_risk);
        assert!(!assessment.approaching_risk);
        assert_eq!(assessment.score, 0.0);
    }

    #[test]
    fn test_sustained_passive_scrolling_is_hard_risk() {
        let frame = frame_with(doomscroll_window(), ActionWindow::default(), 0.9);
        let assessment = RiskEvaluator::evaluate(&frame);
        assert!(assessment.attention_risk);
        assert!(assessment.approaching_risk);
        assert!(assessment.score >= HARD_RISK_THRESHOLD);
    }

    #[test]
    fn test_deliberate_actions_suppress_passivity() {
        let actions = ActionWindow {
            select_count: 3,
            copy_count: 2,
            find_count: 1,
            open_link_count: 2,
            back_forward_count: 0,
            typing_count: 3,
        };
        let passive = RiskEvaluator::evaluate(&frame_with(
            doomscroll_window(),
            ActionWindow::default(),
            0.0,
        ));
        let engaged = RiskEvaluator::evaluate(&frame_with(doomscroll_window(), actions, 0.0));
        assert!(engaged.score < passive.score);
    }

    #[test]
    fn test_moderate_scrolling_is_soft_risk_only() {
        let behavior = BehaviorWindow {
            scroll_px_total: 5_000.0,
            scroll_px_per_sec: 83.0,
            continuous_scroll_sec: 25.0,
            direction_changes: 1,
            scroll_back_events: 1,
            idle_sec: 2.0,
            ..BehaviorWindow::default()
        };
        let assessment = RiskEvaluator::evaluate(&frame_with(behavior, ActionWindow::default(), 0.0));
        assert!(assessment.approaching_risk);
        assert!(!assessment.attention_risk);
    }

    #[test]
    fn test_infinite_scroll_amplifies_score() {
        let calm = RiskEvaluator::evaluate(&frame_with(doomscroll_window(), ActionWindow::default(), 0.0));
        let feed = RiskEvaluator::evaluate(&frame_with(doomscroll_window(), ActionWindow::default(), 1.0));
        assert!(feed.score > calm.score);
    }

    #[test]
    fn test_quota_caps_per_day() {
        let mut quota = QuotaTracker::new(2);
        let day0 = 1_000;
        assert!(quota.cap_ok(day0));
        quota.record_shown(day0);
        quota.record_shown(day0);
        assert!(!quota.cap_ok(day0));

        // Next UTC day resets the counter
        let day1 = MS_PER_DAY + 1_000;
        assert!(quota.cap_ok(day1));
        assert_eq!(quota.shown_today(), 0);
    }

    #[test]
    fn test_derive_signals_reflects_cap() {
        let mut quota = QuotaTracker::new(0);
        let frame = frame_with(doomscroll_window(), ActionWindow::default(), 1.0);
        let signals = derive_signals(&frame, &mut quota, 1_000);
        assert!(signals.attention_risk);
        assert!(!signals.cap_ok);
        assert_eq!(signals.scroll_depth, 18_000.0);
    }
}
