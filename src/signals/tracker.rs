//! Rolling-window signal aggregation
//!
//! The tracker maintains six time-ordered event lists and produces an
//! `ObservationFrame` on demand. Every read prunes the lists to the last
//! 60 seconds (monotonic eviction, FIFO by timestamp); there is no background
//! task and no suspension, all work happens synchronously in the caller.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::signals::frame::{ActionWindow, BehaviorWindow, ObservationFrame, PageMeta};

/// Rolling window length
const WINDOW_MS: i64 = 60_000;

/// Gaps at or above this are session boundaries, not dwells
const SESSION_GAP_MS: i64 = 30_000;

/// Deltas more negative than this count as an upward re-read
const SCROLL_BACK_PX: f64 = -80.0;

/// Idle cap in seconds
const IDLE_CAP_SEC: f64 = 60.0;

/// Deliberate user actions tracked per-type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Select,
    Copy,
    Find,
    OpenLink,
    BackForward,
    Typing,
}

/// Rolling-window aggregator over raw page events
#[derive(Debug, Clone, Default)]
pub struct SignalTracker {
    /// (timestamp, signed pixel delta)
    scroll_deltas: VecDeque<(i64, f64)>,
    /// (timestamp, gap in ms) between consecutive scroll events
    dwell_gaps: VecDeque<(i64, f64)>,
    /// (timestamp, active duration in seconds)
    active_ticks: VecDeque<(i64, f64)>,
    direction_changes: VecDeque<i64>,
    scroll_backs: VecDeque<i64>,
    actions: VecDeque<(i64, ActionKind)>,
    last_scroll_at: Option<i64>,
    /// Sign of the previous scroll delta; explicit state, not ambient
    prev_delta_sign: Option<i8>,
    last_activity_at: Option<i64>,
}

impl SignalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one scroll event with its signed pixel delta.
    ///
    /// Computes the dwell gap against the previous scroll event (discarded as
    /// a session gap when >= 30 s), flags a direction change on sign flip, and
    /// a scroll-back when the delta is more negative than -80 px.
    pub fn record_scroll(&mut self, now_ms: i64, delta_px: f64) {
        if let Some(prev) = self.last_scroll_at {
            let gap = now_ms - prev;
            if gap >= 0 && gap < SESSION_GAP_MS {
                self.dwell_gaps.push_back((now_ms, gap as f64));
            }
        }
        self.last_scroll_at = Some(now_ms);

        let sign: i8 = if delta_px > 0.0 {
            1
        } else if delta_px < 0.0 {
            -1
        } else {
            0
        };
        if let Some(prev_sign) = self.prev_delta_sign {
            if sign != 0 && prev_sign != 0 && sign != prev_sign {
                self.direction_changes.push_back(now_ms);
            }
        }
        if sign != 0 {
            self.prev_delta_sign = Some(sign);
        }

        if delta_px < SCROLL_BACK_PX {
            self.scroll_backs.push_back(now_ms);
        }

        self.scroll_deltas.push_back((now_ms, delta_px));
        self.last_activity_at = Some(now_ms);
    }

    /// Record a deliberate user action (select, copy, find, ...)
    pub fn record_action(&mut self, now_ms: i64, kind: ActionKind) {
        self.actions.push_back((now_ms, kind));
        self.last_activity_at = Some(now_ms);
    }

    /// Record an active tick: `duration_sec` of engaged time ending at `now_ms`
    pub fn record_active_tick(&mut self, now_ms: i64, duration_sec: f64) {
        if duration_sec > 0.0 {
            self.active_ticks.push_back((now_ms, duration_sec));
        }
    }

    /// Build the observation frame for the current window
    pub fn frame(&mut self, now_ms: i64, page: PageMeta) -> ObservationFrame {
        self.prune(now_ms);

        let behavior_60s = BehaviorWindow {
            dwell_mean_ms: self.dwell_mean(),
            dwell_p90_ms: self.dwell_p90(),
            scroll_px_total: self.scroll_px_total(),
            scroll_px_per_sec: self.scroll_px_total() / (WINDOW_MS as f64 / 1000.0),
            continuous_scroll_sec: self.active_ticks.iter().map(|(_, d)| d).sum(),
            direction_changes: self.direction_changes.len() as u32,
            scroll_back_events: self.scroll_backs.len() as u32,
            idle_sec: self.idle_sec(now_ms),
        };

        ObservationFrame {
            behavior_60s,
            actions_60s: self.action_window(),
            page,
            text_snippets: None,
            captured_at_ms: now_ms,
        }
    }

    /// Seconds since last scroll/action, capped at 60
    pub fn idle_sec(&self, now_ms: i64) -> f64 {
        match self.last_activity_at {
            Some(at) => (((now_ms - at).max(0)) as f64 / 1000.0).min(IDLE_CAP_SEC),
            None => IDLE_CAP_SEC,
        }
    }

    /// Evict everything older than the 60 s window
    fn prune(&mut self, now_ms: i64) {
        let cutoff = now_ms - WINDOW_MS;
        prune_front(&mut self.scroll_deltas, |(ts, _)| *ts, cutoff);
        prune_front(&mut self.dwell_gaps, |(ts, _)| *ts, cutoff);
        prune_front(&mut self.active_ticks, |(ts, _)| *ts, cutoff);
        prune_front(&mut self.direction_changes, |ts| *ts, cutoff);
        prune_front(&mut self.scroll_backs, |ts| *ts, cutoff);
        prune_front(&mut self.actions, |(ts, _)| *ts, cutoff);
    }

    fn scroll_px_total(&self) -> f64 {
        self.scroll_deltas.iter().map(|(_, d)| d.abs()).sum()
    }

    fn dwell_mean(&self) -> f64 {
        if self.dwell_gaps.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.dwell_gaps.iter().map(|(_, g)| g).sum();
        sum / self.dwell_gaps.len() as f64
    }

    /// Nearest-rank 90th percentile: index floor(0.9 * n), clamped to last
    fn dwell_p90(&self) -> f64 {
        if self.dwell_gaps.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.dwell_gaps.iter().map(|(_, g)| *g).collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((0.9 * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
        sorted[idx]
    }

    fn action_window(&self) -> ActionWindow {
        let mut window = ActionWindow::default();
        for (_, kind) in &self.actions {
            match kind {
                ActionKind::Select => window.select_count += 1,
                ActionKind::Copy => window.copy_count += 1,
                ActionKind::Find => window.find_count += 1,
                ActionKind::OpenLink => window.open_link_count += 1,
                ActionKind::BackForward => window.back_forward_count += 1,
                ActionKind::Typing => window.typing_count += 1,
            }
        }
        window
    }
}

fn prune_front<T, F: Fn(&T) -> i64>(queue: &mut VecDeque<T>, ts_of: F, cutoff: i64) {
    while let Some(front) = queue.front() {
        if ts_of(front) < cutoff {
            queue.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::frame::PageMeta;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scroll_totals_and_rate() {
        let mut tracker = SignalTracker::new();
        tracker.record_scroll(1_000, 100.0);
        tracker.record_scroll(2_000, -50.0);
        tracker.record_scroll(3_000, 200.0);

        let frame = tracker.frame(3_000, PageMeta::default());
        assert_eq!(frame.behavior_60s.scroll_px_total, 350.0);
        assert!((frame.behavior_60s.scroll_px_per_sec - 350.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_eviction_is_fifo_by_timestamp() {
        let mut tracker = SignalTracker::new();
        tracker.record_scroll(0, 100.0);
        tracker.record_scroll(30_000, 100.0);
        tracker.record_scroll(65_000, 100.0);

        // The event at t=0 falls out of the [5_000, 65_000] window
        let frame = tracker.frame(65_000, PageMeta::default());
        assert_eq!(frame.behavior_60s.scroll_px_total, 200.0);
    }

    #[test]
    fn test_dwell_gap_discards_session_gaps() {
        let mut tracker = SignalTracker::new();
        tracker.record_scroll(0, 10.0);
        tracker.record_scroll(1_000, 10.0); // 1000ms gap, kept
        tracker.record_scroll(35_000, 10.0); // 34s gap, session boundary
        tracker.record_scroll(35_500, 10.0); // 500ms gap, kept

        let frame = tracker.frame(36_000, PageMeta::default());
        assert_eq!(frame.behavior_60s.dwell_mean_ms, 750.0);
    }

    #[test]
    fn test_direction_change_on_sign_flip_only() {
        let mut tracker = SignalTracker::new();
        tracker.record_scroll(1_000, 50.0);
        tracker.record_scroll(2_000, 60.0); // same sign
        tracker.record_scroll(3_000, -50.0); // flip
        tracker.record_scroll(4_000, -20.0); // same sign
        tracker.record_scroll(5_000, 30.0); // flip

        let frame = tracker.frame(5_000, PageMeta::default());
        assert_eq!(frame.behavior_60s.direction_changes, 2);
    }

    #[test]
    fn test_scroll_back_threshold_is_exclusive() {
        let mut tracker = SignalTracker::new();
        tracker.record_scroll(1_000, -80.0); // not more negative than -80
        tracker.record_scroll(2_000, -81.0); // scroll-back
        tracker.record_scroll(3_000, -200.0); // scroll-back

        let frame = tracker.frame(3_000, PageMeta::default());
        assert_eq!(frame.behavior_60s.scroll_back_events, 2);
    }

    #[test]
    fn test_dwell_p90_nearest_rank() {
        let mut tracker = SignalTracker::new();
        // Gaps: 100, 200, ..., 1000 (ten gaps from eleven events)
        let mut t = 0i64;
        tracker.record_scroll(t, 10.0);
        for gap in (100..=1000).step_by(100) {
            t += gap;
            tracker.record_scroll(t, 10.0);
        }

        let frame = tracker.frame(t, PageMeta::default());
        // floor(0.9 * 10) = 9 -> sorted[9] = 1000
        assert_eq!(frame.behavior_60s.dwell_p90_ms, 1000.0);
    }

    #[test]
    fn test_dwell_p90_clamps_to_last_index() {
        let mut tracker = SignalTracker::new();
        tracker.record_scroll(0, 10.0);
        tracker.record_scroll(400, 10.0); // single gap of 400

        let frame = tracker.frame(400, PageMeta::default());
        assert_eq!(frame.behavior_60s.dwell_p90_ms, 400.0);
    }

    #[test]
    fn test_idle_seconds_capped() {
        let mut tracker = SignalTracker::new();
        tracker.record_scroll(0, 10.0);

        assert_eq!(tracker.idle_sec(5_000), 5.0);
        assert_eq!(tracker.idle_sec(90_000), 60.0);

        let fresh = SignalTracker::new();
        assert_eq!(fresh.idle_sec(1_000), 60.0);
    }

    #[test]
    fn test_continuous_scroll_sums_active_ticks() {
        let mut tracker = SignalTracker::new();
        tracker.record_active_tick(5_000, 5.0);
        tracker.record_active_tick(10_000, 4.0);
        tracker.record_active_tick(80_000, 3.0);

        // Only the tick at t=80_000 survives a window ending at t=130_000
        let frame = tracker.frame(130_000, PageMeta::default());
        assert_eq!(frame.behavior_60s.continuous_scroll_sec, 3.0);
    }

    #[test]
    fn test_action_counts_by_kind() {
        let mut tracker = SignalTracker::new();
        tracker.record_action(1_000, ActionKind::Select);
        tracker.record_action(2_000, ActionKind::Select);
        tracker.record_action(3_000, ActionKind::Copy);
        tracker.record_action(4_000, ActionKind::Typing);

        let frame = tracker.frame(5_000, PageMeta::default());
        assert_eq!(frame.actions_60s.select_count, 2);
        assert_eq!(frame.actions_60s.copy_count, 1);
        assert_eq!(frame.actions_60s.typing_count, 1);
        assert_eq!(frame.actions_60s.total(), 4);
    }
}
