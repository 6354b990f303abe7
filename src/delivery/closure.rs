//! Micro-closure prompt
//!
//! A low-friction floating prompt rather than a full block. It times out
//! passively after 12 s (suspended while the document is hidden, so a tab
//! switch never counts against the user), closes immediately on either
//! explicit action, and carries a scroll-dismiss classifier that separates a
//! deliberate fast flee from an ordinary scroll-away. A hover lock shields
//! the prompt from the classifier while the user is reading it.

use serde::{Deserialize, Serialize};

use crate::delivery::ReactionLatch;
use crate::types::{DeliveryMode, InterventionInstance, ReactionAction, TelemetryEvent};

/// Passive timeout while visible
const PASSIVE_TIMEOUT_MS: i64 = 12_000;

/// Scroll samples are ignored for this long after show
const GRACE_MS: i64 = 1_000;

/// Hover lock armed on hover start
const HOVER_LOCK_MS: i64 = 2_000;

/// Minimum additional lock granted when hover ends
const HOVER_RELEASE_LOCK_MS: i64 = 1_200;

/// Cumulative |Δy| that triggers classification
const DISMISS_THRESHOLD_PX: f64 = 600.0;

/// Under this elapsed-since-eligible, a dismissal can be fast
const FAST_ELIGIBLE_WINDOW_MS: i64 = 1_200;

/// Under this tracking time, a dismissal is fast outright
const FAST_TRACK_WINDOW_MS: i64 = 600;

/// Instantaneous velocity above which a dismissal is fast
const FAST_VELOCITY_PX_PER_MS: f64 = 1.4;

/// Scroll pause that resets tracking before the threshold
const TRACK_PAUSE_RESET_MS: i64 = 250;

/// Explicit prompt actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureAction {
    FinishSession,
    SnoozeDelay,
}

/// How a scroll-driven dismissal was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissClass {
    Fast,
    Auto,
}

impl From<DismissClass> for ReactionAction {
    fn from(class: DismissClass) -> Self {
        match class {
            DismissClass::Fast => ReactionAction::FastDismissByScroll,
            DismissClass::Auto => ReactionAction::AutoDismissedByScroll,
        }
    }
}

/// Scroll-position tracker feeding the dismiss classifier.
///
/// All state is explicit fields here; nothing ambient is shared with the
/// host page.
#[derive(Debug, Clone, Default)]
pub struct ScrollTracker {
    start_y: Option<f64>,
    start_at: Option<i64>,
    last_y: f64,
    last_at: i64,
    accum_px: f64,
}

impl ScrollTracker {
    /// Whether a dismissal is currently being tracked (the prompt dims)
    pub fn is_tracking(&self) -> bool {
        self.start_at.is_some()
    }

    /// Scroll position where tracking started, while tracking
    pub fn start_y(&self) -> Option<f64> {
        self.start_y
    }

    /// Milliseconds since the last sample, or `None` when not tracking
    fn quiet_for(&self, now_ms: i64) -> Option<i64> {
        self.start_at.map(|_| now_ms - self.last_at)
    }

    /// Feed one scroll sample. `eligible_at_ms` is when the prompt became
    /// classifiable; returns a class once the cumulative threshold is hit.
    fn sample(&mut self, now_ms: i64, y: f64, eligible_at_ms: i64) -> Option<DismissClass> {
        // A pause before this sample already reset tracking
        if let Some(quiet) = self.quiet_for(now_ms) {
            if quiet >= TRACK_PAUSE_RESET_MS {
                self.reset();
            }
        }

        let Some(start_at) = self.start_at else {
            self.start_y = Some(y);
            self.start_at = Some(now_ms);
            self.last_y = y;
            self.last_at = now_ms;
            self.accum_px = 0.0;
            return None;
        };

        let dy = (y - self.last_y).abs();
        let dt = now_ms - self.last_at;
        self.accum_px += dy;
        self.last_y = y;
        self.last_at = now_ms;

        if self.accum_px < DISMISS_THRESHOLD_PX {
            return None;
        }

        let since_eligible = now_ms - eligible_at_ms;
        let track_time = now_ms - start_at;
        let velocity = if dt > 0 { dy / dt as f64 } else { f64::INFINITY };

        let class = if since_eligible < FAST_ELIGIBLE_WINDOW_MS
            && (track_time < FAST_TRACK_WINDOW_MS || velocity > FAST_VELOCITY_PX_PER_MS)
        {
            DismissClass::Fast
        } else {
            DismissClass::Auto
        };
        self.reset();
        Some(class)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClosureState {
    Visible,
    Closed,
}

#[derive(Debug)]
pub struct MicroClosureMachine {
    instance: InterventionInstance,
    state: ClosureState,
    /// The single outstanding timer: passive-timeout deadline
    deadline: i64,
    hidden_since: Option<i64>,
    hovering: bool,
    hover_lock_until: i64,
    grace_until: i64,
    /// Set when the prompt first becomes classifiable
    eligible_at: Option<i64>,
    tracker: ScrollTracker,
    latch: ReactionLatch,
}

impl MicroClosureMachine {
    pub fn new(now_ms: i64) -> (Self, TelemetryEvent) {
        let instance = InterventionInstance::new(DeliveryMode::MicroClosure, now_ms);
        let shown = TelemetryEvent::shown(&instance);
        let machine = Self {
            instance,
            state: ClosureState::Visible,
            deadline: now_ms + PASSIVE_TIMEOUT_MS,
            hidden_since: None,
            hovering: false,
            hover_lock_until: 0,
            grace_until: now_ms + GRACE_MS,
            eligible_at: None,
            tracker: ScrollTracker::default(),
            latch: ReactionLatch::default(),
        };
        (machine, shown)
    }

    pub fn instance(&self) -> &InterventionInstance {
        &self.instance
    }

    pub fn is_terminal(&self) -> bool {
        self.state == ClosureState::Closed
    }

    /// The prompt dims to 30% opacity and loses pointer-interactivity while
    /// a dismissal is being tracked
    pub fn dimmed(&self) -> bool {
        self.tracker.is_tracking()
    }

    /// Document visibility change. Hiding suspends the passive timeout.
    pub fn visibility(&mut self, hidden: bool, now_ms: i64) {
        if self.state != ClosureState::Visible {
            return;
        }
        match (hidden, self.hidden_since) {
            (true, None) => self.hidden_since = Some(now_ms),
            (false, Some(since)) => {
                self.deadline += now_ms - since;
                self.hidden_since = None;
            }
            _ => {}
        }
    }

    /// Hover locks out the scroll classifier while the user reads
    pub fn hover_start(&mut self, now_ms: i64) {
        if self.state != ClosureState::Visible {
            return;
        }
        self.hovering = true;
        self.hover_lock_until = self.hover_lock_until.max(now_ms + HOVER_LOCK_MS);
        // Eligibility restarts once this lock expires
        self.eligible_at = None;
        self.tracker.reset();
    }

    /// Releasing hover keeps a minimum residual lock
    pub fn hover_end(&mut self, now_ms: i64) {
        if self.state != ClosureState::Visible {
            return;
        }
        self.hovering = false;
        self.hover_lock_until = self.hover_lock_until.max(now_ms + HOVER_RELEASE_LOCK_MS);
    }

    /// Explicit action: cancels the timeout and closes immediately
    pub fn choose(&mut self, action: ClosureAction, now_ms: i64) -> Option<TelemetryEvent> {
        if self.state != ClosureState::Visible {
            return None;
        }
        let reaction = match action {
            ClosureAction::FinishSession => ReactionAction::Completed,
            ClosureAction::SnoozeDelay => ReactionAction::Snoozed,
        };
        self.close(reaction, now_ms)
    }

    /// One scroll-position sample from the host page
    pub fn scroll(&mut self, now_ms: i64, y: f64) -> Option<TelemetryEvent> {
        if self.state != ClosureState::Visible || self.hidden_since.is_some() {
            return None;
        }
        if now_ms < self.grace_until || self.hovering || now_ms < self.hover_lock_until {
            return None;
        }
        let eligible_at = *self
            .eligible_at
            .get_or_insert(self.grace_until.max(self.hover_lock_until));

        let class = self.tracker.sample(now_ms, y, eligible_at)?;
        self.close(class.into(), now_ms)
    }

    /// Advance the passive timeout and the tracking-pause debounce
    pub fn tick(&mut self, now_ms: i64) -> Option<TelemetryEvent> {
        if self.state != ClosureState::Visible || self.hidden_since.is_some() {
            return None;
        }

        // Scroll stopped short of the threshold: restore the prompt
        if let Some(quiet) = self.tracker.quiet_for(now_ms) {
            if quiet >= TRACK_PAUSE_RESET_MS {
                self.tracker.reset();
            }
        }

        if now_ms >= self.deadline {
            return self.close(ReactionAction::TimeoutIgnored, now_ms);
        }
        None
    }

    fn close(&mut self, action: ReactionAction, now_ms: i64) -> Option<TelemetryEvent> {
        self.state = ClosureState::Closed;
        self.tracker.reset();
        self.latch.fire(&self.instance, action, now_ms)
    }
}
