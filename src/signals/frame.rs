//! Observation frame types
//!
//! The observation frame is the immutable rolling-window snapshot handed to
//! the decision boundary on every tick. It is rebuilt from the signal tracker
//! each time; nothing downstream mutates it.

use serde::{Deserialize, Serialize};

/// Coarse page classification supplied by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Article,
    Feed,
    Video,
    Search,
    Other,
}

impl Default for PageType {
    fn default() -> Self {
        PageType::Other
    }
}

/// Page metadata captured alongside the behavioral window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page_type: PageType,
    /// 0.0-1.0 likelihood that the page is an infinite-scroll surface
    pub infinite_scroll_likelihood: f64,
    pub has_video: bool,
}

impl Default for PageMeta {
    fn default() -> Self {
        Self {
            page_type: PageType::Other,
            infinite_scroll_likelihood: 0.0,
            has_video: false,
        }
    }
}

/// Rolling 60-second behavioral metrics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BehaviorWindow {
    /// Mean dwell gap between scroll events in milliseconds
    pub dwell_mean_ms: f64,
    /// 90th-percentile dwell gap (nearest-rank)
    pub dwell_p90_ms: f64,
    /// Total unsigned scroll travel in pixels
    pub scroll_px_total: f64,
    /// Scroll travel per second over the window
    pub scroll_px_per_sec: f64,
    /// Sum of in-window active-tick durations
    pub continuous_scroll_sec: f64,
    /// Scroll delta sign flips
    pub direction_changes: u32,
    /// Upward re-read events (delta below the scroll-back threshold)
    pub scroll_back_events: u32,
    /// Seconds since last activity, capped at 60
    pub idle_sec: f64,
}

/// Rolling 60-second deliberate-action counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionWindow {
    pub select_count: u32,
    pub copy_count: u32,
    pub find_count: u32,
    pub open_link_count: u32,
    pub back_forward_count: u32,
    pub typing_count: u32,
}

impl ActionWindow {
    /// Total deliberate actions in the window
    pub fn total(&self) -> u32 {
        self.select_count
            + self.copy_count
            + self.find_count
            + self.open_link_count
            + self.back_forward_count
            + self.typing_count
    }
}

/// Rolling-window snapshot of user behavior, built fresh each tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationFrame {
    pub behavior_60s: BehaviorWindow,
    pub actions_60s: ActionWindow,
    pub page: PageMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_snippets: Option<Vec<String>>,
    pub captured_at_ms: i64,
}

impl ObservationFrame {
    /// An empty frame: no recorded behavior, fully idle
    pub fn empty(captured_at_ms: i64) -> Self {
        Self {
            behavior_60s: BehaviorWindow {
                idle_sec: 60.0,
                ..BehaviorWindow::default()
            },
            actions_60s: ActionWindow::default(),
            page: PageMeta::default(),
            text_snippets: None,
            captured_at_ms,
        }
    }
}

/// Decision inputs derived from the frame plus the intervention quota
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionSignals {
    pub attention_risk: bool,
    pub approaching_risk: bool,
    pub cap_ok: bool,
    /// Scroll travel in the window, a proxy for how deep the user has burrowed
    pub scroll_depth: f64,
}
