//! Shared value types for the intervention pipeline
//!
//! This module defines the types that cross the engine's boundaries: the
//! intervention vocabulary (categories, hard modes, triggers), the directives
//! handed to the rendering context, and the telemetry events emitted for every
//! shown intervention.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Intervention categories, declared least- to most-intrusive.
///
/// The declaration order is load-bearing: the derived `Ord` backs both the
/// candidate ordering in the selector and the anti-repeat comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionCategory {
    PresenceSignal,
    MicroClosure,
    GentleReflection,
    HardInterrupt,
}

/// Concrete ritual rendered for a hard interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HardMode {
    Breath,
    Tap,
    Stillness,
}

/// Which delivery state machine is (or was) driving an intervention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Breath,
    Tap,
    Stillness,
    MicroClosure,
}

impl From<HardMode> for DeliveryMode {
    fn from(mode: HardMode) -> Self {
        match mode {
            HardMode::Breath => DeliveryMode::Breath,
            HardMode::Tap => DeliveryMode::Tap,
            HardMode::Stillness => DeliveryMode::Stillness,
        }
    }
}

/// Why the decision gate fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trigger {
    HardLimit,
    SoftSignal,
    None,
}

/// Directive kinds understood by the host page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    None,
    PresenceSignal,
    MicroClosure,
    HardInterrupt,
}

/// An intervention directive returned to the host page.
///
/// `mode` is set only for hard interrupts. `category` carries the selector
/// category that produced the directive; a `gentle_reflection` selection is
/// delivered through the micro-closure prompt surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    #[serde(rename = "type")]
    pub kind: DirectiveKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<HardMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<InterventionCategory>,
    pub trigger: Trigger,
}

impl Directive {
    /// The silent directive: nothing is rendered, nothing is tracked
    pub fn none() -> Self {
        Self {
            kind: DirectiveKind::None,
            mode: None,
            category: None,
            trigger: Trigger::None,
        }
    }

    /// Build a directive from a selected category
    pub fn from_category(category: InterventionCategory, trigger: Trigger) -> Self {
        let kind = match category {
            InterventionCategory::PresenceSignal => DirectiveKind::PresenceSignal,
            InterventionCategory::MicroClosure | InterventionCategory::GentleReflection => {
                DirectiveKind::MicroClosure
            }
            InterventionCategory::HardInterrupt => DirectiveKind::HardInterrupt,
        };
        Self {
            kind,
            mode: None,
            category: Some(category),
            trigger,
        }
    }

    /// Build a hard-interrupt directive carrying a concrete ritual mode
    pub fn hard_interrupt(mode: HardMode, trigger: Trigger) -> Self {
        Self {
            kind: DirectiveKind::HardInterrupt,
            mode: Some(mode),
            category: Some(InterventionCategory::HardInterrupt),
            trigger,
        }
    }

    pub fn is_none(&self) -> bool {
        self.kind == DirectiveKind::None
    }
}

/// Terminal outcome of one delivery state machine run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReactionAction {
    Completed,
    Ignored,
    Snoozed,
    TimeoutIgnored,
    FastDismissByScroll,
    AutoDismissedByScroll,
}

/// One shown intervention, alive from `SHOWN` until its `REACTION` is emitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionInstance {
    pub id: Uuid,
    pub mode: DeliveryMode,
    pub shown_at_ms: i64,
}

impl InterventionInstance {
    pub fn new(mode: DeliveryMode, shown_at_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            shown_at_ms,
        }
    }
}

/// Telemetry emitted by the delivery state machines.
///
/// Exactly one `Shown` and at most one `Reaction` are emitted per
/// intervention instance. Timestamps serialize as RFC3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TelemetryEvent {
    Shown {
        intervention_id: Uuid,
        mode: DeliveryMode,
        shown_at: DateTime<Utc>,
    },
    Reaction {
        action: ReactionAction,
        mode: DeliveryMode,
        intervention_id: Uuid,
        shown_at: DateTime<Utc>,
        reacted_at: DateTime<Utc>,
        duration_ms: i64,
    },
}

impl TelemetryEvent {
    pub fn shown(instance: &InterventionInstance) -> Self {
        Self::Shown {
            intervention_id: instance.id,
            mode: instance.mode,
            shown_at: datetime_from_ms(instance.shown_at_ms),
        }
    }

    pub fn reaction(instance: &InterventionInstance, action: ReactionAction, now_ms: i64) -> Self {
        Self::Reaction {
            action,
            mode: instance.mode,
            intervention_id: instance.id,
            shown_at: datetime_from_ms(instance.shown_at_ms),
            reacted_at: datetime_from_ms(now_ms),
            duration_ms: now_ms - instance.shown_at_ms,
        }
    }
}

/// Convert an epoch-millisecond timestamp to a UTC datetime.
///
/// Out-of-range values clamp to the epoch rather than panic; the engine only
/// ever sees host-provided clocks.
pub fn datetime_from_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
