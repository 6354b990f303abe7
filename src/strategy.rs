//! Strategy resolution
//!
//! The selector consumes an opaque strategy: an intent plus intensity and
//! risk tolerance. Strategies normally come from an external classifier
//! (optionally AI-assisted); when the classifier times out, fails, or returns
//! a low-confidence hint, the engine falls back to a conservative heuristic
//! derived from the gate trigger and the frame. Resolution never blocks the
//! tick and never propagates classifier errors.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::signals::{DecisionSignals, ObservationFrame};
use crate::types::InterventionCategory;

/// Minimum classifier confidence to accept a hint over the heuristic
const MIN_HINT_CONFIDENCE: f64 = 0.5;

/// Scroll-back count that marks a window as heavy re-reading
const HEAVY_RE_READ_COUNT: u32 = 3;

/// What the intervention is trying to accomplish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ReduceResistance,
    RestoreAwareness,
    EnableClosure,
    GentleReflection,
    /// Unrecognized intents select nothing
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Conservative,
    Balanced,
    Aggressive,
}

/// Opaque strategy input to the category selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub intent: Intent,
    pub intensity: Intensity,
    pub risk_tolerance: RiskTolerance,
}

/// Session-scoped anti-repeat and preference memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionContext {
    pub intervention_fatigue: Fatigue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_category: Option<InterventionCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_successful_intervention: Option<InterventionCategory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fatigue {
    Low,
    High,
}

impl Default for SelectionContext {
    fn default() -> Self {
        Self {
            intervention_fatigue: Fatigue::Low,
            recent_category: None,
            last_successful_intervention: None,
        }
    }
}

/// Classification hint from the external (optionally AI-assisted) collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierHint {
    pub recommend: bool,
    pub mode: Intent,
    pub confidence: f64,
    #[serde(default)]
    pub cooldown_s: u32,
}

/// Resolve the strategy for this tick.
///
/// `hint` is `None` when no classifier is wired in; an `Err` hint is a
/// collaborator timeout or schema violation and degrades to the heuristic
/// with a warning.
pub fn resolve_strategy(
    hint: Option<Result<ClassifierHint, EngineError>>,
    frame: &ObservationFrame,
    signals: &DecisionSignals,
) -> Strategy {
    match hint {
        Some(Ok(hint)) if hint.recommend && hint.confidence >= MIN_HINT_CONFIDENCE => {
            strategy_from_hint(&hint)
        }
        Some(Ok(_)) => heuristic_strategy(frame, signals),
        Some(Err(err)) => {
            warn!("classifier unavailable, using heuristic strategy: {err}");
            heuristic_strategy(frame, signals)
        }
        None => heuristic_strategy(frame, signals),
    }
}

fn strategy_from_hint(hint: &ClassifierHint) -> Strategy {
    let intensity = if hint.confidence >= 0.8 {
        Intensity::High
    } else if hint.confidence >= 0.65 {
        Intensity::Medium
    } else {
        Intensity::Low
    };
    Strategy {
        intent: hint.mode,
        intensity,
        risk_tolerance: RiskTolerance::Balanced,
    }
}

/// Conservative fallback strategy from the frame and gate inputs
pub fn heuristic_strategy(frame: &ObservationFrame, signals: &DecisionSignals) -> Strategy {
    if signals.attention_risk {
        return Strategy {
            intent: Intent::EnableClosure,
            intensity: Intensity::High,
            risk_tolerance: RiskTolerance::Balanced,
        };
    }
    if signals.approaching_risk
        && frame.behavior_60s.scroll_back_events >= HEAVY_RE_READ_COUNT
    {
        return Strategy {
            intent: Intent::RestoreAwareness,
            intensity: Intensity::Medium,
            risk_tolerance: RiskTolerance::Balanced,
        };
    }
    Strategy {
        intent: Intent::ReduceResistance,
        intensity: Intensity::Low,
        risk_tolerance: RiskTolerance::Conservative,
    }
}
