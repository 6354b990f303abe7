//! Risk decision gate
//!
//! A pure, side-effect-free gate over the derived decision signals. All state
//! (quota, history) lives upstream in the signal and quota providers; keeping
//! the gate stateless keeps it trivially testable.

use serde::{Deserialize, Serialize};

use crate::signals::DecisionSignals;
use crate::types::Trigger;

/// Outcome of one gate evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub safe_to_scroll: bool,
    pub trigger: Trigger,
    pub meta: DecisionSignals,
}

/// Evaluate the gate for one tick.
///
/// `needs_processing = (attention_risk OR approaching_risk) AND cap_ok`;
/// the hard flag takes precedence for the trigger.
pub fn decide(signals: &DecisionSignals) -> GateDecision {
    let needs_processing = (signals.attention_risk || signals.approaching_risk) && signals.cap_ok;

    let trigger = if !needs_processing {
        Trigger::None
    } else if signals.attention_risk {
        Trigger::HardLimit
    } else {
        Trigger::SoftSignal
    };

    GateDecision {
        safe_to_scroll: !needs_processing,
        trigger,
        meta: *signals,
    }
}
