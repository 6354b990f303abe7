//! Intervention category selection
//!
//! Picks one of the four intervention categories (or none) from a strategy
//! and the session selection context. Rule order matters and is fixed:
//! fatigue silence, conservative exclusion, anti-repeat exclusion, the intent
//! decision table, then post-selection validation with graceful fallback.
//! The selector is a pure function of its inputs.

use crate::strategy::{Fatigue, Intensity, Intent, RiskTolerance, SelectionContext, Strategy};
use crate::types::InterventionCategory;

use InterventionCategory::{GentleReflection, HardInterrupt, MicroClosure, PresenceSignal};

/// Select a category, or `None` for full silence.
pub fn select_category(strategy: &Strategy, context: &SelectionContext) -> Option<InterventionCategory> {
    let aggressive = strategy.risk_tolerance == RiskTolerance::Aggressive;

    // Rule 1: high fatigue silences everything unless the strategy is aggressive
    if context.intervention_fatigue == Fatigue::High && !aggressive {
        return None;
    }

    // Candidates in intrusiveness order
    let mut candidates = vec![PresenceSignal, MicroClosure, GentleReflection, HardInterrupt];

    // Rule 2: conservative strategies never hard-interrupt
    if strategy.risk_tolerance == RiskTolerance::Conservative {
        candidates.retain(|c| *c != HardInterrupt);
    }

    // Rule 3: anti-repeat, except for presence signals and aggressive strategies
    if let Some(recent) = context.recent_category {
        if recent != PresenceSignal && !aggressive {
            candidates.retain(|c| *c != recent);
        }
    }

    let chosen = decision_table(strategy)?;

    if candidates.contains(&chosen) {
        return Some(chosen);
    }

    // The table picked an excluded category: degrade rather than go silent
    // when the caller signaled urgency, silent otherwise.
    if aggressive && candidates.contains(&MicroClosure) {
        return Some(MicroClosure);
    }
    if candidates.contains(&PresenceSignal) {
        return Some(PresenceSignal);
    }
    None
}

fn decision_table(strategy: &Strategy) -> Option<InterventionCategory> {
    match strategy.intent {
        Intent::ReduceResistance => Some(PresenceSignal),
        Intent::RestoreAwareness => {
            if strategy.intensity == Intensity::Low {
                Some(PresenceSignal)
            } else {
                Some(GentleReflection)
            }
        }
        Intent::EnableClosure => {
            if strategy.intensity == Intensity::High
                && strategy.risk_tolerance == RiskTolerance::Aggressive
            {
                Some(HardInterrupt)
            } else {
                // Covers both the remembered-preference case
                // (last_successful_intervention == micro_closure at high
                // intensity) and the default.
                Some(MicroClosure)
            }
        }
        Intent::GentleReflection => Some(GentleReflection),
        Intent::Unknown => None,
    }
}
