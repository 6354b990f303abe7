//! Behavioral signal aggregation
//!
//! This module turns raw page events into the rolling-window observation
//! frame and the decision inputs derived from it.
//!
//! Pipeline: raw events → SignalTracker → ObservationFrame → RiskEvaluator +
//! QuotaTracker → DecisionSignals

pub mod frame;
pub mod risk;
pub mod tracker;

pub use frame::{
    ActionWindow, BehaviorWindow, DecisionSignals, ObservationFrame, PageMeta, PageType,
};
pub use risk::{derive_signals, QuotaTracker, RiskAssessment, RiskEvaluator};
pub use tracker::{ActionKind, SignalTracker};
