//! Driftguard - Attention-intervention decision and delivery engine
//!
//! Driftguard turns rolling behavioral signals from a browsing session into
//! intervention directives through a deterministic pipeline: signal
//! aggregation → risk gating → strategy resolution → category selection →
//! timed delivery state machines. A parallel escalation tracker enforces a
//! per-domain work/break focus schedule with cooldowns, allow-windows, and a
//! deterministic hard-mode cycle.
//!
//! ## Modules
//!
//! - **signals**: rolling 60 s observation frames, risk scoring, quota
//! - **gate / strategy / selector**: the decision boundary
//! - **escalation**: focus-mode attempt counting and hard-mode cycling
//! - **delivery**: breath, tap-and-hold, stillness, and micro-closure
//!   state machines with exactly-once telemetry
//! - **engine**: tick orchestration, mutual exclusion, debounces
//!
//! The engine renders nothing and persists nothing: storage, transport,
//! classification, and telemetry are collaborator traits in [`ports`]. All
//! timing is injected epoch milliseconds, so every rule is deterministic
//! under test.

pub mod delivery;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod gate;
pub mod ports;
pub mod selector;
pub mod signals;
pub mod strategy;
pub mod types;

pub use engine::{Engine, EngineConfig};
pub use error::EngineError;
pub use gate::{decide, GateDecision};
pub use selector::select_category;

// Signal exports
pub use signals::{
    ActionKind, DecisionSignals, ObservationFrame, PageMeta, PageType, QuotaTracker,
    RiskEvaluator, SignalTracker,
};

// Escalation exports
pub use escalation::{
    AttemptOutcome, EscalationTier, EscalationTracker, FocusState, HardModeConfig, Phase,
};

// Strategy exports
pub use strategy::{
    ClassifierHint, Fatigue, Intensity, Intent, RiskTolerance, SelectionContext, Strategy,
};

// Shared type exports
pub use types::{
    DeliveryMode, Directive, DirectiveKind, HardMode, InterventionCategory, InterventionInstance,
    ReactionAction, TelemetryEvent, Trigger,
};

/// Crate version, for hosts stamping telemetry payloads
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
