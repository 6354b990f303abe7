//! Collaborator interfaces
//!
//! The engine renders nothing and persists nothing. Storage, transport,
//! classification, and telemetry are reached through these traits; the
//! implementations live in the host. Every call site treats the collaborators
//! as unreliable: classification falls back to the heuristic strategy, a
//! missing directive receiver is a normal outcome, and telemetry is
//! fire-and-forget.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::escalation::FocusState;
use crate::signals::ObservationFrame;
use crate::strategy::ClassifierHint;
use crate::types::{Directive, TelemetryEvent};

/// Optional (possibly AI-assisted) classification of an observation frame
pub trait Classifier {
    fn classify(&mut self, frame: &ObservationFrame) -> Result<ClassifierHint, EngineError>;
}

/// Partial update applied to the persisted focus state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FocusStatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<FocusState>,
}

impl FocusStatePatch {
    pub fn replace(state: FocusState) -> Self {
        Self { state: Some(state) }
    }
}

/// Persistent focus-state store, eventually consistent across processes.
///
/// Reads are snapshots that may be stale by one round trip; the engine's
/// enforcement checks re-read and are idempotent, so staleness delays
/// correction but never corrupts state.
pub trait FocusStore {
    fn read(&mut self, domain: &str) -> Result<Option<FocusState>, EngineError>;
    fn write(&mut self, patch: FocusStatePatch) -> Result<(), EngineError>;
}

/// Fire-and-forget telemetry sink
pub trait TelemetrySink {
    fn log_event(&mut self, event: TelemetryEvent);
}

/// Acknowledgement from the rendering context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack;

/// There was no receiver for the directive. A normal, expected outcome
/// (the rendering context may not be attached), not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoReceiver;

/// Cross-process delivery of directives to the rendering context
pub trait DirectiveBus {
    fn send(&mut self, directive: &Directive) -> Result<Ack, NoReceiver>;
}

/// In-memory collaborators for tests and embedding without a host.
pub mod memory {
    use super::*;

    /// Classifier that always reports unavailable
    #[derive(Debug, Default)]
    pub struct NullClassifier;

    impl Classifier for NullClassifier {
        fn classify(&mut self, _frame: &ObservationFrame) -> Result<ClassifierHint, EngineError> {
            Err(EngineError::ClassifierUnavailable("not configured".into()))
        }
    }

    /// Classifier returning a fixed hint
    #[derive(Debug)]
    pub struct FixedClassifier(pub ClassifierHint);

    impl Classifier for FixedClassifier {
        fn classify(&mut self, _frame: &ObservationFrame) -> Result<ClassifierHint, EngineError> {
            Ok(self.0.clone())
        }
    }

    /// Single-process in-memory focus store
    #[derive(Debug, Default)]
    pub struct MemoryFocusStore {
        current: Option<FocusState>,
    }

    impl MemoryFocusStore {
        pub fn with_state(state: FocusState) -> Self {
            Self {
                current: Some(state),
            }
        }

        pub fn current(&self) -> Option<&FocusState> {
            self.current.as_ref()
        }
    }

    impl FocusStore for MemoryFocusStore {
        fn read(&mut self, _domain: &str) -> Result<Option<FocusState>, EngineError> {
            Ok(self.current.clone())
        }

        fn write(&mut self, patch: FocusStatePatch) -> Result<(), EngineError> {
            if let Some(state) = patch.state {
                self.current = Some(state);
            }
            Ok(())
        }
    }

    /// Telemetry sink that records every event
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub events: Vec<TelemetryEvent>,
    }

    impl TelemetrySink for RecordingSink {
        fn log_event(&mut self, event: TelemetryEvent) {
            self.events.push(event);
        }
    }

    /// Bus that records directives; optionally simulates a missing receiver
    #[derive(Debug, Default)]
    pub struct RecordingBus {
        pub sent: Vec<Directive>,
        pub no_receiver: bool,
    }

    impl DirectiveBus for RecordingBus {
        fn send(&mut self, directive: &Directive) -> Result<Ack, NoReceiver> {
            if self.no_receiver {
                return Err(NoReceiver);
            }
            self.sent.push(directive.clone());
            Ok(Ack)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::*;
    use super::*;
    use crate::types::{Directive, HardMode, Trigger};

    #[test]
    fn test_no_receiver_is_an_expected_outcome() {
        let mut bus = RecordingBus {
            no_receiver: true,
            ..RecordingBus::default()
        };
        let directive = Directive::hard_interrupt(HardMode::Breath, Trigger::HardLimit);
        assert_eq!(bus.send(&directive), Err(NoReceiver));
    }

    #[test]
    fn test_memory_store_round_trip() {
        use crate::escalation::{FocusState, Phase};

        let mut store = MemoryFocusStore::default();
        assert!(store.read("feed.example").unwrap().is_none());

        let state = FocusState::new(Phase::Work, 0, 1_000);
        store.write(FocusStatePatch::replace(state.clone())).unwrap();
        assert_eq!(store.read("feed.example").unwrap(), Some(state));
    }
}
