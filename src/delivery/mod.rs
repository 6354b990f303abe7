//! Delivery state machines
//!
//! Each intervention is adjudicated by a timed, cancellable state machine:
//! breath hold, tap-and-hold, stillness, or the micro-closure prompt. The
//! machines share three rules: at most one outstanding deadline per machine
//! (every transition cancels before it arms), one `SHOWN` event on entry, and
//! exactly one `REACTION` per intervention instance no matter how many
//! terminal triggers race in.
//!
//! Machines are advanced by a cooperative `tick(now_ms)` sampled from a
//! monotonic clock and fed explicit input events; they never read time
//! themselves.

pub mod breath;
pub mod closure;
pub mod stillness;
pub mod tap_hold;

pub use breath::{BreathLabel, BreathMachine, BreathState};
pub use closure::{ClosureAction, DismissClass, MicroClosureMachine, ScrollTracker};
pub use stillness::{StillnessMachine, StillnessState};
pub use tap_hold::{TapHoldMachine, TapState};

use crate::types::{InterventionInstance, ReactionAction, TelemetryEvent};

/// One-shot guard around `REACTION` emission.
///
/// Terminal transitions call `fire`; only the first call per instance yields
/// an event. The flag flips before the event is handed back, so re-entrant
/// triggers (rapid double-release, a timer racing an input) cannot double-emit.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReactionLatch {
    fired: bool,
}

impl ReactionLatch {
    pub(crate) fn fire(
        &mut self,
        instance: &InterventionInstance,
        action: ReactionAction,
        now_ms: i64,
    ) -> Option<TelemetryEvent> {
        if self.fired {
            return None;
        }
        self.fired = true;
        Some(TelemetryEvent::reaction(instance, action, now_ms))
    }
}

/// The currently active delivery machine, if any.
///
/// The engine holds at most one of these at a time; the variant mirrors the
/// dispatched directive.
#[derive(Debug)]
pub enum ActiveDelivery {
    Breath(BreathMachine),
    Tap(TapHoldMachine),
    Stillness(StillnessMachine),
    Closure(MicroClosureMachine),
}

impl ActiveDelivery {
    pub fn instance(&self) -> &InterventionInstance {
        match self {
            ActiveDelivery::Breath(m) => m.instance(),
            ActiveDelivery::Tap(m) => m.instance(),
            ActiveDelivery::Stillness(m) => m.instance(),
            ActiveDelivery::Closure(m) => m.instance(),
        }
    }

    pub fn tick(&mut self, now_ms: i64) -> Option<TelemetryEvent> {
        match self {
            ActiveDelivery::Breath(m) => m.tick(now_ms),
            ActiveDelivery::Tap(m) => m.tick(now_ms),
            ActiveDelivery::Stillness(m) => m.tick(now_ms),
            ActiveDelivery::Closure(m) => m.tick(now_ms),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            ActiveDelivery::Breath(m) => m.is_terminal(),
            ActiveDelivery::Tap(m) => m.is_terminal(),
            ActiveDelivery::Stillness(m) => m.is_terminal(),
            ActiveDelivery::Closure(m) => m.is_terminal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeliveryMode;

    #[test]
    fn test_latch_fires_once() {
        let instance = InterventionInstance::new(DeliveryMode::Breath, 0);
        let mut latch = ReactionLatch::default();

        assert!(latch.fire(&instance, ReactionAction::Completed, 5_000).is_some());
        assert!(latch.fire(&instance, ReactionAction::Ignored, 5_001).is_none());
    }
}
