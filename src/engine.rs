//! Engine orchestration
//!
//! Ties the pipeline together: each 5 s tick builds an observation frame,
//! derives decision signals, runs the gate, resolves a strategy, selects a
//! category, and dispatches the resulting directive. Blocked-navigation
//! reports from the focus subsystem run through a debounced enforcement
//! check against the persisted focus state. The engine owns the delivery
//! machines and the concurrency rules around them: one machine at a time,
//! a single-slot pending micro-closure, an idle-delay abort, and a bounded
//! dedup set for inbound result messages.
//!
//! Any internal error on the tick path degrades to the silent directive;
//! the intervention system must never itself become a source of frustration.

use std::collections::VecDeque;

use log::{debug, warn};

use crate::delivery::{
    ActiveDelivery, BreathMachine, ClosureAction, MicroClosureMachine, StillnessMachine,
    TapHoldMachine,
};
use crate::escalation::{AttemptOutcome, EscalationTier, EscalationTracker, HardModeConfig, Phase};
use crate::gate::{decide, GateDecision};
use crate::ports::{Classifier, DirectiveBus, FocusStatePatch, FocusStore, TelemetrySink};
use crate::selector::select_category;
use crate::signals::{
    derive_signals, ActionKind, ObservationFrame, PageMeta, QuotaTracker, SignalTracker,
};
use crate::strategy::{resolve_strategy, Fatigue, SelectionContext};
use crate::types::{
    Directive, DirectiveKind, HardMode, InterventionCategory, ReactionAction, TelemetryEvent,
    Trigger,
};

/// Engine timing and quota configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Tick cadence expected from the host
    pub tick_interval_ms: i64,
    /// Coalescing window for enforcement requests
    pub enforce_debounce_ms: i64,
    /// Idle delay before a scheduled micro-closure becomes visible
    pub idle_delay_ms: i64,
    /// Bounded seen-set size for result dedup
    pub seen_capacity: usize,
    /// Daily intervention cap
    pub daily_cap: u32,
    /// Interventions shown today at which fatigue flips high
    pub fatigue_at: u32,
    /// Hard mode used for attention-path interrupts (the escalation path
    /// cycles through its own sequence)
    pub default_hard_mode: HardMode,
    pub hard: HardModeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            enforce_debounce_ms: 100,
            idle_delay_ms: 2_500,
            seen_capacity: 50,
            daily_cap: 6,
            fatigue_at: 4,
            default_hard_mode: HardMode::Breath,
            hard: HardModeConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingClosure {
    requested_at_ms: i64,
    directive: Directive,
}

#[derive(Debug, Clone)]
struct PendingEnforcement {
    domain: String,
    due_at_ms: i64,
}

/// The attention-intervention engine for one browsing-tab context
pub struct Engine<C, F, T, B> {
    config: EngineConfig,
    classifier: C,
    store: F,
    telemetry: T,
    bus: B,

    tracker: SignalTracker,
    quota: QuotaTracker,
    escalation: EscalationTracker,
    context: SelectionContext,

    active: Option<ActiveDelivery>,
    active_category: Option<InterventionCategory>,
    pending_closure: Option<PendingClosure>,
    pending_enforcement: Option<PendingEnforcement>,

    document_hidden: bool,
    last_tick_ms: Option<i64>,
    last_interaction_at_ms: Option<i64>,
    scrolled_since_tick: bool,
    seen_results: VecDeque<String>,
}

impl<C, F, T, B> Engine<C, F, T, B>
where
    C: Classifier,
    F: FocusStore,
    T: TelemetrySink,
    B: DirectiveBus,
{
    pub fn new(classifier: C, store: F, telemetry: T, bus: B) -> Self {
        Self::with_config(EngineConfig::default(), classifier, store, telemetry, bus)
    }

    pub fn with_config(
        config: EngineConfig,
        classifier: C,
        store: F,
        telemetry: T,
        bus: B,
    ) -> Self {
        let quota = QuotaTracker::new(config.daily_cap);
        let escalation = EscalationTracker::new(config.hard.clone());
        Self {
            config,
            classifier,
            store,
            telemetry,
            bus,
            tracker: SignalTracker::new(),
            quota,
            escalation,
            context: SelectionContext::default(),
            active: None,
            active_category: None,
            pending_closure: None,
            pending_enforcement: None,
            document_hidden: false,
            last_tick_ms: None,
            last_interaction_at_ms: None,
            scrolled_since_tick: false,
            seen_results: VecDeque::new(),
        }
    }

    pub fn is_intervention_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn selection_context(&self) -> &SelectionContext {
        &self.context
    }

    // ------------------------------------------------------------------
    // Signal inputs
    // ------------------------------------------------------------------

    /// A scroll event: `y` is the page scroll position, `delta_px` the
    /// signed delta. Counts as a qualifying interaction.
    pub fn on_scroll(&mut self, now_ms: i64, y: f64, delta_px: f64) {
        self.tracker.record_scroll(now_ms, delta_px);
        self.scrolled_since_tick = true;
        self.note_interaction(now_ms);

        let mut events = Vec::new();
        if let Some(ActiveDelivery::Closure(machine)) = self.active.as_mut() {
            events.extend(machine.scroll(now_ms, y));
        }
        self.flush(events);
    }

    /// A deliberate user action (select, copy, find, ...). Counts as a
    /// qualifying interaction.
    pub fn on_action(&mut self, now_ms: i64, kind: ActionKind) {
        self.tracker.record_action(now_ms, kind);
        self.note_interaction(now_ms);
    }

    /// Record a qualifying interaction (click, keydown, scroll). The host
    /// must not report mousemove here; pointer movement does not cancel a
    /// scheduled micro-closure.
    pub fn note_interaction(&mut self, now_ms: i64) {
        self.last_interaction_at_ms = Some(now_ms);
    }

    /// Document visibility change
    pub fn visibility_change(&mut self, hidden: bool, now_ms: i64) {
        self.document_hidden = hidden;
        if let Some(ActiveDelivery::Closure(machine)) = self.active.as_mut() {
            machine.visibility(hidden, now_ms);
        }
    }

    // ------------------------------------------------------------------
    // Tick pipeline
    // ------------------------------------------------------------------

    /// The periodic 5 s tick. Skipped while the document is hidden or an
    /// intervention is active; the last-tick timestamp advances regardless so
    /// a resume does not see a false elapsed-time spike.
    pub fn on_tick(&mut self, now_ms: i64, page: PageMeta) -> Directive {
        if self.document_hidden || self.active.is_some() {
            self.last_tick_ms = Some(now_ms);
            self.scrolled_since_tick = false;
            return Directive::none();
        }

        if self.scrolled_since_tick {
            let elapsed_ms = self
                .last_tick_ms
                .map(|last| (now_ms - last).clamp(0, self.config.tick_interval_ms))
                .unwrap_or(self.config.tick_interval_ms);
            self.tracker
                .record_active_tick(now_ms, elapsed_ms as f64 / 1_000.0);
        }
        self.last_tick_ms = Some(now_ms);
        self.scrolled_since_tick = false;

        let frame = self.tracker.frame(now_ms, page);
        let signals = derive_signals(&frame, &mut self.quota, now_ms);
        let decision = decide(&signals);
        if decision.safe_to_scroll {
            return Directive::none();
        }

        self.decide_intervention(&frame, &decision, now_ms)
    }

    fn decide_intervention(
        &mut self,
        frame: &ObservationFrame,
        decision: &GateDecision,
        now_ms: i64,
    ) -> Directive {
        let hint = self.classifier.classify(frame);
        let strategy = resolve_strategy(Some(hint), frame, &decision.meta);

        let mut context = self.context;
        context.intervention_fatigue = if self.quota.shown_today() >= self.config.fatigue_at {
            Fatigue::High
        } else {
            Fatigue::Low
        };

        let Some(category) = select_category(&strategy, &context) else {
            return Directive::none();
        };

        let directive = match category {
            InterventionCategory::HardInterrupt => {
                Directive::hard_interrupt(self.config.default_hard_mode, decision.trigger)
            }
            other => Directive::from_category(other, decision.trigger),
        };
        self.dispatch(directive.clone(), now_ms);
        directive
    }

    // ------------------------------------------------------------------
    // Dispatch and delivery
    // ------------------------------------------------------------------

    /// Drive the directive's delivery. Presence signals go straight to the
    /// rendering context; micro-closures enter the single pending slot and
    /// become visible after the idle delay; hard interrupts start their
    /// machine immediately. Returns `false` when the directive was dropped
    /// (silent directive, machine already active, slot occupied).
    pub fn dispatch(&mut self, directive: Directive, now_ms: i64) -> bool {
        match directive.kind {
            DirectiveKind::None => false,
            DirectiveKind::PresenceSignal => {
                self.context.recent_category = directive.category;
                self.quota.record_shown(now_ms);
                self.send(&directive);
                true
            }
            DirectiveKind::MicroClosure => {
                if self.active.is_some() || self.pending_closure.is_some() {
                    debug!("micro-closure request dropped: slot occupied");
                    return false;
                }
                self.pending_closure = Some(PendingClosure {
                    requested_at_ms: now_ms,
                    directive,
                });
                true
            }
            DirectiveKind::HardInterrupt => {
                if self.active.is_some() {
                    debug!("hard interrupt dropped: intervention already active");
                    return false;
                }
                let mode = directive.mode.unwrap_or(self.config.default_hard_mode);
                let (machine, shown) = match mode {
                    HardMode::Breath => {
                        let (m, s) = BreathMachine::new(now_ms);
                        (ActiveDelivery::Breath(m), s)
                    }
                    HardMode::Tap => {
                        let (m, s) = TapHoldMachine::new(now_ms);
                        (ActiveDelivery::Tap(m), s)
                    }
                    HardMode::Stillness => {
                        let (m, s) = StillnessMachine::new(now_ms);
                        (ActiveDelivery::Stillness(m), s)
                    }
                };
                self.active = Some(machine);
                self.active_category = directive
                    .category
                    .or(Some(InterventionCategory::HardInterrupt));
                self.context.recent_category = self.active_category;
                self.quota.record_shown(now_ms);
                self.telemetry.log_event(shown);
                self.send(&directive);
                true
            }
        }
    }

    /// Run due timers: the pending micro-closure activation and the debounced
    /// enforcement check. Call at the cooperative scheduler cadence together
    /// with `tick_delivery`. Returns a directive when enforcement or
    /// activation produced one (enforcement takes precedence).
    pub fn poll(&mut self, now_ms: i64) -> Option<Directive> {
        let activated = self.activate_pending_closure(now_ms);
        let enforced = self.run_pending_enforcement(now_ms);
        enforced.or(activated)
    }

    fn activate_pending_closure(&mut self, now_ms: i64) -> Option<Directive> {
        let pending = self.pending_closure.as_ref()?;
        if now_ms - pending.requested_at_ms < self.config.idle_delay_ms {
            return None;
        }
        let pending = self.pending_closure.take()?;

        // A qualifying interaction after the request aborts the show
        let interacted = self
            .last_interaction_at_ms
            .map(|at| at > pending.requested_at_ms)
            .unwrap_or(false);
        if interacted {
            debug!("scheduled micro-closure aborted by interaction");
            return None;
        }
        if self.active.is_some() {
            return None;
        }

        let (machine, shown) = MicroClosureMachine::new(now_ms);
        self.active = Some(ActiveDelivery::Closure(machine));
        self.active_category = pending
            .directive
            .category
            .or(Some(InterventionCategory::MicroClosure));
        self.context.recent_category = self.active_category;
        self.quota.record_shown(now_ms);
        self.telemetry.log_event(shown);
        self.send(&pending.directive);
        Some(pending.directive)
    }

    fn run_pending_enforcement(&mut self, now_ms: i64) -> Option<Directive> {
        let pending = self.pending_enforcement.as_ref()?;
        if now_ms < pending.due_at_ms {
            return None;
        }
        let pending = self.pending_enforcement.take()?;
        self.enforce(&pending.domain, now_ms)
    }

    /// Advance the active delivery machine's timers
    pub fn tick_delivery(&mut self, now_ms: i64) {
        let event = self.active.as_mut().and_then(|m| m.tick(now_ms));
        self.flush(event.into_iter().collect());
    }

    // ------------------------------------------------------------------
    // Delivery machine inputs
    // ------------------------------------------------------------------

    pub fn press(&mut self, now_ms: i64) {
        self.note_interaction(now_ms);
        match self.active.as_mut() {
            Some(ActiveDelivery::Breath(m)) => m.press(now_ms),
            Some(ActiveDelivery::Tap(m)) => m.press(now_ms),
            _ => {}
        }
    }

    pub fn release(&mut self, now_ms: i64) {
        let event = match self.active.as_mut() {
            Some(ActiveDelivery::Breath(m)) => m.release(now_ms),
            Some(ActiveDelivery::Tap(m)) => m.release(now_ms),
            _ => None,
        };
        self.flush(event.into_iter().collect());
    }

    pub fn pointer_move(&mut self, now_ms: i64) {
        let event = match self.active.as_mut() {
            Some(ActiveDelivery::Stillness(m)) => m.pointer_move(now_ms),
            _ => None,
        };
        self.flush(event.into_iter().collect());
    }

    pub fn hover_start(&mut self, now_ms: i64) {
        if let Some(ActiveDelivery::Closure(m)) = self.active.as_mut() {
            m.hover_start(now_ms);
        }
    }

    pub fn hover_end(&mut self, now_ms: i64) {
        if let Some(ActiveDelivery::Closure(m)) = self.active.as_mut() {
            m.hover_end(now_ms);
        }
    }

    pub fn closure_action(&mut self, action: ClosureAction, now_ms: i64) {
        let event = match self.active.as_mut() {
            Some(ActiveDelivery::Closure(m)) => m.choose(action, now_ms),
            _ => None,
        };
        self.flush(event.into_iter().collect());
    }

    // ------------------------------------------------------------------
    // Focus-mode enforcement
    // ------------------------------------------------------------------

    /// Report a blocked-navigation attempt. Bursts within the debounce window
    /// coalesce into a single enforcement check run by `poll`.
    pub fn request_enforcement(&mut self, domain: &str, now_ms: i64) {
        match self.pending_enforcement.as_mut() {
            Some(pending) => {
                // Coalesce: keep the window, track the latest domain
                pending.domain = domain.to_string();
            }
            None => {
                self.pending_enforcement = Some(PendingEnforcement {
                    domain: domain.to_string(),
                    due_at_ms: now_ms + self.config.enforce_debounce_ms,
                });
            }
        }
    }

    fn enforce(&mut self, domain: &str, now_ms: i64) -> Option<Directive> {
        let state = match self.store.read(domain) {
            Ok(state) => state?,
            Err(err) => {
                warn!("focus-state read failed, skipping enforcement: {err}");
                return None;
            }
        };
        if !state.enabled || state.phase != Phase::Work || now_ms >= state.phase_ends_at_ms {
            return None;
        }

        let mut state = state;
        let outcome = self.escalation.register_attempt(&mut state, domain, now_ms);

        if let Err(err) = self.store.write(FocusStatePatch::replace(state)) {
            warn!("focus-state write failed: {err}");
        }

        match outcome {
            AttemptOutcome::Allowed | AttemptOutcome::CoolingDown => None,
            AttemptOutcome::Escalate { tier, mode, .. } => match tier {
                EscalationTier::None => None,
                EscalationTier::Micro => {
                    let directive = Directive::from_category(
                        InterventionCategory::MicroClosure,
                        Trigger::HardLimit,
                    );
                    self.dispatch(directive.clone(), now_ms);
                    Some(directive)
                }
                EscalationTier::Hard => {
                    let mode = mode.unwrap_or(self.config.default_hard_mode);
                    let directive = Directive::hard_interrupt(mode, Trigger::HardLimit);
                    self.dispatch(directive.clone(), now_ms);
                    Some(directive)
                }
            },
        }
    }

    /// Grant a temporary allow-window for `domain`, if the per-phase quota
    /// remains. Read-modify-write against the store.
    pub fn grant_allow(&mut self, domain: &str, sec: u32, now_ms: i64) -> bool {
        let Ok(Some(mut state)) = self.store.read(domain) else {
            return false;
        };
        if !self.escalation.grant_allow(&mut state, domain, sec, now_ms) {
            return false;
        }
        if let Err(err) = self.store.write(FocusStatePatch::replace(state)) {
            warn!("focus-state write failed: {err}");
            return false;
        }
        true
    }

    /// Transition the persisted focus state to the next phase, clearing all
    /// phase-scoped counters and allow-windows.
    pub fn transition_phase(&mut self, phase: Phase, now_ms: i64, duration_ms: i64) {
        // The focus record is installation-wide; the domain key on reads is
        // only a routing hint for sharded stores.
        let Ok(Some(mut state)) = self.store.read("") else {
            return;
        };
        self.escalation
            .transition_phase(&mut state, phase, now_ms, duration_ms);
        if let Err(err) = self.store.write(FocusStatePatch::replace(state)) {
            warn!("focus-state write failed: {err}");
        }
    }

    // ------------------------------------------------------------------
    // Result dedup
    // ------------------------------------------------------------------

    /// Accept an inbound result message by request id. Returns `false` for
    /// duplicates; the seen-set is bounded and FIFO-evicted.
    pub fn accept_result(&mut self, request_id: &str) -> bool {
        if self.seen_results.iter().any(|id| id == request_id) {
            debug!("duplicate result message dropped: {request_id}");
            return false;
        }
        self.seen_results.push_back(request_id.to_string());
        while self.seen_results.len() > self.config.seen_capacity {
            self.seen_results.pop_front();
        }
        true
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn send(&mut self, directive: &Directive) {
        if self.bus.send(directive).is_err() {
            // No receiver attached is a normal outcome
            debug!("directive had no receiver");
        }
    }

    fn flush(&mut self, events: Vec<TelemetryEvent>) {
        let mut finished = false;
        for event in events {
            if let TelemetryEvent::Reaction { action, .. } = &event {
                if *action == ReactionAction::Completed {
                    self.context.last_successful_intervention = self.active_category;
                }
                finished = true;
            }
            self.telemetry.log_event(event);
        }
        let terminal = self.active.as_ref().map(|m| m.is_terminal()).unwrap_or(false);
        if (finished || terminal) && self.active.take().is_some() {
            self.active_category = None;
        }
    }
}
