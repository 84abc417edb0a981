//! Progression engine: per-user phase state and gate evaluation.
//!
//! The engine is the only writer of a user's current phase. `evaluate`
//! decides whether the active gate is open; `transition` moves the user
//! without re-checking, so callers can force ritual-gated crossings.
//! `advance` does both under the user's lock.
//!
//! A gate opens when all of these hold:
//!
//! 1. the user has dwelt in the phase for the gate's minimum duration,
//! 2. every required condition is met (checked in order, short-circuiting),
//! 3. the weighted readiness `achieved / total` reaches the threshold,
//! 4. the `collective_resonance` signal reaches the gate's collective
//!    threshold, when that threshold is non-zero.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::context::ContextSnapshot;
use crate::gate::{self, GateRegistry, GateScore};
use crate::guidance::{self, PhaseGuidance};
use crate::phase::Phase;
use crate::store::UserStore;

/// Signal consulted by gates with a collective threshold.
pub const COLLECTIVE_RESONANCE: &str = "collective_resonance";

/// One entry in a user's phase history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: Phase,
    pub to: Phase,
    pub at: u64,
    /// Spiral the user was on when leaving `from`.
    pub spiral_count: u32,
    pub ritual_completed: bool,
}

/// A recorded breakthrough moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakthrough {
    pub at: u64,
    pub phase: Phase,
    pub data: BTreeMap<String, String>,
}

/// Phase state owned by the engine for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPhaseState {
    pub user_id: String,
    pub current_phase: Phase,
    pub phase_entry_time: u64,
    /// Conditions satisfied so far in the current phase.
    pub completed_conditions: BTreeSet<String>,
    pub phase_history: Vec<TransitionRecord>,
    /// Starts at 1; grows each time transcendence returns to initiation.
    pub spiral_count: u32,
    pub phase_resonance: f64,
    pub breakthrough_moments: Vec<Breakthrough>,
}

impl UserPhaseState {
    /// A user entering initiation at `now`.
    pub fn new(user_id: &str, now: u64, baseline_resonance: f64) -> Self {
        Self {
            user_id: user_id.to_string(),
            current_phase: Phase::Initiation,
            phase_entry_time: now,
            completed_conditions: BTreeSet::new(),
            phase_history: Vec::new(),
            spiral_count: 1,
            phase_resonance: baseline_resonance,
            breakthrough_moments: Vec::new(),
        }
    }

    /// Seconds spent in the current phase; clock skew reads as zero.
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.phase_entry_time)
    }
}

/// Outbound notification emitted for every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionNotice {
    pub user_id: String,
    pub from: Phase,
    pub to: Phase,
    /// Spiral count after the transition.
    pub spiral_count: u32,
    pub at: u64,
    pub ritual_completed: bool,
}

/// Why a gate is (not) open, with every condition scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub user_id: String,
    pub phase: Phase,
    pub next_phase: Phase,
    pub elapsed_secs: u64,
    pub minimum_duration_secs: u64,
    pub duration_met: bool,
    pub score: GateScore,
    pub readiness_met: bool,
    pub collective_threshold: f64,
    pub collective_met: bool,
    pub ready: bool,
}

/// Tunables for the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressionSettings {
    pub readiness_threshold: f64,
    pub baseline_resonance: f64,
    pub breakthrough_increment: f64,
}

impl Default for ProgressionSettings {
    fn default() -> Self {
        Self {
            readiness_threshold: 0.7,
            baseline_resonance: 0.5,
            breakthrough_increment: 0.1,
        }
    }
}

/// Per-user phase evaluator.
#[derive(Debug)]
pub struct ProgressionEngine {
    registry: Arc<GateRegistry>,
    states: UserStore<UserPhaseState>,
    clock: Arc<dyn Clock>,
    settings: ProgressionSettings,
}

impl ProgressionEngine {
    pub fn new(
        registry: Arc<GateRegistry>,
        clock: Arc<dyn Clock>,
        settings: ProgressionSettings,
    ) -> Self {
        Self {
            registry,
            states: UserStore::new(),
            clock,
            settings,
        }
    }

    pub fn registry(&self) -> &GateRegistry {
        &self.registry
    }

    pub fn settings(&self) -> ProgressionSettings {
        self.settings
    }

    /// Make sure `user_id` exists, entering initiation now if new.
    pub fn enroll(&self, user_id: &str) -> UserPhaseState {
        let now = self.clock.now();
        self.states.with(user_id, || self.fresh_state(user_id, now), |s| s.clone())
    }

    /// The phase `user_id` should move to, or `None` if the gate is closed.
    pub fn evaluate(&self, user_id: &str, ctx: &ContextSnapshot) -> Option<Phase> {
        let now = self.clock.now();
        self.states.with(
            user_id,
            || self.fresh_state(user_id, now),
            |state| self.evaluate_locked(state, ctx, now),
        )
    }

    /// Move `user_id` to `to` unconditionally.
    pub fn transition(&self, user_id: &str, to: Phase, ritual_completed: bool) -> TransitionNotice {
        let now = self.clock.now();
        self.states.with(
            user_id,
            || self.fresh_state(user_id, now),
            |state| self.transition_locked(state, to, ritual_completed, now),
        )
    }

    /// Evaluate and, when the gate is open, transition, atomically for this user.
    pub fn advance(
        &self,
        user_id: &str,
        ctx: &ContextSnapshot,
        ritual_completed: bool,
    ) -> Option<TransitionNotice> {
        let now = self.clock.now();
        self.states.with(
            user_id,
            || self.fresh_state(user_id, now),
            |state| {
                let to = self.evaluate_locked(state, ctx, now)?;
                Some(self.transition_locked(state, to, ritual_completed, now))
            },
        )
    }

    /// Full, non-short-circuiting readiness breakdown. Does not mutate state
    /// beyond lazily creating the user.
    pub fn assess(&self, user_id: &str, ctx: &ContextSnapshot) -> ReadinessReport {
        let now = self.clock.now();
        let state = self.enroll(user_id);
        let gate = self.registry.gate_for(state.current_phase);
        let elapsed = state.elapsed(now);
        let score = gate.score(ctx);
        let duration_met = elapsed >= gate.minimum_duration_secs;
        let readiness_met = score.readiness >= self.settings.readiness_threshold;
        let collective_met = !gate.applies_collective()
            || ctx.number(COLLECTIVE_RESONANCE) >= gate.collective_resonance_threshold;
        let ready = duration_met && score.required_met && readiness_met && collective_met;
        ReadinessReport {
            user_id: user_id.to_string(),
            phase: state.current_phase,
            next_phase: gate.to,
            elapsed_secs: elapsed,
            minimum_duration_secs: gate.minimum_duration_secs,
            duration_met,
            readiness_met,
            collective_threshold: gate.collective_resonance_threshold,
            collective_met,
            ready,
            score,
        }
    }

    /// Append a breakthrough and raise phase resonance. Returns the new resonance.
    pub fn record_breakthrough(&self, user_id: &str, data: BTreeMap<String, String>) -> f64 {
        let now = self.clock.now();
        let increment = self.settings.breakthrough_increment;
        self.states.with(
            user_id,
            || self.fresh_state(user_id, now),
            |state| {
                state.breakthrough_moments.push(Breakthrough {
                    at: now,
                    phase: state.current_phase,
                    data,
                });
                state.phase_resonance = (state.phase_resonance + increment).min(1.0);
                tracing::info!(
                    user_id,
                    phase = %state.current_phase,
                    resonance = state.phase_resonance,
                    "breakthrough recorded"
                );
                state.phase_resonance
            },
        )
    }

    /// Static characteristics of `phase`.
    pub fn guidance_for(&self, phase: Phase) -> &'static PhaseGuidance {
        guidance::guidance_for(phase)
    }

    /// Copy of a user's state, if the user is known.
    pub fn state(&self, user_id: &str) -> Option<UserPhaseState> {
        self.states.get(user_id)
    }

    /// Current phase; unknown users are in initiation.
    pub fn current_phase(&self, user_id: &str) -> Phase {
        self.states
            .with_existing(user_id, |s| s.current_phase)
            .unwrap_or(Phase::Initiation)
    }

    /// Seconds in the current phase; 0 for unknown users.
    pub fn phase_duration_secs(&self, user_id: &str) -> u64 {
        let now = self.clock.now();
        self.states
            .with_existing(user_id, |s| s.elapsed(now))
            .unwrap_or(0)
    }

    /// Whether the gate out of the user's current phase asks for a ritual.
    pub fn ritual_required(&self, user_id: &str) -> bool {
        self.registry.gate_for(self.current_phase(user_id)).ritual_required
    }

    /// Install previously persisted state.
    pub fn restore(&self, state: UserPhaseState) {
        let user_id = state.user_id.clone();
        self.states.insert(&user_id, state);
    }

    /// Copies of every user's state, ordered by user id.
    pub fn all_states(&self) -> Vec<UserPhaseState> {
        self.states
            .user_ids()
            .iter()
            .filter_map(|id| self.states.get(id))
            .collect()
    }

    fn fresh_state(&self, user_id: &str, now: u64) -> UserPhaseState {
        tracing::debug!(user_id, "new user enters initiation");
        UserPhaseState::new(user_id, now, self.settings.baseline_resonance)
    }

    fn evaluate_locked(
        &self,
        state: &mut UserPhaseState,
        ctx: &ContextSnapshot,
        now: u64,
    ) -> Option<Phase> {
        let gate = self.registry.gate_for(state.current_phase);
        let elapsed = state.elapsed(now);
        if elapsed < gate.minimum_duration_secs {
            tracing::debug!(
                user_id = %state.user_id,
                phase = %state.current_phase,
                elapsed,
                minimum = gate.minimum_duration_secs,
                "gate closed: minimum duration not reached"
            );
            return None;
        }

        let mut achieved = 0.0;
        let mut total = 0.0;
        for condition in &gate.conditions {
            let met = condition.is_met(ctx);
            if !met && condition.required {
                tracing::debug!(
                    user_id = %state.user_id,
                    condition = %condition.name,
                    "gate closed: required condition unmet"
                );
                return None;
            }
            total += condition.weight;
            if met {
                achieved += condition.weight;
                state.completed_conditions.insert(condition.name.clone());
            }
        }

        let readiness = gate::readiness(achieved, total);
        if readiness < self.settings.readiness_threshold {
            tracing::debug!(
                user_id = %state.user_id,
                readiness,
                "gate closed: readiness below threshold"
            );
            return None;
        }
        if gate.applies_collective() {
            let collective = ctx.number(COLLECTIVE_RESONANCE);
            if collective < gate.collective_resonance_threshold {
                tracing::debug!(
                    user_id = %state.user_id,
                    collective,
                    threshold = gate.collective_resonance_threshold,
                    "gate closed: collective resonance too low"
                );
                return None;
            }
        }

        tracing::debug!(user_id = %state.user_id, readiness, to = %gate.to, "gate open");
        Some(gate.to)
    }

    fn transition_locked(
        &self,
        state: &mut UserPhaseState,
        to: Phase,
        ritual_completed: bool,
        now: u64,
    ) -> TransitionNotice {
        let from = state.current_phase;
        state.phase_history.push(TransitionRecord {
            from,
            to,
            at: now,
            spiral_count: state.spiral_count,
            ritual_completed,
        });
        state.current_phase = to;
        state.phase_entry_time = now;
        state.completed_conditions.clear();
        state.phase_resonance = self.settings.baseline_resonance;
        if from.closes_spiral(to) {
            state.spiral_count += 1;
        }

        tracing::info!(
            user_id = %state.user_id,
            %from,
            %to,
            spiral = state.spiral_count,
            ritual_completed,
            "phase transition"
        );

        TransitionNotice {
            user_id: state.user_id.clone(),
            from,
            to,
            spiral_count: state.spiral_count,
            at: now,
            ritual_completed,
        }
    }
}
