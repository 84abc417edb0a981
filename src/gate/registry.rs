//! The gate registry: one validated outgoing gate per phase.
//!
//! The registry is configuration, not runtime state. It is built once,
//! validated, and then shared read-only. Invariant violations (a phase
//! without a gate, two gates from one phase, an empty gate) are reported at
//! construction so evaluation never has to handle them.

use std::collections::HashSet;

use crate::error::RegistryError;
use crate::phase::Phase;

use super::{Condition, PhaseGate, Predicate};

/// Validated table of phase gates, indexed by source phase.
#[derive(Debug, Clone)]
pub struct GateRegistry {
    /// `gates[phase.index()]` is the gate leaving `phase`.
    gates: Vec<PhaseGate>,
}

impl GateRegistry {
    /// Build a registry from an arbitrary list of gates, enforcing every
    /// table invariant.
    pub fn new(gates: Vec<PhaseGate>) -> Result<Self, RegistryError> {
        for gate in &gates {
            validate_gate(gate)?;
        }

        let mut ordered = Vec::with_capacity(Phase::ALL.len());
        for phase in Phase::ALL {
            let mut leaving = gates.iter().filter(|g| g.from == phase);
            let Some(gate) = leaving.next() else {
                return Err(RegistryError::MissingGate { phase });
            };
            let extra = leaving.count();
            if extra > 0 {
                return Err(RegistryError::DuplicateGate {
                    phase,
                    count: extra + 1,
                });
            }
            ordered.push(gate.clone());
        }

        Ok(Self { gates: ordered })
    }

    /// The built-in seven-gate cycle.
    pub fn standard() -> Self {
        // The standard table satisfies every invariant; the test suite pins it.
        Self {
            gates: standard_gates(),
        }
    }

    /// The single outgoing gate for `phase`.
    pub fn gate_for(&self, phase: Phase) -> &PhaseGate {
        &self.gates[phase.index()]
    }

    /// All gates in cycle order.
    pub fn gates(&self) -> &[PhaseGate] {
        &self.gates
    }

    /// Deterministic next phase after `phase`.
    pub fn next_phase(&self, phase: Phase) -> Phase {
        self.gate_for(phase).to
    }
}

impl Default for GateRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn validate_gate(gate: &PhaseGate) -> Result<(), RegistryError> {
    if gate.conditions.is_empty() {
        return Err(RegistryError::EmptyGate {
            from: gate.from,
            to: gate.to,
        });
    }

    let threshold = gate.collective_resonance_threshold;
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(RegistryError::InvalidThreshold {
            from: gate.from,
            threshold,
        });
    }

    let mut seen = HashSet::new();
    for condition in &gate.conditions {
        if !condition.weight.is_finite() || condition.weight <= 0.0 {
            return Err(RegistryError::InvalidWeight {
                from: gate.from,
                name: condition.name.clone(),
                weight: condition.weight,
            });
        }
        if !seen.insert(condition.name.as_str()) {
            return Err(RegistryError::DuplicateCondition {
                from: gate.from,
                name: condition.name.clone(),
            });
        }
    }
    Ok(())
}

fn standard_gates() -> Vec<PhaseGate> {
    use Phase::*;

    vec![
        PhaseGate::new(Initiation, Exploration, 3)
            .condition(
                Condition::new("vision_clarified", Predicate::above("vision_clarity", 0.7), 2.0)
                    .required()
                    .describe("User has clarified their vision or intention"),
            )
            .condition(
                Condition::new("first_action_taken", Predicate::above("actions_taken", 0.0), 1.5)
                    .describe("User has taken at least one concrete action"),
            )
            .condition(
                Condition::new(
                    "commitment_declared",
                    Predicate::above("commitment_level", 0.6),
                    1.0,
                )
                .describe("User has declared commitment to their path"),
            ),
        PhaseGate::new(Exploration, Challenge, 7)
            .condition(
                Condition::new("edges_found", Predicate::at_least("edges_encountered", 3.0), 1.5)
                    .required()
                    .describe("User has encountered multiple edge experiences"),
            )
            .condition(
                Condition::new(
                    "patterns_recognized",
                    Predicate::at_least("patterns_seen", 2.0),
                    1.0,
                )
                .describe("User recognizes recurring patterns"),
            )
            .condition(
                Condition::new("resistance_felt", Predicate::above("resistance_level", 0.5), 1.0)
                    .describe("User feels natural resistance to growth"),
            ),
        PhaseGate::new(Challenge, Transformation, 14)
            .condition(
                Condition::new("crisis_faced", Predicate::above("crisis_intensity", 0.8), 2.0)
                    .required()
                    .describe("User has faced significant crisis or challenge"),
            )
            .condition(
                Condition::new(
                    "old_identity_released",
                    Predicate::above("identity_fluidity", 0.7),
                    1.5,
                )
                .describe("User shows willingness to release old identity"),
            )
            .condition(
                Condition::new("surrender_achieved", Predicate::above("surrender_level", 0.6), 1.5)
                    .describe("User has surrendered to the transformation process"),
            )
            .collective_threshold(0.8),
        PhaseGate::new(Transformation, Integration, 7)
            .condition(
                Condition::new("rebirth_complete", Predicate::at_least("rebirth_markers", 3.0), 2.0)
                    .required()
                    .describe("User shows clear signs of rebirth"),
            )
            .condition(
                Condition::new(
                    "new_identity_emerging",
                    Predicate::above("new_identity_coherence", 0.6),
                    1.0,
                )
                .describe("New identity beginning to stabilize"),
            )
            .condition(
                Condition::new("gifts_recognized", Predicate::above("gifts_awareness", 0.5), 1.0)
                    .describe("User recognizes gifts from transformation"),
            ),
        PhaseGate::new(Integration, Mastery, 21)
            .condition(
                Condition::new("wisdom_embodied", Predicate::above("embodiment_level", 0.8), 1.5)
                    .required()
                    .describe("User embodies learned wisdom consistently"),
            )
            .condition(
                Condition::new("teaching_impulse", Predicate::above("teaching_desire", 0.6), 1.0)
                    .describe("User feels called to share wisdom"),
            )
            .condition(
                Condition::new("stability_achieved", Predicate::above("life_stability", 0.7), 1.0)
                    .describe("User has achieved new stability"),
            ),
        PhaseGate::new(Mastery, Transcendence, 28)
            .condition(
                Condition::new("ego_transcended", Predicate::above("ego_dissolution", 0.8), 2.0)
                    .required()
                    .describe("User transcends personal ego regularly"),
            )
            .condition(
                Condition::new(
                    "unity_experienced",
                    Predicate::at_least("unity_experiences", 3.0),
                    1.5,
                )
                .describe("Multiple unity experiences"),
            )
            .condition(
                Condition::new(
                    "service_embodied",
                    Predicate::above("service_orientation", 0.9),
                    1.0,
                )
                .describe("Life oriented toward service"),
            )
            .collective_threshold(0.9),
        PhaseGate::new(Transcendence, Initiation, 7)
            .condition(
                Condition::new("cycle_complete", Predicate::above("completion_sense", 0.9), 1.0)
                    .required()
                    .describe("Sense of cycle completion"),
            )
            .condition(
                Condition::new("new_calling", Predicate::above("new_vision_emerging", 0.5), 1.0)
                    .describe("New vision or calling emerging"),
            ),
    ]
}
