//! Phase gates: weighted, optionally-required conditions between phases.
//!
//! A [`PhaseGate`] is the rule set for leaving one phase. Each [`Condition`]
//! is a pure [`Predicate`] over a [`ContextSnapshot`]. Predicates are plain
//! tagged data so a gate table can be loaded from a config file and
//! inspected, with no closures involved.

pub mod registry;

use serde::{Deserialize, Serialize};

use crate::clock::DAY_SECS;
use crate::context::ContextSnapshot;
use crate::phase::Phase;

pub use registry::GateRegistry;

/// A comparison of one context signal against a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum Predicate {
    /// `signal > value`
    Above { signal: String, value: f64 },
    /// `signal >= value`
    AtLeast { signal: String, value: f64 },
    /// `signal < value`
    Below { signal: String, value: f64 },
    /// Signal is truthy.
    Flag { signal: String },
}

impl Predicate {
    pub fn above(signal: &str, value: f64) -> Self {
        Self::Above {
            signal: signal.into(),
            value,
        }
    }

    pub fn at_least(signal: &str, value: f64) -> Self {
        Self::AtLeast {
            signal: signal.into(),
            value,
        }
    }

    /// Evaluate against a context. Missing signals read as 0 / false.
    pub fn holds(&self, ctx: &ContextSnapshot) -> bool {
        match self {
            Self::Above { signal, value } => ctx.number(signal) > *value,
            Self::AtLeast { signal, value } => ctx.number(signal) >= *value,
            Self::Below { signal, value } => ctx.number(signal) < *value,
            Self::Flag { signal } => ctx.flag(signal),
        }
    }

    /// Name of the signal this predicate reads.
    pub fn signal(&self) -> &str {
        match self {
            Self::Above { signal, .. }
            | Self::AtLeast { signal, .. }
            | Self::Below { signal, .. }
            | Self::Flag { signal } => signal,
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Above { signal, value } => write!(f, "{signal} > {value}"),
            Self::AtLeast { signal, value } => write!(f, "{signal} >= {value}"),
            Self::Below { signal, value } => write!(f, "{signal} < {value}"),
            Self::Flag { signal } => write!(f, "{signal}"),
        }
    }
}

/// A named, weighted predicate contributing to a gate's readiness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub predicate: Predicate,
    pub weight: f64,
    /// Required conditions are a hard gate, independent of the score.
    #[serde(default)]
    pub required: bool,
}

impl Condition {
    pub fn new(name: &str, predicate: Predicate, weight: f64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            predicate,
            weight,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_met(&self, ctx: &ContextSnapshot) -> bool {
        self.predicate.holds(ctx)
    }
}

/// The rule set for leaving `from` and entering `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseGate {
    pub from: Phase,
    pub to: Phase,
    pub conditions: Vec<Condition>,
    /// Minimum seconds a user must dwell in `from` before leaving.
    pub minimum_duration_secs: u64,
    /// Informational: the guidance layer offers a ritual for this crossing.
    #[serde(default = "default_ritual_required")]
    pub ritual_required: bool,
    /// Minimum `collective_resonance` signal; 0 disables the check.
    #[serde(default)]
    pub collective_resonance_threshold: f64,
}

fn default_ritual_required() -> bool {
    true
}

impl PhaseGate {
    pub fn new(from: Phase, to: Phase, minimum_days: u64) -> Self {
        Self {
            from,
            to,
            conditions: Vec::new(),
            minimum_duration_secs: minimum_days * DAY_SECS,
            ritual_required: true,
            collective_resonance_threshold: 0.0,
        }
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn collective_threshold(mut self, threshold: f64) -> Self {
        self.collective_resonance_threshold = threshold;
        self
    }

    pub fn without_ritual(mut self) -> Self {
        self.ritual_required = false;
        self
    }

    /// Distinct signal names the conditions read, in condition order.
    pub fn signals(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for condition in &self.conditions {
            let name = condition.predicate.signal();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Whether the collective-resonance check applies to this gate.
    pub fn applies_collective(&self) -> bool {
        self.collective_resonance_threshold > 0.0
    }

    /// Score every condition against `ctx` (no short-circuit).
    pub fn score(&self, ctx: &ContextSnapshot) -> GateScore {
        let outcomes: Vec<ConditionOutcome> = self
            .conditions
            .iter()
            .map(|c| ConditionOutcome {
                name: c.name.clone(),
                satisfied: c.is_met(ctx),
                weight: c.weight,
                required: c.required,
            })
            .collect();
        let achieved: f64 = outcomes.iter().filter(|o| o.satisfied).map(|o| o.weight).sum();
        let total: f64 = outcomes.iter().map(|o| o.weight).sum();
        GateScore {
            achieved,
            total,
            readiness: readiness(achieved, total),
            required_met: outcomes.iter().all(|o| o.satisfied || !o.required),
            outcomes,
        }
    }
}

/// Weighted readiness ratio, clamped to [0, 1]. Zero total weight scores 0.
pub fn readiness(achieved: f64, total: f64) -> f64 {
    if total > 0.0 {
        (achieved / total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Result of evaluating one condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionOutcome {
    pub name: String,
    pub satisfied: bool,
    pub weight: f64,
    pub required: bool,
}

/// Full scoring of a gate against a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateScore {
    pub achieved: f64,
    pub total: f64,
    pub readiness: f64,
    pub required_met: bool,
    pub outcomes: Vec<ConditionOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initiation_gate() -> PhaseGate {
        let vision = Predicate::above("vision_clarity", 0.7);
        let action = Predicate::above("actions_taken", 0.0);
        let commitment = Predicate::above("commitment_level", 0.6);
        PhaseGate::new(Phase::Initiation, Phase::Exploration, 3)
            .condition(Condition::new("vision_clarified", vision, 2.0).required())
            .condition(Condition::new("first_action_taken", action, 1.5))
            .condition(Condition::new("commitment_declared", commitment, 1.0))
    }

    #[test]
    fn gate_lists_the_signals_it_reads() {
        let gate = initiation_gate().condition(Condition::new(
            "vision_sharpened",
            Predicate::at_least("vision_clarity", 0.9),
            0.5,
        ));
        assert_eq!(
            gate.signals(),
            vec!["vision_clarity", "actions_taken", "commitment_level"]
        );
        assert_eq!(Predicate::Flag { signal: "lit".into() }.signal(), "lit");
    }

    #[test]
    fn predicates_read_missing_as_zero() {
        let ctx = ContextSnapshot::new();
        assert!(!Predicate::above("x", 0.0).holds(&ctx));
        assert!(Predicate::at_least("x", 0.0).holds(&ctx));
        assert!(Predicate::Below { signal: "x".into(), value: 0.5 }.holds(&ctx));
        assert!(!Predicate::Flag { signal: "x".into() }.holds(&ctx));
    }

    #[test]
    fn above_is_strict_at_least_is_not() {
        let ctx = ContextSnapshot::new().with("edges_encountered", 3.0);
        assert!(!Predicate::above("edges_encountered", 3.0).holds(&ctx));
        assert!(Predicate::at_least("edges_encountered", 3.0).holds(&ctx));
    }

    #[test]
    fn full_score_when_everything_met() {
        let ctx = ContextSnapshot::new()
            .with("vision_clarity", 0.8)
            .with("actions_taken", 1.0)
            .with("commitment_level", 0.7);
        let score = initiation_gate().score(&ctx);
        assert_eq!(score.achieved, 4.5);
        assert_eq!(score.total, 4.5);
        assert_eq!(score.readiness, 1.0);
        assert!(score.required_met);
    }

    #[test]
    fn required_unmet_is_reported_alongside_partial_score() {
        let ctx = ContextSnapshot::new()
            .with("vision_clarity", 0.5)
            .with("actions_taken", 1.0)
            .with("commitment_level", 0.7);
        let score = initiation_gate().score(&ctx);
        assert!(!score.required_met);
        assert!((score.readiness - 2.5 / 4.5).abs() < 1e-9);
        assert!(!score.outcomes[0].satisfied);
    }

    #[test]
    fn readiness_is_bounded() {
        assert_eq!(readiness(0.0, 0.0), 0.0);
        assert_eq!(readiness(3.0, 2.0), 1.0);
        assert_eq!(readiness(1.0, 4.0), 0.25);
    }

    #[test]
    fn gate_round_trips_through_toml() {
        let gate = initiation_gate().collective_threshold(0.8);
        let text = toml::to_string(&gate).unwrap();
        let back: PhaseGate = toml::from_str(&text).unwrap();
        assert_eq!(back, gate);
    }
}
