//! Static phase characteristics consumed by guidance generators.
//!
//! Read-only reference data keyed by phase: energy, focus, typical
//! challenges and gifts, recommended practices, active archetypes, and
//! elemental affinities. Nothing here is user state.

use serde::Serialize;

use crate::phase::{Element, Phase};

/// Read model describing one phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseGuidance {
    pub phase: Phase,
    pub energy: &'static str,
    pub focus: &'static str,
    pub challenges: &'static [&'static str],
    pub gifts: &'static [&'static str],
    pub practices: &'static [&'static str],
    pub archetypes: &'static [&'static str],
    /// Affinity per element in [0, 1], in `Element::ALL` order.
    pub element_affinities: [(Element, f64); 5],
}

impl PhaseGuidance {
    /// Affinity for one element.
    pub fn affinity(&self, element: Element) -> f64 {
        self.element_affinities[element.index()].1
    }

    /// The element this phase resonates with most strongly.
    pub fn strongest_element(&self) -> Element {
        let mut best = self.element_affinities[0];
        for pair in &self.element_affinities[1..] {
            if pair.1 > best.1 {
                best = *pair;
            }
        }
        best.0
    }
}

/// Guidance for `phase`.
pub fn guidance_for(phase: Phase) -> &'static PhaseGuidance {
    &GUIDANCE[phase.index()]
}

const fn affinities(
    fire: f64,
    water: f64,
    earth: f64,
    air: f64,
    aether: f64,
) -> [(Element, f64); 5] {
    [
        (Element::Fire, fire),
        (Element::Water, water),
        (Element::Earth, earth),
        (Element::Air, air),
        (Element::Aether, aether),
    ]
}

static GUIDANCE: [PhaseGuidance; 7] = [
    PhaseGuidance {
        phase: Phase::Initiation,
        energy: "awakening",
        focus: "vision_clarification",
        challenges: &["confusion", "overwhelm", "doubt"],
        gifts: &["fresh_perspective", "beginner_mind", "enthusiasm"],
        practices: &["meditation", "journaling", "vision_boarding"],
        archetypes: &["Innocent", "Seeker", "Fool", "Wonderer"],
        element_affinities: affinities(0.8, 0.5, 0.4, 0.7, 0.6),
    },
    PhaseGuidance {
        phase: Phase::Exploration,
        energy: "expansion",
        focus: "experimentation",
        challenges: &["distraction", "overwhelm", "impatience"],
        gifts: &["curiosity", "playfulness", "discovery"],
        practices: &["trying_new_things", "travel", "learning"],
        archetypes: &["Explorer", "Student", "Adventurer", "Wanderer"],
        element_affinities: affinities(0.7, 0.6, 0.4, 0.9, 0.5),
    },
    PhaseGuidance {
        phase: Phase::Challenge,
        energy: "friction",
        focus: "perseverance",
        challenges: &["resistance", "fear", "old_patterns"],
        gifts: &["strength", "clarity", "determination"],
        practices: &["shadow_work", "therapy", "physical_training"],
        archetypes: &["Warrior", "Challenger", "Shadow-Facer", "Tested One"],
        element_affinities: affinities(0.7, 0.6, 0.8, 0.4, 0.5),
    },
    PhaseGuidance {
        phase: Phase::Transformation,
        energy: "metamorphosis",
        focus: "surrender",
        challenges: &["death_of_old_self", "uncertainty", "void"],
        gifts: &["rebirth", "authenticity", "power"],
        practices: &["ritual", "fasting", "vision_quest"],
        archetypes: &["Phoenix", "Shapeshifter", "Death-Walker", "Alchemist"],
        element_affinities: affinities(0.9, 0.8, 0.4, 0.5, 0.7),
    },
    PhaseGuidance {
        phase: Phase::Integration,
        energy: "synthesis",
        focus: "embodiment",
        challenges: &["patience", "practice", "consistency"],
        gifts: &["wisdom", "balance", "groundedness"],
        practices: &["daily_rituals", "teaching", "creating"],
        archetypes: &["Bridge-Builder", "Weaver", "Integrator", "Embodier"],
        element_affinities: affinities(0.5, 0.7, 0.9, 0.6, 0.6),
    },
    PhaseGuidance {
        phase: Phase::Mastery,
        energy: "flow",
        focus: "service",
        challenges: &["humility", "continued_growth", "teaching"],
        gifts: &["effortless_action", "wisdom", "magnetism"],
        practices: &["mentoring", "advanced_practices", "innovation"],
        archetypes: &["Master", "Teacher", "Guide", "Sage"],
        element_affinities: affinities(0.7, 0.7, 0.7, 0.7, 0.8),
    },
    PhaseGuidance {
        phase: Phase::Transcendence,
        energy: "unity",
        focus: "being",
        challenges: &["staying_grounded", "communication", "loneliness"],
        gifts: &["unity_consciousness", "peace", "presence"],
        practices: &["meditation", "service", "presence"],
        archetypes: &["Mystic", "Oracle", "Void-Walker", "Unity-Keeper"],
        element_affinities: affinities(0.6, 0.6, 0.5, 0.6, 1.0),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_phase() {
        for phase in Phase::ALL {
            assert_eq!(guidance_for(phase).phase, phase);
        }
    }

    #[test]
    fn affinities_follow_element_order() {
        for phase in Phase::ALL {
            let g = guidance_for(phase);
            for element in Element::ALL {
                assert_eq!(g.element_affinities[element.index()].0, element);
                assert!((0.0..=1.0).contains(&g.affinity(element)));
            }
        }
    }

    #[test]
    fn strongest_elements() {
        assert_eq!(guidance_for(Phase::Initiation).strongest_element(), Element::Fire);
        assert_eq!(guidance_for(Phase::Exploration).strongest_element(), Element::Air);
        assert_eq!(guidance_for(Phase::Integration).strongest_element(), Element::Earth);
        assert_eq!(guidance_for(Phase::Transcendence).strongest_element(), Element::Aether);
    }

    #[test]
    fn guidance_serializes_for_downstream_generators() {
        let json = serde_json::to_value(guidance_for(Phase::Challenge)).unwrap();
        assert_eq!(json["phase"], "challenge");
        assert_eq!(json["energy"], "friction");
        assert_eq!(json["archetypes"][0], "Warrior");
    }
}
