//! Growth phases and elemental tags.
//!
//! The seven [`Phase`]s form a closed cycle: transcendence leads back to
//! initiation, starting a new spiral. [`Element`] tags interactions and
//! symbols with one of five elemental qualities.

use serde::{Deserialize, Serialize};

/// One of the seven stages of a user's growth cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Initiation,
    Exploration,
    Challenge,
    Transformation,
    Integration,
    Mastery,
    Transcendence,
}

impl Phase {
    /// All phases in cycle order.
    pub const ALL: [Phase; 7] = [
        Phase::Initiation,
        Phase::Exploration,
        Phase::Challenge,
        Phase::Transformation,
        Phase::Integration,
        Phase::Mastery,
        Phase::Transcendence,
    ];

    /// Lowercase name, as used in config files and serialized state.
    pub fn label(self) -> &'static str {
        match self {
            Self::Initiation => "initiation",
            Self::Exploration => "exploration",
            Self::Challenge => "challenge",
            Self::Transformation => "transformation",
            Self::Integration => "integration",
            Self::Mastery => "mastery",
            Self::Transcendence => "transcendence",
        }
    }

    /// Position in the cycle, 0-based.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The phase that follows this one in the natural cycle.
    pub fn successor(self) -> Phase {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Whether moving from `self` to `to` closes a spiral.
    pub fn closes_spiral(self, to: Phase) -> bool {
        self == Phase::Transcendence && to == Phase::Initiation
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.label() == lower)
            .ok_or_else(|| format!("unknown phase \"{s}\""))
    }
}

/// Elemental quality attached to interactions, symbols, and trends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Fire,
    Water,
    Earth,
    Air,
    Aether,
}

impl Element {
    /// All elements in canonical order.
    pub const ALL: [Element; 5] = [
        Element::Fire,
        Element::Water,
        Element::Earth,
        Element::Air,
        Element::Aether,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Fire => "fire",
            Self::Water => "water",
            Self::Earth => "earth",
            Self::Air => "air",
            Self::Aether => "aether",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Element {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|e| e.label() == lower)
            .ok_or_else(|| format!("unknown element \"{s}\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_wraps_around() {
        assert_eq!(Phase::Initiation.successor(), Phase::Exploration);
        assert_eq!(Phase::Mastery.successor(), Phase::Transcendence);
        assert_eq!(Phase::Transcendence.successor(), Phase::Initiation);
    }

    #[test]
    fn only_transcendence_to_initiation_closes_spiral() {
        assert!(Phase::Transcendence.closes_spiral(Phase::Initiation));
        assert!(!Phase::Mastery.closes_spiral(Phase::Initiation));
        assert!(!Phase::Transcendence.closes_spiral(Phase::Exploration));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Challenge".parse::<Phase>().unwrap(), Phase::Challenge);
        assert_eq!(" AETHER ".parse::<Element>().unwrap(), Element::Aether);
        assert!("limbo".parse::<Phase>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Phase::Transformation).unwrap();
        assert_eq!(json, "\"transformation\"");
        let back: Element = serde_json::from_str("\"water\"").unwrap();
        assert_eq!(back, Element::Water);
    }
}
