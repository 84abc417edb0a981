//! Interaction records and the lightweight analyzers that annotate them.

use serde::{Deserialize, Serialize};

use crate::phase::{Element, Phase};
use crate::text;

/// Integration level assumed when a guidance bundle carries no resonance.
pub const DEFAULT_RESONANCE: f64 = 0.7;

const POSITIVE_WORDS: &[&str] = &["happy", "excited", "grateful", "love", "peace", "joy"];
const NEGATIVE_WORDS: &[&str] = &["sad", "angry", "frustrated", "scared", "worried", "stuck"];
const PHRASE_MARKERS: &[&str] = &["you are", "remember", "trust", "become", "let"];

/// Guidance issued alongside an interaction by the content layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidanceBundle {
    pub element: Element,
    pub phase: Phase,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub archetype: Option<String>,
    #[serde(default)]
    pub symbolic_image: Option<String>,
    #[serde(default)]
    pub reflection_prompt: Option<String>,
    /// Resonance in [0, 1] reported by the content layer.
    #[serde(default)]
    pub resonance: Option<f64>,
}

impl GuidanceBundle {
    pub fn new(element: Element, phase: Phase, message: impl Into<String>) -> Self {
        Self {
            element,
            phase,
            message: message.into(),
            archetype: None,
            symbolic_image: None,
            reflection_prompt: None,
            resonance: None,
        }
    }

    pub fn with_archetype(mut self, archetype: impl Into<String>) -> Self {
        self.archetype = Some(archetype.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.symbolic_image = Some(image.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.reflection_prompt = Some(prompt.into());
        self
    }

    pub fn with_resonance(mut self, resonance: f64) -> Self {
        self.resonance = Some(resonance);
        self
    }

    /// Reported resonance clamped to [0, 1], or the default.
    pub fn effective_resonance(&self) -> f64 {
        match self.resonance {
            Some(r) if r.is_finite() => r.clamp(0.0, 1.0),
            _ => DEFAULT_RESONANCE,
        }
    }
}

/// One recorded interaction. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// 1-based sequence number within the user's history.
    pub seq: u64,
    pub user_id: String,
    pub timestamp: u64,
    pub content: String,
    /// In [-1, 1].
    pub emotional_valence: f64,
    /// In [0, 1].
    pub integration_level: f64,
    pub elements: Vec<Element>,
    pub phase: Phase,
    pub insights: Vec<String>,
    pub symbols: Vec<String>,
    pub themes: Vec<String>,
    pub guidance: GuidanceBundle,
}

/// Lexicon valence: `(positive - negative) / (positive + negative)`, 0 when neutral.
pub fn emotional_valence(tokens: &[String]) -> f64 {
    let positive = text::count_matches(tokens, POSITIVE_WORDS) as f64;
    let negative = text::count_matches(tokens, NEGATIVE_WORDS) as f64;
    if positive + negative == 0.0 {
        0.0
    } else {
        (positive - negative) / (positive + negative)
    }
}

/// Archetype, reflection prompt, and up to three key phrases of the message.
pub fn extract_insights(guidance: &GuidanceBundle) -> Vec<String> {
    let mut insights = Vec::new();
    if let Some(archetype) = &guidance.archetype {
        insights.push(format!("Archetype: {archetype}"));
    }
    if let Some(prompt) = &guidance.reflection_prompt {
        insights.push(format!("Reflection: {prompt}"));
    }
    insights.extend(key_phrases(&guidance.message).into_iter().take(3));
    insights
}

/// Sentences of moderate length that carry instructive language.
pub fn key_phrases(message: &str) -> Vec<String> {
    message
        .split(['.', '!', '?'])
        .filter(|s| {
            let len = s.chars().count();
            len > 20 && len < 100
        })
        .filter(|s| text::contains_any(&text::tokenize(s), PHRASE_MARKERS))
        .map(|s| s.trim().to_string())
        .take(5)
        .collect()
}
