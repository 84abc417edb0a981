//! Symbolic threads: how a recurring symbol accumulates meaning for a user.
//!
//! Each (user, symbol) pair owns one [`SymbolicThread`]. Appearances are
//! append-only; the element and phase tallies, the current meaning, and the
//! archetypal resonance are recomputed on every new appearance.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::phase::{Element, Phase};
use crate::store::UserStore;
use crate::text;

/// Symbols recognised in content and symbolic images.
pub const SYMBOL_VOCABULARY: &[&str] = &[
    "fire", "water", "earth", "air", "void", "light", "shadow", "tree", "mountain", "ocean",
    "sky", "crystal", "mirror", "phoenix", "dragon", "eagle", "serpent", "lotus", "seed",
];

/// Appearance contexts are truncated to this many characters.
pub const CONTEXT_CHARS: usize = 100;

/// How many of a thread's latest contexts `resonant_symbols` inspects.
const RECENT_CONTEXTS: usize = 3;

/// Symbols from the vocabulary that occur in `text`, in vocabulary order.
pub fn extract_symbols(text: &str) -> Vec<String> {
    let tokens = text::tokenize(text);
    SYMBOL_VOCABULARY
        .iter()
        .filter(|s| tokens.iter().any(|t| t == *s))
        .map(|s| s.to_string())
        .collect()
}

/// One sighting of a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub at: u64,
    pub phase: Phase,
    pub element: Element,
    pub context: String,
}

/// What a symbol currently means to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SymbolMeaning {
    /// Seen once.
    Emerging { symbol: String },
    /// Seen across phases; carries the most recently joined phase.
    EvolvingThrough { symbol: String, phase: Phase },
    /// Seen repeatedly within one phase; carries the dominant element.
    ResonatingWith { symbol: String, element: Element },
}

impl fmt::Display for SymbolMeaning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emerging { symbol } => write!(f, "{symbol} emerging"),
            Self::EvolvingThrough { symbol, phase } => {
                write!(f, "{symbol} evolving through {phase}")
            }
            Self::ResonatingWith { symbol, element } => {
                write!(f, "{symbol} resonating with {element}")
            }
        }
    }
}

/// The history of one symbol for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolicThread {
    pub symbol: String,
    /// Set once on creation.
    pub first_appearance: u64,
    pub appearances: Vec<Appearance>,
    pub elemental_associations: BTreeMap<Element, u32>,
    pub phase_associations: BTreeMap<Phase, u32>,
    pub current_meaning: SymbolMeaning,
    pub archetypal_resonance: f64,
}

impl SymbolicThread {
    fn new(symbol: &str, at: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            first_appearance: at,
            appearances: Vec::new(),
            elemental_associations: BTreeMap::new(),
            phase_associations: BTreeMap::new(),
            current_meaning: SymbolMeaning::Emerging {
                symbol: symbol.to_string(),
            },
            archetypal_resonance: 0.0,
        }
    }

    /// Most recent sighting time. Appearances may arrive out of order.
    pub fn last_seen(&self) -> u64 {
        self.appearances
            .iter()
            .map(|a| a.at)
            .max()
            .unwrap_or(self.first_appearance)
    }

    /// The phase this symbol was most recently seen in for the first time.
    /// Returning to an earlier phase does not change it.
    pub fn newest_phase(&self) -> Option<Phase> {
        let mut seen: Vec<Phase> = Vec::new();
        for appearance in &self.appearances {
            if !seen.contains(&appearance.phase) {
                seen.push(appearance.phase);
            }
        }
        seen.pop()
    }

    /// Element with the highest count; ties go to the earlier element.
    pub fn dominant_element(&self) -> Option<Element> {
        let mut best: Option<(Element, u32)> = None;
        for (&element, &count) in &self.elemental_associations {
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((element, count));
            }
        }
        best.map(|(e, _)| e)
    }

    /// Evolving: more than three appearances spread over more than one phase.
    pub fn is_evolving(&self) -> bool {
        self.appearances.len() > 3 && self.phase_associations.len() > 1
    }

    fn push(&mut self, appearance: Appearance, resonance: f64) {
        *self
            .elemental_associations
            .entry(appearance.element)
            .or_insert(0) += 1;
        *self.phase_associations.entry(appearance.phase).or_insert(0) += 1;
        self.appearances.push(appearance);
        self.archetypal_resonance = if resonance.is_finite() {
            resonance.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.current_meaning = self.interpret();
    }

    fn interpret(&self) -> SymbolMeaning {
        let symbol = self.symbol.clone();
        if self.appearances.len() < 2 {
            return SymbolMeaning::Emerging { symbol };
        }
        match (self.phase_associations.len() > 1, self.newest_phase()) {
            (true, Some(phase)) => SymbolMeaning::EvolvingThrough { symbol, phase },
            _ => SymbolMeaning::ResonatingWith {
                symbol,
                element: self.dominant_element().unwrap_or(Element::Aether),
            },
        }
    }

    fn mentioned_recently(&self) -> bool {
        let tokens_of = |a: &Appearance| text::tokenize(&a.context);
        self.appearances
            .iter()
            .rev()
            .take(RECENT_CONTEXTS)
            .any(|a| text::contains_keyword(&tokens_of(a), &self.symbol))
    }
}

/// Per-user symbol threads.
#[derive(Debug, Default)]
pub struct SymbolicThreadTracker {
    threads: UserStore<BTreeMap<String, SymbolicThread>>,
}

impl SymbolicThreadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting of `symbol` and return its updated meaning.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        user_id: &str,
        symbol: &str,
        at: u64,
        phase: Phase,
        element: Element,
        context: &str,
        resonance: f64,
    ) -> SymbolMeaning {
        self.threads.with(user_id, BTreeMap::new, |threads| {
            let thread = threads.entry(symbol.to_string()).or_insert_with(|| {
                tracing::debug!(user_id, symbol, "new symbolic thread");
                SymbolicThread::new(symbol, at)
            });
            thread.push(
                Appearance {
                    at,
                    phase,
                    element,
                    context: text::excerpt(context, CONTEXT_CHARS),
                },
                resonance,
            );
            thread.current_meaning.clone()
        })
    }

    /// Symbols seen within `window_secs` of `now` that either occur in
    /// `query` or were mentioned in their own recent contexts, strongest first.
    pub fn resonant_symbols(
        &self,
        user_id: &str,
        query: &str,
        window_secs: u64,
        now: u64,
    ) -> Vec<String> {
        let query_tokens = text::tokenize(query);
        self.threads
            .with_existing(user_id, |threads| {
                let mut hits: Vec<(&str, f64)> = threads
                    .values()
                    .filter(|t| now.saturating_sub(t.last_seen()) <= window_secs)
                    .filter(|t| {
                        text::contains_keyword(&query_tokens, &t.symbol) || t.mentioned_recently()
                    })
                    .map(|t| (t.symbol.as_str(), t.archetypal_resonance))
                    .collect();
                hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
                hits.into_iter().map(|(s, _)| s.to_string()).collect()
            })
            .unwrap_or_default()
    }

    pub fn thread(&self, user_id: &str, symbol: &str) -> Option<SymbolicThread> {
        self.threads
            .with_existing(user_id, |threads| threads.get(symbol).cloned())
            .flatten()
    }

    /// All of a user's threads, keyed by symbol.
    pub fn threads(&self, user_id: &str) -> BTreeMap<String, SymbolicThread> {
        self.threads.get(user_id).unwrap_or_default()
    }

    pub fn evolving_symbol_count(&self, user_id: &str) -> usize {
        self.threads
            .with_existing(user_id, |threads| threads.values().filter(|t| t.is_evolving()).count())
            .unwrap_or(0)
    }

    pub(crate) fn restore(&self, user_id: &str, threads: BTreeMap<String, SymbolicThread>) {
        self.threads.insert(user_id, threads);
    }
}
