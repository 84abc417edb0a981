//! Memory bridge: interaction history and the signals derived from it.
//!
//! - [`record`]: interaction records, guidance bundles, valence and insights
//! - [`symbolic`]: per-user symbol threads
//! - [`narrative`]: per-user narrative arcs
//! - [`ritual`]: ritual sequences planned from memory
//!
//! The bridge owns the interaction log and the latest upstream signals for
//! each user, feeds the symbol and narrative trackers, and forwards an
//! anonymized pattern of every interaction to the collective aggregator.
//! [`MemoryBridge::derive_context`] turns all of that into the
//! [`ContextSnapshot`] the progression engine evaluates gates against.

pub mod narrative;
pub mod record;
pub mod ritual;
pub mod symbolic;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::clock::Clock;
use crate::collective::{AnonymizedPattern, CollectivePatternAggregator};
use crate::context::ContextSnapshot;
use crate::phase::{Element, Phase};
use crate::progression::COLLECTIVE_RESONANCE;
use crate::store::UserStore;
use crate::text;

pub use narrative::{NarrativeArc, NarrativeArcTracker};
pub use record::{GuidanceBundle, InteractionRecord};
pub use ritual::RitualStep;
pub use symbolic::{SymbolMeaning, SymbolicThread, SymbolicThreadTracker};

// ---------------------------------------------------------------------------
// Derived signal names
// ---------------------------------------------------------------------------

pub const INTEGRATION_AVERAGE: &str = "integration_average";
pub const TRANSFORMATION_MENTIONS: &str = "transformation_mentions";
pub const SYMBOL_EVOLUTION: &str = "symbol_evolution";
pub const TRANSFORMATION_READY: &str = "transformation_ready";
pub const MEMORY_DEPTH: &str = "memory_depth";
pub const EMOTIONAL_VALENCE_AVERAGE: &str = "emotional_valence_average";
pub const OPEN_ARCS: &str = "open_arcs";

/// `balance_<element>` signal name.
pub fn balance_signal(element: Element) -> String {
    format!("balance_{element}")
}

const TRANSFORMATION_WORDS: &[&str] = &["change", "transform", "ready", "new", "release", "let go"];
const CONTEXT_CHARS: usize = symbolic::CONTEXT_CHARS;

/// Readiness for transformation needs this much history...
const READY_MIN_RECORDS: usize = 5;
/// ...this average integration (exclusive)...
const READY_MIN_INTEGRATION: f64 = 0.75;
/// ...and this many recent transformation mentions.
const READY_MIN_MENTIONS: usize = 3;
/// Symbol evolution needs this many evolving threads.
const EVOLVING_SYMBOLS: usize = 2;

// ---------------------------------------------------------------------------
// Settings and summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySettings {
    /// Most recent records considered by `derive_context`.
    pub recent_window: usize,
    /// Symbols unseen for longer than this are not resonant.
    pub recency_window_secs: u64,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            recent_window: 10,
            recency_window_secs: 30 * crate::clock::DAY_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArcSummary {
    pub arc_id: String,
    pub title: String,
    pub chapter: String,
    pub unresolved_tensions: usize,
    pub completion: f64,
}

/// Compact view of a user's memory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySummary {
    pub user_id: String,
    /// Distinct symbols of the recent window, latest first.
    pub recent_symbols: Vec<String>,
    pub active_narratives: Vec<ArcSummary>,
    pub elemental_balance: BTreeMap<Element, f64>,
    pub integration_average: f64,
    pub memory_depth: usize,
}

/// Everything the bridge holds for one user, for persistence.
#[derive(Debug, Clone, Default)]
pub struct UserMemory {
    pub records: Vec<InteractionRecord>,
    pub signals: ContextSnapshot,
    pub threads: BTreeMap<String, SymbolicThread>,
    pub arcs: Vec<NarrativeArc>,
}

// ---------------------------------------------------------------------------
// MemoryBridge
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MemoryBridge {
    records: UserStore<Vec<InteractionRecord>>,
    signals: UserStore<ContextSnapshot>,
    symbols: SymbolicThreadTracker,
    narratives: NarrativeArcTracker,
    collective: Arc<CollectivePatternAggregator>,
    clock: Arc<dyn Clock>,
    settings: MemorySettings,
}

impl MemoryBridge {
    pub fn new(
        collective: Arc<CollectivePatternAggregator>,
        clock: Arc<dyn Clock>,
        settings: MemorySettings,
    ) -> Self {
        Self {
            records: UserStore::new(),
            signals: UserStore::new(),
            symbols: SymbolicThreadTracker::new(),
            narratives: NarrativeArcTracker::new(),
            collective,
            clock,
            settings,
        }
    }

    /// Analyze and store one interaction, then fan it out to the symbol and
    /// narrative trackers and the collective field.
    pub fn record_interaction(
        &self,
        user_id: &str,
        content: &str,
        guidance: &GuidanceBundle,
        element: Element,
        phase: Phase,
    ) -> InteractionRecord {
        let now = self.clock.now();
        let tokens = text::tokenize(content);
        let integration_level = guidance.effective_resonance();
        let symbols = interaction_symbols(content, guidance);
        let themes = narrative::extract_themes(&tokens);

        let record = self.records.with(user_id, Vec::new, |records| {
            let record = InteractionRecord {
                seq: records.len() as u64 + 1,
                user_id: user_id.to_string(),
                timestamp: now,
                content: content.to_string(),
                emotional_valence: record::emotional_valence(&tokens),
                integration_level,
                elements: vec![element],
                phase,
                insights: record::extract_insights(guidance),
                symbols,
                themes,
                guidance: guidance.clone(),
            };
            records.push(record.clone());
            record
        });

        let snippet = text::excerpt(content, CONTEXT_CHARS);
        for symbol in &record.symbols {
            self.symbols
                .record(user_id, symbol, now, phase, element, &snippet, integration_level);
        }
        let arcs = self.narratives.record(user_id, content, guidance, now);

        self.collective.add_pattern(AnonymizedPattern {
            archetype: guidance.archetype.clone(),
            element,
            phase,
            resonance: integration_level,
            themes: record.themes.clone(),
        });

        tracing::debug!(
            user_id,
            seq = record.seq,
            symbols = record.symbols.len(),
            arcs = arcs.len(),
            "interaction recorded"
        );
        record
    }

    /// Merge upstream signal values into the user's latest signals.
    pub fn record_signals(&self, user_id: &str, signals: &ContextSnapshot) {
        if signals.is_empty() {
            return;
        }
        self.signals
            .with(user_id, ContextSnapshot::new, |latest| latest.merge(signals));
    }

    /// Drop the user's upstream signals. They describe the current phase only,
    /// so the engine calls this on every transition.
    pub fn clear_signals(&self, user_id: &str) {
        self.signals
            .with_existing(user_id, |latest| *latest = ContextSnapshot::new());
    }

    /// Signals derived from the recent window, overlaid with the user's
    /// upstream signals. Upstream values win on key collisions.
    pub fn derive_context(&self, user_id: &str) -> ContextSnapshot {
        let (depth, recent) = self.recent(user_id);
        let mut ctx = ContextSnapshot::new();

        for (element, share) in elemental_balance(&recent) {
            ctx.set(balance_signal(element), share);
        }

        let integration = average(recent.iter().map(|r| r.integration_level));
        let mentions = recent
            .iter()
            .filter(|r| text::contains_any(&text::tokenize(&r.content), TRANSFORMATION_WORDS))
            .count();
        let ready = depth >= READY_MIN_RECORDS
            && integration > READY_MIN_INTEGRATION
            && mentions >= READY_MIN_MENTIONS;

        ctx.set(INTEGRATION_AVERAGE, integration);
        ctx.set(TRANSFORMATION_MENTIONS, mentions);
        ctx.set(
            SYMBOL_EVOLUTION,
            self.symbols.evolving_symbol_count(user_id) >= EVOLVING_SYMBOLS,
        );
        ctx.set(TRANSFORMATION_READY, ready);
        ctx.set(MEMORY_DEPTH, depth);
        ctx.set(
            EMOTIONAL_VALENCE_AVERAGE,
            average(recent.iter().map(|r| r.emotional_valence)),
        );
        ctx.set(OPEN_ARCS, self.narratives.open_arc_count(user_id));
        ctx.set(COLLECTIVE_RESONANCE, self.collective.collective_resonance());

        if let Some(upstream) = self.signals.get(user_id) {
            ctx.merge(&upstream);
        }
        ctx
    }

    pub fn user_summary(&self, user_id: &str) -> MemorySummary {
        let (depth, recent) = self.recent(user_id);
        let mut recent_symbols: Vec<String> = Vec::new();
        for symbol in recent.iter().rev().flat_map(|r| &r.symbols) {
            if !recent_symbols.contains(symbol) {
                recent_symbols.push(symbol.clone());
            }
        }
        let active_narratives = self
            .narratives
            .open_arcs(user_id)
            .into_iter()
            .map(|arc| ArcSummary {
                unresolved_tensions: arc.unresolved_tensions(),
                chapter: arc.current_chapter.to_string(),
                arc_id: arc.arc_id,
                title: arc.title,
                completion: arc.completion,
            })
            .collect();
        MemorySummary {
            user_id: user_id.to_string(),
            recent_symbols,
            active_narratives,
            elemental_balance: elemental_balance(&recent),
            integration_average: average(recent.iter().map(|r| r.integration_level)),
            memory_depth: depth,
        }
    }

    /// Ritual steps for `intention`, balancing the user's weakest element and
    /// working with their most resonant symbols.
    pub fn ritual_sequence(&self, user_id: &str, intention: &str) -> Vec<RitualStep> {
        let (_, recent) = self.recent(user_id);
        let resonant = self.symbols.resonant_symbols(
            user_id,
            intention,
            self.settings.recency_window_secs,
            self.clock.now(),
        );
        ritual::plan(&elemental_balance(&recent), &resonant)
    }

    /// Full interaction log of a user, oldest first.
    pub fn records(&self, user_id: &str) -> Vec<InteractionRecord> {
        self.records.get(user_id).unwrap_or_default()
    }

    pub fn symbols(&self) -> &SymbolicThreadTracker {
        &self.symbols
    }

    pub fn narratives(&self) -> &NarrativeArcTracker {
        &self.narratives
    }

    pub fn collective(&self) -> &CollectivePatternAggregator {
        &self.collective
    }

    pub fn settings(&self) -> MemorySettings {
        self.settings
    }

    /// Users with any recorded interactions or signals, sorted.
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids = self.records.user_ids();
        ids.extend(self.signals.user_ids());
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn export(&self, user_id: &str) -> UserMemory {
        UserMemory {
            records: self.records(user_id),
            signals: self.signals.get(user_id).unwrap_or_default(),
            threads: self.symbols.threads(user_id),
            arcs: self.narratives.arcs(user_id),
        }
    }

    /// Replace a user's memory with previously exported state.
    pub fn import(&self, user_id: &str, memory: UserMemory) {
        self.records.insert(user_id, memory.records);
        self.signals.insert(user_id, memory.signals);
        self.symbols.restore(user_id, memory.threads);
        self.narratives.restore(user_id, memory.arcs);
    }

    /// Total interactions and the latest `recent_window` of them.
    fn recent(&self, user_id: &str) -> (usize, Vec<InteractionRecord>) {
        let window = self.settings.recent_window;
        self.records
            .with_existing(user_id, |records| {
                let start = records.len().saturating_sub(window);
                (records.len(), records[start..].to_vec())
            })
            .unwrap_or_default()
    }
}

/// Vocabulary symbols in the content and symbolic image, plus the archetype.
fn interaction_symbols(content: &str, guidance: &GuidanceBundle) -> Vec<String> {
    let mut symbols = symbolic::extract_symbols(content);
    let image = guidance.symbolic_image.as_deref().unwrap_or_default();
    let archetype = guidance.archetype.as_deref().map(|a| a.trim().to_lowercase());
    for symbol in symbolic::extract_symbols(image).into_iter().chain(archetype) {
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

/// Share of each element among the records' element tags; all zero when empty.
fn elemental_balance(records: &[InteractionRecord]) -> BTreeMap<Element, f64> {
    let mut counts: BTreeMap<Element, usize> = Element::ALL.into_iter().map(|e| (e, 0)).collect();
    let mut total = 0usize;
    for element in records.iter().flat_map(|r| &r.elements) {
        *counts.entry(*element).or_insert(0) += 1;
        total += 1;
    }
    counts
        .into_iter()
        .map(|(e, n)| (e, if total == 0 { 0.0 } else { n as f64 / total as f64 }))
        .collect()
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}
