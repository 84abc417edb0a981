//! Collective field: anonymized patterns aggregated across all users.
//!
//! Counters are lock-free (`DashMap` of `AtomicU64`). The rolling pattern log
//! and the per-element resonance trends are bounded ring buffers; once full,
//! the oldest entry is dropped.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::phase::{Element, Phase};
use crate::store::lock;

/// Patterns considered when ranking phases.
const PHASE_WINDOW: usize = 100;
const TOP_ARCHETYPES: usize = 5;
const TOP_PHASES: usize = 3;

/// A user-free summary of one interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizedPattern {
    pub archetype: Option<String>,
    pub element: Element,
    pub phase: Phase,
    pub resonance: f64,
    pub themes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LoggedPattern {
    at: u64,
    pattern: AnonymizedPattern,
}

/// Aggregate view of the collective field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectiveInsights {
    /// At most five, by count descending then name.
    pub top_archetypes: Vec<(String, u64)>,
    /// Mean trend value, for elements with any data.
    pub element_resonance: BTreeMap<Element, f64>,
    pub theme_frequency: Vec<(String, u64)>,
    /// Most frequent phases among the latest patterns, at most three.
    pub phase_frequency: Vec<(Phase, u64)>,
    /// Patterns currently held in the rolling log.
    pub pattern_count: usize,
    /// Patterns ever added.
    pub total_patterns: u64,
    /// When the newest logged pattern arrived.
    pub latest_pattern_at: Option<u64>,
}

/// Concurrent aggregator shared by every user session.
#[derive(Debug)]
pub struct CollectivePatternAggregator {
    archetypes: DashMap<String, AtomicU64>,
    themes: DashMap<String, AtomicU64>,
    phases: DashMap<Phase, AtomicU64>,
    log: Mutex<VecDeque<LoggedPattern>>,
    trends: [Mutex<VecDeque<f64>>; 5],
    total: AtomicU64,
    log_capacity: usize,
    trend_capacity: usize,
    clock: Arc<dyn Clock>,
}

impl CollectivePatternAggregator {
    pub fn new(log_capacity: usize, trend_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            archetypes: DashMap::new(),
            themes: DashMap::new(),
            phases: DashMap::new(),
            log: Mutex::new(VecDeque::with_capacity(log_capacity.min(1024))),
            trends: std::array::from_fn(|_| Mutex::new(VecDeque::new())),
            total: AtomicU64::new(0),
            log_capacity: log_capacity.max(1),
            trend_capacity: trend_capacity.max(1),
            clock,
        }
    }

    /// Fold one pattern into the field.
    pub fn add_pattern(&self, pattern: AnonymizedPattern) {
        if let Some(archetype) = &pattern.archetype {
            bump(&self.archetypes, archetype.clone());
        }
        for theme in &pattern.themes {
            bump(&self.themes, theme.clone());
        }
        bump(&self.phases, pattern.phase);

        let resonance = if pattern.resonance.is_finite() {
            pattern.resonance.clamp(0.0, 1.0)
        } else {
            0.0
        };
        {
            let mut trend = lock(&self.trends[pattern.element.index()]);
            if trend.len() >= self.trend_capacity {
                trend.pop_front();
            }
            trend.push_back(resonance);
        }
        {
            let mut log = lock(&self.log);
            if log.len() >= self.log_capacity {
                log.pop_front();
            }
            log.push_back(LoggedPattern {
                at: self.clock.now(),
                pattern,
            });
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn collective_insights(&self) -> CollectiveInsights {
        let mut top_archetypes = ranked(&self.archetypes);
        top_archetypes.truncate(TOP_ARCHETYPES);

        let element_resonance = Element::ALL
            .into_iter()
            .filter_map(|e| {
                let trend = lock(&self.trends[e.index()]);
                mean(trend.iter().copied()).map(|m| (e, m))
            })
            .collect();

        let (phase_frequency, pattern_count, latest_pattern_at) = {
            let log = lock(&self.log);
            let mut counts: BTreeMap<Phase, u64> = BTreeMap::new();
            for entry in log.iter().rev().take(PHASE_WINDOW) {
                *counts.entry(entry.pattern.phase).or_insert(0) += 1;
            }
            let mut phases: Vec<(Phase, u64)> = counts.into_iter().collect();
            phases.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            phases.truncate(TOP_PHASES);
            (phases, log.len(), log.back().map(|p| p.at))
        };

        CollectiveInsights {
            top_archetypes,
            element_resonance,
            theme_frequency: ranked(&self.themes),
            phase_frequency,
            pattern_count,
            total_patterns: self.total.load(Ordering::Relaxed),
            latest_pattern_at,
        }
    }

    /// Mean of every stored trend value; 0 with no data.
    pub fn collective_resonance(&self) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for trend in &self.trends {
            let trend = lock(trend);
            sum += trend.iter().sum::<f64>();
            count += trend.len();
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    /// Lifetime count of one phase across all patterns.
    pub fn phase_count(&self, phase: Phase) -> u64 {
        self.phases
            .get(&phase)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Patterns ever added.
    pub fn total_patterns(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

fn bump<K: std::hash::Hash + Eq>(map: &DashMap<K, AtomicU64>, key: K) {
    map.entry(key)
        .or_insert_with(|| AtomicU64::new(0))
        .fetch_add(1, Ordering::Relaxed);
}

fn ranked(map: &DashMap<String, AtomicU64>) -> Vec<(String, u64)> {
    let mut out: Vec<(String, u64)> = map
        .iter()
        .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}
