//! Engine facade: top-level API for spiralgate.
//!
//! The `SpiralEngine` owns the gate registry, the progression engine, the
//! memory bridge, and the collective aggregator, and wires them into a single
//! interaction pipeline:
//!
//! ```text
//! event ─► record signals ─► record interaction ─► derive context ─► advance
//! ```
//!
//! The pipeline runs under a per-user session lock, so one user's events are
//! processed in order while different users proceed in parallel.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, DAY_SECS, SystemClock};
use crate::collective::{CollectiveInsights, CollectivePatternAggregator};
use crate::config::SpiralConfig;
use crate::context::{ContextSnapshot, Signal};
use crate::error::{SpiralResult, StoreError};
use crate::gate::GateRegistry;
use crate::guidance::PhaseGuidance;
use crate::memory::narrative::NarrativeArc;
use crate::memory::{
    GuidanceBundle, InteractionRecord, MemoryBridge, MemorySettings, SymbolicThread, UserMemory,
};
use crate::phase::{Element, Phase};
use crate::progression::{
    ProgressionEngine, ProgressionSettings, ReadinessReport, TransitionNotice, UserPhaseState,
};
use crate::store::UserStore;
use crate::store::durable::DurableStore;

/// Whole days in the current phase.
pub const PHASE_DAYS: &str = "phase_days";
/// The user's current phase resonance.
pub const PHASE_RESONANCE: &str = "phase_resonance";
pub const SPIRAL_COUNT: &str = "spiral_count";
/// Upstream flag marking the gate's ritual as done.
pub const RITUAL_COMPLETED: &str = "ritual_completed";

/// Key prefix of persisted user snapshots.
const USER_PREFIX: &str = "user:";

/// One inbound interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub user_id: String,
    pub content: String,
    pub guidance: GuidanceBundle,
    pub element: Element,
    /// Phase to tag the interaction with; the user's current phase if absent.
    #[serde(default)]
    pub phase: Option<Phase>,
    /// Upstream signals observed alongside the interaction.
    #[serde(default)]
    pub signals: ContextSnapshot,
}

/// Result of processing one interaction.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionOutcome {
    pub record: InteractionRecord,
    /// The context the gate was evaluated against.
    pub context: ContextSnapshot,
    pub transition: Option<TransitionNotice>,
    /// Phase after the interaction.
    pub phase: Phase,
    pub guidance: &'static PhaseGuidance,
}

/// The spiralgate engine.
pub struct SpiralEngine {
    config: SpiralConfig,
    clock: Arc<dyn Clock>,
    progression: ProgressionEngine,
    memory: MemoryBridge,
    collective: Arc<CollectivePatternAggregator>,
    sessions: UserStore<()>,
    durable: Option<DurableStore>,
}

impl SpiralEngine {
    /// Create an engine on the system clock.
    pub fn new(config: SpiralConfig) -> SpiralResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine on the given clock, restoring persisted users when
    /// `data_dir` is set.
    pub fn with_clock(config: SpiralConfig, clock: Arc<dyn Clock>) -> SpiralResult<Self> {
        config.validate()?;
        let registry = Arc::new(config.registry()?);

        tracing::info!(
            gates = registry.gates().len(),
            readiness_threshold = config.readiness_threshold,
            persistent = config.data_dir.is_some(),
            "initializing spiralgate engine"
        );

        let collective = Arc::new(CollectivePatternAggregator::new(
            config.pattern_log_capacity,
            config.trend_capacity,
            Arc::clone(&clock),
        ));
        let progression = ProgressionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&clock),
            ProgressionSettings {
                readiness_threshold: config.readiness_threshold,
                baseline_resonance: config.baseline_resonance,
                breakthrough_increment: config.breakthrough_increment,
            },
        );
        let memory = MemoryBridge::new(
            Arc::clone(&collective),
            Arc::clone(&clock),
            MemorySettings {
                recent_window: config.recent_window,
                recency_window_secs: config.recency_window_secs(),
            },
        );
        let durable = match &config.data_dir {
            Some(dir) => Some(DurableStore::open(dir)?),
            None => None,
        };

        let engine = Self {
            config,
            clock,
            progression,
            memory,
            collective,
            sessions: UserStore::new(),
            durable,
        };
        engine.restore()?;
        Ok(engine)
    }

    // ----- interaction pipeline -----

    /// Record an interaction, derive the user's context, and advance their
    /// phase when the gate opens.
    ///
    /// Auto-advances count the ritual as completed when the gate does not
    /// ask for one, or when the `ritual_completed` signal is set. Upstream
    /// signals are cleared on transition; the next gate needs fresh ones.
    pub fn process_interaction(&self, event: InteractionEvent) -> InteractionOutcome {
        let user_id = event.user_id.as_str();
        self.sessions.with(user_id, || (), |_| {
            let state = self.progression.enroll(user_id);
            self.memory.record_signals(user_id, &event.signals);
            let phase = event.phase.unwrap_or(state.current_phase);
            let record = self.memory.record_interaction(
                user_id,
                &event.content,
                &event.guidance,
                event.element,
                phase,
            );

            let context = self.context_for(user_id);
            let ritual_completed =
                context.flag(RITUAL_COMPLETED) || !self.progression.ritual_required(user_id);
            let transition = self.progression.advance(user_id, &context, ritual_completed);
            if transition.is_some() {
                self.memory.clear_signals(user_id);
            }
            let phase = self.progression.current_phase(user_id);

            InteractionOutcome {
                record,
                context,
                transition,
                phase,
                guidance: self.progression.guidance_for(phase),
            }
        })
    }

    /// Memory-derived context plus the user's phase bookkeeping signals.
    /// Upstream signals of the same name take precedence.
    pub fn context_for(&self, user_id: &str) -> ContextSnapshot {
        let mut ctx = self.memory.derive_context(user_id);
        if let Some(state) = self.progression.state(user_id) {
            let days = (state.elapsed(self.clock.now()) / DAY_SECS) as f64;
            let bookkeeping = [
                (PHASE_DAYS, Signal::Number(days)),
                (PHASE_RESONANCE, Signal::Number(state.phase_resonance)),
                (SPIRAL_COUNT, Signal::Number(f64::from(state.spiral_count))),
            ];
            for (key, value) in bookkeeping {
                if !ctx.contains(key) {
                    ctx.set(key, value);
                }
            }
        }
        ctx
    }

    /// Whether the user's gate is open right now, without transitioning.
    pub fn evaluate(&self, user_id: &str) -> Option<Phase> {
        let ctx = self.context_for(user_id);
        self.progression.evaluate(user_id, &ctx)
    }

    /// Full readiness breakdown for the user's current gate.
    pub fn assess(&self, user_id: &str) -> ReadinessReport {
        let ctx = self.context_for(user_id);
        self.progression.assess(user_id, &ctx)
    }

    pub fn record_breakthrough(&self, user_id: &str, data: BTreeMap<String, String>) -> f64 {
        self.sessions
            .with(user_id, || (), |_| self.progression.record_breakthrough(user_id, data))
    }

    /// Move a user without consulting the gate.
    pub fn force_transition(
        &self,
        user_id: &str,
        to: Phase,
        ritual_completed: bool,
    ) -> TransitionNotice {
        self.sessions.with(user_id, || (), |_| {
            tracing::warn!(user_id, to = %to, "forcing phase transition");
            let notice = self.progression.transition(user_id, to, ritual_completed);
            self.memory.clear_signals(user_id);
            notice
        })
    }

    /// Guidance for the user's current phase.
    pub fn guidance(&self, user_id: &str) -> &'static PhaseGuidance {
        self.progression
            .guidance_for(self.progression.current_phase(user_id))
    }

    pub fn collective_insights(&self) -> CollectiveInsights {
        self.collective.collective_insights()
    }

    // ----- accessors -----

    pub fn progression(&self) -> &ProgressionEngine {
        &self.progression
    }

    pub fn memory(&self) -> &MemoryBridge {
        &self.memory
    }

    pub fn collective(&self) -> &CollectivePatternAggregator {
        &self.collective
    }

    pub fn registry(&self) -> &GateRegistry {
        self.progression.registry()
    }

    pub fn config(&self) -> &SpiralConfig {
        &self.config
    }

    pub fn info(&self) -> EngineInfo {
        let users = self.user_ids();
        EngineInfo {
            user_count: users.len(),
            interaction_count: users.iter().map(|u| self.memory.records(u).len()).sum(),
            gate_count: self.registry().gates().len(),
            collective_patterns: self.collective.total_patterns(),
            collective_resonance: self.collective.collective_resonance(),
            persistent: self.durable.is_some(),
        }
    }

    /// Every user known to progression or memory, sorted.
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .progression
            .all_states()
            .into_iter()
            .map(|s| s.user_id)
            .collect();
        ids.extend(self.memory.user_ids());
        ids.sort();
        ids.dedup();
        ids
    }

    // ----- persistence -----

    /// Write every user's state to the durable store. Returns the number of
    /// users written; 0 in memory-only mode.
    pub fn persist(&self) -> SpiralResult<usize> {
        let Some(durable) = &self.durable else {
            return Ok(0);
        };
        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        for user_id in self.user_ids() {
            let snapshot = self.sessions.with(&user_id, || (), |_| {
                StoredUser::capture(self.progression.state(&user_id), self.memory.export(&user_id))
            });
            let bytes = bincode::serialize(&snapshot).map_err(|e| StoreError::Serialization {
                message: format!("user {user_id}: {e}"),
            })?;
            entries.push((format!("{USER_PREFIX}{user_id}").into_bytes(), bytes));
        }
        let batch: Vec<(&[u8], &[u8])> = entries
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
            .collect();
        durable.put_batch(&batch)?;
        tracing::info!(users = entries.len(), "persisted user state");
        Ok(entries.len())
    }

    fn restore(&self) -> SpiralResult<()> {
        let Some(durable) = &self.durable else {
            return Ok(());
        };
        let entries = durable.scan_prefix(USER_PREFIX.as_bytes())?;
        for (key, value) in &entries {
            let user_id = String::from_utf8_lossy(&key[USER_PREFIX.len()..]).into_owned();
            let stored: StoredUser =
                bincode::deserialize(value).map_err(|e| StoreError::Serialization {
                    message: format!("user {user_id}: {e}"),
                })?;
            let (phase, memory) = stored.into_parts();
            if let Some(state) = phase {
                self.progression.restore(state);
            }
            self.memory.import(&user_id, memory);
        }
        if !entries.is_empty() {
            tracing::info!(users = entries.len(), "restored user state");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SpiralEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiralEngine")
            .field("config", &self.config)
            .field("users", &self.sessions.len())
            .field("persistent", &self.durable.is_some())
            .finish()
    }
}

/// Summary counters for the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineInfo {
    pub user_count: usize,
    pub interaction_count: usize,
    pub gate_count: usize,
    pub collective_patterns: u64,
    pub collective_resonance: f64,
    pub persistent: bool,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "spiralgate engine info")?;
        writeln!(f, "  users:         {}", self.user_count)?;
        writeln!(f, "  interactions:  {}", self.interaction_count)?;
        writeln!(f, "  gates:         {}", self.gate_count)?;
        writeln!(f, "  patterns:      {}", self.collective_patterns)?;
        writeln!(f, "  resonance:     {:.3}", self.collective_resonance)?;
        writeln!(f, "  persistent:    {}", self.persistent)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Persisted form
// ---------------------------------------------------------------------------

/// bincode needs an explicitly tagged signal; the public `Signal` is untagged
/// for JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum StoredSignal {
    Flag(bool),
    Number(f64),
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredUser {
    phase: Option<UserPhaseState>,
    records: Vec<InteractionRecord>,
    signals: Vec<(String, StoredSignal)>,
    threads: BTreeMap<String, SymbolicThread>,
    arcs: Vec<NarrativeArc>,
}

impl StoredUser {
    fn capture(phase: Option<UserPhaseState>, memory: UserMemory) -> Self {
        let signals = memory
            .signals
            .iter()
            .map(|(k, v)| {
                let stored = match v {
                    Signal::Flag(b) => StoredSignal::Flag(b),
                    Signal::Number(n) => StoredSignal::Number(n),
                };
                (k.to_string(), stored)
            })
            .collect();
        Self {
            phase,
            records: memory.records,
            signals,
            threads: memory.threads,
            arcs: memory.arcs,
        }
    }

    fn into_parts(self) -> (Option<UserPhaseState>, UserMemory) {
        let signals = self
            .signals
            .into_iter()
            .map(|(k, v)| {
                let signal = match v {
                    StoredSignal::Flag(b) => Signal::Flag(b),
                    StoredSignal::Number(n) => Signal::Number(n),
                };
                (k, signal)
            })
            .collect();
        let memory = UserMemory {
            records: self.records,
            signals,
            threads: self.threads,
            arcs: self.arcs,
        };
        (self.phase, memory)
    }
}
