//! Persistence and recovery tests for the spiralgate engine.
//!
//! These tests verify that phase state, interaction history, symbol threads,
//! narrative arcs, and upstream signals survive an engine restart.

use std::sync::Arc;

use spiralgate::clock::ManualClock;
use spiralgate::config::SpiralConfig;
use spiralgate::context::{ContextSnapshot, Signal};
use spiralgate::engine::{InteractionEvent, SpiralEngine};
use spiralgate::memory::GuidanceBundle;
use spiralgate::phase::{Element, Phase};

const T0: u64 = 1_700_000_000;

fn persistent_engine(dir: &std::path::Path, clock: Arc<ManualClock>) -> SpiralEngine {
    SpiralEngine::with_clock(
        SpiralConfig {
            data_dir: Some(dir.to_path_buf()),
            ..Default::default()
        },
        clock,
    )
    .unwrap()
}

fn event(user: &str, content: &str, signals: ContextSnapshot) -> InteractionEvent {
    InteractionEvent {
        user_id: user.into(),
        content: content.into(),
        guidance: GuidanceBundle::new(Element::Water, Phase::Initiation, "Let the river carry you.")
            .with_archetype("Mystic")
            .with_image("an ocean at dusk")
            .with_resonance(0.9),
        element: Element::Water,
        phase: None,
        signals,
    }
}

#[test]
fn user_state_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(T0));

    // First session: progress one user, record history, persist.
    {
        let engine = persistent_engine(dir.path(), clock.clone());
        assert!(engine.info().persistent);
        let signals = ContextSnapshot::new()
            .with("vision_clarity", 0.9)
            .with("actions_taken", 2.0)
            .with("commitment_level", 0.8)
            .with("ritual_completed", true);
        engine.process_interaction(event("ana", "I want to heal by the ocean", signals));
        clock.advance_days(3);
        let outcome =
            engine.process_interaction(event("ana", "the ocean again", ContextSnapshot::new()));
        assert_eq!(outcome.phase, Phase::Exploration);
        engine.record_breakthrough("ana", Default::default());
        let signals = ContextSnapshot::new()
            .with("ritual_completed", true)
            .with("vision_clarity", 0.4);
        engine.process_interaction(event("ben", "just arrived", signals));
        assert_eq!(engine.persist().unwrap(), 2);
    }

    // Second session: reopen and verify.
    {
        let engine = persistent_engine(dir.path(), clock.clone());
        assert_eq!(engine.info().user_count, 2);
        assert_eq!(engine.info().interaction_count, 3);

        let state = engine.progression().state("ana").unwrap();
        assert_eq!(state.current_phase, Phase::Exploration);
        assert_eq!(state.phase_history.len(), 1);
        assert!(state.phase_history[0].ritual_completed);
        assert_eq!(state.breakthrough_moments.len(), 1);
        assert!((state.phase_resonance - 0.6).abs() < 1e-9);

        let records = engine.memory().records("ana");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].seq, 2);
        assert_eq!(records[0].symbols, vec!["ocean", "mystic"]);

        let thread = engine.memory().symbols().thread("ana", "ocean").unwrap();
        assert_eq!(thread.first_appearance, T0);
        assert_eq!(thread.appearances.len(), 2);

        let arcs = engine.memory().narratives().arcs("ana");
        assert_eq!(arcs.len(), 1);
        assert_eq!(arcs[0].title, "healing");

        // Ana's signals were cleared at her crossing; Ben's keep their kinds.
        let ctx = engine.context_for("ana");
        assert!(!ctx.contains("ritual_completed"));
        let ctx = engine.context_for("ben");
        assert_eq!(ctx.get("ritual_completed"), Some(Signal::Flag(true)));
        assert_eq!(ctx.get("vision_clarity"), Some(Signal::Number(0.4)));

        assert_eq!(engine.progression().current_phase("ben"), Phase::Initiation);

        // Collective state is rebuilt, not restored.
        assert_eq!(engine.collective_insights().total_patterns, 0);
    }
}

#[test]
fn restored_user_keeps_progressing() {
    let dir = tempfile::TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(T0));

    {
        let engine = persistent_engine(dir.path(), clock.clone());
        let signals = ContextSnapshot::new()
            .with("vision_clarity", 0.9)
            .with("actions_taken", 1.0)
            .with("commitment_level", 0.7);
        engine.process_interaction(event("ana", "day one", signals));
        engine.persist().unwrap();
    }

    clock.advance_days(3);
    let engine = persistent_engine(dir.path(), clock.clone());
    // Entry time and upstream signals came back, so the gate opens now.
    assert_eq!(engine.evaluate("ana"), Some(Phase::Exploration));
    let outcome = engine.process_interaction(event("ana", "day four", ContextSnapshot::new()));
    assert_eq!(outcome.transition.unwrap().to, Phase::Exploration);
    assert_eq!(outcome.record.seq, 2);
}

#[test]
fn fresh_data_dir_starts_empty() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = persistent_engine(dir.path(), Arc::new(ManualClock::new(T0)));
    assert_eq!(engine.info().user_count, 0);
    assert_eq!(engine.persist().unwrap(), 0);
    assert!(dir.path().join(spiralgate::store::durable::DB_FILE).exists());
}
