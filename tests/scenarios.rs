//! End-to-end phase progression through the engine facade.
//!
//! Time is driven by a `ManualClock`, so multi-day dwell requirements run
//! instantly.

use std::sync::Arc;

use spiralgate::clock::ManualClock;
use spiralgate::config::SpiralConfig;
use spiralgate::context::ContextSnapshot;
use spiralgate::engine::{InteractionEvent, RITUAL_COMPLETED, SpiralEngine};
use spiralgate::memory::{GuidanceBundle, SymbolMeaning};
use spiralgate::phase::{Element, Phase};

const T0: u64 = 1_700_000_000;

fn engine() -> (SpiralEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let engine = SpiralEngine::with_clock(SpiralConfig::default(), clock.clone()).unwrap();
    (engine, clock)
}

fn event(user: &str, content: &str, signals: ContextSnapshot) -> InteractionEvent {
    InteractionEvent {
        user_id: user.into(),
        content: content.into(),
        guidance: GuidanceBundle::new(Element::Fire, Phase::Initiation, "Trust what calls you.")
            .with_archetype("Seeker"),
        element: Element::Fire,
        phase: None,
        signals,
    }
}

fn initiation_signals(vision: f64) -> ContextSnapshot {
    ContextSnapshot::new()
        .with("vision_clarity", vision)
        .with("actions_taken", 1.0)
        .with("commitment_level", 0.7)
}

/// Walk a user around the cycle up to `target` without consulting gates.
fn force_to(engine: &SpiralEngine, user: &str, target: Phase) {
    let mut phase = engine.progression().current_phase(user);
    while phase != target {
        phase = engine.force_transition(user, phase.successor(), true).to;
    }
}

#[test]
fn initiation_opens_after_three_days() {
    let (engine, clock) = engine();
    let first = engine.process_interaction(event("ana", "starting out", initiation_signals(0.8)));
    assert!(first.transition.is_none(), "dwell time not yet served");

    clock.advance_days(3);
    let outcome =
        engine.process_interaction(event("ana", "I know what I want", ContextSnapshot::new()));
    let notice = outcome.transition.expect("gate should open");
    assert_eq!(notice.from, Phase::Initiation);
    assert_eq!(notice.to, Phase::Exploration);
    assert_eq!(notice.spiral_count, 1);
    assert!(!notice.ritual_completed);
    assert_eq!(outcome.phase, Phase::Exploration);
    assert_eq!(outcome.guidance.phase, Phase::Exploration);

    let state = engine.progression().state("ana").unwrap();
    assert_eq!(state.phase_history.len(), 1);
    assert_eq!(state.phase_resonance, 0.5);
    assert!(state.completed_conditions.is_empty());
}

#[test]
fn unmet_required_condition_blocks_regardless_of_others() {
    let (engine, clock) = engine();
    engine.process_interaction(event("ana", "starting out", initiation_signals(0.5)));
    clock.advance_days(30);
    let outcome = engine.process_interaction(event("ana", "still here", ContextSnapshot::new()));
    assert!(outcome.transition.is_none());
    assert_eq!(engine.evaluate("ana"), None);

    let report = engine.assess("ana");
    assert!(report.duration_met);
    assert!(!report.score.required_met);
    assert!(!report.ready);
    assert_eq!(engine.progression().current_phase("ana"), Phase::Initiation);
}

#[test]
fn minimum_duration_is_enforced() {
    let (engine, clock) = engine();
    engine.process_interaction(event("ana", "hello", initiation_signals(0.9)));
    clock.advance_days(2);
    assert_eq!(engine.evaluate("ana"), None);
    assert!(!engine.assess("ana").duration_met);
    clock.advance_days(1);
    assert_eq!(engine.evaluate("ana"), Some(Phase::Exploration));
}

#[test]
fn ritual_signal_marks_transition() {
    let (engine, clock) = engine();
    let signals = initiation_signals(0.9).with(RITUAL_COMPLETED, true);
    engine.process_interaction(event("ana", "hello", signals));
    clock.advance_days(3);
    let outcome = engine.process_interaction(event("ana", "ready", ContextSnapshot::new()));
    assert!(outcome.transition.unwrap().ritual_completed);
}

#[test]
fn upstream_signals_expire_at_each_gate() {
    let (engine, clock) = engine();
    let signals = initiation_signals(0.9)
        .with(RITUAL_COMPLETED, true)
        .with("collective_resonance", 0.95);
    engine.process_interaction(event("ana", "hello", signals));
    clock.advance_days(3);
    let first = engine.process_interaction(event("ana", "ready", ContextSnapshot::new()));
    assert!(first.transition.unwrap().ritual_completed);

    // The live collective mean and the fresh phase show through again.
    let ctx = engine.context_for("ana");
    assert!(!ctx.contains(RITUAL_COMPLETED));
    assert_eq!(ctx.number("vision_clarity"), 0.0);
    assert!((ctx.number("collective_resonance") - 0.7).abs() < 1e-9);

    clock.advance_days(7);
    let exploration = ContextSnapshot::new()
        .with("edges_encountered", 3.0)
        .with("patterns_seen", 2.0);
    let second = engine.process_interaction(event("ana", "edges everywhere", exploration));
    let notice = second.transition.expect("exploration gate should open");
    assert_eq!(notice.to, Phase::Challenge);
    assert!(!notice.ritual_completed, "no ritual was reported for this gate");

    let history = engine.progression().state("ana").unwrap().phase_history;
    assert!(history[0].ritual_completed);
    assert!(!history[1].ritual_completed);
}

#[test]
fn forced_transition_clears_upstream_signals() {
    let (engine, _) = engine();
    engine.process_interaction(event("ana", "hello", initiation_signals(0.9)));
    engine.force_transition("ana", Phase::Exploration, false);
    assert!(!engine.context_for("ana").contains("commitment_level"));
}

#[test]
fn transcendence_returns_to_initiation_on_a_new_spiral() {
    let (engine, clock) = engine();
    engine.progression().enroll("ana");
    force_to(&engine, "ana", Phase::Transcendence);
    assert_eq!(engine.progression().state("ana").unwrap().spiral_count, 1);

    clock.advance_days(7);
    let signals = ContextSnapshot::new()
        .with("completion_sense", 0.95)
        .with("new_vision_emerging", 0.6);
    let outcome = engine.process_interaction(event("ana", "the circle closes", signals));
    let notice = outcome.transition.expect("cycle should close");
    assert_eq!(notice.from, Phase::Transcendence);
    assert_eq!(notice.to, Phase::Initiation);
    assert_eq!(notice.spiral_count, 2);

    let state = engine.progression().state("ana").unwrap();
    assert_eq!(state.spiral_count, 2);
    assert_eq!(state.current_phase, Phase::Initiation);
    assert_eq!(state.phase_history.len(), 7);
}

#[test]
fn spiral_count_is_per_user() {
    let (engine, clock) = engine();
    engine.progression().enroll("ana");
    engine.progression().enroll("ben");
    force_to(&engine, "ana", Phase::Transcendence);
    clock.advance_days(7);
    engine.process_interaction(event(
        "ana",
        "done",
        ContextSnapshot::new().with("completion_sense", 1.0).with("new_vision_emerging", 1.0),
    ));
    assert_eq!(engine.progression().state("ana").unwrap().spiral_count, 2);
    assert_eq!(engine.progression().state("ben").unwrap().spiral_count, 1);
}

#[test]
fn collective_threshold_gates_challenge() {
    let (engine, clock) = engine();
    engine.progression().enroll("ana");
    force_to(&engine, "ana", Phase::Challenge);
    clock.advance_days(14);

    let personal = ContextSnapshot::new()
        .with("crisis_intensity", 0.9)
        .with("identity_fluidity", 0.8)
        .with("surrender_level", 0.7);
    // Default guidance resonance puts the collective mean at 0.7.
    let outcome = engine.process_interaction(event("ana", "the storm", personal));
    assert!(outcome.transition.is_none());
    assert!(!engine.assess("ana").collective_met);

    let field = ContextSnapshot::new().with("collective_resonance", 0.85);
    let outcome = engine.process_interaction(event("ana", "the storm passes", field));
    assert_eq!(outcome.transition.unwrap().to, Phase::Transformation);
}

#[test]
fn fire_symbol_evolves_across_phases() {
    let (engine, clock) = engine();
    let phases = [Phase::Initiation, Phase::Initiation, Phase::Exploration, Phase::Exploration];
    for phase in phases {
        let mut e = event("ana", "the fire inside me grows", ContextSnapshot::new());
        e.phase = Some(phase);
        engine.process_interaction(e);
        clock.advance(3_600);
    }
    let thread = engine.memory().symbols().thread("ana", "fire").unwrap();
    assert_eq!(thread.first_appearance, T0);
    assert_eq!(thread.appearances.len(), 4);
    assert_eq!(thread.elemental_associations[&Element::Fire], 4);
    assert_eq!(
        thread.current_meaning,
        SymbolMeaning::EvolvingThrough {
            symbol: "fire".into(),
            phase: Phase::Exploration,
        }
    );

    let arcs = engine.memory().narratives().arcs("ana");
    assert_eq!(arcs.len(), 1);
    assert_eq!(arcs[0].title, "growth");
    assert_eq!(arcs[0].key_events.len(), 4);
}

#[test]
fn users_progress_independently_in_parallel() {
    let (engine, clock) = engine();
    let engine = Arc::new(engine);
    let users: Vec<String> = (0..16).map(|i| format!("user-{i}")).collect();
    for user in &users {
        engine.process_interaction(event(user, "begin", initiation_signals(0.9)));
    }
    clock.advance_days(3);

    let handles: Vec<_> = users
        .iter()
        .cloned()
        .map(|user| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                (0..5)
                    .filter_map(|_| {
                        engine
                            .process_interaction(event(&user, "onward", ContextSnapshot::new()))
                            .transition
                    })
                    .count()
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), 1, "each user crosses exactly once");
    }
    for user in &users {
        assert_eq!(engine.progression().current_phase(user), Phase::Exploration);
    }
    assert_eq!(engine.info().user_count, 16);
    assert_eq!(engine.collective_insights().total_patterns, 16 * 6);
}

#[test]
fn breakthroughs_raise_resonance_until_transition() {
    let (engine, clock) = engine();
    engine.process_interaction(event("ana", "hello", initiation_signals(0.9)));
    let data = [("insight".to_string(), "saw it".to_string())].into();
    let r1 = engine.record_breakthrough("ana", data);
    let r2 = engine.record_breakthrough("ana", Default::default());
    assert!((r1 - 0.6).abs() < 1e-9);
    assert!((r2 - 0.7).abs() < 1e-9);
    assert!((engine.context_for("ana").number("phase_resonance") - 0.7).abs() < 1e-9);

    clock.advance_days(3);
    engine.process_interaction(event("ana", "crossing", ContextSnapshot::new()));
    let state = engine.progression().state("ana").unwrap();
    assert_eq!(state.current_phase, Phase::Exploration);
    assert_eq!(state.phase_resonance, 0.5);
    assert_eq!(state.breakthrough_moments.len(), 2);
}
