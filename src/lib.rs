// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # spiralgate
//!
//! Phase progression for a personal-growth companion: users move through a
//! seven-phase cycle, crossing weighted gates evaluated against signals
//! derived from their interaction history.
//!
//! ## Architecture
//!
//! - **Gates** (`gate`): weighted, serializable conditions per phase transition
//! - **Progression** (`progression`): per-user phase state, evaluation, transitions
//! - **Memory** (`memory`): interaction log, symbol threads, narrative arcs, rituals
//! - **Collective** (`collective`): anonymized cross-user aggregates
//! - **Storage** (`store`): per-user keyed locking, redb snapshots
//!
//! ## Library usage
//!
//! ```no_run
//! use spiralgate::config::SpiralConfig;
//! use spiralgate::engine::{InteractionEvent, SpiralEngine};
//! use spiralgate::memory::GuidanceBundle;
//! use spiralgate::phase::{Element, Phase};
//!
//! let engine = SpiralEngine::new(SpiralConfig::default()).unwrap();
//! let outcome = engine.process_interaction(InteractionEvent {
//!     user_id: "ana".into(),
//!     content: "I see a fire I want to follow".into(),
//!     guidance: GuidanceBundle::new(Element::Fire, Phase::Initiation, "Trust the spark."),
//!     element: Element::Fire,
//!     phase: None,
//!     signals: Default::default(),
//! });
//! println!("{} -> {:?}", outcome.phase, outcome.transition);
//! ```

pub mod clock;
pub mod collective;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod gate;
pub mod guidance;
pub mod memory;
pub mod phase;
pub mod progression;
pub mod store;
pub mod text;
