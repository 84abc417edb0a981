//! spiralgate CLI: inspect gates, replay interactions, read collective insights.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Deserialize;

use spiralgate::clock::{Clock, ManualClock, SystemClock};
use spiralgate::config::SpiralConfig;
use spiralgate::engine::{InteractionEvent, SpiralEngine};
use spiralgate::phase::Phase;

#[derive(Parser)]
#[command(name = "spiralgate", version, about = "Phase progression engine")]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for persistent storage (overrides the config).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the gate registry.
    Gates,

    /// Print the static guidance of a phase as JSON.
    Guidance {
        /// Phase name, e.g. "exploration".
        phase: String,
    },

    /// Feed a JSON array of interaction events through the engine.
    Replay {
        /// Path to the events file.
        #[arg(long)]
        file: PathBuf,

        /// Print collective insights after the replay.
        #[arg(long)]
        insights: bool,
    },

    /// Print collective insights and engine info for the stored users.
    Insights,

    /// Show a user's phase state and readiness.
    Status {
        user_id: String,
    },

    /// Manage configuration files.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration to a file.
    Init {
        path: PathBuf,
    },
}

/// An event in a replay file. `at` pins the engine clock (seconds since
/// the UNIX epoch) before the event is processed.
#[derive(Deserialize)]
struct ReplayEntry {
    #[serde(default)]
    at: Option<u64>,
    #[serde(flatten)]
    event: InteractionEvent,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SpiralConfig::load(path)?,
        None => SpiralConfig::default(),
    };
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir.clone();
    }

    match cli.command {
        Commands::Gates => {
            let registry = config.registry()?;
            for gate in registry.gates() {
                println!(
                    "{} -> {}  (min {} days, ritual: {}, collective >= {})",
                    gate.from,
                    gate.to,
                    gate.minimum_duration_secs / spiralgate::clock::DAY_SECS,
                    gate.ritual_required,
                    gate.collective_resonance_threshold,
                );
                println!("  reads: {}", gate.signals().join(", "));
                for condition in &gate.conditions {
                    let marker = if condition.required { "*" } else { " " };
                    println!(
                        "  {marker} {:<24} w={:<4} {}",
                        condition.name, condition.weight, condition.predicate
                    );
                }
            }
        }

        Commands::Guidance { phase } => {
            let phase: Phase = phase.parse().map_err(|e: String| miette::miette!(e))?;
            let guidance = spiralgate::guidance::guidance_for(phase);
            println!("{}", serde_json::to_string_pretty(guidance).into_diagnostic()?);
        }

        Commands::Replay { file, insights } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let entries: Vec<ReplayEntry> = serde_json::from_str(&content).into_diagnostic()?;

            let clock = Arc::new(ManualClock::new(SystemClock.now()));
            let engine = SpiralEngine::with_clock(config, clock.clone())?;

            let mut transitions = 0usize;
            for entry in entries {
                if let Some(at) = entry.at {
                    clock.set(at);
                }
                let user_id = entry.event.user_id.clone();
                let outcome = engine.process_interaction(entry.event);
                if let Some(notice) = &outcome.transition {
                    transitions += 1;
                    println!(
                        "{user_id}: {} -> {} (spiral {}, at {})",
                        notice.from, notice.to, notice.spiral_count, notice.at
                    );
                }
            }
            println!("{transitions} transition(s)");

            if insights {
                let report = engine.collective_insights();
                println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
            }
            let written = engine.persist()?;
            if written > 0 {
                println!("Persisted {written} user(s)");
            }
            print!("{}", engine.info());
        }

        Commands::Insights => {
            let engine = SpiralEngine::new(config)?;
            let report = engine.collective_insights();
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
            print!("{}", engine.info());
        }

        Commands::Status { user_id } => {
            let engine = SpiralEngine::new(config)?;
            let Some(state) = engine.progression().state(&user_id) else {
                miette::bail!("unknown user \"{user_id}\"");
            };
            println!("{}", serde_json::to_string_pretty(&state).into_diagnostic()?);
            let report = engine.assess(&user_id);
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
            let summary = engine.memory().user_summary(&user_id);
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { path } => {
                SpiralConfig::default().save(&path)?;
                println!("Wrote default configuration to {}", path.display());
            }
        },
    }

    Ok(())
}
