//! Rich diagnostic error types for spiralgate.
//!
//! Runtime anomalies (missing signals, unknown users, out-of-order clocks) are
//! absorbed by the subsystems themselves. The errors here cover the things
//! that genuinely cannot proceed: a misconfigured gate table, unreadable
//! configuration, and storage failures.

use miette::Diagnostic;
use thiserror::Error;

use crate::phase::Phase;

/// Top-level error type for spiralgate.
///
/// Each variant wraps a subsystem-specific error, preserving the diagnostic
/// chain (codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SpiralError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

/// Gate table invariant violations, caught when the registry is built.
#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("no outgoing gate registered for phase {phase}")]
    #[diagnostic(
        code(spiral::registry::missing_gate),
        help(
            "Every phase must have exactly one outgoing gate, including \
             transcendence (which gates back to initiation). Add a gate with \
             `from = \"{phase}\"`."
        )
    )]
    MissingGate { phase: Phase },

    #[error("phase {phase} has {count} outgoing gates")]
    #[diagnostic(
        code(spiral::registry::duplicate_gate),
        help("The next phase must be deterministic. Remove all but one gate leaving {phase}.")
    )]
    DuplicateGate { phase: Phase, count: usize },

    #[error("gate {from} -> {to} has no conditions")]
    #[diagnostic(
        code(spiral::registry::empty_gate),
        help("A gate needs at least one condition, otherwise its readiness ratio is undefined.")
    )]
    EmptyGate { from: Phase, to: Phase },

    #[error("condition \"{name}\" on gate leaving {from} has invalid weight {weight}")]
    #[diagnostic(
        code(spiral::registry::invalid_weight),
        help("Condition weights must be finite and strictly positive.")
    )]
    InvalidWeight { from: Phase, name: String, weight: f64 },

    #[error("condition \"{name}\" appears more than once on gate leaving {from}")]
    #[diagnostic(
        code(spiral::registry::duplicate_condition),
        help("Condition names must be unique within a gate; they key completed-condition tracking.")
    )]
    DuplicateCondition { from: Phase, name: String },

    #[error("gate leaving {from} has collective resonance threshold {threshold} outside [0, 1]")]
    #[diagnostic(
        code(spiral::registry::invalid_threshold),
        help("Use 0 to disable the collective check, or a value in (0, 1].")
    )]
    InvalidThreshold { from: Phase, threshold: f64 },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(spiral::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(spiral::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             Try running with a fresh data directory if the problem persists."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(spiral::store::serde),
        help(
            "Failed to serialize or deserialize stored state. \
             The on-disk format may have changed between versions."
        )
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(spiral::config::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file: {path}")]
    #[diagnostic(
        code(spiral::config::write),
        help("Check that the parent directory is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config in {path}: {message}")]
    #[diagnostic(
        code(spiral::config::parse),
        help(
            "The file must be valid TOML matching the SpiralConfig layout. \
             Run `spiralgate config init` for a template."
        )
    )]
    Parse { path: String, message: String },

    #[error("invalid value for {field}: {message}")]
    #[diagnostic(
        code(spiral::config::invalid),
        help("Adjust the value in the config file or leave it out to use the default.")
    )]
    Invalid { field: &'static str, message: String },
}

/// Convenience result type for spiralgate operations.
pub type SpiralResult<T> = std::result::Result<T, SpiralError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_converts_to_top_level() {
        let err: SpiralError = RegistryError::MissingGate {
            phase: Phase::Mastery,
        }
        .into();
        assert!(matches!(err, SpiralError::Registry(_)));
        assert_eq!(
            err.to_string(),
            "no outgoing gate registered for phase mastery"
        );
    }

    #[test]
    fn diagnostic_code_is_exposed() {
        let err = RegistryError::EmptyGate {
            from: Phase::Initiation,
            to: Phase::Exploration,
        };
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("spiral::registry::empty_gate"));
    }
}
