//! Engine configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file is a valid config. A `gates`
//! table, when present, replaces the built-in gate registry and goes through
//! the same validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SpiralResult};
use crate::gate::{GateRegistry, PhaseGate};

/// Tunables for the progression engine, memory bridge, and aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiralConfig {
    /// Weighted readiness a gate must reach (inclusive).
    pub readiness_threshold: f64,
    /// Phase resonance after every transition.
    pub baseline_resonance: f64,
    /// Resonance gained per recorded breakthrough.
    pub breakthrough_increment: f64,
    /// Number of most recent interactions `derive_context` looks at.
    pub recent_window: usize,
    /// Symbols older than this are not considered resonant.
    pub recency_window_days: u64,
    /// Cap of the collective rolling pattern log.
    pub pattern_log_capacity: usize,
    /// Cap of each per-element collective resonance trend.
    pub trend_capacity: usize,
    /// Directory for persistent state. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Custom gate table. `None` uses the standard seven-gate cycle.
    pub gates: Option<Vec<PhaseGate>>,
}

impl Default for SpiralConfig {
    fn default() -> Self {
        Self {
            readiness_threshold: 0.7,
            baseline_resonance: 0.5,
            breakthrough_increment: 0.1,
            recent_window: 10,
            recency_window_days: 30,
            pattern_log_capacity: 1000,
            trend_capacity: 100,
            data_dir: None,
            gates: None,
        }
    }
}

impl SpiralConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> SpiralResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: SpiralConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> SpiralResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> SpiralResult<()> {
        let unit = |field: &'static str, v: f64| -> Result<(), ConfigError> {
            if v.is_finite() && (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    message: format!("{v} is outside [0, 1]"),
                })
            }
        };
        unit("readiness_threshold", self.readiness_threshold)?;
        unit("baseline_resonance", self.baseline_resonance)?;
        unit("breakthrough_increment", self.breakthrough_increment)?;

        let positive = |field: &'static str, v: usize| -> Result<(), ConfigError> {
            if v > 0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    message: "must be greater than zero".into(),
                })
            }
        };
        positive("recent_window", self.recent_window)?;
        positive("pattern_log_capacity", self.pattern_log_capacity)?;
        positive("trend_capacity", self.trend_capacity)?;

        if let Some(gates) = &self.gates {
            GateRegistry::new(gates.clone())?;
        }
        Ok(())
    }

    /// Build the gate registry this config describes.
    pub fn registry(&self) -> SpiralResult<GateRegistry> {
        match &self.gates {
            Some(gates) => {
                tracing::warn!(count = gates.len(), "using custom gate table from config");
                Ok(GateRegistry::new(gates.clone())?)
            }
            None => Ok(GateRegistry::standard()),
        }
    }

    /// Recency window in seconds.
    pub fn recency_window_secs(&self) -> u64 {
        self.recency_window_days * crate::clock::DAY_SECS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpiralError;
    use crate::phase::Phase;

    #[test]
    fn empty_toml_is_default() {
        let config: SpiralConfig = toml::from_str("").unwrap();
        assert_eq!(config, SpiralConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config: SpiralConfig =
            toml::from_str("readiness_threshold = 0.8\nrecent_window = 5\n").unwrap();
        assert_eq!(config.readiness_threshold, 0.8);
        assert_eq!(config.recent_window, 5);
        assert_eq!(config.trend_capacity, 100);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let config = SpiralConfig {
            readiness_threshold: 1.2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            SpiralError::Config(ConfigError::Invalid { field: "readiness_threshold", .. })
        ));

        let config = SpiralConfig {
            recent_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn custom_gate_table_is_validated() {
        let mut gates = GateRegistry::standard().gates().to_vec();
        gates.pop();
        let config = SpiralConfig {
            gates: Some(gates),
            ..Default::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            SpiralError::Registry(crate::error::RegistryError::MissingGate {
                phase: Phase::Transcendence
            })
        ));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("spiralgate.toml");
        let config = SpiralConfig {
            recency_window_days: 14,
            gates: Some(GateRegistry::standard().gates().to_vec()),
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = SpiralConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.registry().unwrap().gates().len(), 7);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = SpiralConfig::load(Path::new("/nonexistent/spiralgate.toml")).unwrap_err();
        assert!(matches!(err, SpiralError::Config(ConfigError::Read { .. })));
    }
}
