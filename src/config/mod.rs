//! Analyzer configuration
//!
//! Loaded from TOML. Every section is optional and falls back to the harness
//! defaults; a present section replaces the default section as a whole, so a
//! `[pairing]` table listing only `chains` has no start/stop rules.

use crate::aggregator::{AnomalyConfig, SeriesConfig};
use crate::classifier::{DialectSpec, PatternRecognizer};
use crate::correlator::{PairingSpec, ScheduleSpec};
use crate::error::ConfigError;
use crate::events::DurationUnit;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_cadence_unit() -> DurationUnit {
    DurationUnit::Milliseconds
}

fn default_anchor() -> String {
    "t1".to_string()
}

/// Units of emitted durations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitsConfig {
    /// Start/stop and checkpoint intervals
    #[serde(default)]
    pub interval: DurationUnit,
    /// Slot cadence intervals
    #[serde(default = "default_cadence_unit")]
    pub cadence: DurationUnit,
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            interval: DurationUnit::default(),
            cadence: default_cadence_unit(),
        }
    }
}

/// Slot cadence settings
///
/// Cadence gaps are only checked against the overflow sentinel unless a
/// ceiling of their own is set; `[anomaly].duration_ceiling` does not apply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CadenceConfig {
    /// Kind tag marking the start of a slot
    #[serde(default = "default_anchor")]
    pub anchor: String,
    /// Gaps above this, in the cadence unit, are flagged
    #[serde(default)]
    pub duration_ceiling: Option<f64>,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            anchor: default_anchor(),
            duration_ceiling: None,
        }
    }
}

/// Complete analyzer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub pairing: PairingSpec,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
    #[serde(default)]
    pub units: UnitsConfig,
    #[serde(default)]
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub schedule: ScheduleSpec,
    #[serde(default)]
    pub series: SeriesConfig,
    /// Extra dialects registered around the built-ins
    #[serde(default)]
    pub dialects: Vec<DialectSpec>,
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::ParseError` if it is not valid TOML for this schema, and
    /// `ConfigError::ValidationError` if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for usable values
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pairing.validate()?;

        if !self.anomaly.duration_ceiling.is_finite() || self.anomaly.duration_ceiling < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "anomaly.duration_ceiling must be a non-negative number, got {}",
                self.anomaly.duration_ceiling
            )));
        }
        if self.anomaly.sentinel.is_nan() || self.anomaly.sentinel <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "anomaly.sentinel must be positive, got {}",
                self.anomaly.sentinel
            )));
        }
        if self.cadence.anchor.is_empty() {
            return Err(ConfigError::ValidationError(
                "cadence.anchor must not be empty".to_string(),
            ));
        }
        if let Some(ceiling) = self.cadence.duration_ceiling {
            if !ceiling.is_finite() || ceiling < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "cadence.duration_ceiling must be a non-negative number, got {}",
                    ceiling
                )));
            }
        }
        if self.schedule.slots_per_frame == 0 {
            return Err(ConfigError::ValidationError(
                "schedule.slots_per_frame must be at least 1".to_string(),
            ));
        }
        if self.series.moving_average_window == 0 {
            return Err(ConfigError::ValidationError(
                "series.moving_average_window must be at least 1".to_string(),
            ));
        }

        for dialect in &self.dialects {
            PatternRecognizer::from_spec(dialect)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::DialectPriority;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.anomaly.duration_ceiling, 100.0);
        assert_eq!(config.anomaly.sentinel, 2147483647.0);
        assert_eq!(config.units.interval, DurationUnit::Microseconds);
        assert_eq!(config.units.cadence, DurationUnit::Milliseconds);
        assert_eq!(config.cadence.anchor, "t1");
        assert_eq!(config.cadence.duration_ceiling, None);
        assert_eq!(config.schedule.slots_per_frame, 20);
        assert_eq!(config.series.moving_average_window, 5);
        assert!(config.dialects.is_empty());
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[anomaly]
duration_ceiling = 250.0
exclude_from_statistics = false

[units]
interval = "milliseconds"

[[pairing.start_stop]]
consume_start = true

[[dialects]]
name = "rlc"
pattern = '^(?P<ts>[\d.]+) RLC retx=(?P<retx>\d+)'
kind = "rlc-retx"
fields = [{{ name = "retx" }}]
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.anomaly.duration_ceiling, 250.0);
        assert!(!config.anomaly.exclude_from_statistics);
        assert_eq!(config.units.interval, DurationUnit::Milliseconds);
        assert_eq!(config.units.cadence, DurationUnit::Milliseconds);
        assert!(config.pairing.start_stop[0].consume_start);
        assert!(config.pairing.chains.is_empty());
        assert_eq!(config.dialects[0].priority, DialectPriority::Last);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file(Path::new("/nonexistent/slotlens.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml("[anomaly\nduration_ceiling = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));

        let result = Config::from_toml("[anomaly]\nduration_ceiling = \"high\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            "[anomaly]\nduration_ceiling = -1.0",
            "[anomaly]\nsentinel = 0.0",
            "[cadence]\nanchor = \"\"",
            "[cadence]\nduration_ceiling = -0.5",
            "[schedule]\nslots_per_frame = 0",
            "[series]\nmoving_average_window = 0",
            "[pairing]\nstart_stop = []\nchains = []",
        ];
        for case in cases {
            let result = Config::from_toml(case);
            assert!(
                matches!(result, Err(ConfigError::ValidationError(_))),
                "expected validation error for {:?}",
                case
            );
        }
    }

    #[test]
    fn test_invalid_dialect_rejected() {
        let result = Config::from_toml(
            r#"
[[dialects]]
name = "broken"
pattern = '^(?P<ts>[\d.]+ ('
kind = "x"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
