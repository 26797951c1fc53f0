use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::leads::Lead;
use crate::storage::DEFAULT_HISTORY_LEN;

pub const DEFAULT_RATE_REPORT_INTERVAL_S: f64 = 5.0;

/// Longest accepted rate report interval, one day.
pub const MAX_RATE_REPORT_INTERVAL_S: f64 = 86_400.0;

/// Acquisition and analysis settings for one [`crate::session::Session`].
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// history_len = 2000
/// analysis_lead = "V5"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Samples kept per lead.
    pub history_len: usize,
    pub tick_interval_ms: u64,
    /// Frames moved from the queue into the histories per tick.
    pub max_frames_per_tick: usize,
    /// Queue bound; the oldest frame is dropped beyond it.
    pub max_pending_frames: usize,
    pub rate_report_interval_s: f64,
    /// Rate assumed for analysis until the first measurement is in.
    pub nominal_sampling_rate: f64,
    pub analysis_lead: Lead,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_len: DEFAULT_HISTORY_LEN,
            tick_interval_ms: 50,
            max_frames_per_tick: 20,
            max_pending_frames: 10_000,
            rate_report_interval_s: DEFAULT_RATE_REPORT_INTERVAL_S,
            nominal_sampling_rate: 500.0,
            analysis_lead: Lead::II,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |what: &str| Err(ConfigError::Invalid(what.to_string()));

        if self.history_len == 0 {
            return invalid("history_len must be at least 1");
        }
        if self.tick_interval_ms == 0 {
            return invalid("tick_interval_ms must be positive");
        }
        if self.max_frames_per_tick == 0 {
            return invalid("max_frames_per_tick must be at least 1");
        }
        if self.max_pending_frames == 0 {
            return invalid("max_pending_frames must be at least 1");
        }
        let interval_ok = self.rate_report_interval_s > 0.0
            && self.rate_report_interval_s <= MAX_RATE_REPORT_INTERVAL_S
            && Duration::try_from_secs_f64(self.rate_report_interval_s).is_ok();
        if !interval_ok {
            return invalid("rate_report_interval_s must be positive and at most one day");
        }
        if !(self.nominal_sampling_rate.is_finite() && self.nominal_sampling_rate > 0.0) {
            return invalid("nominal_sampling_rate must be positive");
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Falls back to the default interval for values [`validate`](Self::validate) rejects.
    pub fn rate_report_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_report_interval_s)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_RATE_REPORT_INTERVAL_S))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(SessionConfig::from_toml_str("").unwrap(), SessionConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = SessionConfig::from_toml_str(
            r#"
            history_len = 2500
            analysis_lead = "aVF"
            nominal_sampling_rate = 250.0
            "#,
        )
        .unwrap();
        assert_eq!(config.history_len, 2500);
        assert_eq!(config.analysis_lead, Lead::AVF);
        assert_eq!(config.nominal_sampling_rate, 250.0);
        assert_eq!(config.max_frames_per_tick, 20);
        assert_eq!(config.tick_interval(), Duration::from_millis(50));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            SessionConfig::from_toml_str("history_len = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_toml_str("rate_report_interval_s = -1.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_toml_str("analysis_lead = \"VX\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SessionConfig::from_toml_str("history = 10"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rate_interval_is_bounded() {
        for source in [
            "rate_report_interval_s = 1e20",
            "rate_report_interval_s = 86401.0",
            "rate_report_interval_s = inf",
            "rate_report_interval_s = nan",
        ] {
            assert!(
                matches!(SessionConfig::from_toml_str(source), Err(ConfigError::Invalid(_))),
                "{}",
                source
            );
        }

        let day = SessionConfig::from_toml_str("rate_report_interval_s = 86400.0").unwrap();
        assert_eq!(day.rate_report_interval(), Duration::from_secs(86_400));

        let huge = SessionConfig {
            rate_report_interval_s: 1e20,
            ..SessionConfig::default()
        };
        assert_eq!(huge.rate_report_interval(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file() {
        let err = SessionConfig::load("/nonexistent/ecgcore.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
