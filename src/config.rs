//! Analyzer configuration with defaults, settings file, and env overrides
//!
//! Thresholds are threaded explicitly into the detector, analyzer, and
//! aggregator constructors. Nothing reads ambient process-wide state, so
//! tests can vary thresholds per case without interference.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Thresholds and limits for one analysis cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Minimum rank improvement (in positions) counted as a surge
    pub rank_surge_threshold: i64,
    /// Minimum read count growth (percent) counted as a surge
    pub read_surge_pct: f64,
    /// Minimum collect count growth (percent) counted as a surge
    pub collect_surge_pct: f64,
    /// Trailing window for category trends, in days
    pub trend_window_days: i64,
    /// Per-sequence display cap applied by the projection
    pub report_max_items: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            rank_surge_threshold: 10,
            read_surge_pct: 50.0,
            collect_surge_pct: 30.0,
            trend_window_days: 7,
            report_max_items: 10,
        }
    }
}

impl AnalyzerConfig {
    /// Load settings from a JSON file, merged over defaults
    ///
    /// A missing file yields the defaults. Unknown keys are ignored;
    /// missing keys keep their default values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of the current values
    ///
    /// Variables: `RANK_SURGE_THRESHOLD`, `READ_SURGE_PCT`,
    /// `COLLECT_SURGE_PCT`, `TREND_WINDOW_DAYS`, `REPORT_MAX_ITEMS`.
    /// Unset or unparseable values leave the field unchanged.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("RANK_SURGE_THRESHOLD") {
            self.rank_surge_threshold = v;
        }
        if let Some(v) = env_parse("READ_SURGE_PCT") {
            self.read_surge_pct = v;
        }
        if let Some(v) = env_parse("COLLECT_SURGE_PCT") {
            self.collect_surge_pct = v;
        }
        if let Some(v) = env_parse("TREND_WINDOW_DAYS") {
            self.trend_window_days = v;
        }
        if let Some(v) = env_parse("REPORT_MAX_ITEMS") {
            self.report_max_items = v;
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read settings file: {}", e),
            ConfigError::Parse(e) => write!(f, "Invalid settings file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.rank_surge_threshold, 10);
        assert_eq!(config.read_surge_pct, 50.0);
        assert_eq!(config.collect_surge_pct, 30.0);
        assert_eq!(config.trend_window_days, 7);
        assert_eq!(config.report_max_items, 10);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AnalyzerConfig::from_file("no/such/settings.json").unwrap();
        assert_eq!(config, AnalyzerConfig::default());
    }

    #[test]
    fn test_partial_file_merges_over_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"rank_surge_threshold": 5, "report_max_items": 3}}"#).unwrap();

        let config = AnalyzerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.rank_surge_threshold, 5);
        assert_eq!(config.report_max_items, 3);
        // Untouched keys keep defaults
        assert_eq!(config.read_surge_pct, 50.0);
        assert_eq!(config.trend_window_days, 7);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(AnalyzerConfig::from_file(file.path()).is_err());
    }
}
