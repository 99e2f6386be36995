//! Runtime Settings
//!
//! Process-level settings loaded from environment variables (and `.env`,
//! via `dotenvy`, in the binary). Malformed values fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ConfigError;
use super::runtime::default_config_path;
use crate::application::ports::FeedMode;
use crate::application::services::DEFAULT_STRATEGY_NAME;
use crate::domain::market::Timeframe;

/// Simulated feed settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// Delay between delivery cycles.
    pub interval: Duration,
    /// Close a daily bar every this many cycles (0 = never).
    pub bar_every: u32,
    /// Feed verbosity.
    pub mode: FeedMode,
    /// Random walk seed; random when unset.
    pub seed: Option<u64>,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            bar_every: 5,
            mode: FeedMode::Quiet,
            seed: None,
        }
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSettings {
    /// Whether the exporter is installed.
    pub enabled: bool,
    /// Scrape endpoint port.
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Complete runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Strategy name.
    pub name: String,
    /// Runtime INI file.
    pub config_file: PathBuf,
    /// Instrument codes to subscribe to.
    pub codes: Vec<String>,
    /// Timeframes to subscribe to.
    pub timeframes: Vec<Timeframe>,
    /// Simulated feed settings.
    pub feed: FeedSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

impl RuntimeSettings {
    /// Create settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if neither `STRATEGY_CONFIG` nor `HOME` is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create settings from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if neither `STRATEGY_CONFIG` nor `HOME` is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config_file = match non_empty(lookup("STRATEGY_CONFIG")) {
            Some(path) => PathBuf::from(path),
            None => {
                let home = non_empty(lookup("HOME")).ok_or(ConfigError::MissingHome)?;
                default_config_path(Path::new(&home))
            }
        };

        let name = non_empty(lookup("STRATEGY_NAME"))
            .unwrap_or_else(|| DEFAULT_STRATEGY_NAME.to_string());

        let codes: Vec<String> = lookup("STRATEGY_CODES")
            .map(|v| parse_list(&v).map(str::to_uppercase).collect())
            .unwrap_or_default();

        let timeframes: Vec<Timeframe> = lookup("STRATEGY_TIMEFRAMES")
            .map(|v| parse_list(&v).filter_map(|s| s.parse().ok()).collect())
            .unwrap_or_default();

        let defaults = FeedSettings::default();
        let feed = FeedSettings {
            interval: parse_duration_millis(
                lookup("STRATEGY_FEED_INTERVAL_MS"),
                defaults.interval,
            ),
            bar_every: parse_or(lookup("STRATEGY_FEED_BAR_EVERY"), defaults.bar_every),
            mode: lookup("STRATEGY_FEED_MODE")
                .map_or(defaults.mode, |v| FeedMode::from_str_case_insensitive(&v)),
            seed: lookup("STRATEGY_FEED_SEED").and_then(|v| v.trim().parse().ok()),
        };

        let metrics = MetricsSettings {
            enabled: parse_bool(lookup("STRATEGY_METRICS_ENABLED"), false),
            port: parse_or(lookup("STRATEGY_METRICS_PORT"), MetricsSettings::default().port),
        };

        Ok(Self {
            name,
            config_file,
            codes,
            timeframes,
            feed,
            metrics,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    value.map_or(default, |v| {
        matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}

fn parse_duration_millis(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|&millis| millis > 0)
        .map_or(default, Duration::from_millis)
}
