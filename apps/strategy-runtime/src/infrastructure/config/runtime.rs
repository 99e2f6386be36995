//! Runtime INI Configuration
//!
//! The INI file the runner loads during startup. Sections read:
//!
//! | Section      | Required | Destination                          |
//! |--------------|----------|--------------------------------------|
//! | `[hikyuu]`   | no       | `tmpdir`, `datadir` into misc params |
//! | `[baseinfo]` | yes      | base params, verbatim                |
//! | `[block]`    | no       | block params, verbatim               |
//! | `[kdata]`    | no       | series params, verbatim              |
//! | `[preload]`  | no       | `<timeframe>_max` per timeframe      |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};

use super::error::ConfigError;
use crate::application::ports::{ParamMap, RegistryParams};
use crate::domain::market::Timeframe;

/// Bars preloaded per timeframe when `[preload]` does not say.
pub const DEFAULT_PRELOAD_MAX: usize = 4096;

const DEFAULT_DIR: &str = ".";

/// Parsed runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    tmpdir: String,
    datadir: String,
    base: ParamMap,
    block: ParamMap,
    series: ParamMap,
    preload: ParamMap,
}

impl RuntimeConfig {
    /// Load and parse the INI file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed, or lacks a
    /// `[baseinfo]` section.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Config::builder()
            .add_source(File::new(&path.to_string_lossy(), FileFormat::Ini))
            .build()
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_config(&config)
    }

    /// Parse INI contents held in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the contents are malformed or lack `[baseinfo]`.
    pub fn from_ini_str(contents: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Ini))
            .build()
            .map_err(ConfigError::Parse)?;
        Self::from_config(&config)
    }

    fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let base = section(config, "baseinfo")
            .ok_or_else(|| ConfigError::MissingSection("baseinfo".to_string()))?;

        let hikyuu = section(config, "hikyuu").unwrap_or_default();
        let dir = |key: &str| {
            hikyuu
                .get(key)
                .cloned()
                .unwrap_or_else(|| DEFAULT_DIR.to_string())
        };

        Ok(Self {
            tmpdir: dir("tmpdir"),
            datadir: dir("datadir"),
            base,
            block: section(config, "block").unwrap_or_default(),
            series: section(config, "kdata").unwrap_or_default(),
            preload: section(config, "preload").unwrap_or_default(),
        })
    }

    /// Scratch directory.
    #[must_use]
    pub fn tmpdir(&self) -> &str {
        &self.tmpdir
    }

    /// Data directory.
    #[must_use]
    pub fn datadir(&self) -> &str {
        &self.datadir
    }

    /// `[baseinfo]` options.
    #[must_use]
    pub const fn base(&self) -> &ParamMap {
        &self.base
    }

    /// Maximum bars to preload for `timeframe`.
    ///
    /// Absent or malformed entries fall back to [`DEFAULT_PRELOAD_MAX`].
    #[must_use]
    pub fn preload_max(&self, timeframe: Timeframe) -> usize {
        self.preload
            .get(&format!("{}_max", timeframe.preload_key()))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_PRELOAD_MAX)
    }

    /// Registry parameters preloading exactly `timeframes`.
    #[must_use]
    pub fn registry_params(&self, timeframes: &[Timeframe]) -> RegistryParams {
        let preload: BTreeMap<Timeframe, usize> = timeframes
            .iter()
            .map(|&timeframe| (timeframe, self.preload_max(timeframe)))
            .collect();

        let misc = ParamMap::from([
            ("tmpdir".to_string(), self.tmpdir.clone()),
            ("datadir".to_string(), self.datadir.clone()),
        ]);

        RegistryParams {
            base: self.base.clone(),
            block: self.block.clone(),
            series: self.series.clone(),
            preload,
            misc,
        }
    }
}

/// Default config path: `$HOME/.hikyuu/hikyuu.ini`.
#[must_use]
pub fn default_config_path(home: &Path) -> PathBuf {
    home.join(".hikyuu").join("hikyuu.ini")
}

fn section(config: &Config, name: &str) -> Option<ParamMap> {
    let table = config.get_table(name).ok()?;
    Some(
        table
            .into_iter()
            .filter_map(|(key, value)| value.into_string().ok().map(|v| (key, v)))
            .collect(),
    )
}
