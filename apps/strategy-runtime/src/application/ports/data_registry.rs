//! Data Registry Port (Driven Port)
//!
//! Interface for the shared instrument database: one-time initialization
//! from parsed configuration, code resolution, and bar series access.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::application::ports::strategy::StrategySetup;
use crate::domain::market::{Bar, BarRange, Timeframe};

/// Shared handle to a resolved instrument.
pub type InstrumentHandle = Arc<dyn Instrument>;

/// String parameters keyed by option name.
pub type ParamMap = BTreeMap<String, String>;

/// Everything the registry needs to initialize, as parsed from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryParams {
    /// Instrument database connection options (`[baseinfo]`).
    pub base: ParamMap,
    /// Block/sector definitions (`[block]`).
    pub block: ParamMap,
    /// Bar series storage options (`[kdata]`).
    pub series: ParamMap,
    /// Timeframes to preload, with the maximum number of bars kept for each.
    pub preload: BTreeMap<Timeframe, usize>,
    /// Miscellaneous process options (`tmpdir`, `datadir`).
    pub misc: ParamMap,
}

impl RegistryParams {
    /// Maximum preloaded bars for `timeframe`, if it is preloaded.
    #[must_use]
    pub fn preload_max(&self, timeframe: Timeframe) -> Option<usize> {
        self.preload.get(&timeframe).copied()
    }
}

/// Registry error.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Initialization failed.
    #[error("data registry initialization failed: {0}")]
    Init(String),
}

/// A resolved instrument and its bar series.
pub trait Instrument: Send + Sync {
    /// Canonical instrument code (market + security code).
    fn code(&self) -> &str;

    /// Bars of `timeframe` within `range`, oldest first.
    fn bar_series(&self, timeframe: Timeframe, range: BarRange) -> Vec<Bar>;

    /// Number of bars of `timeframe`.
    fn bar_count(&self, timeframe: Timeframe) -> usize;

    /// Bar of `timeframe` at `index`.
    fn bar(&self, index: usize, timeframe: Timeframe) -> Option<Bar>;

    /// Most recent bar of `timeframe`.
    fn last_bar(&self, timeframe: Timeframe) -> Option<Bar> {
        self.bar_count(timeframe)
            .checked_sub(1)
            .and_then(|index| self.bar(index, timeframe))
    }
}

/// Port for the shared instrument database.
#[cfg_attr(test, mockall::automock)]
pub trait DataRegistry: Send + Sync {
    /// Initialize from parsed configuration. Called once per run.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be opened.
    fn init(&self, params: &RegistryParams, setup: &StrategySetup) -> Result<(), RegistryError>;

    /// Resolve an instrument code (e.g. `SH600000`).
    fn resolve(&self, code: &str) -> Option<InstrumentHandle>;
}
