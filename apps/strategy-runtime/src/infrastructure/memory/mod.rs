//! In-Memory Data Registry
//!
//! A [`DataRegistry`] holding bar series in process memory. Series sit
//! behind a `parking_lot::RwLock` so a feed can append bars while the
//! runner reads them.
//!
//! Codes are stored upper-case; resolution is case-insensitive.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tracing::debug;

use crate::application::ports::{
    DataRegistry, Instrument, InstrumentHandle, RegistryError, RegistryParams, StrategySetup,
};
use crate::domain::market::{Bar, BarRange, Timeframe};

// =============================================================================
// Instrument
// =============================================================================

/// An instrument whose bar series live in memory.
#[derive(Debug)]
pub struct InMemoryInstrument {
    code: String,
    bars: RwLock<BTreeMap<Timeframe, Vec<Bar>>>,
}

impl InMemoryInstrument {
    /// Create an instrument with no bars.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into().to_uppercase(),
            bars: RwLock::new(BTreeMap::new()),
        }
    }

    /// Replace the `timeframe` series with `bars`, oldest first.
    #[must_use]
    pub fn with_bars(self, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.bars.write().insert(timeframe, bars);
        self
    }

    /// Daily flat bars closing at `closes`, one per day, the last on `end`.
    #[must_use]
    pub fn with_daily_history(self, end: DateTime<Utc>, closes: &[Decimal]) -> Self {
        let mut start = end;
        for _ in 1..closes.len() {
            start -= TimeDelta::days(1);
        }

        let mut datetime = start;
        let mut bars = Vec::with_capacity(closes.len());
        for &close in closes {
            bars.push(Bar::flat(datetime, close));
            datetime += TimeDelta::days(1);
        }
        self.with_bars(Timeframe::Day, bars)
    }

    /// Append a bar to the `timeframe` series.
    pub fn push_bar(&self, timeframe: Timeframe, bar: Bar) {
        self.bars.write().entry(timeframe).or_default().push(bar);
    }

    /// Keep only the newest `max` bars of `timeframe`.
    pub fn truncate_to_latest(&self, timeframe: Timeframe, max: usize) {
        if let Some(series) = self.bars.write().get_mut(&timeframe)
            && series.len() > max
        {
            series.drain(..series.len() - max);
        }
    }
}

impl Instrument for InMemoryInstrument {
    fn code(&self) -> &str {
        &self.code
    }

    fn bar_series(&self, timeframe: Timeframe, range: BarRange) -> Vec<Bar> {
        let bars = self.bars.read();
        bars.get(&timeframe).map_or_else(Vec::new, |series| {
            series[range.clamp(series.len())].to_vec()
        })
    }

    fn bar_count(&self, timeframe: Timeframe) -> usize {
        self.bars.read().get(&timeframe).map_or(0, Vec::len)
    }

    fn bar(&self, index: usize, timeframe: Timeframe) -> Option<Bar> {
        self.bars
            .read()
            .get(&timeframe)
            .and_then(|series| series.get(index).copied())
    }

    fn last_bar(&self, timeframe: Timeframe) -> Option<Bar> {
        self.bars
            .read()
            .get(&timeframe)
            .and_then(|series| series.last().copied())
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Registry of in-memory instruments.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    instruments: RwLock<BTreeMap<String, Arc<InMemoryInstrument>>>,
    params: Mutex<Option<RegistryParams>>,
    init_count: AtomicUsize,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instrument, replacing any with the same code.
    pub fn insert(&self, instrument: InMemoryInstrument) -> Arc<InMemoryInstrument> {
        let instrument = Arc::new(instrument);
        self.instruments
            .write()
            .insert(instrument.code.clone(), Arc::clone(&instrument));
        instrument
    }

    /// Concrete handle for `code`.
    #[must_use]
    pub fn instrument(&self, code: &str) -> Option<Arc<InMemoryInstrument>> {
        self.instruments.read().get(&code.to_uppercase()).cloned()
    }

    /// All instruments, ordered by code.
    #[must_use]
    pub fn instruments(&self) -> Vec<Arc<InMemoryInstrument>> {
        self.instruments.read().values().cloned().collect()
    }

    /// Parameters of the most recent `init` call.
    #[must_use]
    pub fn init_params(&self) -> Option<RegistryParams> {
        self.params.lock().clone()
    }

    /// Number of `init` calls so far.
    #[must_use]
    pub fn init_count(&self) -> usize {
        self.init_count.load(Ordering::Acquire)
    }
}

impl DataRegistry for InMemoryRegistry {
    fn init(&self, params: &RegistryParams, setup: &StrategySetup) -> Result<(), RegistryError> {
        for instrument in self.instruments.read().values() {
            for (&timeframe, &max) in &params.preload {
                instrument.truncate_to_latest(timeframe, max);
            }
        }

        *self.params.lock() = Some(params.clone());
        self.init_count.fetch_add(1, Ordering::AcqRel);

        debug!(
            instruments = self.instruments.read().len(),
            codes = setup.codes().len(),
            preload = ?params.preload,
            "in-memory registry initialized"
        );
        Ok(())
    }

    fn resolve(&self, code: &str) -> Option<InstrumentHandle> {
        self.instrument(code)
            .map(|instrument| instrument as InstrumentHandle)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 15, 0, 0).unwrap()
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let registry = InMemoryRegistry::new();
        registry.insert(InMemoryInstrument::new("sh600000"));

        let handle = registry.resolve("Sh600000").unwrap();
        assert_eq!(handle.code(), "SH600000");
        assert!(registry.resolve("SZ000001").is_none());
    }

    #[test]
    fn bar_series_respects_range() {
        let instrument = InMemoryInstrument::new("SH600000").with_bars(
            Timeframe::Day,
            (1..=5).map(|d| Bar::flat(day(d), Decimal::ONE)).collect(),
        );

        assert_eq!(instrument.bar_count(Timeframe::Day), 5);
        assert_eq!(instrument.bar_series(Timeframe::Day, BarRange::all()).len(), 5);

        let middle = instrument.bar_series(Timeframe::Day, BarRange::new(1, Some(3)));
        assert_eq!(middle.len(), 2);
        assert_eq!(middle[0].datetime, day(2));

        assert!(instrument.bar_series(Timeframe::Min5, BarRange::all()).is_empty());
        assert_eq!(instrument.bar(4, Timeframe::Day).unwrap().datetime, day(5));
        assert!(instrument.bar(5, Timeframe::Day).is_none());
    }

    #[test]
    fn pushed_bars_are_visible_through_handles() {
        let registry = InMemoryRegistry::new();
        let instrument = registry.insert(InMemoryInstrument::new("SH600000"));
        let handle = registry.resolve("SH600000").unwrap();

        assert!(handle.last_bar(Timeframe::Day).is_none());
        instrument.push_bar(Timeframe::Day, Bar::flat(day(2), Decimal::TEN));

        assert_eq!(handle.last_bar(Timeframe::Day).unwrap().datetime, day(2));
    }

    #[test]
    fn daily_history_ends_on_given_day() {
        let instrument = InMemoryInstrument::new("SH600000")
            .with_daily_history(day(10), &[dec!(10.00), dec!(10.12), dec!(10.07)]);

        let bars = instrument.bar_series(Timeframe::Day, BarRange::all());
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].datetime, day(8));
        assert_eq!(bars[2].datetime, day(10));
        assert_eq!(bars[2].close, dec!(10.07));
    }

    #[test]
    fn init_records_params_and_truncates_preloaded_series() {
        let registry = InMemoryRegistry::new();
        let instrument = registry.insert(InMemoryInstrument::new("SH600000").with_bars(
            Timeframe::Day,
            (1..=10).map(|d| Bar::flat(day(d), Decimal::ONE)).collect(),
        ));

        let mut params = RegistryParams::default();
        params.preload.insert(Timeframe::Day, 4);
        registry.init(&params, &StrategySetup::new()).unwrap();

        assert_eq!(registry.init_count(), 1);
        assert_eq!(registry.init_params(), Some(params));
        assert_eq!(instrument.bar_count(Timeframe::Day), 4);
        assert_eq!(instrument.bar(0, Timeframe::Day).unwrap().datetime, day(7));
    }
}
