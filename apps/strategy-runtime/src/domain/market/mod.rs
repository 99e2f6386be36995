//! Market Data Types
//!
//! Ticks, bars and timeframes as seen by the strategy runtime, plus the two
//! feed-side state tables: the latest-tick snapshot and the bar baseline used
//! to detect bar closes.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Timeframe
// =============================================================================

/// Granularity over which bars are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// One minute.
    Min,
    /// Five minutes.
    Min5,
    /// Fifteen minutes.
    Min15,
    /// Thirty minutes.
    Min30,
    /// Sixty minutes.
    Min60,
    /// Two hours.
    Hour2,
    /// Trading day.
    Day,
    /// Calendar week.
    Week,
    /// Calendar month.
    Month,
    /// Calendar quarter.
    Quarter,
    /// Half year.
    HalfYear,
    /// Calendar year.
    Year,
}

impl Timeframe {
    /// Get all timeframes, finest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Min,
            Self::Min5,
            Self::Min15,
            Self::Min30,
            Self::Min60,
            Self::Hour2,
            Self::Day,
            Self::Week,
            Self::Month,
            Self::Quarter,
            Self::HalfYear,
            Self::Year,
        ]
    }

    /// Canonical upper-case name (`DAY`, `MIN5`, ...).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Min => "MIN",
            Self::Min5 => "MIN5",
            Self::Min15 => "MIN15",
            Self::Min30 => "MIN30",
            Self::Min60 => "MIN60",
            Self::Hour2 => "HOUR2",
            Self::Day => "DAY",
            Self::Week => "WEEK",
            Self::Month => "MONTH",
            Self::Quarter => "QUARTER",
            Self::HalfYear => "HALFYEAR",
            Self::Year => "YEAR",
        }
    }

    /// Lower-case name used for preload parameter keys.
    #[must_use]
    pub fn preload_key(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a timeframe name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timeframe: {0}")]
pub struct UnknownTimeframe(pub String);

impl FromStr for Timeframe {
    type Err = UnknownTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|tf| tf.as_str() == upper)
            .ok_or_else(|| UnknownTimeframe(s.to_string()))
    }
}

// =============================================================================
// Tick
// =============================================================================

/// One side of the order book at a single price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Quoted price.
    pub price: Decimal,
    /// Quoted volume.
    pub volume: Decimal,
}

/// A point-in-time quote update for one instrument, as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Market code (e.g. `SH`).
    pub market: String,
    /// Security code within the market (e.g. `600000`).
    pub code: String,
    /// Display name.
    pub name: String,
    /// Quote time.
    pub datetime: DateTime<Utc>,
    /// Previous session close.
    pub yesterday_close: Decimal,
    /// Session open.
    pub open: Decimal,
    /// Session high.
    pub high: Decimal,
    /// Session low.
    pub low: Decimal,
    /// Last traded price.
    pub close: Decimal,
    /// Traded amount.
    pub amount: Decimal,
    /// Traded volume.
    pub volume: Decimal,
    /// Bid levels, best first.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best first.
    pub asks: Vec<PriceLevel>,
}

impl Tick {
    /// Create a tick carrying only a last price; session fields mirror it.
    #[must_use]
    pub fn new(
        market: impl Into<String>,
        code: impl Into<String>,
        datetime: DateTime<Utc>,
        close: Decimal,
    ) -> Self {
        Self {
            market: market.into(),
            code: code.into(),
            name: String::new(),
            datetime,
            yesterday_close: close,
            open: close,
            high: close,
            low: close,
            close,
            amount: Decimal::ZERO,
            volume: Decimal::ZERO,
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// Registry lookup key: market code followed by security code.
    #[must_use]
    pub fn instrument_key(&self) -> String {
        format!("{}{}", self.market, self.code)
    }
}

// =============================================================================
// Bar
// =============================================================================

/// Aggregated price record for one instrument over one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar close time.
    pub datetime: DateTime<Utc>,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Traded amount.
    pub amount: Decimal,
    /// Traded volume.
    pub volume: Decimal,
}

impl Bar {
    /// A bar where every price equals `price` and nothing traded.
    #[must_use]
    pub const fn flat(datetime: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            datetime,
            open: price,
            high: price,
            low: price,
            close: price,
            amount: Decimal::ZERO,
            volume: Decimal::ZERO,
        }
    }
}

/// Index range over a bar series: `[start, end)`, open end meaning "to the
/// last bar".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BarRange {
    /// First index, inclusive.
    pub start: usize,
    /// Last index, exclusive. `None` runs to the end of the series.
    pub end: Option<usize>,
}

impl BarRange {
    /// The whole series.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: 0,
            end: None,
        }
    }

    /// An explicit index range.
    #[must_use]
    pub const fn new(start: usize, end: Option<usize>) -> Self {
        Self { start, end }
    }

    /// Clamp the range to a series of `len` bars.
    #[must_use]
    pub fn clamp(&self, len: usize) -> Range<usize> {
        let end = self.end.map_or(len, |end| end.min(len));
        let start = self.start.min(end);
        start..end
    }
}

// =============================================================================
// Tick Snapshot
// =============================================================================

/// Latest tick per instrument. Last write wins; entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct TickSnapshot {
    latest: HashMap<String, Tick>,
}

impl TickSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tick` as the latest for `instrument`.
    pub fn update(&mut self, instrument: &str, tick: Tick) {
        self.latest.insert(instrument.to_string(), tick);
    }

    /// Latest tick seen for `instrument`.
    #[must_use]
    pub fn get(&self, instrument: &str) -> Option<&Tick> {
        self.latest.get(instrument)
    }

    /// Number of instruments seen at least once.
    #[must_use]
    pub fn len(&self) -> usize {
        self.latest.len()
    }

    /// Whether no tick has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    /// Iterate over `(instrument, tick)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tick)> {
        self.latest.iter().map(|(code, tick)| (code.as_str(), tick))
    }
}

// =============================================================================
// Bar Baseline
// =============================================================================

/// Last observed bar time per subscribed timeframe.
///
/// A timeframe without an entry is not tracked at all (empty universe); an
/// entry holding `None` is tracked but has not seen a bar yet. Entries only
/// move forward in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarBaseline {
    entries: HashMap<Timeframe, Option<DateTime<Utc>>>,
}

impl BarBaseline {
    /// A baseline that tracks nothing and therefore never advances.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Track `timeframe` starting from `last` (the newest bar already known).
    pub fn track(&mut self, timeframe: Timeframe, last: Option<DateTime<Utc>>) {
        self.entries.insert(timeframe, last);
    }

    /// Whether `timeframe` is tracked.
    #[must_use]
    pub fn contains(&self, timeframe: Timeframe) -> bool {
        self.entries.contains_key(&timeframe)
    }

    /// Last observed bar time for `timeframe`.
    ///
    /// Returns `None` both for untracked timeframes and tracked ones that
    /// have not seen a bar yet; use [`Self::contains`] to tell them apart.
    #[must_use]
    pub fn last(&self, timeframe: Timeframe) -> Option<DateTime<Utc>> {
        self.entries.get(&timeframe).copied().flatten()
    }

    /// Number of tracked timeframes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timeframe is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Observe the newest bar time for `timeframe`.
    ///
    /// Returns `true` when the bar closes a new period: the timeframe is
    /// tracked and `latest` is strictly newer than the stored time, or no
    /// time was stored yet.
    pub fn advance(&mut self, timeframe: Timeframe, latest: DateTime<Utc>) -> bool {
        let Some(slot) = self.entries.get_mut(&timeframe) else {
            return false;
        };

        if slot.is_some_and(|previous| latest <= previous) {
            return false;
        }
        *slot = Some(latest);
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use test_case::test_case;

    use super::*;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    #[test_case("DAY", Timeframe::Day ; "upper case")]
    #[test_case("day", Timeframe::Day ; "lower case")]
    #[test_case("Min5", Timeframe::Min5 ; "mixed case")]
    #[test_case(" halfyear ", Timeframe::HalfYear ; "surrounding whitespace")]
    #[test_case("HOUR2", Timeframe::Hour2 ; "hour2")]
    fn timeframe_parsing(input: &str, expected: Timeframe) {
        assert_eq!(input.parse::<Timeframe>().unwrap(), expected);
    }

    #[test]
    fn timeframe_parsing_rejects_unknown() {
        let err = "FORTNIGHT".parse::<Timeframe>().unwrap_err();
        assert_eq!(err, UnknownTimeframe("FORTNIGHT".to_string()));
    }

    #[test]
    fn timeframe_names_round_trip() {
        for tf in Timeframe::all() {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), *tf);
        }
        assert_eq!(Timeframe::Min15.preload_key(), "min15");
        assert_eq!(Timeframe::Day.to_string(), "DAY");
    }

    #[test]
    fn tick_instrument_key_joins_market_and_code() {
        let tick = Tick::new("SH", "600000", day(1), Decimal::ONE);
        assert_eq!(tick.instrument_key(), "SH600000");
    }

    #[test]
    fn bar_range_clamps_to_series() {
        assert_eq!(BarRange::all().clamp(5), 0..5);
        assert_eq!(BarRange::new(2, Some(4)).clamp(5), 2..4);
        assert_eq!(BarRange::new(2, Some(10)).clamp(5), 2..5);
        assert_eq!(BarRange::new(7, None).clamp(5), 5..5);
        assert_eq!(BarRange::all().clamp(0), 0..0);
    }

    #[test]
    fn snapshot_last_write_wins() {
        let mut snapshot = TickSnapshot::new();
        assert!(snapshot.is_empty());

        snapshot.update("SH600000", Tick::new("SH", "600000", day(1), Decimal::ONE));
        snapshot.update("SH600000", Tick::new("SH", "600000", day(2), Decimal::TWO));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("SH600000").unwrap().close, Decimal::TWO);
        assert!(snapshot.get("SZ000001").is_none());
    }

    #[test]
    fn baseline_ignores_same_or_older_bars() {
        let mut baseline = BarBaseline::empty();
        baseline.track(Timeframe::Day, Some(day(2)));

        assert!(!baseline.advance(Timeframe::Day, day(2)));
        assert!(!baseline.advance(Timeframe::Day, day(1)));
        assert_eq!(baseline.last(Timeframe::Day), Some(day(2)));
    }

    #[test]
    fn baseline_advances_on_strictly_newer_bar() {
        let mut baseline = BarBaseline::empty();
        baseline.track(Timeframe::Day, Some(day(2)));

        assert!(baseline.advance(Timeframe::Day, day(3)));
        assert_eq!(baseline.last(Timeframe::Day), Some(day(3)));
        assert!(!baseline.advance(Timeframe::Day, day(3)));
    }

    #[test]
    fn baseline_unset_transitions_on_first_bar() {
        let mut baseline = BarBaseline::empty();
        baseline.track(Timeframe::Min5, None);

        assert!(baseline.contains(Timeframe::Min5));
        assert_eq!(baseline.last(Timeframe::Min5), None);
        assert!(baseline.advance(Timeframe::Min5, day(1)));
        assert_eq!(baseline.last(Timeframe::Min5), Some(day(1)));
    }

    #[test]
    fn untracked_timeframe_never_advances() {
        let mut baseline = BarBaseline::empty();
        assert!(!baseline.advance(Timeframe::Day, day(1)));
        assert!(baseline.is_empty());
    }
}
