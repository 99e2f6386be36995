//! Spot Ingestor
//!
//! Feed-side half of the runtime. Runs on the feed's delivery thread, keeps
//! the latest tick per instrument, detects bar closes on the reference
//! instrument, and turns each delivery cycle into queued strategy events.
//!
//! The ingestor is moved into the feed when registered, so its state is
//! only ever touched from the delivery thread and needs no locking. A feed
//! that delivers from several threads at once must serialize its calls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::application::ports::{DataRegistry, InstrumentHandle, SpotHandler};
use crate::domain::events::{Event, EventSender};
use crate::domain::market::{BarBaseline, BarRange, Tick, TickSnapshot, Timeframe};
use crate::infrastructure::metrics;

/// Counters describing what the ingestor has seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Ticks delivered by the feed.
    pub ticks_received: u64,
    /// Ticks whose instrument could not be resolved.
    pub ticks_dropped: u64,
    /// Completed delivery cycles.
    pub batches: u64,
    /// Bar events enqueued.
    pub bar_events: u64,
}

/// Converts feed deliveries into strategy events.
pub struct SpotIngestor<S> {
    strategy: String,
    registry: Arc<dyn DataRegistry>,
    reference: Option<InstrumentHandle>,
    timeframes: Vec<Timeframe>,
    snapshot: TickSnapshot,
    baseline: BarBaseline,
    events: EventSender<S>,
    stats: IngestStats,
}

impl<S> SpotIngestor<S> {
    /// Create an ingestor.
    ///
    /// `reference` is the first resolved instrument of the universe, `None`
    /// for an empty universe. `baseline` is the bar state captured at startup.
    #[must_use]
    pub fn new(
        strategy: impl Into<String>,
        registry: Arc<dyn DataRegistry>,
        reference: Option<InstrumentHandle>,
        timeframes: Vec<Timeframe>,
        baseline: BarBaseline,
        events: EventSender<S>,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            registry,
            reference,
            timeframes,
            snapshot: TickSnapshot::new(),
            baseline,
            events,
            stats: IngestStats::default(),
        }
    }

    /// Capture the startup baseline from the reference instrument.
    ///
    /// Every timeframe is tracked, holding the time of the newest bar already
    /// present or nothing if the series is empty. Without a reference
    /// instrument nothing is tracked, so no bar event can ever fire.
    #[must_use]
    pub fn capture_baseline(
        reference: Option<&InstrumentHandle>,
        timeframes: &[Timeframe],
    ) -> BarBaseline {
        let mut baseline = BarBaseline::empty();
        let Some(reference) = reference else {
            return baseline;
        };

        for &timeframe in timeframes {
            // Read the whole series in one call: a count-then-index pair can
            // straddle an append made by a registry still loading in the
            // background.
            let last = reference
                .bar_series(timeframe, BarRange::all())
                .last()
                .map(|bar| bar.datetime);
            baseline.track(timeframe, last);
        }
        baseline
    }

    /// Latest tick per instrument.
    #[must_use]
    pub const fn snapshot(&self) -> &TickSnapshot {
        &self.snapshot
    }

    /// Latest tick for `instrument`.
    #[must_use]
    pub fn latest(&self, instrument: &str) -> Option<&Tick> {
        self.snapshot.get(instrument)
    }

    /// Current bar baseline.
    #[must_use]
    pub const fn baseline(&self) -> &BarBaseline {
        &self.baseline
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> IngestStats {
        self.stats
    }

    fn ingest(&mut self, tick: &Tick) {
        self.stats.ticks_received += 1;
        metrics::record_tick_received();

        let key = tick.instrument_key();
        let Some(instrument) = self.registry.resolve(&key) else {
            self.stats.ticks_dropped += 1;
            metrics::record_tick_dropped();
            trace!(
                strategy = %self.strategy,
                instrument = %key,
                "dropping tick for unknown instrument"
            );
            return;
        };

        self.snapshot.update(instrument.code(), tick.clone());
    }

    fn complete_batch(&mut self, as_of: DateTime<Utc>) {
        self.stats.batches += 1;

        self.events.send(Event::Tick);

        let Some(reference) = &self.reference else {
            return;
        };

        for &timeframe in &self.timeframes {
            let Some(bar) = reference.last_bar(timeframe) else {
                continue;
            };

            if self.baseline.advance(timeframe, bar.datetime) {
                self.stats.bar_events += 1;
                self.events.send(Event::Bar(timeframe));
                debug!(
                    strategy = %self.strategy,
                    timeframe = %timeframe,
                    bar_time = %bar.datetime,
                    as_of = %as_of,
                    "bar closed"
                );
            }
        }
    }
}

impl<S: 'static> SpotHandler for SpotIngestor<S> {
    fn on_spot(&mut self, tick: &Tick) {
        self.ingest(tick);
    }

    fn on_batch_complete(&mut self, as_of: DateTime<Utc>) {
        self.complete_batch(as_of);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;
    use crate::application::ports::MockDataRegistry;
    use crate::domain::market::Bar;
    use crate::domain::queue::EventQueue;
    use crate::infrastructure::memory::{InMemoryInstrument, InMemoryRegistry};

    struct Noop;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 15, 0, 0).unwrap()
    }

    fn bar(d: u32) -> Bar {
        Bar::flat(day(d), Decimal::TEN)
    }

    fn drain(queue: &EventQueue<Event<Noop>>) -> Vec<String> {
        std::iter::from_fn(|| queue.try_pop())
            .map(|event| format!("{event:?}"))
            .collect()
    }

    struct Fixture {
        registry: Arc<InMemoryRegistry>,
        queue: Arc<EventQueue<Event<Noop>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Arc::new(InMemoryRegistry::new()),
                queue: Arc::new(EventQueue::new()),
            }
        }

        fn ingestor(&self, codes: &[&str], timeframes: &[Timeframe]) -> SpotIngestor<Noop> {
            let universe: Vec<InstrumentHandle> = codes
                .iter()
                .filter_map(|code| self.registry.resolve(code))
                .collect();
            let baseline = SpotIngestor::<Noop>::capture_baseline(universe.first(), timeframes);
            SpotIngestor::new(
                "test",
                Arc::clone(&self.registry) as Arc<dyn DataRegistry>,
                universe.first().cloned(),
                timeframes.to_vec(),
                baseline,
                EventSender::new(Arc::clone(&self.queue)),
            )
        }
    }

    #[test]
    fn unchanged_reference_fires_ticks_only() {
        let fx = Fixture::new();
        fx.registry
            .insert(InMemoryInstrument::new("SH600000").with_bars(Timeframe::Day, vec![bar(1)]));
        let mut ingestor = fx.ingestor(&["SH600000"], &[Timeframe::Day]);

        for _ in 0..3 {
            ingestor.on_batch_complete(day(1));
        }

        assert_eq!(drain(&fx.queue), vec!["Tick", "Tick", "Tick"]);
        assert_eq!(ingestor.baseline().last(Timeframe::Day), Some(day(1)));
    }

    #[test]
    fn new_bar_fires_exactly_once_after_tick() {
        let fx = Fixture::new();
        let a = fx.registry.insert(
            InMemoryInstrument::new("SH600000").with_bars(Timeframe::Day, vec![bar(1), bar(2)]),
        );
        fx.registry.insert(InMemoryInstrument::new("SZ000001"));
        let mut ingestor = fx.ingestor(&["SH600000", "SZ000001"], &[Timeframe::Day]);

        // cycle 1: nothing new
        ingestor.on_spot(&Tick::new("SH", "600000", day(2), Decimal::TEN));
        ingestor.on_spot(&Tick::new("SZ", "000001", day(2), Decimal::ONE));
        ingestor.on_batch_complete(day(2));
        assert_eq!(drain(&fx.queue), vec!["Tick"]);
        assert_eq!(ingestor.baseline().last(Timeframe::Day), Some(day(2)));

        // cycle 2: reference grows a bar
        a.push_bar(Timeframe::Day, bar(3));
        ingestor.on_batch_complete(day(3));
        assert_eq!(drain(&fx.queue), vec!["Tick", "Bar(Day)"]);
        assert_eq!(ingestor.baseline().last(Timeframe::Day), Some(day(3)));

        // cycle 3: no repeat
        ingestor.on_batch_complete(day(3));
        assert_eq!(drain(&fx.queue), vec!["Tick"]);
        assert_eq!(ingestor.stats().bar_events, 1);
        assert_eq!(ingestor.stats().batches, 3);
    }

    #[test]
    fn empty_universe_fires_ticks_but_never_bars() {
        let fx = Fixture::new();
        let mut ingestor = fx.ingestor(&[], &[Timeframe::Day]);
        assert!(ingestor.baseline().is_empty());

        ingestor.on_batch_complete(day(1));
        ingestor.on_batch_complete(day(2));

        assert_eq!(drain(&fx.queue), vec!["Tick", "Tick"]);
    }

    #[test]
    fn empty_series_does_not_transition_unset_baseline() {
        let fx = Fixture::new();
        let a = fx.registry.insert(InMemoryInstrument::new("SH600000"));
        let mut ingestor = fx.ingestor(&["SH600000"], &[Timeframe::Min5, Timeframe::Day]);

        assert!(ingestor.baseline().contains(Timeframe::Min5));
        ingestor.on_batch_complete(day(1));
        assert_eq!(drain(&fx.queue), vec!["Tick"]);
        assert_eq!(ingestor.baseline().last(Timeframe::Min5), None);

        a.push_bar(Timeframe::Min5, bar(1));
        ingestor.on_batch_complete(day(1));
        assert_eq!(drain(&fx.queue), vec!["Tick", "Bar(Min5)"]);
    }

    #[test]
    fn bars_follow_timeframe_order_within_a_cycle() {
        let fx = Fixture::new();
        let a = fx.registry.insert(InMemoryInstrument::new("SH600000"));
        let mut ingestor = fx.ingestor(&["SH600000"], &[Timeframe::Min5, Timeframe::Day]);

        a.push_bar(Timeframe::Day, bar(1));
        a.push_bar(Timeframe::Min5, bar(1));
        ingestor.on_batch_complete(day(1));

        assert_eq!(drain(&fx.queue), vec!["Tick", "Bar(Min5)", "Bar(Day)"]);
    }

    #[test]
    fn only_the_reference_instrument_drives_bar_events() {
        let fx = Fixture::new();
        fx.registry
            .insert(InMemoryInstrument::new("SH600000").with_bars(Timeframe::Day, vec![bar(1)]));
        let b = fx
            .registry
            .insert(InMemoryInstrument::new("SZ000001").with_bars(Timeframe::Day, vec![bar(1)]));
        let mut ingestor = fx.ingestor(&["SH600000", "SZ000001"], &[Timeframe::Day]);

        b.push_bar(Timeframe::Day, bar(2));
        ingestor.on_batch_complete(day(2));

        assert_eq!(drain(&fx.queue), vec!["Tick"]);
    }

    #[test]
    fn snapshot_keeps_latest_tick_per_instrument() {
        let fx = Fixture::new();
        fx.registry.insert(InMemoryInstrument::new("SH600000"));
        let mut ingestor = fx.ingestor(&["SH600000"], &[Timeframe::Day]);

        ingestor.on_spot(&Tick::new("SH", "600000", day(1), Decimal::ONE));
        ingestor.on_spot(&Tick::new("sh", "600000", day(2), Decimal::TWO));

        assert_eq!(ingestor.snapshot().len(), 1);
        assert_eq!(ingestor.latest("SH600000").unwrap().close, Decimal::TWO);
        // ticks alone never enqueue anything
        assert!(fx.queue.is_empty());
    }

    #[test]
    fn unresolved_ticks_are_dropped() {
        let mut registry = MockDataRegistry::new();
        registry
            .expect_resolve()
            .withf(|code| code.eq_ignore_ascii_case("SH999999"))
            .times(2)
            .returning(|_| None);

        let queue = Arc::new(EventQueue::<Event<Noop>>::new());
        let mut ingestor = SpotIngestor::new(
            "test",
            Arc::new(registry) as Arc<dyn DataRegistry>,
            None,
            vec![Timeframe::Day],
            BarBaseline::empty(),
            EventSender::new(Arc::clone(&queue)),
        );

        ingestor.on_spot(&Tick::new("SH", "999999", day(1), Decimal::ONE));
        ingestor.on_spot(&Tick::new("SH", "999999", day(1), Decimal::ONE));

        assert!(ingestor.snapshot().is_empty());
        assert_eq!(ingestor.stats().ticks_received, 2);
        assert_eq!(ingestor.stats().ticks_dropped, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn batch_without_prior_ticks_still_fires_tick() {
        let fx = Fixture::new();
        fx.registry.insert(InMemoryInstrument::new("SH600000"));
        let mut ingestor = fx.ingestor(&["SH600000"], &[Timeframe::Day]);

        ingestor.on_batch_complete(day(1));

        assert_eq!(drain(&fx.queue), vec!["Tick"]);
        assert!(ingestor.snapshot().is_empty());
    }
}
