//! Simulated Market Feed
//!
//! A [`MarketFeed`] driven by a tokio task. Every interval it delivers one
//! random-walk tick per registered instrument, then completes the batch.
//! Every `bar_every` cycles it first closes a daily bar on each instrument
//! in the [`InMemoryRegistry`], so the ingestor sees a new bar when the
//! batch completes.
//!
//! Delivery happens on a single task, so the registered handler is never
//! called concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{FeedError, FeedMode, Instrument, MarketFeed, SpotHandler};
use crate::domain::market::{Bar, Tick, Timeframe};
use crate::infrastructure::config::FeedSettings;
use crate::infrastructure::memory::{InMemoryInstrument, InMemoryRegistry};

/// Largest per-cycle price move, in basis points.
const MAX_STEP_BPS: i64 = 50;

/// Shortest delay between delivery cycles.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Simulated feed configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedFeedConfig {
    /// Delay between delivery cycles.
    pub interval: Duration,
    /// Close a daily bar every this many cycles (0 = never).
    pub bar_every: u32,
    /// Random walk seed; random when unset.
    pub seed: Option<u64>,
}

impl SimulatedFeedConfig {
    /// Delivery period, never shorter than one millisecond.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.interval.max(MIN_INTERVAL)
    }
}

impl Default for SimulatedFeedConfig {
    fn default() -> Self {
        Self::from(&FeedSettings::default())
    }
}

impl From<&FeedSettings> for SimulatedFeedConfig {
    fn from(settings: &FeedSettings) -> Self {
        Self {
            interval: settings.interval,
            bar_every: settings.bar_every,
            seed: settings.seed,
        }
    }
}

/// Random-walk feed over an [`InMemoryRegistry`].
pub struct SimulatedFeed {
    config: SimulatedFeedConfig,
    registry: Arc<InMemoryRegistry>,
    runtime: Handle,
    cancel: CancellationToken,
    handler: Option<Box<dyn SpotHandler>>,
    started: bool,
    cycles: Arc<AtomicU64>,
}

impl SimulatedFeed {
    /// Create a feed that will spawn onto `runtime` when started.
    #[must_use]
    pub fn new(
        config: SimulatedFeedConfig,
        registry: Arc<InMemoryRegistry>,
        runtime: Handle,
    ) -> Self {
        Self {
            config,
            registry,
            runtime,
            cancel: CancellationToken::new(),
            handler: None,
            started: false,
            cycles: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a feed bound to the tokio runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Runtime`] when called outside a tokio runtime.
    pub fn with_current_runtime(
        config: SimulatedFeedConfig,
        registry: Arc<InMemoryRegistry>,
    ) -> Result<Self, FeedError> {
        let runtime = Handle::try_current().map_err(|e| FeedError::Runtime(e.to_string()))?;
        Ok(Self::new(config, registry, runtime))
    }

    /// Token that stops delivery when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Completed delivery cycles.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Stop delivering.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl MarketFeed for SimulatedFeed {
    fn register(&mut self, handler: Box<dyn SpotHandler>) {
        if self.handler.replace(handler).is_some() {
            warn!("replacing previously registered spot handler");
        }
    }

    fn start(&mut self, mode: FeedMode) -> Result<(), FeedError> {
        if self.started {
            return Err(FeedError::AlreadyStarted);
        }
        let handler = self.handler.take().ok_or(FeedError::NoHandler)?;
        self.started = true;

        let delivery = Delivery {
            config: self.config,
            registry: Arc::clone(&self.registry),
            handler,
            mode,
            rng: self
                .config
                .seed
                .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64),
            prices: Vec::new(),
            cycles: Arc::clone(&self.cycles),
        };

        info!(
            interval_ms = self.config.interval.as_millis(),
            bar_every = self.config.bar_every,
            verbose = mode.is_verbose(),
            "starting simulated feed"
        );
        self.runtime.spawn(delivery.run(self.cancel.clone()));
        Ok(())
    }
}

impl Drop for SimulatedFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for SimulatedFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedFeed")
            .field("config", &self.config)
            .field("started", &self.started)
            .field("cycles", &self.cycles())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Delivery Task
// =============================================================================

struct Delivery {
    config: SimulatedFeedConfig,
    registry: Arc<InMemoryRegistry>,
    handler: Box<dyn SpotHandler>,
    mode: FeedMode,
    rng: StdRng,
    prices: Vec<(String, Decimal)>,
    cycles: Arc<AtomicU64>,
}

impl Delivery {
    async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.cycle();
        }
        debug!(cycles = self.cycles.load(Ordering::Acquire), "simulated feed stopped");
    }

    fn cycle(&mut self) {
        let cycle = self.cycles.load(Ordering::Acquire) + 1;
        let close_bar =
            self.config.bar_every > 0 && cycle % u64::from(self.config.bar_every) == 0;
        let now = Utc::now();

        let instruments = self.registry.instruments();
        for instrument in &instruments {
            let price = self.step(instrument);
            let (market, code) = split_code(instrument.code());
            self.handler.on_spot(&Tick::new(market, code, now, price));

            if close_bar {
                close_daily_bar(instrument, price, now);
            }
        }

        self.handler.on_batch_complete(now);
        self.cycles.store(cycle, Ordering::Release);

        if self.mode.is_verbose() {
            info!(cycle, ticks = instruments.len(), bar_closed = close_bar, "delivered batch");
        }
    }

    fn step(&mut self, instrument: &InMemoryInstrument) -> Decimal {
        let bps = self.rng.random_range(-MAX_STEP_BPS..=MAX_STEP_BPS);
        let factor = Decimal::ONE + Decimal::new(bps, 4);

        if let Some((_, price)) = self
            .prices
            .iter_mut()
            .find(|(code, _)| code == instrument.code())
        {
            *price = (*price * factor).round_dp(2);
            return *price;
        }

        let start = instrument
            .last_bar(Timeframe::Day)
            .map_or(Decimal::TEN, |bar| bar.close);
        self.prices.push((instrument.code().to_string(), start));
        start
    }
}

fn close_daily_bar(instrument: &InMemoryInstrument, close: Decimal, now: chrono::DateTime<Utc>) {
    let datetime = instrument
        .last_bar(Timeframe::Day)
        .map_or(now, |last| last.datetime + TimeDelta::days(1));
    instrument.push_bar(Timeframe::Day, Bar::flat(datetime, close));
}

fn split_code(code: &str) -> (&str, &str) {
    match (code.get(..2), code.get(2..)) {
        (Some(market), Some(rest)) if !rest.is_empty() => (market, rest),
        _ => ("", code),
    }
}
