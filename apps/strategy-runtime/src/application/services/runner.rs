//! Strategy Runner
//!
//! Owns startup sequencing, the single consumer loop, and shutdown.
//!
//! # Startup
//!
//! 1. Install the interrupt handler (atomic flag write only)
//! 2. Call the strategy's `init`
//! 3. Load the runtime configuration file (fatal on failure)
//! 4. Resolve timeframes, defaulting to daily
//! 5. Initialize the data registry
//! 6. Resolve the instrument universe, skipping unknown codes
//! 7. Capture the bar baseline from the reference instrument
//! 8. Register the ingestor with the feed and start it
//! 9. Run the consumer loop until the sentinel or an interrupt
//!
//! Strategy hooks only ever run on the thread that called [`StrategyRunner::run`].

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, warn};

use crate::application::ports::{
    DataRegistry, FeedError, FeedMode, InstrumentHandle, MarketFeed, RegistryError, Strategy,
    StrategyContext, StrategySetup,
};
use crate::application::services::ingestor::SpotIngestor;
use crate::domain::events::{Event, EventSender};
use crate::domain::market::Timeframe;
use crate::domain::queue::EventQueue;
use crate::infrastructure::config::{ConfigError, RuntimeConfig};
use crate::infrastructure::{metrics, signal};

/// Default strategy name.
pub const DEFAULT_STRATEGY_NAME: &str = "Strategy";

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Strategy name used in logs.
    pub name: String,
    /// Path of the runtime INI file.
    pub config_file: PathBuf,
    /// Feed verbosity.
    pub feed_mode: FeedMode,
    /// Whether to install the process interrupt handler.
    pub install_signal_handler: bool,
}

impl RunnerConfig {
    /// Configuration with defaults for everything but the config file.
    #[must_use]
    pub fn new(config_file: impl Into<PathBuf>) -> Self {
        Self {
            name: DEFAULT_STRATEGY_NAME.to_string(),
            config_file: config_file.into(),
            feed_mode: FeedMode::Quiet,
            install_signal_handler: true,
        }
    }

    /// Set the strategy name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the feed verbosity.
    #[must_use]
    pub const fn with_feed_mode(mut self, mode: FeedMode) -> Self {
        self.feed_mode = mode;
        self
    }

    /// Enable or disable the process interrupt handler.
    #[must_use]
    pub const fn with_signal_handler(mut self, install: bool) -> Self {
        self.install_signal_handler = install;
        self
    }
}

/// Why the consumer loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The termination sentinel was consumed.
    Sentinel,
    /// The running flag was cleared, normally by an interrupt.
    Signal,
}

impl ShutdownReason {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sentinel => "sentinel",
            Self::Signal => "signal",
        }
    }
}

/// What happened during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Events executed, the sentinel included.
    pub events_processed: u64,
    /// Tick hooks run.
    pub tick_events: u64,
    /// Bar hooks run.
    pub bar_events: u64,
    /// Deferred tasks run.
    pub deferred_tasks: u64,
    /// Why the loop stopped.
    pub reason: ShutdownReason,
}

/// Runner error.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Runtime configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The data registry failed to initialize.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The feed could not be started.
    #[error(transparent)]
    Feed(#[from] FeedError),
}

impl RunnerError {
    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        1
    }
}

/// Hosts one strategy: startup, event loop, shutdown.
pub struct StrategyRunner<S: Strategy> {
    config: RunnerConfig,
    strategy: S,
    setup: StrategySetup,
    registry: Arc<dyn DataRegistry>,
    feed: Box<dyn MarketFeed>,
    queue: Arc<EventQueue<Event<S>>>,
    running: Arc<AtomicBool>,
}

impl<S: Strategy> StrategyRunner<S> {
    /// Create a runner.
    pub fn new(
        strategy: S,
        registry: Arc<dyn DataRegistry>,
        feed: Box<dyn MarketFeed>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            config,
            strategy,
            setup: StrategySetup::new(),
            registry,
            feed,
            queue: Arc::new(EventQueue::new()),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Preset instrument codes; `init` may still change them.
    #[must_use]
    pub fn with_codes<I, C>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.setup.set_codes(codes);
        self
    }

    /// Preset timeframes; `init` may still change them.
    #[must_use]
    pub fn with_timeframes<I>(mut self, timeframes: I) -> Self
    where
        I: IntoIterator<Item = Timeframe>,
    {
        self.setup.set_timeframes(timeframes);
        self
    }

    /// Strategy name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Producer handle onto this runner's event queue.
    #[must_use]
    pub fn events(&self) -> EventSender<S> {
        EventSender::new(Arc::clone(&self.queue))
    }

    /// The running flag; clearing it stops the loop at its next iteration.
    #[must_use]
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run the strategy until terminated.
    ///
    /// Blocks the calling thread, which becomes the consumer thread.
    ///
    /// # Errors
    ///
    /// Returns an error if startup fails: the configuration file cannot be
    /// loaded, the registry cannot initialize, or the feed cannot start. No
    /// tick or bar hook has run in that case.
    pub fn run(mut self) -> Result<RunSummary, RunnerError> {
        let name = self.config.name.clone();
        info!(strategy = %name, "strategy is running, press Ctrl-C to terminate");

        if self.config.install_signal_handler
            && let Err(e) = signal::install_interrupt_flag(&self.running)
        {
            warn!(
                strategy = %name,
                error = %e,
                "interrupt handler not installed, stop via sentinel only"
            );
        }

        self.strategy.init(&mut self.setup);

        let runtime = RuntimeConfig::load(&self.config.config_file).map_err(|e| {
            error!(
                strategy = %name,
                path = %self.config.config_file.display(),
                error = %e,
                "failed to load configuration"
            );
            info!(strategy = %name, "exit strategy");
            e
        })?;

        let timeframes = self.setup.effective_timeframes();
        let params = runtime.registry_params(&timeframes);

        self.registry.init(&params, &self.setup).map_err(|e| {
            error!(strategy = %name, error = %e, "failed to initialize data registry");
            e
        })?;

        let instruments = self.resolve_universe();
        let baseline = SpotIngestor::<S>::capture_baseline(instruments.first(), &timeframes);

        let ingestor = SpotIngestor::new(
            name.clone(),
            Arc::clone(&self.registry),
            instruments.first().cloned(),
            timeframes.clone(),
            baseline,
            self.events(),
        );
        self.feed.register(Box::new(ingestor));
        self.feed.start(self.config.feed_mode).map_err(|e| {
            error!(strategy = %name, error = %e, "failed to start market feed");
            e
        })?;

        let ctx = StrategyContext::new(
            name.clone(),
            instruments,
            timeframes,
            Arc::clone(&self.registry),
            self.events(),
        );

        info!(
            strategy = %name,
            instruments = ctx.instruments().len(),
            timeframes = ?ctx.timeframes(),
            "entering event loop"
        );

        let summary = self.event_loop(&ctx);
        self.strategy.on_stop(&ctx);

        info!(
            strategy = %name,
            reason = summary.reason.as_str(),
            events = summary.events_processed,
            ticks = summary.tick_events,
            bars = summary.bar_events,
            pending = self.queue.len(),
            "quit strategy"
        );

        Ok(summary)
    }

    fn resolve_universe(&self) -> Vec<InstrumentHandle> {
        let codes = self.setup.codes();
        let mut instruments = Vec::with_capacity(codes.len());

        for code in codes {
            match self.registry.resolve(code) {
                Some(instrument) => instruments.push(instrument),
                None => {
                    warn!(
                        strategy = %self.config.name,
                        code = %code,
                        "invalid code, instrument not found"
                    );
                }
            }
        }

        if instruments.is_empty() {
            warn!(strategy = %self.config.name, "instrument universe is empty");
        }
        instruments
    }

    fn event_loop(&mut self, ctx: &StrategyContext<S>) -> RunSummary {
        let mut summary = RunSummary {
            events_processed: 0,
            tick_events: 0,
            bar_events: 0,
            deferred_tasks: 0,
            reason: ShutdownReason::Signal,
        };

        while self.running.load(Ordering::Acquire) {
            let event = self.queue.pop_blocking();
            summary.events_processed += 1;
            metrics::record_event_processed(event.kind());

            match event {
                Event::Tick => {
                    summary.tick_events += 1;
                    self.strategy.on_tick(ctx);
                }
                Event::Bar(timeframe) => {
                    summary.bar_events += 1;
                    self.strategy.on_bar(timeframe, ctx);
                }
                Event::Deferred(task) => {
                    summary.deferred_tasks += 1;
                    task(&mut self.strategy);
                }
                Event::Terminate => {
                    self.running.store(false, Ordering::Release);
                    summary.reason = ShutdownReason::Sentinel;
                }
            }
        }

        summary
    }
}

impl<S: Strategy> std::fmt::Debug for StrategyRunner<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRunner")
            .field("config", &self.config)
            .field("setup", &self.setup)
            .field("pending", &self.queue.len())
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
