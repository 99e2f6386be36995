//! Strategy Port (Driver Port)
//!
//! The hooks a strategy author implements, the setup they fill in during
//! `init`, and the context handed to every later hook.
//!
//! All hooks run on the runner's consumer thread, one at a time.

use std::fmt;
use std::sync::Arc;

use crate::application::ports::data_registry::{DataRegistry, InstrumentHandle};
use crate::domain::events::EventSender;
use crate::domain::market::Timeframe;

// =============================================================================
// Strategy Setup
// =============================================================================

/// Instrument codes and timeframes a strategy subscribes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategySetup {
    codes: Vec<String>,
    timeframes: Vec<Timeframe>,
}

impl StrategySetup {
    /// Create an empty setup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instrument codes, in declaration order.
    #[must_use]
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// Replace the instrument codes.
    pub fn set_codes<I, C>(&mut self, codes: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.codes = codes.into_iter().map(Into::into).collect();
    }

    /// Append an instrument code.
    pub fn add_code(&mut self, code: impl Into<String>) {
        self.codes.push(code.into());
    }

    /// Declared timeframes, in declaration order and without duplicates.
    #[must_use]
    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// Replace the timeframes. Duplicates are dropped, first one wins.
    pub fn set_timeframes<I>(&mut self, timeframes: I)
    where
        I: IntoIterator<Item = Timeframe>,
    {
        self.timeframes.clear();
        for timeframe in timeframes {
            self.add_timeframe(timeframe);
        }
    }

    /// Append a timeframe unless it is already declared.
    pub fn add_timeframe(&mut self, timeframe: Timeframe) {
        if !self.timeframes.contains(&timeframe) {
            self.timeframes.push(timeframe);
        }
    }

    /// Timeframes to subscribe to; daily when none were declared.
    #[must_use]
    pub fn effective_timeframes(&self) -> Vec<Timeframe> {
        if self.timeframes.is_empty() {
            vec![Timeframe::Day]
        } else {
            self.timeframes.clone()
        }
    }
}

// =============================================================================
// Strategy Context
// =============================================================================

/// What a strategy can see and do from inside a hook.
pub struct StrategyContext<S> {
    name: String,
    instruments: Vec<InstrumentHandle>,
    timeframes: Vec<Timeframe>,
    registry: Arc<dyn DataRegistry>,
    events: EventSender<S>,
}

impl<S> StrategyContext<S> {
    /// Assemble a context.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        instruments: Vec<InstrumentHandle>,
        timeframes: Vec<Timeframe>,
        registry: Arc<dyn DataRegistry>,
        events: EventSender<S>,
    ) -> Self {
        Self {
            name: name.into(),
            instruments,
            timeframes,
            registry,
            events,
        }
    }

    /// Strategy name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved instrument universe, in declaration order.
    #[must_use]
    pub fn instruments(&self) -> &[InstrumentHandle] {
        &self.instruments
    }

    /// Instrument used for bar-close detection (first of the universe).
    #[must_use]
    pub fn reference_instrument(&self) -> Option<&InstrumentHandle> {
        self.instruments.first()
    }

    /// Subscribed timeframes.
    #[must_use]
    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// Shared data registry, for re-querying bars or resolving other codes.
    #[must_use]
    pub fn registry(&self) -> &Arc<dyn DataRegistry> {
        &self.registry
    }

    /// Producer handle onto the strategy's own event queue.
    #[must_use]
    pub const fn events(&self) -> &EventSender<S> {
        &self.events
    }

    /// Run `task` later on the consumer thread, after everything queued now.
    pub fn defer<F>(&self, task: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.events.defer(task);
    }

    /// Ask the runner to stop once everything queued now has run.
    pub fn stop(&self) {
        self.events.terminate();
    }
}

impl<S> fmt::Debug for StrategyContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.instruments.iter().map(|i| i.code()).collect();
        f.debug_struct("StrategyContext")
            .field("name", &self.name)
            .field("instruments", &codes)
            .field("timeframes", &self.timeframes)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Strategy
// =============================================================================

/// Strategy hooks.
///
/// # Lifecycle
///
/// 1. `init` - once, before configuration is loaded; declare codes and
///    timeframes here
/// 2. `on_tick` - once per feed delivery cycle
/// 3. `on_bar` - when the reference instrument closes a new bar
/// 4. `on_stop` - once, after the loop exits
pub trait Strategy: Send + Sized + 'static {
    /// Called once before configuration is loaded.
    fn init(&mut self, setup: &mut StrategySetup) {
        let _ = setup;
    }

    /// Called once per feed delivery cycle.
    fn on_tick(&mut self, ctx: &StrategyContext<Self>);

    /// Called when a new bar closes for `timeframe`.
    fn on_bar(&mut self, timeframe: Timeframe, ctx: &StrategyContext<Self>) {
        let _ = (timeframe, ctx);
    }

    /// Called once when the runner shuts down.
    fn on_stop(&mut self, ctx: &StrategyContext<Self>) {
        let _ = ctx;
    }
}
