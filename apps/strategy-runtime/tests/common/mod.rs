//! Shared fixtures for runner integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use strategy_runtime::{
    Bar, EventSender, FeedError, FeedMode, InMemoryInstrument, MarketFeed, SpotHandler, Tick,
    Timeframe,
};

/// One feed action, run in order on the feed thread.
pub enum Step {
    /// Deliver a tick.
    Spot(Tick),
    /// Append a bar to an instrument's series.
    PushBar(Arc<InMemoryInstrument>, Timeframe, Bar),
    /// Complete the current delivery cycle.
    Batch(DateTime<Utc>),
}

/// Feed that plays a fixed script on its own thread, then sends the sentinel.
pub struct ScriptedFeed<S> {
    script: Vec<Step>,
    handler: Option<Box<dyn SpotHandler>>,
    events: Arc<OnceLock<EventSender<S>>>,
    started: Arc<AtomicBool>,
}

impl<S: Send + 'static> ScriptedFeed<S> {
    pub fn new(script: Vec<Step>, events: Arc<OnceLock<EventSender<S>>>) -> Self {
        Self {
            script,
            handler: None,
            events,
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn started_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.started)
    }
}

impl<S: Send + 'static> MarketFeed for ScriptedFeed<S> {
    fn register(&mut self, handler: Box<dyn SpotHandler>) {
        self.handler = Some(handler);
    }

    fn start(&mut self, _mode: FeedMode) -> Result<(), FeedError> {
        let mut handler = self.handler.take().ok_or(FeedError::NoHandler)?;
        let script = std::mem::take(&mut self.script);
        let events = Arc::clone(&self.events);
        self.started.store(true, Ordering::Release);

        thread::spawn(move || {
            for step in script {
                match step {
                    Step::Spot(tick) => handler.on_spot(&tick),
                    Step::PushBar(instrument, timeframe, bar) => {
                        instrument.push_bar(timeframe, bar);
                    }
                    Step::Batch(as_of) => handler.on_batch_complete(as_of),
                }
            }
            if let Some(events) = events.get() {
                events.terminate();
            }
        });
        Ok(())
    }
}

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, d, 15, 0, 0).unwrap()
}

pub fn bar(d: u32) -> Bar {
    Bar::flat(day(d), Decimal::TEN)
}

pub fn tick(key: &str, d: u32) -> Tick {
    Tick::new(&key[..2], &key[2..], day(d), Decimal::ONE)
}

pub fn ini_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

pub const RUNTIME_INI: &str = "\
[hikyuu]
tmpdir = /tmp/strategy
datadir = /data/strategy

[baseinfo]
type = memory

[preload]
day_max = 64
";
