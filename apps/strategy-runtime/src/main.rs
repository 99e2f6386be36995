//! Strategy Runtime Binary
//!
//! Runs a demo strategy against the simulated feed and an in-memory registry.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin strategy-runtime
//! ```
//!
//! # Environment Variables
//!
//! - `STRATEGY_NAME`: Strategy name in logs (default: Strategy)
//! - `STRATEGY_CONFIG`: Runtime INI file (default: `$HOME/.hikyuu/hikyuu.ini`)
//! - `STRATEGY_CODES`: Comma-separated instrument codes (default: SH000001,SZ399001)
//! - `STRATEGY_TIMEFRAMES`: Comma-separated timeframes (default: DAY)
//! - `STRATEGY_FEED_INTERVAL_MS`: Delay between feed cycles (default: 1000)
//! - `STRATEGY_FEED_BAR_EVERY`: Cycles per simulated daily bar (default: 5)
//! - `STRATEGY_FEED_MODE`: quiet | verbose (default: quiet)
//! - `STRATEGY_FEED_SEED`: Random walk seed (default: random)
//! - `STRATEGY_METRICS_ENABLED`: Serve Prometheus metrics (default: false)
//! - `STRATEGY_METRICS_PORT`: Prometheus scrape port (default: 9090)
//! - `OTEL_ENABLED`: Export traces over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: `strategy_runtime=info`)

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{TimeDelta, Utc};
use rust_decimal::Decimal;
use strategy_runtime::infrastructure::config::RuntimeSettings;
use strategy_runtime::infrastructure::telemetry;
use strategy_runtime::{
    DataRegistry, InMemoryInstrument, InMemoryRegistry, Instrument, RunSummary, RunnerConfig,
    RunnerError, SimulatedFeed, SimulatedFeedConfig, Strategy, StrategyContext, StrategyRunner,
    Timeframe, init_metrics,
};

/// Instruments traded when `STRATEGY_CODES` is unset.
const DEMO_CODES: [&str; 2] = ["SH000001", "SZ399001"];

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();

    let _telemetry_guard = telemetry::init();

    match run().await {
        Ok(summary) => {
            tracing::info!(
                reason = summary.reason.as_str(),
                events = summary.events_processed,
                "strategy runtime finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "strategy runtime failed");
            let code = e.downcast_ref::<RunnerError>().map_or(1, RunnerError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run() -> anyhow::Result<RunSummary> {
    let settings = RuntimeSettings::from_env().context("failed to load settings")?;
    log_settings(&settings);

    if settings.metrics.enabled {
        init_metrics(settings.metrics.port).context("failed to start metrics exporter")?;
    }

    let codes: Vec<String> = if settings.codes.is_empty() {
        DEMO_CODES.iter().map(ToString::to_string).collect()
    } else {
        settings.codes.clone()
    };

    let registry = Arc::new(demo_registry(&codes));
    let feed = SimulatedFeed::with_current_runtime(
        SimulatedFeedConfig::from(&settings.feed),
        Arc::clone(&registry),
    )?;
    let feed_cancel = feed.cancellation_token();

    let runner = StrategyRunner::new(
        LoggingStrategy::default(),
        registry as Arc<dyn DataRegistry>,
        Box::new(feed),
        RunnerConfig::new(&settings.config_file)
            .with_name(settings.name.clone())
            .with_feed_mode(settings.feed.mode),
    )
    .with_codes(codes)
    .with_timeframes(settings.timeframes.iter().copied());

    let outcome = tokio::task::spawn_blocking(move || runner.run()).await;
    feed_cancel.cancel();

    match outcome {
        Ok(result) => Ok(result?),
        Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
        Err(join) => Err(join).context("strategy thread was cancelled"),
    }
}

/// Registry seeded with a short daily history per code.
fn demo_registry(codes: &[String]) -> InMemoryRegistry {
    let registry = InMemoryRegistry::new();
    let yesterday = Utc::now() - TimeDelta::days(1);
    let closes = [
        Decimal::new(1000, 2),
        Decimal::new(1012, 2),
        Decimal::new(1007, 2),
    ];

    for code in codes {
        registry.insert(
            InMemoryInstrument::new(code.as_str()).with_daily_history(yesterday, &closes),
        );
    }
    registry
}

/// Log the parsed settings.
fn log_settings(settings: &RuntimeSettings) {
    tracing::info!(
        strategy = %settings.name,
        config = %settings.config_file.display(),
        codes = ?settings.codes,
        timeframes = ?settings.timeframes,
        "Configuration loaded"
    );
    tracing::debug!(
        interval_ms = settings.feed.interval.as_millis(),
        bar_every = settings.feed.bar_every,
        metrics = settings.metrics.enabled,
        "Feed settings"
    );
}

fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

// =============================================================================
// Demo Strategy
// =============================================================================

/// Logs every bar close and a heartbeat every tenth tick.
#[derive(Debug, Default)]
struct LoggingStrategy {
    ticks: u64,
    bars: u64,
}

impl Strategy for LoggingStrategy {
    fn on_tick(&mut self, ctx: &StrategyContext<Self>) {
        self.ticks += 1;
        if self.ticks % 10 == 0 {
            tracing::info!(strategy = ctx.name(), ticks = self.ticks, "heartbeat");
        }
    }

    fn on_bar(&mut self, timeframe: Timeframe, ctx: &StrategyContext<Self>) {
        self.bars += 1;
        for instrument in ctx.instruments() {
            if let Some(bar) = instrument.last_bar(timeframe) {
                tracing::info!(
                    strategy = ctx.name(),
                    code = instrument.code(),
                    timeframe = %timeframe,
                    close = %bar.close,
                    "bar closed"
                );
            }
        }

        let bars = self.bars;
        ctx.defer(move |strategy: &mut Self| {
            tracing::debug!(bars, ticks = strategy.ticks, "bar follow-up");
        });
    }

    fn on_stop(&mut self, ctx: &StrategyContext<Self>) {
        tracing::info!(
            strategy = ctx.name(),
            ticks = self.ticks,
            bars = self.bars,
            "strategy stopped"
        );
    }
}
