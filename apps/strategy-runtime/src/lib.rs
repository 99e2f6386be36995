#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::panic
    )
)]

//! Strategy Runtime - Event-Serialized Strategy Host
//!
//! Turns asynchronously delivered market ticks into an ordered stream of
//! strategy callbacks. Strategy code only ever runs on one consumer thread,
//! never concurrently with itself or with the feed.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Queue, events and market data types
//!   - `queue`: Unbounded blocking FIFO
//!   - `events`: Tick, bar, deferred task and termination events
//!   - `market`: Ticks, bars, timeframes, snapshot and bar baseline
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Market feed, data registry, strategy hooks
//!   - `services`: Spot ingestion and the strategy runner
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `config`: Environment settings and the runtime INI file
//!   - `memory`: In-memory data registry
//!   - `feed`: Simulated random-walk feed
//!   - `signal`: Interrupt flag
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! feed thread                         consumer thread
//! ───────────                         ───────────────
//! on_spot ──► SpotIngestor            StrategyRunner
//!               │ snapshot              │
//! on_batch ──►  │ Tick, Bar(tf)...      │ pop_blocking
//!               └──────► EventQueue ────┘──► on_tick / on_bar / deferred
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no knowledge of adapters.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::events::{DeferredTask, Event, EventKind, EventSender};
pub use domain::market::{
    Bar, BarBaseline, BarRange, PriceLevel, Tick, TickSnapshot, Timeframe, UnknownTimeframe,
};
pub use domain::queue::EventQueue;

// Ports
pub use application::ports::{
    DataRegistry, FeedError, FeedMode, Instrument, InstrumentHandle, MarketFeed, ParamMap,
    RegistryError, RegistryParams, SpotHandler, Strategy, StrategyContext, StrategySetup,
};

// Services
pub use application::services::{
    IngestStats, RunSummary, RunnerConfig, RunnerError, ShutdownReason, SpotIngestor,
    StrategyRunner,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, RuntimeConfig, RuntimeSettings};

// Adapters
pub use infrastructure::feed::{SimulatedFeed, SimulatedFeedConfig};
pub use infrastructure::memory::{InMemoryInstrument, InMemoryRegistry};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
