//! Application Services
//!
//! Services that drive the strategy through the ports.
//!
//! - `SpotIngestor`: turns feed deliveries into queued strategy events
//! - `StrategyRunner`: startup sequencing, the consumer loop, and shutdown

mod ingestor;
mod runner;

pub use ingestor::{IngestStats, SpotIngestor};
pub use runner::{
    DEFAULT_STRATEGY_NAME, RunSummary, RunnerConfig, RunnerError, ShutdownReason, StrategyRunner,
};
