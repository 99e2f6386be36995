//! Application Layer - Use cases and port definitions.
//!
//! Port interfaces describe the feed, the data registry, and the strategy
//! hooks; services wire them together around the event queue.

/// Port interfaces for the market feed, data registry, and strategies.
pub mod ports;

/// Spot ingestion and strategy running.
pub mod services;
