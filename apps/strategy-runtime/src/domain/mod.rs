//! Domain Layer - Core types for event-serialized strategy execution.
//!
//! Nothing in this layer knows about feeds, registries or configuration.

/// Ticks, bars, timeframes and the feed-side state tables.
pub mod market;

/// Unbounded multi-producer, single-consumer queue.
pub mod queue;

/// Work items executed by the consumer loop.
pub mod events;
