//! Port Interfaces
//!
//! Defines the interfaces (ports) the runtime uses to talk to the outside
//! world, following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `MarketFeed` / `SpotHandler`: live tick delivery
//! - `DataRegistry` / `Instrument`: instrument database and bar series
//!
//! ## Driver Ports (Inbound)
//!
//! - `Strategy`: hooks implemented by the strategy author

mod data_registry;
mod market_feed;
mod strategy;

pub use data_registry::{
    DataRegistry, Instrument, InstrumentHandle, ParamMap, RegistryError, RegistryParams,
};
pub use market_feed::{FeedError, FeedMode, MarketFeed, SpotHandler};
pub use strategy::{Strategy, StrategyContext, StrategySetup};

#[cfg(test)]
pub use data_registry::MockDataRegistry;
