//! Market Feed Port (Driven Port)
//!
//! Interface for the live tick source. The feed owns its delivery threads;
//! the runtime only registers a handler and starts it.

use chrono::{DateTime, Utc};

use crate::domain::market::Tick;

/// Receiver of feed deliveries.
///
/// A feed calls [`SpotHandler::on_spot`] zero or more times per delivery
/// cycle, then [`SpotHandler::on_batch_complete`] exactly once. Calls arrive
/// on the feed's delivery thread.
pub trait SpotHandler: Send {
    /// A single tick was delivered.
    fn on_spot(&mut self, tick: &Tick);

    /// The current wave of ticks for `as_of` has been fully delivered.
    fn on_batch_complete(&mut self, as_of: DateTime<Utc>);
}

/// How chatty the feed should be while delivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedMode {
    /// Deliver silently.
    #[default]
    Quiet,
    /// Log every delivered batch.
    Verbose,
}

impl FeedMode {
    /// Parse the mode from a string, defaulting to quiet.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "verbose" | "print" | "true" => Self::Verbose,
            _ => Self::Quiet,
        }
    }

    /// Whether batches should be logged.
    #[must_use]
    pub const fn is_verbose(&self) -> bool {
        matches!(self, Self::Verbose)
    }
}

/// Feed error.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// `start` was called twice.
    #[error("market feed already started")]
    AlreadyStarted,
    /// `start` was called before any handler was registered.
    #[error("market feed has no registered handler")]
    NoHandler,
    /// The feed could not spin up its delivery mechanism.
    #[error("market feed runtime error: {0}")]
    Runtime(String),
}

/// Port for a live market data feed.
pub trait MarketFeed: Send {
    /// Register a handler for subsequent deliveries.
    fn register(&mut self, handler: Box<dyn SpotHandler>);

    /// Start delivering to the registered handlers.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed was already started, has no handler, or
    /// cannot start its delivery mechanism.
    fn start(&mut self, mode: FeedMode) -> Result<(), FeedError>;
}
