//! Configuration Module
//!
//! Environment settings for the process and the runtime INI file the
//! runner reads at startup.

mod error;
mod runtime;
mod settings;

pub use error::ConfigError;
pub use runtime::{DEFAULT_PRELOAD_MAX, RuntimeConfig, default_config_path};
pub use settings::{FeedSettings, MetricsSettings, RuntimeSettings};
