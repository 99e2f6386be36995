use std::path::PathBuf;

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The runtime INI file could not be read or parsed.
    #[error("failed to read configuration file {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: config::ConfigError,
    },
    /// In-memory INI contents could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[source] config::ConfigError),
    /// A required section is absent.
    #[error("missing required configuration section [{0}]")]
    MissingSection(String),
    /// No config path was given and `HOME` is not set.
    #[error("STRATEGY_CONFIG is not set and HOME is unavailable")]
    MissingHome,
}
