//! Error types for Spark

use thiserror::Error;

/// The main error type for Spark operations
#[derive(Debug, Error)]
pub enum SparkError {
    /// A fetch completed with a non-success status.
    #[error("Transport failure: {url} returned status {status}")]
    Transport { url: String, status: u16 },

    /// A fetch never produced a status (connection refused, read error, ...).
    #[error("Transport error for {url}: {message}")]
    TransportIo { url: String, message: String },

    #[error("Engine fault: {0}")]
    EngineFault(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Engine config is borrowed by a running frame")]
    ConfigBusy,

    #[error("Unknown key name: {0}")]
    UnknownKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

impl SparkError {
    /// Returns true for failures reported by a resource transport.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SparkError::Transport { .. } | SparkError::TransportIo { .. }
        )
    }

    /// Convenience constructor for engine faults.
    pub fn engine_fault(message: impl Into<String>) -> Self {
        SparkError::EngineFault(message.into())
    }
}

/// Result type alias for Spark operations
pub type Result<T> = std::result::Result<T, SparkError>;

impl From<toml::de::Error> for SparkError {
    fn from(err: toml::de::Error) -> Self {
        SparkError::TomlParseError(err.to_string())
    }
}
