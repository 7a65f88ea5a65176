//! Core error types for tta

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors returned from `Listener::accept` and friends
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The listener will never yield another connection
    #[error("listener closed")]
    Closed,

    /// Accepting a connection failed; the listener remains usable
    #[error("accept failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ListenerError {
    /// Whether this error ends the accept loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, ListenerError::Closed)
    }
}

/// A single outbound connection attempt failed
#[derive(Error, Debug)]
pub enum DialError {
    /// Transport error, reported with the OS text unchanged
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The attempt did not complete within the connect timeout
    #[error("dial {address}: timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
