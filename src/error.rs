//! Error types for the aggregation engine, the transports and configuration loading.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::metrics::{MetricKind, MetricValue};

/// Error returned when a value does not fit the metric it is applied to
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricError {
    /// An integer was sent to a boolean metric or the other way around
    #[error("type mismatch: {kind} metric cannot be updated with {value}")]
    TypeMismatch { kind: MetricKind, value: MetricValue },
}

/// Error returned by transports when delivering or (re)connecting
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unable to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out after {timeout:?} connecting to {addr}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("address {addr} did not resolve to any socket address")]
    Resolve { addr: String },

    /// Disconnect requested while no connection was established
    #[error("connection was previously disconnected or never established")]
    NotConnected,

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Error returned when loading a [`Config`](crate::config::Config)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for environment variable {var}")]
    InvalidEnv { var: &'static str, value: String },
}
