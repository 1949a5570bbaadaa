//! Transport Abstraction
//!
//! The aggregator only needs two things from the network: deliver a buffer
//! and re-establish the connection. Keeping that behind [`Transport`] lets
//! the same aggregation code run against the real graphite client or the
//! in-memory [`SimulatedTransport`] used by tests.
//!
//! Also home of the plaintext line protocol shared by every transport:
//! `"<path> <value> <unix-seconds>\n"`.

pub mod graphite;
pub mod simulated;

pub use graphite::GraphiteClient;
pub use simulated::SimulatedTransport;

use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::BoxFuture;

use crate::error::TransportError;

/// Boxed future returned by [`Transport`] methods
pub type TransportFuture<'a, T> = BoxFuture<'a, Result<T, TransportError>>;

/// Network-facing side of an aggregator
pub trait Transport: Send + Sync + 'static {
    /// Deliver `buf` in one write, returning the number of bytes written
    fn send<'a>(&'a self, buf: &'a [u8]) -> TransportFuture<'a, usize>;

    /// Close the current connection (if any) and open a new one
    fn reconnect(&self) -> TransportFuture<'_, ()>;
}

/// Current wall clock as unix seconds
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Append one protocol line to `buf`
pub fn write_line(buf: &mut String, path: &str, value: &str, timestamp: u64) {
    // Writing into a String never fails
    let _ = writeln!(buf, "{path} {value} {timestamp}");
}

/// Format a single protocol line
pub fn format_line(path: &str, value: &str, timestamp: u64) -> String {
    let mut line = String::with_capacity(path.len() + value.len() + 13);
    write_line(&mut line, path, value, timestamp);
    line
}

/// One parsed protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireLine {
    pub path: String,
    pub value: String,
    pub timestamp: u64,
}

impl WireLine {
    /// Parse a single line, with or without its trailing newline
    pub fn parse(line: &str) -> Option<WireLine> {
        let mut parts = line.trim_end_matches('\n').split(' ');
        let path = parts.next()?;
        let value = parts.next()?;
        let timestamp = parts.next()?.parse().ok()?;
        if parts.next().is_some() || path.is_empty() || value.is_empty() {
            return None;
        }
        Some(WireLine {
            path: path.to_string(),
            value: value.to_string(),
            timestamp,
        })
    }

    /// Parse every line of a delivered buffer, skipping malformed ones
    pub fn parse_batch(buf: &[u8]) -> Vec<WireLine> {
        String::from_utf8_lossy(buf)
            .lines()
            .filter_map(WireLine::parse)
            .collect()
    }
}
