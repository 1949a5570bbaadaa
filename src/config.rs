//! Emitter configuration
//!
//! Loaded from TOML (`Config::load`) or from `GRAPHITE_*` environment
//! variables (`Config::from_env`). Missing keys fall back to defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Connect timeout used when `timeout_ms` is zero
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Plaintext port of carbon/graphite
pub const DEFAULT_PORT: u16 = 2003;

/// Join a namespace prefix and a metric key into a dotted path.
///
/// Either side may be empty, in which case the other is returned as is.
pub fn resolve_path(prefix: &str, key: &str) -> String {
    if !prefix.is_empty() && !key.is_empty() {
        format!("{prefix}.{key}")
    } else {
        format!("{prefix}{key}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(format!("protocol [{other}] not supported")),
        }
    }
}

/// Graphite client and aggregator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host name or IP address of the collector
    pub host: String,
    /// Collector port
    pub port: u16,
    /// Prefix prepended to every metric path
    pub namespace: String,
    /// Connect timeout in milliseconds, 0 selects [`DEFAULT_TIMEOUT`]
    pub timeout_ms: u64,
    /// Reconnect before every send. Useful behind load balancers that
    /// silently drop idle connections.
    pub force_reconnect: bool,
    pub protocol: Protocol,
    /// Period of the background flush loop started by the binary
    pub flush_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: String::new(),
            port: DEFAULT_PORT,
            namespace: String::new(),
            timeout_ms: 0,
            force_reconnect: false,
            protocol: Protocol::Tcp,
            flush_interval_ms: 10_000,
        }
    }
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Config {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_force_reconnect(mut self, force: bool) -> Self {
        self.force_reconnect = force;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }

    /// `host:port`, unvalidated
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        if self.timeout_ms > 0 {
            Duration::from_millis(self.timeout_ms)
        } else {
            DEFAULT_TIMEOUT
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Full path for `key` under the configured namespace
    pub fn metric_path(&self, key: &str) -> String {
        resolve_path(&self.namespace, key)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by any `GRAPHITE_*` variable that is set
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        if let Ok(host) = std::env::var("GRAPHITE_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_env("GRAPHITE_PORT")? {
            config.port = port;
        }
        if let Ok(namespace) = std::env::var("GRAPHITE_NAMESPACE") {
            config.namespace = namespace;
        }
        if let Some(timeout_ms) = parse_env("GRAPHITE_TIMEOUT_MS")? {
            config.timeout_ms = timeout_ms;
        }
        if let Ok(value) = std::env::var("GRAPHITE_FORCE_RECONNECT") {
            config.force_reconnect = match value.as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "GRAPHITE_FORCE_RECONNECT",
                        value,
                    })
                }
            };
        }
        if let Some(protocol) = parse_env("GRAPHITE_PROTOCOL")? {
            config.protocol = protocol;
        }
        if let Some(interval) = parse_env("GRAPHITE_FLUSH_INTERVAL_MS")? {
            config.flush_interval_ms = interval;
        }
        Ok(config)
    }
}

fn parse_env<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}
