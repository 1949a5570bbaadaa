//! Metric Aggregator
//!
//! Accumulates sums, averages and active latches under hierarchical paths,
//! then ships everything accumulated since the last successful flush as one
//! batch of plaintext lines.
//!
//! Concurrency model:
//! - every update takes the store lock once, so concurrent updates are
//!   never lost and readers never see a half-applied update
//! - a flush detaches the whole store under the lock, renders and sends it
//!   outside the lock, and merges the batch back if the send fails; updates
//!   made while a send is in flight land in the next batch
//! - flushes are serialized by an async gate, so explicit flushes and the
//!   periodic loop never ship overlapping batches

mod runner;
pub mod store;

pub use runner::{RunHandle, RunState, MAX_FLUSH_PERIOD, MIN_FLUSH_PERIOD};
pub use store::MetricStore;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::{resolve_path, Config};
use crate::error::{MetricError, TransportError};
use crate::metrics::{MetricKind, MetricValue};
use crate::transport::{unix_timestamp, Transport};

struct Inner<T> {
    namespace: String,
    store: Mutex<MetricStore>,
    transport: Arc<T>,
    flush_gate: tokio::sync::Mutex<()>,
}

/// Thread-safe metric aggregator bound to one [`Transport`].
///
/// Cheap to clone; clones share the same store and transport.
pub struct Aggregator<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Aggregator<T> {
    fn clone(&self) -> Self {
        Aggregator {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Aggregator<T> {
    /// Empty aggregator; every key is prefixed with `namespace`
    pub fn new(namespace: impl Into<String>, transport: Arc<T>) -> Self {
        Aggregator {
            inner: Arc::new(Inner {
                namespace: namespace.into(),
                store: Mutex::new(MetricStore::new()),
                transport,
                flush_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn from_config(config: &Config, transport: Arc<T>) -> Self {
        Self::new(config.namespace.clone(), transport)
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.inner.transport
    }

    /// Add `value` to the metric at `key`, creating a sum if absent
    pub fn add_sum(&self, key: &str, value: i64) -> Result<(), MetricError> {
        self.update(key, MetricKind::Sum, value.into())
    }

    /// Shorthand for `add_sum(key, 1)`
    pub fn increase(&self, key: &str) -> Result<(), MetricError> {
        self.add_sum(key, 1)
    }

    /// Record one sample in the metric at `key`, creating an average if absent
    pub fn add_average(&self, key: &str, value: i64) -> Result<(), MetricError> {
        self.update(key, MetricKind::Average, value.into())
    }

    pub fn set_active(&self, key: &str) -> Result<(), MetricError> {
        self.update(key, MetricKind::Active, true.into())
    }

    pub fn set_inactive(&self, key: &str) -> Result<(), MetricError> {
        self.update(key, MetricKind::Active, false.into())
    }

    fn update(&self, key: &str, kind: MetricKind, value: MetricValue) -> Result<(), MetricError> {
        let path = resolve_path(&self.inner.namespace, key);
        self.inner.store.lock().update(path, kind, value)
    }

    /// Rendered value of the metric at `key`, if it exists in the current batch
    pub fn calculate(&self, key: &str) -> Option<String> {
        let path = resolve_path(&self.inner.namespace, key);
        self.inner.store.lock().get(&path).map(|m| m.calculate())
    }

    /// Rendered snapshot of the current batch, keyed by resolved path
    pub fn metrics(&self) -> BTreeMap<String, String> {
        self.inner
            .store
            .lock()
            .iter()
            .map(|(path, metric)| (path.to_string(), metric.calculate()))
            .collect()
    }

    /// Number of distinct paths waiting for the next flush
    pub fn len(&self) -> usize {
        self.inner.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.lock().is_empty()
    }

    /// Send every accumulated metric as one buffer.
    ///
    /// All lines share a single timestamp. On success the batch is gone and
    /// the byte count is returned; an empty store sends nothing and returns
    /// `Ok(0)`. On failure, or if this future is dropped before the send
    /// completes, the batch is merged back into the store.
    pub async fn flush(&self) -> Result<usize, TransportError> {
        let _gate = self.inner.flush_gate.lock().await;

        let batch = {
            let mut store = self.inner.store.lock();
            if store.is_empty() {
                return Ok(0);
            }
            store.take()
        };
        let in_flight = InFlight {
            store: &self.inner.store,
            batch: Some(batch),
        };

        let count = in_flight.len();
        let buffer = in_flight.render(unix_timestamp());
        let written = self.inner.transport.send(buffer.as_bytes()).await?;

        in_flight.commit();
        debug!(metrics = count, bytes = written, "flushed metrics");
        Ok(written)
    }

    /// Reconnect the transport, then flush exactly once.
    ///
    /// A failed reconnect is returned as-is and no flush is attempted.
    pub async fn retry(&self) -> Result<usize, TransportError> {
        self.inner.transport.reconnect().await?;
        self.flush().await
    }

    /// Flush, and on failure reconnect and flush once more.
    ///
    /// The first failure is logged; the retry's outcome is returned.
    pub async fn flush_with_retry(&self) -> Result<usize, TransportError> {
        match self.flush().await {
            Ok(written) => Ok(written),
            Err(e) => {
                warn!(error = %e, "flush failed, reconnecting");
                self.retry().await
            }
        }
    }
}

/// Batch detached for sending; merged back into the store unless committed
struct InFlight<'a> {
    store: &'a Mutex<MetricStore>,
    batch: Option<MetricStore>,
}

impl InFlight<'_> {
    fn len(&self) -> usize {
        self.batch.as_ref().map_or(0, MetricStore::len)
    }

    fn render(&self, timestamp: u64) -> String {
        self.batch
            .as_ref()
            .map(|b| b.render(timestamp))
            .unwrap_or_default()
    }

    fn commit(mut self) {
        self.batch = None;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            self.store.lock().restore(batch);
        }
    }
}
