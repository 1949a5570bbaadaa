//! Metric store: resolved path -> accumulator.

use std::collections::hash_map::Entry;

use ahash::AHashMap;
use tracing::warn;

use crate::error::MetricError;
use crate::metrics::{Metric, MetricKind, MetricValue};
use crate::transport::write_line;

/// Mapping from fully resolved path to exactly one [`Metric`].
///
/// Not synchronized; the aggregator wraps it in its lock.
#[derive(Debug, Default, Clone)]
pub struct MetricStore {
    metrics: AHashMap<String, Metric>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate-or-create the metric at `path` and apply `value`.
    ///
    /// `kind` only matters when the path is new; an existing entry keeps
    /// its kind and rejects values that do not fit it.
    pub fn update(
        &mut self,
        path: String,
        kind: MetricKind,
        value: MetricValue,
    ) -> Result<(), MetricError> {
        if let Some(metric) = self.metrics.get_mut(&path) {
            return metric.update(value);
        }
        let mut metric = Metric::new(kind);
        metric.update(value)?;
        self.metrics.insert(path, metric);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Metric> {
        self.metrics.get(path)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metric)> {
        self.metrics.iter().map(|(path, metric)| (path.as_str(), metric))
    }

    /// Detach every entry, leaving this store empty
    pub fn take(&mut self) -> MetricStore {
        std::mem::take(self)
    }

    /// Merge a previously detached batch back in.
    ///
    /// Entries written since the batch was taken are newer: sums and
    /// averages fold the old accumulation in, latches keep their newer
    /// state. Returns the number of paths whose kind changed in between;
    /// for those the newer metric is kept.
    pub fn restore(&mut self, older: MetricStore) -> usize {
        let mut conflicts = 0;
        for (path, metric) in older.metrics {
            match self.metrics.entry(path) {
                Entry::Occupied(mut entry) => {
                    if !entry.get_mut().absorb(&metric) {
                        warn!(
                            path = %entry.key(),
                            kept = %entry.get().kind(),
                            dropped = %metric.kind(),
                            "metric kind changed while its batch was in flight"
                        );
                        conflicts += 1;
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(metric);
                }
            }
        }
        conflicts
    }

    /// Render every entry as a protocol line, all sharing `timestamp`
    pub fn render(&self, timestamp: u64) -> String {
        let mut buf = String::with_capacity(self.metrics.len() * 48);
        for (path, metric) in &self.metrics {
            write_line(&mut buf, path, &metric.calculate(), timestamp);
        }
        buf
    }
}
