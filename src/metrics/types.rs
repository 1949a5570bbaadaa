//! Accumulator variants.
//!
//! Each variant owns its own representation and knows nothing about the
//! store, the lock or the transport. Updates are statically typed; the
//! tagged entry point lives on [`Metric`](super::Metric).

/// Running integer total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SumMetric {
    total: i64,
}

impl SumMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` to the running total (saturating at the i64 bounds)
    #[inline]
    pub fn add(&mut self, value: i64) {
        self.total = self.total.saturating_add(value);
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn clear(&mut self) {
        self.total = 0;
    }

    pub fn calculate(&self) -> String {
        self.total.to_string()
    }

    pub(super) fn absorb(&mut self, older: &SumMetric) {
        self.add(older.total);
    }
}

/// Running total and sample count, rendered as their quotient
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AverageMetric {
    total: i64,
    count: u64,
}

impl AverageMetric {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, value: i64) {
        self.total = self.total.saturating_add(value);
        self.count += 1;
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn clear(&mut self) {
        self.total = 0;
        self.count = 0;
    }

    /// `total / count` with six decimals, or the literal `"0"` while the
    /// total is zero.
    pub fn calculate(&self) -> String {
        if self.total == 0 || self.count == 0 {
            return "0".to_string();
        }
        format!("{:.6}", self.total as f64 / self.count as f64)
    }

    pub(super) fn absorb(&mut self, older: &AverageMetric) {
        self.total = self.total.saturating_add(older.total);
        self.count += older.count;
    }
}

/// Boolean latch, last write wins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveMetric {
    state: bool,
}

impl ActiveMetric {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn set(&mut self, state: bool) {
        self.state = state;
    }

    pub fn is_active(&self) -> bool {
        self.state
    }

    pub fn clear(&mut self) {
        self.state = false;
    }

    pub fn calculate(&self) -> String {
        let rendered = if self.state { "1" } else { "0" };
        rendered.to_string()
    }
}
