//! Metric Family
//!
//! The accumulators an aggregator stores per path:
//!
//! - **Sum**: running integer total
//! - **Average**: running total and count, rendered as a 6-decimal quotient
//! - **Active**: boolean latch rendered as `1` / `0`
//!
//! [`Metric`] is the tagged union the store holds. Values reach it through
//! [`MetricValue`], which is checked against the variant at the boundary.

mod types;

pub use types::{ActiveMetric, AverageMetric, SumMetric};

use std::fmt;

use crate::error::MetricError;

/// Kind of accumulator created for a fresh path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Sum,
    Average,
    Active,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Sum => "sum",
            MetricKind::Average => "average",
            MetricKind::Active => "active",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value passed to [`Metric::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricValue {
    Int(i64),
    Bool(bool),
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        MetricValue::Bool(v)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "integer {v}"),
            MetricValue::Bool(v) => write!(f, "boolean {v}"),
        }
    }
}

/// One accumulator, polymorphic over the supported kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Sum(SumMetric),
    Average(AverageMetric),
    Active(ActiveMetric),
}

impl Metric {
    /// Zero-valued metric of the given kind
    pub fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Sum => Metric::Sum(SumMetric::new()),
            MetricKind::Average => Metric::Average(AverageMetric::new()),
            MetricKind::Active => Metric::Active(ActiveMetric::new()),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Sum(_) => MetricKind::Sum,
            Metric::Average(_) => MetricKind::Average,
            Metric::Active(_) => MetricKind::Active,
        }
    }

    /// Apply `value`; integers feed Sum/Average, booleans feed Active.
    /// A mismatched value leaves the metric untouched.
    pub fn update(&mut self, value: impl Into<MetricValue>) -> Result<(), MetricError> {
        match (self, value.into()) {
            (Metric::Sum(m), MetricValue::Int(v)) => m.add(v),
            (Metric::Average(m), MetricValue::Int(v)) => m.add(v),
            (Metric::Active(m), MetricValue::Bool(v)) => m.set(v),
            (metric, value) => {
                return Err(MetricError::TypeMismatch {
                    kind: metric.kind(),
                    value,
                })
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        match self {
            Metric::Sum(m) => m.clear(),
            Metric::Average(m) => m.clear(),
            Metric::Active(m) => m.clear(),
        }
    }

    /// Wire-ready textual value
    pub fn calculate(&self) -> String {
        match self {
            Metric::Sum(m) => m.calculate(),
            Metric::Average(m) => m.calculate(),
            Metric::Active(m) => m.calculate(),
        }
    }

    /// Fold an older accumulation of the same path into this one.
    ///
    /// Totals and counts add up; an active latch keeps its own (newer) state.
    /// Returns `false` and keeps `self` unchanged when the kinds differ.
    pub fn absorb(&mut self, older: &Metric) -> bool {
        match (self, older) {
            (Metric::Sum(newer), Metric::Sum(older)) => newer.absorb(older),
            (Metric::Average(newer), Metric::Average(older)) => newer.absorb(older),
            (Metric::Active(_), Metric::Active(_)) => {}
            _ => return false,
        }
        true
    }
}
