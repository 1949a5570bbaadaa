pub mod aggregator;
pub mod buggify;
pub mod config;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod transport;

pub use aggregator::{Aggregator, MetricStore, RunHandle, RunState};
pub use config::{Config, Protocol};
pub use error::{ConfigError, MetricError, TransportError};
pub use metrics::{ActiveMetric, AverageMetric, Metric, MetricKind, MetricValue, SumMetric};
pub use transport::{GraphiteClient, SimulatedTransport, Transport};
