//! Traffic and request-outcome accounting.
mod registry;
mod reporter;
mod types;

#[cfg(test)]
mod tests;

pub use registry::{MetricsRegistry, MetricsSink, MetricsSnapshot};
pub use reporter::spawn_stats_reporter;
pub use types::{HttpKey, HttpOutcome, StreamId};
