use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use super::{HttpKey, HttpOutcome, StreamId};

/// Receiver of per-iteration accounting from the request loop.
pub trait MetricsSink: Send + Sync {
    fn add_traffic(&self, stream: &StreamId, bytes: u64);
    fn inc_http(&self, host: &str, method: &str, outcome: HttpOutcome);
}

#[derive(Debug, Default)]
struct RegistryState {
    traffic: BTreeMap<StreamId, u64>,
    http: BTreeMap<HttpKey, u64>,
}

/// In-process metrics store shared by every job.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    state: Mutex<RegistryState>,
}

/// Point-in-time totals of a [`MetricsRegistry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub bytes: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub streams: usize,
}

impl MetricsRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn traffic(&self, stream: &StreamId) -> u64 {
        self.with_state(|state| state.traffic.get(stream).copied().unwrap_or(0))
    }

    #[must_use]
    pub fn http_count(&self, host: &str, method: &str, outcome: HttpOutcome) -> u64 {
        let key = HttpKey {
            host: host.to_owned(),
            method: method.to_owned(),
            outcome,
        };
        self.with_state(|state| state.http.get(&key).copied().unwrap_or(0))
    }

    /// Copy of every per-request counter, ordered by label.
    #[must_use]
    pub fn http_counters(&self) -> Vec<(HttpKey, u64)> {
        self.with_state(|state| {
            state
                .http
                .iter()
                .map(|(key, count)| (key.clone(), *count))
                .collect()
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.with_state(|state| {
            let mut snapshot = MetricsSnapshot {
                bytes: state
                    .traffic
                    .values()
                    .fold(0_u64, |acc, bytes| acc.saturating_add(*bytes)),
                streams: state.traffic.len(),
                ..MetricsSnapshot::default()
            };
            for (key, count) in &state.http {
                let slot = match key.outcome {
                    HttpOutcome::Success => &mut snapshot.successful_requests,
                    HttpOutcome::Fail => &mut snapshot.failed_requests,
                };
                *slot = slot.saturating_add(*count);
            }
            snapshot
        })
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RegistryState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl MetricsSink for MetricsRegistry {
    fn add_traffic(&self, stream: &StreamId, bytes: u64) {
        self.with_state(|state| {
            let total = state.traffic.entry(stream.clone()).or_insert(0);
            *total = total.saturating_add(bytes);
        });
    }

    fn inc_http(&self, host: &str, method: &str, outcome: HttpOutcome) {
        let key = HttpKey {
            host: host.to_owned(),
            method: method.to_owned(),
            outcome,
        };
        self.with_state(|state| {
            let count = state.http.entry(key).or_insert(0);
            *count = count.saturating_add(1);
        });
    }
}
