//! services/metrics_service.rs

use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::metrics_model::MetricsSnapshot;

/// Contadores del despachador. Se comparten con `Arc` entre el poller y
/// la API de estado.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    iterations: AtomicU64,
    events_seen: AtomicU64,
    events_finalized: AtomicU64,
    adapter_successes: AtomicU64,
    adapter_failures: AtomicU64,
    blocked_skips: AtomicU64,
    alerts_sent: AtomicU64,
    blocked_operations: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn events_seen(&self, n: u64) {
        self.events_seen.fetch_add(n, Ordering::Relaxed);
    }

    pub fn event_finalized(&self) {
        self.events_finalized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn adapter_success(&self) {
        self.adapter_successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn adapter_failure(&self) {
        self.adapter_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn blocked_skip(&self) {
        self.blocked_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn alert_sent(&self) {
        self.alerts_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Gauge: se reemplaza, no se acumula.
    pub fn set_blocked(&self, total: u64) {
        self.blocked_operations.store(total, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            iterations: self.iterations.load(Ordering::Relaxed),
            events_seen: self.events_seen.load(Ordering::Relaxed),
            events_finalized: self.events_finalized.load(Ordering::Relaxed),
            adapter_successes: self.adapter_successes.load(Ordering::Relaxed),
            adapter_failures: self.adapter_failures.load(Ordering::Relaxed),
            blocked_skips: self.blocked_skips.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            blocked_operations: self.blocked_operations.load(Ordering::Relaxed),
        }
    }
}
