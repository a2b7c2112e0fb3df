use serde::Serialize;

/// Foto de los contadores del despachador, expuesta en `/api/metrics`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub iterations: u64,
    pub events_seen: u64,
    pub events_finalized: u64,
    pub adapter_successes: u64,
    pub adapter_failures: u64,
    pub blocked_skips: u64,
    pub alerts_sent: u64,
    /// Operaciones Proexsi bloqueadas a la espera de desbloqueo manual.
    pub blocked_operations: u64,
}
