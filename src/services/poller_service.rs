//! services/poller_service.rs
//! Ciclo principal: consulta pendientes, despacha por lotes y cierra los
//! eventos completos.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::event_model::PendingEvent;
use crate::models::operation_model::OperationName;
use crate::services::dispatch_service::DispatchService;
use crate::services::event_service::EventStore;
use crate::services::metrics_service::DispatchMetrics;
use crate::services::operation_service::OperationStore;

/// Resumen de una iteración del poller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub events: usize,
    pub batches: usize,
    pub finalized: usize,
    pub blocked: usize,
    pub failed: usize,
}

enum EventResult {
    Finalized { blocked: usize },
    Pending { blocked: usize },
    Failed,
}

#[derive(Clone)]
pub struct PollerService {
    events: Arc<dyn EventStore>,
    operations: Arc<dyn OperationStore>,
    dispatcher: DispatchService,
    metrics: Arc<DispatchMetrics>,
    batch_size: usize,
    poll_interval: Duration,
    block_threshold: u32,
}

impl PollerService {
    pub fn new(
        events: Arc<dyn EventStore>,
        operations: Arc<dyn OperationStore>,
        dispatcher: DispatchService,
        metrics: Arc<DispatchMetrics>,
        batch_size: usize,
        poll_interval: Duration,
        block_threshold: u32,
    ) -> Self {
        Self {
            events,
            operations,
            dispatcher,
            metrics,
            batch_size: batch_size.max(1),
            poll_interval,
            block_threshold,
        }
    }

    /// Corre hasta que `shutdown` pase a `true` (o se cierre el emisor).
    /// Un lote en curso siempre termina antes de salir.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        log::info!(
            "(run) Poller iniciado: lotes de {}, intervalo {:?}",
            self.batch_size,
            self.poll_interval
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.run_once(&shutdown).await {
                log::error!("(run) Error en iteración del poller: {:?}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        log::info!("(run) Poller detenido");
    }

    /// Una iteración: lotes secuenciales, eventos de cada lote en paralelo.
    pub async fn run_once(&self, shutdown: &watch::Receiver<bool>) -> Result<CycleSummary> {
        let cycle_id = Uuid::new_v4();
        self.metrics.iteration();

        let result = self.process_pending(cycle_id, shutdown).await;
        self.refresh_blocked_gauge().await;
        result
    }

    async fn process_pending(
        &self,
        cycle_id: Uuid,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<CycleSummary> {
        let pending = self
            .events
            .pending_events()
            .await
            .context("Error consultando notificaciones pendientes")?;

        let mut summary = CycleSummary {
            events: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            return Ok(summary);
        }

        self.metrics.events_seen(pending.len() as u64);
        let total_batches = pending.len().div_ceil(self.batch_size);
        log::info!(
            "(run_once) [{}] {} pendientes en {} lotes",
            cycle_id,
            pending.len(),
            total_batches
        );

        for (index, batch) in pending.chunks(self.batch_size).enumerate() {
            if *shutdown.borrow() {
                log::info!(
                    "(run_once) [{}] Apagado solicitado; se omiten {} lotes",
                    cycle_id,
                    total_batches - index
                );
                break;
            }

            let results = join_all(batch.iter().map(|event| self.process_event(event))).await;
            summary.batches += 1;

            let mut batch_blocked = 0;
            for result in results {
                match result {
                    EventResult::Finalized { blocked } => {
                        summary.finalized += 1;
                        batch_blocked += blocked;
                    }
                    EventResult::Pending { blocked } => batch_blocked += blocked,
                    EventResult::Failed => summary.failed += 1,
                }
            }
            summary.blocked += batch_blocked;

            if batch_blocked > 0 {
                log::warn!(
                    "(run_once) [{}] Lote {}/{}: {} operaciones bloqueadas",
                    cycle_id,
                    index + 1,
                    total_batches,
                    batch_blocked
                );
            } else {
                log::debug!(
                    "(run_once) [{}] Lote {}/{} terminado",
                    cycle_id,
                    index + 1,
                    total_batches
                );
            }
        }

        Ok(summary)
    }

    async fn process_event(&self, event: &PendingEvent) -> EventResult {
        let report = match self.dispatcher.dispatch(event).await {
            Ok(report) => report,
            Err(e) => {
                log::error!("(process_event) Error procesando evento {}: {:?}", event.id, e);
                return EventResult::Failed;
            }
        };

        let blocked = report.blocked.len();
        if !report.finalize {
            return EventResult::Pending { blocked };
        }

        match self.events.mark_processed(event.id).await {
            Ok(()) => {
                self.metrics.event_finalized();
                log::info!("(process_event) Evento {} procesado", event.id);
                EventResult::Finalized { blocked }
            }
            Err(e) => {
                log::error!(
                    "(process_event) No se pudo marcar procesado el evento {}: {:?}",
                    event.id,
                    e
                );
                EventResult::Pending { blocked }
            }
        }
    }

    async fn refresh_blocked_gauge(&self) {
        match self
            .operations
            .count_blocked(OperationName::ApiProexsi, self.block_threshold)
            .await
        {
            Ok(total) => self.metrics.set_blocked(total),
            Err(e) => log::warn!("(refresh_blocked_gauge) {:?}", e),
        }
    }
}
