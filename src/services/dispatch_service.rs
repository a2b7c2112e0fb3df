//! services/dispatch_service.rs
//! Despacho de un evento: resuelve qué canales faltan, los intenta y
//! registra el resultado de cada uno.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::models::event_model::{PendingEvent, PunchRecord};
use crate::models::operation_model::OperationName;
use crate::services::alert_service::AlertNotifier;
use crate::services::event_service::EventStore;
use crate::services::message_builder::BlockedAlert;
use crate::services::metrics_service::DispatchMetrics;
use crate::services::notification_channel_service::ChannelSet;
use crate::services::operation_service::OperationStore;
use crate::services::required_operations::required_operations;

/// Resultado de despachar un evento en un ciclo.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub event_id: i64,
    pub required: BTreeSet<OperationName>,
    /// Completadas según el store más las que tuvieron éxito en este ciclo.
    pub completed: BTreeSet<OperationName>,
    /// Operaciones omitidas (o recién bloqueadas) por el corte de circuito.
    pub blocked: Vec<OperationName>,
    pub finalize: bool,
}

#[derive(Clone)]
pub struct DispatchService {
    operations: Arc<dyn OperationStore>,
    events: Arc<dyn EventStore>,
    channels: ChannelSet,
    alerts: Arc<dyn AlertNotifier>,
    metrics: Arc<DispatchMetrics>,
    in_flight: Arc<Semaphore>,
    block_threshold: u32,
}

impl DispatchService {
    pub fn new(
        operations: Arc<dyn OperationStore>,
        events: Arc<dyn EventStore>,
        channels: ChannelSet,
        alerts: Arc<dyn AlertNotifier>,
        metrics: Arc<DispatchMetrics>,
        in_flight: Arc<Semaphore>,
        block_threshold: u32,
    ) -> Self {
        Self {
            operations,
            events,
            channels,
            alerts,
            metrics,
            in_flight,
            block_threshold,
        }
    }

    /// Despacha las operaciones pendientes del evento. El llamador marca el
    /// evento como procesado si `finalize` es verdadero.
    pub async fn dispatch(&self, event: &PendingEvent) -> Result<DispatchReport> {
        let event_id = event.id;

        // Si el store no responde, se asume que no hay nada completado.
        let mut completed = match self.operations.completed_operations(event_id).await {
            Ok(completed) => completed,
            Err(e) => {
                log::warn!(
                    "(dispatch) No se pudieron leer operaciones de {}; se reintentan todas: {:?}",
                    event_id,
                    e
                );
                BTreeSet::new()
            }
        };

        let required =
            required_operations(&event.flags, &event.terminal_source, &event.punch_state);

        let mut report = DispatchReport {
            event_id,
            required: required.clone(),
            ..Default::default()
        };

        if required.is_empty() {
            log::debug!("(dispatch) Evento {} sin canales requeridos", event_id);
            report.finalize = true;
            return Ok(report);
        }

        let pending: Vec<OperationName> = required.difference(&completed).copied().collect();
        if pending.is_empty() {
            report.completed = completed;
            report.finalize = true;
            return Ok(report);
        }

        let Some(punch) = self
            .events
            .punch_record(event_id)
            .await
            .with_context(|| format!("Error cargando marcación {}", event_id))?
        else {
            log::warn!(
                "(dispatch) Marcación {} sin transacción o funcionario; queda pendiente",
                event_id
            );
            report.completed = completed;
            return Ok(report);
        };

        for operation in pending {
            if operation.has_circuit_breaker() && self.is_blocked(event_id, operation).await {
                log::info!(
                    "(dispatch) {} bloqueada para evento {}; se omite hasta desbloqueo manual",
                    operation,
                    event_id
                );
                self.metrics.blocked_skip();
                report.blocked.push(operation);
                continue;
            }

            let outcome = {
                let _permit = self
                    .in_flight
                    .acquire()
                    .await
                    .context("Semáforo de llamadas cerrado")?;
                self.channels.get(operation).send(&punch).await
            };

            if outcome.success {
                self.metrics.adapter_success();
                if let Err(e) = self.operations.mark_completed(event_id, operation).await {
                    log::error!(
                        "(dispatch) {} enviado para {} pero no se pudo guardar: {:?}",
                        operation,
                        event_id,
                        e
                    );
                }
                completed.insert(operation);
                continue;
            }

            self.metrics.adapter_failure();
            let message = outcome.error_message();
            if !operation.has_circuit_breaker() {
                log::warn!(
                    "(dispatch) {} falló para evento {}; se reintentará: {}",
                    operation,
                    event_id,
                    message
                );
                continue;
            }

            match self
                .operations
                .record_failure(event_id, operation, &message, self.block_threshold)
                .await
            {
                Ok(transition) => {
                    log::warn!(
                        "(dispatch) {} falló para evento {} (intento {}/{}): {}",
                        operation,
                        event_id,
                        transition.attempts,
                        self.block_threshold,
                        message
                    );
                    if transition.newly_blocked {
                        report.blocked.push(operation);
                        self.alert(&punch, operation, &message).await;
                    }
                }
                Err(e) => log::error!(
                    "(dispatch) No se pudo registrar fallo de {} para {}: {:?}",
                    operation,
                    event_id,
                    e
                ),
            }
        }

        report.finalize = required.is_subset(&completed);
        report.completed = completed;
        Ok(report)
    }

    async fn is_blocked(&self, event_id: i64, operation: OperationName) -> bool {
        match self
            .operations
            .is_blocked(event_id, operation, self.block_threshold)
            .await
        {
            Ok(blocked) => blocked,
            Err(e) => {
                log::warn!(
                    "(is_blocked) No se pudo consultar bloqueo de {} para {}: {:?}",
                    operation,
                    event_id,
                    e
                );
                false
            }
        }
    }

    async fn alert(&self, punch: &PunchRecord, operation: OperationName, last_error: &str) {
        log::error!(
            "(alert) {} BLOQUEADA para transacción {} tras {} fallos",
            operation,
            punch.event_id,
            self.block_threshold
        );
        let alert = BlockedAlert::new(
            Some(punch),
            punch.event_id,
            operation,
            last_error,
            self.block_threshold,
        );
        match self.alerts.notify_blocked(&alert).await {
            Ok(true) => self.metrics.alert_sent(),
            Ok(false) => {}
            Err(e) => log::error!(
                "(alert) Error enviando alerta de bloqueo para {}: {:?}",
                punch.event_id,
                e
            ),
        }
    }
}
