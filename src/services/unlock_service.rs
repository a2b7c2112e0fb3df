//! services/unlock_service.rs
//! Desbloqueo manual de operaciones Proexsi.

use std::fmt;

use anyhow::{Context, Result};

use crate::services::event_service::EventStore;
use crate::services::operation_service::OperationService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockTarget {
    Event(i64),
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// La transacción no existe; no se tocó nada.
    UnknownEvent(i64),
    Event { event_id: i64, unlocked: bool },
    All(u64),
}

impl UnlockOutcome {
    pub fn unlocked(&self) -> u64 {
        match self {
            UnlockOutcome::UnknownEvent(_) => 0,
            UnlockOutcome::Event { unlocked, .. } => u64::from(*unlocked),
            UnlockOutcome::All(total) => *total,
        }
    }
}

impl fmt::Display for UnlockOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnlockOutcome::UnknownEvent(id) => write!(f, "La transacción {} no existe", id),
            UnlockOutcome::Event {
                event_id,
                unlocked: true,
            } => write!(f, "Transacción {}: 1 operación desbloqueada", event_id),
            UnlockOutcome::Event {
                event_id,
                unlocked: false,
            } => write!(
                f,
                "Transacción {}: 0 operaciones desbloqueadas (no estaba bloqueada)",
                event_id
            ),
            UnlockOutcome::All(total) => write!(f, "{} operaciones desbloqueadas", total),
        }
    }
}

pub async fn unlock_proexsi(
    operations: &OperationService,
    events: &dyn EventStore,
    target: UnlockTarget,
    threshold: u32,
) -> Result<UnlockOutcome> {
    let outcome = match target {
        UnlockTarget::Event(event_id) => {
            if !events
                .event_exists(event_id)
                .await
                .context("Error verificando la transacción")?
            {
                UnlockOutcome::UnknownEvent(event_id)
            } else {
                UnlockOutcome::Event {
                    event_id,
                    unlocked: operations.unlock(event_id, threshold).await?,
                }
            }
        }
        UnlockTarget::All => UnlockOutcome::All(operations.unlock_all(threshold).await?),
    };

    log::info!("(unlock_proexsi) {}", outcome);
    Ok(outcome)
}
