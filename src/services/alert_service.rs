//! services/alert_service.rs
//! Aviso a operaciones cuando una operación queda bloqueada.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::services::email_service::Mailer;
use crate::services::message_builder::BlockedAlert;

#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// `Ok(false)` si no había destinatario y la alerta se omitió.
    async fn notify_blocked(&self, alert: &BlockedAlert) -> Result<bool>;
}

/// Envía la alerta por SMTP a la casilla fija de operaciones (`EMAIL_ALERTA`).
#[derive(Clone)]
pub struct EmailAlertNotifier {
    mailer: Arc<dyn Mailer>,
    recipient: Option<String>,
}

impl EmailAlertNotifier {
    pub fn new(mailer: Arc<dyn Mailer>, recipient: Option<String>) -> Self {
        EmailAlertNotifier { mailer, recipient }
    }
}

#[async_trait]
impl AlertNotifier for EmailAlertNotifier {
    async fn notify_blocked(&self, alert: &BlockedAlert) -> Result<bool> {
        let Some(recipient) = self.recipient.as_deref() else {
            log::warn!(
                "(notify_blocked) EMAIL_ALERTA no configurado, alerta omitida para transacción {} ({})",
                alert.event_id,
                alert.operation
            );
            return Ok(false);
        };

        self.mailer
            .send(recipient, &alert.subject(), &alert.content())
            .await?;

        log::info!(
            "(notify_blocked) Alerta de bloqueo enviada a {} para transacción {} ({})",
            recipient,
            alert.event_id,
            alert.operation
        );
        Ok(true)
    }
}
