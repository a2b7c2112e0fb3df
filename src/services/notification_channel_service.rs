//! services/notification_channel_service.rs
//! Contrato de los canales de notificación y el canal de correo.

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::event_model::PunchRecord;
use crate::models::operation_channel_model::ChannelOutcome;
use crate::models::operation_model::OperationName;
use crate::services::email_service::Mailer;
use crate::services::message_builder::{punch_receipt, PUNCH_RECEIPT_SUBJECT};

/// Un canal recibe la marcación normalizada y responde éxito/fallo.
/// Cada adaptador aplica su propio timeout y no devuelve errores.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    async fn send(&self, punch: &PunchRecord) -> ChannelOutcome;
}

/// Un adaptador por operación.
#[derive(Clone)]
pub struct ChannelSet {
    pub email: Arc<dyn ChannelAdapter>,
    pub saturno: Arc<dyn ChannelAdapter>,
    pub proexsi: Arc<dyn ChannelAdapter>,
}

impl ChannelSet {
    pub fn get(&self, operation: OperationName) -> &Arc<dyn ChannelAdapter> {
        match operation {
            OperationName::Email => &self.email,
            OperationName::ApiSaturno => &self.saturno,
            OperationName::ApiProexsi => &self.proexsi,
        }
    }
}

/// Canal `email`: comprobante al correo del funcionario.
#[derive(Clone)]
pub struct EmailChannel {
    mailer: Arc<dyn Mailer>,
}

impl EmailChannel {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl ChannelAdapter for EmailChannel {
    async fn send(&self, punch: &PunchRecord) -> ChannelOutcome {
        // Sin correo registrado no hay nada que enviar: se da por cumplido.
        let Some(recipient) = punch.recipient() else {
            log::debug!(
                "(email_channel) Funcionario {} sin email, se omite envío",
                punch.emp_code
            );
            return ChannelOutcome::ok();
        };

        let content = punch_receipt(punch);
        match self
            .mailer
            .send(recipient, PUNCH_RECEIPT_SUBJECT, &content)
            .await
        {
            Ok(()) => ChannelOutcome::ok(),
            Err(e) => {
                log::warn!(
                    "(email_channel) Email no enviado para {} - se reintentará: {:?}",
                    punch.emp_code,
                    e
                );
                ChannelOutcome::failed(format!("{:#}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::email_model::EmailContent;
    use crate::utils::date_format::parse_punch_time;
    use actix_rt::test;
    use anyhow::{anyhow, Result};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _content: &EmailContent) -> Result<()> {
            if self.fail {
                return Err(anyhow!("Conexion rechazada"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    fn punch(email: Option<&str>) -> PunchRecord {
        PunchRecord {
            event_id: 1,
            emp_code: "12345678".into(),
            first_name: Some("Ana".into()),
            last_name: Some("Soto".into()),
            email: email.map(str::to_string),
            punch_time: parse_punch_time("2025-03-07 08:05:09").unwrap(),
            punch_state: "0".into(),
            terminal_sn: "App".into(),
            terminal_alias: None,
            area_alias: None,
        }
    }

    #[test]
    async fn test_sends_receipt_to_employee() {
        let mailer = Arc::new(RecordingMailer::default());
        let channel = EmailChannel::new(mailer.clone());

        let outcome = channel.send(&punch(Some("ana@example.cl"))).await;
        assert!(outcome.success);
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(
            sent.as_slice(),
            &[("ana@example.cl".to_string(), PUNCH_RECEIPT_SUBJECT.to_string())]
        );
    }

    #[test]
    async fn test_missing_email_counts_as_success() {
        let mailer = Arc::new(RecordingMailer::default());
        let channel = EmailChannel::new(mailer.clone());

        assert!(channel.send(&punch(None)).await.success);
        assert!(channel.send(&punch(Some("   "))).await.success);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    async fn test_smtp_failure_is_reported() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let channel = EmailChannel::new(mailer);

        let outcome = channel.send(&punch(Some("ana@example.cl"))).await;
        assert!(!outcome.success);
        assert!(outcome.error_message().contains("Conexion rechazada"));
    }
}
