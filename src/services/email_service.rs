//! services/email_service.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::dispatcher_config::SmtpConfig;
use crate::models::email_model::EmailContent;

/// Envío de un correo ya compuesto. Lo usan el canal `email` y las alertas.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, content: &EmailContent) -> Result<()>;
}

/// Mailer SMTP con un transporte (pool de conexiones) compartido.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .with_context(|| format!("EMAIL_FROM inválido: '{}'", config.from))?;

        // STARTTLS si el servidor lo ofrece (puerto 587 sin TLS implícito)
        let tls_params = TlsParameters::new(config.host.clone())?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .tls(Tls::Opportunistic(tls_params))
            .timeout(Some(config.timeout))
            .build();

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send(&self, to: &str, subject: &str, content: &EmailContent) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .with_context(|| format!("Destinatario inválido: '{}'", to))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                content.text.clone(),
                content.html.clone(),
            ))
            .context("No se pudo construir el mensaje")?;

        self.mailer
            .send(message)
            .await
            .with_context(|| format!("Error al enviar correo a: {}", to))?;

        log::debug!("(send) Correo '{}' enviado a {}", subject, to);
        Ok(())
    }
}
