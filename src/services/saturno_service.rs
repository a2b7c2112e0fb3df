//! services/saturno_service.rs
//! Canal `api_saturno`: POST JSON al endpoint `marcaje`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::dispatcher_config::SaturnoConfig;
use crate::models::event_model::PunchRecord;
use crate::models::operation_channel_model::ChannelOutcome;
use crate::services::notification_channel_service::ChannelAdapter;
use crate::utils::date_format;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SaturnoPayload {
    pub institucion: String,
    pub userid: String,
    pub checktime: String,
    pub checktype: String,
    pub nombre_equipo: Option<String>,
}

/// Saturno usa "0" para entrada y "1" para salida; acepta además los
/// códigos extendidos del reloj. Lo demás se envía tal cual.
pub fn saturno_check_type(punch_state: &str) -> String {
    match punch_state {
        "C/In" | "20" | "10" | "12" => "0".to_string(),
        "C/Out" | "21" | "11" | "13" => "1".to_string(),
        other => other.to_string(),
    }
}

#[derive(Clone)]
pub struct SaturnoService {
    http_client: Client,
    config: SaturnoConfig,
}

impl SaturnoService {
    pub fn new(config: SaturnoConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("No se pudo crear cliente HTTP para Saturno")?;
        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn build_payload(&self, punch: &PunchRecord) -> SaturnoPayload {
        SaturnoPayload {
            institucion: self.config.institution.clone(),
            userid: punch.emp_code.clone(),
            checktime: date_format::datetime(&punch.punch_time),
            checktype: saturno_check_type(&punch.punch_state),
            nombre_equipo: punch.area_alias.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}marcaje", self.config.base_url)
    }
}

#[async_trait]
impl ChannelAdapter for SaturnoService {
    async fn send(&self, punch: &PunchRecord) -> ChannelOutcome {
        let payload = self.build_payload(punch);

        let resp = match self
            .http_client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("x-api-secret", &self.config.api_secret)
            .json(&payload)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                log::error!("(saturno) Timeout en marcación de {}", punch.emp_code);
                return ChannelOutcome::failed("Se excedió el tiempo máximo de espera");
            }
            Err(e) => {
                log::error!("(saturno) Error de conexión: {}", e);
                return ChannelOutcome::failed("Error de conexión");
            }
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                return ChannelOutcome::failed("Se excedió el tiempo máximo de espera")
            }
            Err(e) => return ChannelOutcome::failed(format!("Respuesta inválida: {}", e)),
        };

        if !status.is_success() {
            log::error!("(saturno) Error {}: {}", status, body);
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body
            };
            return ChannelOutcome::failed(message);
        }

        let data = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        ChannelOutcome::ok_with(data)
    }
}
