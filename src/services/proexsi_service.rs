//! services/proexsi_service.rs
//! Canal `api_proexsi`: SOAP `CargaMarcacion`.
//!
//! La respuesta trae un JSON dentro de `<CargaMarcacionResult>`; la
//! marcación se considera cargada solo con `EstadoMarcacion == 1`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::dispatcher_config::ProexsiConfig;
use crate::models::event_model::{PunchRecord, TerminalSource};
use crate::models::operation_channel_model::ChannelOutcome;
use crate::services::notification_channel_service::ChannelAdapter;
use crate::utils::{date_format, markup};

const SOAP_ACTION: &str = "http://tempuri.org/CargaMarcacion";
const MOBILE_APP_CLOCK_CODE: &str = "999";
const UNKNOWN_CLOCK_CODE: &str = "000";

/// Campos de interés de `CargaMarcacionResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProexsiResult {
    pub estado: i64,
    pub leidos: Option<i64>,
    pub cargados: Option<i64>,
    pub mensaje: Option<String>,
}

impl ProexsiResult {
    pub fn is_loaded(&self) -> bool {
        self.estado == 1
    }

    pub fn failure_message(&self) -> String {
        match self.mensaje.as_deref() {
            Some(m) if !m.trim().is_empty() => m.to_string(),
            _ => format!(
                "Estado: {}, Mensaje: {}",
                self.estado,
                self.mensaje.as_deref().unwrap_or("null")
            ),
        }
    }
}

/// Código de reloj: 999 para la app, alias del terminal o 000 si no se conoce.
pub fn clock_code(punch: &PunchRecord) -> String {
    match punch.terminal_source() {
        TerminalSource::MobileApp => MOBILE_APP_CLOCK_CODE.to_string(),
        TerminalSource::Terminal(sn) => match punch.terminal_alias.as_deref() {
            Some(alias) if !alias.trim().is_empty() => alias.to_string(),
            _ => {
                log::warn!("(proexsi) No se encontró terminal con sn: {}", sn);
                UNKNOWN_CLOCK_CODE.to_string()
            }
        },
    }
}

pub fn punch_type(punch_state: &str) -> &str {
    match punch_state {
        "0" => "C/In",
        "1" => "C/Out",
        other => other,
    }
}

/// Línea `reloj\tcodigo\tDD-MM-YYYY\tHH:MM\ttipo`.
pub fn format_marcacion(punch: &PunchRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        clock_code(punch),
        punch.emp_code,
        date_format::date_dd_mm_yyyy(&punch.punch_time),
        date_format::time_hh_mm(&punch.punch_time),
        punch_type(&punch.punch_state)
    )
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn number(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Clone)]
pub struct ProexsiService {
    http_client: Client,
    config: ProexsiConfig,
    result_pattern: Regex,
}

impl ProexsiService {
    pub fn new(config: ProexsiConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("No se pudo crear cliente HTTP para Proexsi")?;
        let result_pattern =
            Regex::new(r"(?i)<CargaMarcacionResult[^>]*>([^<]+)</CargaMarcacionResult>")?;
        Ok(Self {
            http_client,
            config,
            result_pattern,
        })
    }

    pub fn build_envelope(&self, punch: &PunchRecord) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <CargaMarcacion xmlns="http://tempuri.org/">
      <CodigoUsuario>{}</CodigoUsuario>
      <Password>{}</Password>
      <Periodo>{}</Periodo>
      <Marcaciones>{}</Marcaciones>
    </CargaMarcacion>
  </soap:Body>
</soap:Envelope>"#,
            markup::escape(&self.config.user_code),
            markup::escape(&self.config.password),
            date_format::period_yyyymm(&punch.punch_time),
            markup::escape(&format_marcacion(punch)),
        )
    }

    /// Extrae el JSON de `CargaMarcacionResult`. `None` si no viene o no
    /// es JSON válido.
    pub fn parse_response(&self, body: &str) -> Option<ProexsiResult> {
        let raw = self.result_pattern.captures(body)?.get(1)?.as_str();
        let data: Value = match serde_json::from_str(&xml_unescape(raw)) {
            Ok(data) => data,
            Err(e) => {
                log::error!("(proexsi) Error al parsear respuesta SOAP JSON: {}", e);
                return None;
            }
        };

        Some(ProexsiResult {
            estado: number(data.get("EstadoMarcacion")).unwrap_or(-1),
            leidos: number(data.get("Leidos")),
            cargados: number(data.get("Cargados")),
            mensaje: data
                .get("Mensaje")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

#[async_trait]
impl ChannelAdapter for ProexsiService {
    async fn send(&self, punch: &PunchRecord) -> ChannelOutcome {
        let envelope = self.build_envelope(punch);

        let resp = match self
            .http_client
            .post(&self.config.url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", SOAP_ACTION)
            .body(envelope)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                log::error!("(proexsi) Timeout en marcación de {}", punch.emp_code);
                return ChannelOutcome::failed("Se excedió el tiempo máximo de espera en Proexsi");
            }
            Err(e) => {
                log::error!("(proexsi) Error de conexión: {}", e);
                return ChannelOutcome::failed("Error de conexión con Proexsi");
            }
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                return ChannelOutcome::failed("Se excedió el tiempo máximo de espera en Proexsi")
            }
            Err(e) => return ChannelOutcome::failed(format!("Respuesta inválida de Proexsi: {}", e)),
        };

        if !status.is_success() {
            log::error!("(proexsi) Error {}: {}", status, body);
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body
            };
            return ChannelOutcome::failed(message);
        }

        let result = self.parse_response(&body).unwrap_or_else(|| {
            log::warn!("(proexsi) No se encontró CargaMarcacionResult en la respuesta");
            ProexsiResult {
                estado: -1,
                leidos: None,
                cargados: None,
                mensaje: None,
            }
        });

        let data = json!({
            "estadoMarcacion": result.estado,
            "leidos": result.leidos,
            "cargados": result.cargados,
            "mensaje": result.mensaje,
        });

        if result.is_loaded() {
            ChannelOutcome::ok_with(data)
        } else {
            let message = result.failure_message();
            log::error!("(proexsi) Error en Proexsi - {}", message);
            ChannelOutcome::failed(message).with_data(data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::date_format::parse_punch_time;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: String) -> ProexsiConfig {
        ProexsiConfig {
            url,
            user_code: "USR".into(),
            password: "p&ss".into(),
            timeout: Duration::from_secs(5),
        }
    }

    fn punch(terminal_sn: &str, alias: Option<&str>, state: &str) -> PunchRecord {
        PunchRecord {
            event_id: 8,
            emp_code: "12345678".into(),
            first_name: None,
            last_name: None,
            email: None,
            punch_time: parse_punch_time("2025-10-02 17:45:00").unwrap(),
            punch_state: state.into(),
            terminal_sn: terminal_sn.into(),
            terminal_alias: alias.map(str::to_string),
            area_alias: None,
        }
    }

    fn soap_response(json: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><CargaMarcacionResponse xmlns="http://tempuri.org/"><CargaMarcacionResult>{}</CargaMarcacionResult></CargaMarcacionResponse></soap:Body></soap:Envelope>"#,
            json
        )
    }

    #[test]
    fn test_clock_code() {
        assert_eq!(clock_code(&punch("App", None, "0")), "999");
        assert_eq!(clock_code(&punch("CJDE1", Some("15"), "0")), "15");
        assert_eq!(clock_code(&punch("CJDE1", None, "0")), "000");
    }

    #[test]
    fn test_marcacion_line() {
        assert_eq!(
            format_marcacion(&punch("CJDE1", Some("15"), "1")),
            "15\t12345678\t02-10-2025\t17:45\tC/Out"
        );
        assert_eq!(
            format_marcacion(&punch("App", None, "0")),
            "999\t12345678\t02-10-2025\t17:45\tC/In"
        );
    }

    #[test]
    fn test_envelope_escapes_credentials() {
        let service = ProexsiService::new(config("http://localhost/ws".into())).unwrap();
        let xml = service.build_envelope(&punch("App", None, "0"));
        assert!(xml.contains("<Password>p&amp;ss</Password>"));
        assert!(xml.contains("<Periodo>202510</Periodo>"));
        assert!(xml.contains("<CodigoUsuario>USR</CodigoUsuario>"));
    }

    #[test]
    fn test_parse_response_variants() {
        let service = ProexsiService::new(config("http://localhost/ws".into())).unwrap();

        let ok = service
            .parse_response(&soap_response(
                r#"{"EstadoMarcacion":"1","Leidos":1,"Cargados":1,"Mensaje":"OK"}"#,
            ))
            .unwrap();
        assert!(ok.is_loaded());
        assert_eq!(ok.cargados, Some(1));

        let escaped = service
            .parse_response(&soap_response(
                "{&quot;EstadoMarcacion&quot;:0,&quot;Mensaje&quot;:&quot;Funcionario no existe&quot;}",
            ))
            .unwrap();
        assert!(!escaped.is_loaded());
        assert_eq!(escaped.failure_message(), "Funcionario no existe");

        let no_message = service
            .parse_response(&soap_response(r#"{"EstadoMarcacion":2}"#))
            .unwrap();
        assert_eq!(no_message.failure_message(), "Estado: 2, Mensaje: null");

        assert!(service.parse_response("<html>error</html>").is_none());
    }

    #[tokio::test]
    async fn test_loaded_punch_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("SOAPAction", SOAP_ACTION))
            .and(body_string_contains("15\t12345678\t02-10-2025\t17:45\tC/In"))
            .respond_with(ResponseTemplate::new(200).set_body_string(soap_response(
                r#"{"EstadoMarcacion":1,"Leidos":1,"Cargados":1,"Mensaje":"Carga exitosa"}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let service = ProexsiService::new(config(format!("{}/ws.asmx", server.uri()))).unwrap();
        let outcome = service.send(&punch("CJDE1", Some("15"), "0")).await;
        assert!(outcome.success, "{:?}", outcome.error);
    }

    #[tokio::test]
    async fn test_rejected_punch_is_failure_with_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(soap_response(
                r#"{"EstadoMarcacion":0,"Leidos":1,"Cargados":0,"Mensaje":"Periodo cerrado"}"#,
            )))
            .mount(&server)
            .await;

        let service = ProexsiService::new(config(format!("{}/ws.asmx", server.uri()))).unwrap();
        let outcome = service.send(&punch("App", None, "1")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Periodo cerrado"));
    }

    #[tokio::test]
    async fn test_server_error_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("soap:Server fault"))
            .mount(&server)
            .await;

        let service = ProexsiService::new(config(format!("{}/ws.asmx", server.uri()))).unwrap();
        let outcome = service.send(&punch("App", None, "1")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("soap:Server fault"));
    }
}
