//! config/dispatcher_config.rs
//! Configuración del despachador, leída desde variables de entorno (.env).

use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

/// SMTP usado para el correo al funcionario y para las alertas.
#[derive(Debug, Clone, Serialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub pass: String,
    pub from: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaturnoConfig {
    /// Base de la API; el endpoint es `{base_url}marcaje`.
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    pub institution: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProexsiConfig {
    pub url: String,
    pub user_code: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatcherConfig {
    pub database_url: String,
    /// Eventos procesados en paralelo por lote.
    pub batch_size: usize,
    /// Pausa fija entre iteraciones del poller.
    pub poll_interval: Duration,
    /// Fallos consecutivos de Proexsi antes de bloquear la operación.
    pub block_threshold: u32,
    /// Tope global de llamadas a canales en vuelo.
    pub max_in_flight_calls: usize,
    pub http_host: String,
    pub http_port: u16,
    pub smtp: SmtpConfig,
    pub saturno: SaturnoConfig,
    pub proexsi: ProexsiConfig,
    /// Destinatario de las alertas de bloqueo (EMAIL_ALERTA).
    pub alert_email: Option<String>,
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/marcaciones.db";
pub const DEFAULT_BATCH_SIZE: usize = 40;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_BLOCK_THRESHOLD: u32 = 3;
pub const DEFAULT_SATURNO_INSTITUTION: &str = "MUNICIPALIDAD PUERTO MONTT";

impl DispatcherConfig {
    /// Lee la configuración del entorno del proceso.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Igual que `from_env`, pero con una función de búsqueda inyectable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let batch_size: usize = env.parsed("DISPATCH_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            bail!("DISPATCH_BATCH_SIZE debe ser mayor que 0");
        }
        let max_in_flight_calls: usize = env.parsed("DISPATCH_MAX_IN_FLIGHT", batch_size)?;
        if max_in_flight_calls == 0 {
            bail!("DISPATCH_MAX_IN_FLIGHT debe ser mayor que 0");
        }
        let block_threshold: u32 = env.parsed("DISPATCH_BLOCK_THRESHOLD", DEFAULT_BLOCK_THRESHOLD)?;
        if block_threshold == 0 {
            bail!("DISPATCH_BLOCK_THRESHOLD debe ser mayor que 0");
        }

        Ok(DispatcherConfig {
            database_url: env.or("DATABASE_URL", DEFAULT_DATABASE_URL),
            batch_size,
            poll_interval: env.secs("DISPATCH_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?,
            block_threshold,
            max_in_flight_calls,
            http_host: env.or("HTTP_HOST", "0.0.0.0"),
            http_port: env.parsed("HTTP_PORT", 5022)?,
            smtp: SmtpConfig {
                host: env.required("EMAIL_HOST")?,
                port: env.parsed("EMAIL_PORT", 587)?,
                user: env.required("EMAIL_USER")?,
                pass: env.required("EMAIL_PASS")?,
                from: env.required("EMAIL_FROM")?,
                timeout: env.secs("EMAIL_TIMEOUT_SECS", 30)?,
            },
            saturno: SaturnoConfig {
                base_url: env.required("API_URL_SATURNO")?,
                api_key: env.required("X_API_KEY")?,
                api_secret: env.required("X_API_SECRET")?,
                institution: env.or("SATURNO_INSTITUCION", DEFAULT_SATURNO_INSTITUTION),
                timeout: env.secs("SATURNO_TIMEOUT_SECS", 5)?,
            },
            proexsi: ProexsiConfig {
                url: env.required("API_URL_PROEXSI")?,
                user_code: env.required("PROEXSI_CODIGO_USUARIO")?,
                password: env.required("PROEXSI_PASSWORD")?,
                timeout: env.secs("PROEXSI_TIMEOUT_SECS", 60)?,
            },
            alert_email: env.optional("EMAIL_ALERTA"),
        })
    }
}

/// Solo la parte de base de datos, para herramientas que no envían nada
/// (utilidad de desbloqueo).
pub fn database_url_from_env() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

pub fn block_threshold_from_env() -> Result<u32> {
    EnvReader {
        lookup: |key: &str| std::env::var(key).ok(),
    }
    .parsed("DISPATCH_BLOCK_THRESHOLD", DEFAULT_BLOCK_THRESHOLD)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| anyhow!("Falta la variable de entorno {}", key))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse::<T>()
                .with_context(|| format!("Valor inválido para {}: '{}'", key, raw)),
            None => Ok(default),
        }
    }

    fn secs(&self, key: &str, default: u64) -> Result<Duration> {
        self.parsed(key, default).map(Duration::from_secs)
    }
}
