use serde::Serialize;
use serde_json::Value;

/// Resultado de un intento de envío por un canal.
///
/// Los adaptadores nunca propagan errores: cualquier falla (timeout,
/// respuesta inválida, conexión) se traduce a `success = false` con un
/// mensaje de diagnóstico.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutcome {
    pub success: bool,
    pub error: Option<String>,
    /// Respuesta del canal, solo para diagnóstico.
    pub data: Option<Value>,
}

impl ChannelOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: None,
        }
    }

    pub fn ok_with(data: Value) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Mensaje a registrar cuando el envío falló.
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "Error desconocido".to_string())
    }
}
