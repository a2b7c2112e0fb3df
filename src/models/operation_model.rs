use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

/// Prefijo con que se marca el mensaje de una operación bloqueada.
pub const BLOCKED_MARKER: &str = "BLOCKED";
/// Prefijo que dejaban las versiones anteriores del despachador.
pub const LEGACY_BLOCKED_MARKER: &str = "BLOQUEADO";

/// Canal de notificación de una marcación, tal como se guarda en
/// `notificacion_operaciones.operacion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationName {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "api_saturno")]
    ApiSaturno,
    #[serde(rename = "api_proexsi")]
    ApiProexsi,
}

impl OperationName {
    /// Orden en que se intentan los canales de un evento.
    pub const ALL: [OperationName; 3] = [
        OperationName::Email,
        OperationName::ApiSaturno,
        OperationName::ApiProexsi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationName::Email => "email",
            OperationName::ApiSaturno => "api_saturno",
            OperationName::ApiProexsi => "api_proexsi",
        }
    }

    /// Solo Proexsi lleva contador de fallos y corta el circuito;
    /// email y Saturno se reintentan en cada ciclo sin límite.
    pub fn has_circuit_breaker(&self) -> bool {
        matches!(self, OperationName::ApiProexsi)
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(OperationName::Email),
            "api_saturno" => Ok(OperationName::ApiSaturno),
            "api_proexsi" => Ok(OperationName::ApiProexsi),
            other => Err(anyhow!("Operación desconocida: {}", other)),
        }
    }
}

/// Fila de `notificacion_operaciones`: una por (evento, operación).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    pub event_id: i64,
    pub operation: OperationName,
    pub completed: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl OperationRecord {
    pub fn has_blocked_marker(&self) -> bool {
        self.last_error
            .as_deref()
            .map(is_blocked_message)
            .unwrap_or(false)
    }

    /// Bloqueada = no completada y (intentos >= umbral o mensaje marcado).
    pub fn is_blocked(&self, threshold: u32) -> bool {
        !self.completed && (self.attempts >= threshold || self.has_blocked_marker())
    }
}

/// Entrada del historial append-only `notificacion_errores`.
#[derive(Debug, Clone, Serialize)]
pub struct FailureHistoryEntry {
    pub event_id: i64,
    pub operation: OperationName,
    pub message: String,
    pub created_at: String,
}

pub fn is_blocked_message(message: &str) -> bool {
    message.starts_with(BLOCKED_MARKER) || message.starts_with(LEGACY_BLOCKED_MARKER)
}

/// Mensaje que se persiste al bloquear la operación.
pub fn blocked_message(threshold: u32, last_error: &str) -> String {
    format!(
        "{}: {} fallos consecutivos. Último error: {}",
        BLOCKED_MARKER, threshold, last_error
    )
}

/// Estado de despacho de un par (evento, operación).
///
/// ```text
/// Pending --fallo--> Failed(1) --fallo--> ... --fallo--> Blocked
///    |                  |                                   |
///    +------éxito-------+---------> Completed         (desbloqueo manual)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationState {
    Pending,
    Failed(u32),
    Blocked,
    Completed,
}

impl OperationState {
    pub fn from_record(record: Option<&OperationRecord>, threshold: u32) -> Self {
        match record {
            None => OperationState::Pending,
            Some(r) if r.completed => OperationState::Completed,
            Some(r) if r.is_blocked(threshold) => OperationState::Blocked,
            Some(r) if r.attempts == 0 => OperationState::Pending,
            Some(r) => OperationState::Failed(r.attempts),
        }
    }

    pub fn on_failure(self, threshold: u32) -> Self {
        let failures = match self {
            OperationState::Completed => return OperationState::Completed,
            OperationState::Blocked => return OperationState::Blocked,
            OperationState::Pending => 1,
            OperationState::Failed(n) => n + 1,
        };
        if failures >= threshold {
            OperationState::Blocked
        } else {
            OperationState::Failed(failures)
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, OperationState::Blocked)
    }
}

/// Resultado de registrar un fallo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureTransition {
    pub attempts: u32,
    pub state: OperationState,
    /// Verdadero solo en el fallo que provoca el paso a `Blocked`.
    pub newly_blocked: bool,
}

impl FailureTransition {
    pub fn compute(previous: Option<&OperationRecord>, threshold: u32) -> Self {
        let before = OperationState::from_record(previous, threshold);
        let after = before.on_failure(threshold);
        let attempts = previous.map(|r| r.attempts).unwrap_or(0) + 1;
        FailureTransition {
            attempts,
            state: after,
            newly_blocked: !before.is_blocked() && after.is_blocked(),
        }
    }
}
