//! models/event_model.rs
//! Marcaciones pendientes de notificar y el registro normalizado que
//! reciben los canales.

use chrono::NaiveDateTime;
use serde::Serialize;

/// Serial con que el reloj identifica las marcaciones hechas desde la app.
pub const MOBILE_APP_TERMINAL: &str = "App";

/// Tipo de marcación según `punch_state` del reloj.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PunchState {
    Entry,
    Exit,
    Other(String),
}

impl PunchState {
    /// "0" = entrada, "1" = salida, cualquier otro código se conserva.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "0" => PunchState::Entry,
            "1" => PunchState::Exit,
            other => PunchState::Other(other.to_string()),
        }
    }

    pub fn is_entry_or_exit(&self) -> bool {
        matches!(self, PunchState::Entry | PunchState::Exit)
    }

    /// Etiqueta para el correo al funcionario.
    pub fn label(&self) -> &str {
        match self {
            PunchState::Entry => "Entrada",
            PunchState::Exit => "Salida",
            PunchState::Other(code) => code,
        }
    }
}

/// Origen de la marcación: app móvil o reloj físico (con su serial).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TerminalSource {
    MobileApp,
    Terminal(String),
}

impl TerminalSource {
    pub fn from_serial(serial: &str) -> Self {
        if serial == MOBILE_APP_TERMINAL {
            TerminalSource::MobileApp
        } else {
            TerminalSource::Terminal(serial.to_string())
        }
    }

    pub fn is_mobile_app(&self) -> bool {
        matches!(self, TerminalSource::MobileApp)
    }
}

/// Canales habilitados para el área de la marcación.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelFlags {
    pub wants_email: bool,
    pub wants_saturno: bool,
    pub wants_proexsi: bool,
}

/// Una fila de `notificaciones_pendientes` con su configuración de canales.
#[derive(Debug, Clone, Serialize)]
pub struct PendingEvent {
    pub id: i64,
    pub flags: ChannelFlags,
    pub punch_state: PunchState,
    pub terminal_source: TerminalSource,
}

/// Marcación completa (transacción + funcionario + terminal) que se entrega
/// a los adaptadores de canal.
#[derive(Debug, Clone, Serialize)]
pub struct PunchRecord {
    pub event_id: i64,
    pub emp_code: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub punch_time: NaiveDateTime,
    /// Código crudo del reloj ("0", "1", "C/In", ...).
    pub punch_state: String,
    pub terminal_sn: String,
    pub terminal_alias: Option<String>,
    pub area_alias: Option<String>,
}

impl PunchRecord {
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    pub fn punch_kind(&self) -> PunchState {
        PunchState::from_code(&self.punch_state)
    }

    pub fn terminal_source(&self) -> TerminalSource {
        TerminalSource::from_serial(&self.terminal_sn)
    }

    /// Email del funcionario, ignorando valores vacíos.
    pub fn recipient(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}
