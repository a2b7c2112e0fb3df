//! services/message_builder.rs
//! Textos de los correos: comprobante de marcación y alerta de bloqueo.

use chrono::NaiveDateTime;

use crate::models::email_model::EmailContent;
use crate::models::event_model::PunchRecord;
use crate::models::operation_model::OperationName;
use crate::utils::{date_format, markup::escape, rut::full_rut};

pub const PUNCH_RECEIPT_SUBJECT: &str = "Registro de Marcacion";

fn area_name(area_alias: Option<&str>) -> &str {
    match area_alias {
        Some(alias) if !alias.trim().is_empty() => alias,
        _ => "App movil",
    }
}

/// Comprobante de marcación que recibe el funcionario.
pub fn punch_receipt(punch: &PunchRecord) -> EmailContent {
    let name = punch.full_name();
    let rut = full_rut(&punch.emp_code);
    let date = date_format::date_dd_mm_yyyy(&punch.punch_time);
    let time = date_format::time_hh_mm_ss(&punch.punch_time);
    let kind = punch.punch_kind();
    let area = area_name(punch.area_alias.as_deref());

    EmailContent {
        text: format!(
            "Estimado/a {name},\n\n\
             RUT: {rut}\n\n\
             Se ha registrado su marcación de asistencia:\n\
             Fecha: {date}\n\
             Hora: {time}\n\
             Tipo: {kind}\n\
             Área: {area}\n\n\
             Saludos cordiales.",
            kind = kind.label(),
        ),
        html: format!(
            r#"<div style="font-family: Arial, sans-serif;">
    <p>Estimado/a {name},</p>
    <p>RUT: {rut}</p>
    <p>Se ha registrado su marcación de asistencia:</p>
    <ul>
        <li><strong>Fecha:</strong> {date}</li>
        <li><strong>Hora:</strong> {time}</li>
        <li><strong>Tipo:</strong> {kind}</li>
        <li><strong>Establecimiento:</strong> {area}</li>
    </ul>
    <p>Saludos cordiales.</p>
</div>"#,
            name = escape(&name),
            rut = escape(&rut),
            kind = escape(kind.label()),
            area = escape(area),
        ),
    }
}

/// Datos de una operación recién bloqueada, para avisar a operaciones.
#[derive(Debug, Clone)]
pub struct BlockedAlert {
    pub event_id: i64,
    pub operation: OperationName,
    /// RUT con dígito verificador, o "N/A".
    pub rut: String,
    pub employee_name: String,
    pub punch_time: Option<NaiveDateTime>,
    pub last_error: String,
    pub threshold: u32,
}

impl BlockedAlert {
    pub fn new(
        punch: Option<&PunchRecord>,
        event_id: i64,
        operation: OperationName,
        last_error: &str,
        threshold: u32,
    ) -> Self {
        BlockedAlert {
            event_id,
            operation,
            rut: punch
                .map(|p| full_rut(&p.emp_code))
                .unwrap_or_else(|| "N/A".to_string()),
            employee_name: punch
                .map(PunchRecord::full_name)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "N/A".to_string()),
            punch_time: punch.map(|p| p.punch_time),
            last_error: last_error.to_string(),
            threshold,
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "[ALERTA] Bloqueo de operación {} - Transacción {}",
            self.operation, self.event_id
        )
    }

    pub fn content(&self) -> EmailContent {
        let when = self
            .punch_time
            .unwrap_or_else(|| chrono::Local::now().naive_local());
        let when = date_format::human(&when);
        let (id, op, rut, name, err, n) = (
            self.event_id,
            self.operation,
            &self.rut,
            &self.employee_name,
            &self.last_error,
            self.threshold,
        );

        EmailContent {
            text: format!(
                "ALERTA: Bloqueo de operación en sistema de marcaciones\n\n\
                 Se ha bloqueado la operación \"{op}\" después de {n} fallos consecutivos.\n\n\
                 Detalles:\n\
                 - ID Transacción: {id}\n\
                 - Operación: {op}\n\
                 - RUT Empleado: {rut}\n\
                 - Nombre: {name}\n\
                 - Fecha/Hora Marcación: {when}\n\
                 - Último Error: {err}\n\n\
                 La operación no se volverá a intentar automáticamente.\n\
                 Por favor, revisar la configuración y el estado del servicio."
            ),
            html: format!(
                r#"<div style="font-family: Arial, sans-serif;">
    <h2 style="color: #d32f2f;">ALERTA: Bloqueo de operación en sistema de marcaciones</h2>
    <p>Se ha bloqueado la operación <strong>"{op}"</strong> después de <strong>{n} fallos consecutivos</strong>.</p>
    <h3>Detalles del bloqueo:</h3>
    <ul>
        <li><strong>ID Transacción:</strong> {id}</li>
        <li><strong>Operación:</strong> {op}</li>
        <li><strong>RUT Empleado:</strong> {rut}</li>
        <li><strong>Nombre:</strong> {name}</li>
        <li><strong>Fecha/Hora Marcación:</strong> {when}</li>
        <li><strong>Último Error:</strong> {err}</li>
    </ul>
    <p style="color: #d32f2f; font-weight: bold;">
        La operación no se volverá a intentar automáticamente.<br>
        Por favor, revisar la configuración y el estado del servicio.
    </p>
</div>"#,
                rut = escape(rut),
                name = escape(name),
                err = escape(err),
            ),
        }
    }
}
