//! utils/date_format.rs
//! Formatos de fecha/hora que esperan los canales y los mensajes.

use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;

/// Formatos aceptados al leer `punch_time` desde la base.
const PUNCH_TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_punch_time(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    PUNCH_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| anyhow!("punch_time con formato desconocido: '{}'", raw))
}

/// `YYYY-MM-DD HH:MM:SS` (Saturno)
pub fn datetime(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `DD-MM-YYYY`
pub fn date_dd_mm_yyyy(ts: &NaiveDateTime) -> String {
    ts.format("%d-%m-%Y").to_string()
}

/// `HH:MM:SS`
pub fn time_hh_mm_ss(ts: &NaiveDateTime) -> String {
    ts.format("%H:%M:%S").to_string()
}

/// `HH:MM`
pub fn time_hh_mm(ts: &NaiveDateTime) -> String {
    ts.format("%H:%M").to_string()
}

/// Periodo `YYYYMM` (Proexsi)
pub fn period_yyyymm(ts: &NaiveDateTime) -> String {
    ts.format("%Y%m").to_string()
}

/// Fecha/hora legible para alertas: `DD/MM/YYYY, HH:MM:SS`
pub fn human(ts: &NaiveDateTime) -> String {
    ts.format("%d/%m/%Y, %H:%M:%S").to_string()
}
