//! utils/mod.rs
//! Funciones auxiliares sin estado (RUT, formatos de fecha, escape).

pub mod date_format;
pub mod markup;
pub mod rut;
