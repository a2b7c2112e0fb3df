//! config/mod.rs
//! Configuración global del despachador.

pub mod dispatcher_config;
