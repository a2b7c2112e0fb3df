//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod email_model;
pub mod event_model;
pub mod metrics_model;
pub mod operation_channel_model;
pub mod operation_model;
