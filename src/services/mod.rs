//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod alert_service;
pub mod dispatch_service;
pub mod email_service;
pub mod event_service;
pub mod message_builder;
pub mod metrics_service;
pub mod notification_channel_service;
pub mod operation_service;
pub mod poller_service;
pub mod proexsi_service;
pub mod required_operations;
pub mod saturno_service;
pub mod unlock_service;
