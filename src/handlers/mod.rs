//! handlers/mod.rs
pub mod status_handler;
