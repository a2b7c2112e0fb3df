//! Despachador de marcaciones: correo, Saturno y Proexsi.

pub mod app;
pub mod config;
pub mod database;
pub mod handlers;
pub mod logger;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod tests;
