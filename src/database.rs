//! database.rs
//! Pool SQLite compartido por el despachador y la utilidad de desbloqueo.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

pub async fn setup_database(database_url: &str) -> Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("DATABASE_URL inválida: {}", database_url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    // Crear carpeta del archivo (p. ej. "data/"); get_filename consume las opciones
    let filename: PathBuf = options.clone().get_filename().to_path_buf();
    if let Some(dir) = filename.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("No se pudo crear directorio {}", dir.display()))?;
        }
    }

    log::info!("Conectando a SQLite en {}", database_url);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("No se pudo conectar a la base de datos SQLite")?;

    Ok(db_pool)
}
