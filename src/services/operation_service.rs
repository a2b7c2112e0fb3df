use std::collections::BTreeSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite, SqliteConnection};

use crate::models::operation_model::{
    blocked_message, FailureHistoryEntry, FailureTransition, OperationName, OperationRecord,
    OperationState, BLOCKED_MARKER, LEGACY_BLOCKED_MARKER,
};

/// Estado de despacho por (evento, operación).
///
/// Cada evento solo toca filas de su propio `event_id`; el upsert es
/// seguro ante escrituras concurrentes (gana la última).
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Operaciones ya completadas para el evento.
    async fn completed_operations(&self, event_id: i64) -> Result<BTreeSet<OperationName>>;

    /// Upsert idempotente: completada = true, intentos + 1.
    async fn mark_completed(&self, event_id: i64, operation: OperationName) -> Result<()>;

    async fn is_blocked(
        &self,
        event_id: i64,
        operation: OperationName,
        threshold: u32,
    ) -> Result<bool>;

    /// Guarda el fallo en el historial y suma un intento. Al alcanzar el
    /// umbral el mensaje queda marcado como bloqueado.
    async fn record_failure(
        &self,
        event_id: i64,
        operation: OperationName,
        message: &str,
        threshold: u32,
    ) -> Result<FailureTransition>;

    async fn count_blocked(&self, operation: OperationName, threshold: u32) -> Result<u64>;
}

const SELECT_RECORD: &str = r#"
    SELECT iclock_transaction_id, operacion, completada, intentos, error_mensaje
    FROM notificacion_operaciones
    WHERE iclock_transaction_id = ?1 AND operacion = ?2
"#;

/// Condición SQL de "bloqueada"; `?` del umbral se enlaza aparte.
fn blocked_condition(threshold_param: &str) -> String {
    format!(
        "completada = 0 AND (intentos >= {} OR error_mensaje LIKE '{}%' OR error_mensaje LIKE '{}%')",
        threshold_param, BLOCKED_MARKER, LEGACY_BLOCKED_MARKER
    )
}

#[derive(Clone, Debug)]
pub struct OperationService {
    db_pool: Pool<Sqlite>,
}

impl OperationService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        OperationService { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo en migraciones de notificaciones")?;
        Ok(())
    }

    pub async fn get_record(
        &self,
        event_id: i64,
        operation: OperationName,
    ) -> Result<Option<OperationRecord>> {
        let row = sqlx::query(SELECT_RECORD)
            .bind(event_id)
            .bind(operation.as_str())
            .fetch_optional(&self.db_pool)
            .await
            .context("Error leyendo notificacion_operaciones")?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Todas las operaciones registradas de un evento.
    pub async fn list_for_event(&self, event_id: i64) -> Result<Vec<OperationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT iclock_transaction_id, operacion, completada, intentos, error_mensaje
            FROM notificacion_operaciones
            WHERE iclock_transaction_id = ?1
            ORDER BY operacion
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Error listando operaciones del evento")?;

        rows.iter().map(record_from_row).collect()
    }

    /// Operaciones Proexsi bloqueadas, esperando desbloqueo manual.
    pub async fn list_blocked(&self, threshold: u32) -> Result<Vec<OperationRecord>> {
        let sql = format!(
            r#"
            SELECT iclock_transaction_id, operacion, completada, intentos, error_mensaje
            FROM notificacion_operaciones
            WHERE operacion = ?1 AND {}
            ORDER BY iclock_transaction_id
            "#,
            blocked_condition("?2")
        );

        let rows = sqlx::query(&sql)
            .bind(OperationName::ApiProexsi.as_str())
            .bind(i64::from(threshold))
            .fetch_all(&self.db_pool)
            .await
            .context("Error listando operaciones bloqueadas")?;

        rows.iter().map(record_from_row).collect()
    }

    /// Historial de fallos (más antiguo primero).
    pub async fn failure_history(
        &self,
        event_id: i64,
        operation: OperationName,
    ) -> Result<Vec<FailureHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT iclock_transaction_id, operacion, error_mensaje, created_at
            FROM notificacion_errores
            WHERE iclock_transaction_id = ?1 AND operacion = ?2
            ORDER BY id
            "#,
        )
        .bind(event_id)
        .bind(operation.as_str())
        .fetch_all(&self.db_pool)
        .await
        .context("Error leyendo notificacion_errores")?;

        rows.iter()
            .map(|row| -> Result<FailureHistoryEntry> {
                Ok(FailureHistoryEntry {
                    event_id: row.try_get("iclock_transaction_id")?,
                    operation: row.try_get::<String, _>("operacion")?.parse()?,
                    message: row.try_get("error_mensaje")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    /// Desbloquea la operación Proexsi de un evento (intentos = 0, sin
    /// mensaje). Devuelve `true` si había algo bloqueado.
    pub async fn unlock(&self, event_id: i64, threshold: u32) -> Result<bool> {
        let sql = format!(
            r#"
            UPDATE notificacion_operaciones
            SET error_mensaje = NULL, intentos = 0
            WHERE iclock_transaction_id = ?1 AND operacion = ?2 AND {}
            "#,
            blocked_condition("?3")
        );

        let result = sqlx::query(&sql)
            .bind(event_id)
            .bind(OperationName::ApiProexsi.as_str())
            .bind(i64::from(threshold))
            .execute(&self.db_pool)
            .await
            .with_context(|| format!("Error desbloqueando transacción {}", event_id))?;

        Ok(result.rows_affected() > 0)
    }

    /// Desbloquea todas las operaciones Proexsi bloqueadas.
    pub async fn unlock_all(&self, threshold: u32) -> Result<u64> {
        let sql = format!(
            r#"
            UPDATE notificacion_operaciones
            SET error_mensaje = NULL, intentos = 0
            WHERE operacion = ?1 AND {}
            "#,
            blocked_condition("?2")
        );

        let result = sqlx::query(&sql)
            .bind(OperationName::ApiProexsi.as_str())
            .bind(i64::from(threshold))
            .execute(&self.db_pool)
            .await
            .context("Error desbloqueando operaciones")?;

        Ok(result.rows_affected())
    }

    async fn append_history(
        &self,
        event_id: i64,
        operation: OperationName,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notificacion_errores (iclock_transaction_id, operacion, error_mensaje)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(event_id)
        .bind(operation.as_str())
        .bind(message)
        .execute(&self.db_pool)
        .await
        .context("Error guardando historial de errores")?;
        Ok(())
    }
}

#[async_trait]
impl OperationStore for OperationService {
    async fn completed_operations(&self, event_id: i64) -> Result<BTreeSet<OperationName>> {
        let rows = sqlx::query(
            r#"
            SELECT operacion
            FROM notificacion_operaciones
            WHERE iclock_transaction_id = ?1 AND completada = 1
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Error consultando operaciones completadas")?;

        let mut completed = BTreeSet::new();
        for row in rows {
            let name: String = row.try_get("operacion")?;
            match name.parse::<OperationName>() {
                Ok(op) => {
                    completed.insert(op);
                }
                Err(e) => log::warn!("(completed_operations) evento={}: {}", event_id, e),
            }
        }
        Ok(completed)
    }

    async fn mark_completed(&self, event_id: i64, operation: OperationName) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notificacion_operaciones (iclock_transaction_id, operacion, completada, intentos)
            VALUES (?1, ?2, 1, 1)
            ON CONFLICT (iclock_transaction_id, operacion)
            DO UPDATE SET completada = 1, intentos = notificacion_operaciones.intentos + 1
            "#,
        )
        .bind(event_id)
        .bind(operation.as_str())
        .execute(&self.db_pool)
        .await
        .with_context(|| format!("Error marcando {} completada (evento={})", operation, event_id))?;

        Ok(())
    }

    async fn is_blocked(
        &self,
        event_id: i64,
        operation: OperationName,
        threshold: u32,
    ) -> Result<bool> {
        Ok(self
            .get_record(event_id, operation)
            .await?
            .map(|record| record.is_blocked(threshold))
            .unwrap_or(false))
    }

    async fn record_failure(
        &self,
        event_id: i64,
        operation: OperationName,
        message: &str,
        threshold: u32,
    ) -> Result<FailureTransition> {
        // El historial se intenta siempre, aunque falle el upsert.
        if let Err(e) = self.append_history(event_id, operation, message).await {
            log::error!("(record_failure) evento={} op={}: {:?}", event_id, operation, e);
        }

        // BEGIN IMMEDIATE toma el lock de escritura antes del SELECT; con un
        // BEGIN diferido, dos escritores en WAL fallan al subir el lock.
        let mut conn = self
            .db_pool
            .acquire()
            .await
            .context("No se pudo obtener conexión")?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .context("No se pudo abrir transacción")?;

        let result = apply_failure(&mut conn, event_id, operation, message, threshold).await;
        let finish = if result.is_ok() { "COMMIT" } else { "ROLLBACK" };
        if let Err(e) = sqlx::query(finish).execute(&mut *conn).await {
            // Estado de la conexión incierto: se cierra en vez de volver al pool.
            drop(conn.detach());
            return Err(e).context("Error cerrando transacción de fallo");
        }
        result
    }

    async fn count_blocked(&self, operation: OperationName, threshold: u32) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) AS total FROM notificacion_operaciones WHERE operacion = ?1 AND {}",
            blocked_condition("?2")
        );

        let total: i64 = sqlx::query(&sql)
            .bind(operation.as_str())
            .bind(i64::from(threshold))
            .fetch_one(&self.db_pool)
            .await
            .context("Error contando operaciones bloqueadas")?
            .try_get("total")?;

        Ok(total.max(0) as u64)
    }
}

/// Lectura y upsert de un fallo, dentro de una transacción ya abierta.
async fn apply_failure(
    conn: &mut SqliteConnection,
    event_id: i64,
    operation: OperationName,
    message: &str,
    threshold: u32,
) -> Result<FailureTransition> {
    let previous = sqlx::query(SELECT_RECORD)
        .bind(event_id)
        .bind(operation.as_str())
        .fetch_optional(&mut *conn)
        .await
        .context("Error leyendo intentos actuales")?
        .as_ref()
        .map(record_from_row)
        .transpose()?;

    let transition = FailureTransition::compute(previous.as_ref(), threshold);
    if transition.state == OperationState::Completed {
        return Ok(transition);
    }

    let stored_message = if transition.state.is_blocked() {
        blocked_message(threshold, message)
    } else {
        message.to_string()
    };

    sqlx::query(
        r#"
        INSERT INTO notificacion_operaciones (iclock_transaction_id, operacion, completada, intentos, error_mensaje)
        VALUES (?1, ?2, 0, ?3, ?4)
        ON CONFLICT (iclock_transaction_id, operacion)
        DO UPDATE SET intentos = excluded.intentos, error_mensaje = excluded.error_mensaje
        "#,
    )
    .bind(event_id)
    .bind(operation.as_str())
    .bind(i64::from(transition.attempts))
    .bind(&stored_message)
    .execute(&mut *conn)
    .await
    .context("Error registrando fallo de operación")?;

    Ok(transition)
}

fn record_from_row(row: &SqliteRow) -> Result<OperationRecord> {
    let completed: i64 = row.try_get("completada")?;
    let attempts: i64 = row.try_get("intentos")?;
    Ok(OperationRecord {
        event_id: row.try_get("iclock_transaction_id")?,
        operation: row.try_get::<String, _>("operacion")?.parse()?,
        completed: completed != 0,
        attempts: attempts.max(0) as u32,
        last_error: row.try_get("error_mensaje")?,
    })
}
