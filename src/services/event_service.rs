//! services/event_service.rs
//! Lectura de marcaciones pendientes y cierre (`procesado = true`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

use crate::models::event_model::{
    ChannelFlags, PendingEvent, PunchRecord, PunchState, TerminalSource,
};
use crate::utils::date_format::parse_punch_time;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Eventos con `procesado = false`, con sus canales habilitados.
    async fn pending_events(&self) -> Result<Vec<PendingEvent>>;

    /// Marcación normalizada para los canales. `None` si la transacción o
    /// el funcionario no existen.
    async fn punch_record(&self, event_id: i64) -> Result<Option<PunchRecord>>;

    /// Pasa el evento a procesado. Nunca vuelve a `false`.
    async fn mark_processed(&self, event_id: i64) -> Result<()>;

    async fn event_exists(&self, event_id: i64) -> Result<bool>;
}

#[derive(Clone, Debug)]
pub struct EventService {
    db_pool: Pool<Sqlite>,
}

impl EventService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        EventService { db_pool }
    }
}

#[async_trait]
impl EventStore for EventService {
    async fn pending_events(&self) -> Result<Vec<PendingEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT
                np.iclock_transaction_id AS event_id,
                COALESCE(ns.email, 0) AS wants_email,
                COALESCE(ns.api, 0) AS wants_saturno,
                COALESCE(ns.api_proexsi, 0) AS wants_proexsi,
                it.terminal_sn,
                it.punch_state
            FROM notificaciones_pendientes np
            INNER JOIN iclock_transaction it ON np.iclock_transaction_id = it.id
            LEFT JOIN personnel_area pa ON it.area_alias = pa.area_name
            LEFT JOIN notification_settings ns ON pa.id = ns.personnel_area_id
            WHERE np.procesado = 0
            ORDER BY np.iclock_transaction_id
            "#,
        )
        .fetch_all(&self.db_pool)
        .await
        .context("Error consultando notificaciones pendientes")?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let wants_email: i64 = row.try_get("wants_email")?;
            let wants_saturno: i64 = row.try_get("wants_saturno")?;
            let wants_proexsi: i64 = row.try_get("wants_proexsi")?;
            let terminal_sn: String = row.try_get("terminal_sn")?;
            let punch_state: String = row.try_get("punch_state")?;

            events.push(PendingEvent {
                id: row.try_get("event_id")?,
                flags: ChannelFlags {
                    wants_email: wants_email != 0,
                    wants_saturno: wants_saturno != 0,
                    wants_proexsi: wants_proexsi != 0,
                },
                punch_state: PunchState::from_code(&punch_state),
                terminal_source: TerminalSource::from_serial(&terminal_sn),
            });
        }
        Ok(events)
    }

    async fn punch_record(&self, event_id: i64) -> Result<Option<PunchRecord>> {
        let row = sqlx::query(
            r#"
            SELECT
                t.id, t.emp_code, t.punch_time, t.punch_state, t.terminal_sn, t.area_alias,
                pe.first_name, pe.last_name, pe.email,
                term.alias AS terminal_alias
            FROM iclock_transaction t
            INNER JOIN personnel_employee pe ON t.emp_code = pe.emp_code
            LEFT JOIN iclock_terminal term ON term.sn = t.terminal_sn
            WHERE t.id = ?1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.db_pool)
        .await
        .with_context(|| format!("Error al obtener transacción {}", event_id))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let punch_time: String = row.try_get("punch_time")?;
        Ok(Some(PunchRecord {
            event_id: row.try_get("id")?,
            emp_code: row.try_get("emp_code")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            punch_time: parse_punch_time(&punch_time)
                .with_context(|| format!("Transacción {}", event_id))?,
            punch_state: row.try_get("punch_state")?,
            terminal_sn: row.try_get("terminal_sn")?,
            terminal_alias: row.try_get("terminal_alias")?,
            area_alias: row.try_get("area_alias")?,
        }))
    }

    async fn mark_processed(&self, event_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE notificaciones_pendientes
            SET procesado = 1
            WHERE iclock_transaction_id = ?1 AND procesado = 0
            "#,
        )
        .bind(event_id)
        .execute(&self.db_pool)
        .await
        .with_context(|| format!("Error marcando evento {} como procesado", event_id))?;
        Ok(())
    }

    async fn event_exists(&self, event_id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT id FROM iclock_transaction WHERE id = ?1")
            .bind(event_id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Error verificando transacción")?;
        Ok(row.is_some())
    }
}
