//! tests/mod.rs
//! Pruebas contra SQLite en memoria con las migraciones del crate, y
//! dobles de prueba para canales y alertas.

mod operation_store_tests;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use tokio::sync::Semaphore;

use crate::models::event_model::PunchRecord;
use crate::models::operation_channel_model::ChannelOutcome;
use crate::services::alert_service::AlertNotifier;
use crate::services::dispatch_service::DispatchService;
use crate::services::event_service::EventService;
use crate::services::message_builder::BlockedAlert;
use crate::services::metrics_service::DispatchMetrics;
use crate::services::notification_channel_service::{ChannelAdapter, ChannelSet};
use crate::services::operation_service::{OperationService, OperationStore};

pub(crate) const THRESHOLD: u32 = 3;

/// Una sola conexión: cada conexión nueva a `sqlite::memory:` sería otra base.
pub(crate) async fn test_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("sqlite en memoria");
    OperationService::new(pool.clone())
        .run_migrations()
        .await
        .expect("migraciones");
    pool
}

pub(crate) async fn seed_employee(pool: &Pool<Sqlite>, emp_code: &str, email: Option<&str>) {
    sqlx::query(
        "INSERT INTO personnel_employee (emp_code, first_name, last_name, email) VALUES (?1, 'Ana', 'Soto', ?2)",
    )
    .bind(emp_code)
    .bind(email)
    .execute(pool)
    .await
    .unwrap();
}

/// Área con sus canales habilitados (email, api, api_proexsi).
pub(crate) async fn seed_area(
    pool: &Pool<Sqlite>,
    id: i64,
    name: &str,
    flags: (bool, bool, bool),
) {
    sqlx::query("INSERT INTO personnel_area (id, area_name) VALUES (?1, ?2)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO notification_settings (personnel_area_id, email, api, api_proexsi) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(id)
    .bind(flags.0)
    .bind(flags.1)
    .bind(flags.2)
    .execute(pool)
    .await
    .unwrap();
}

pub(crate) async fn seed_terminal(pool: &Pool<Sqlite>, sn: &str, alias: &str) {
    sqlx::query("INSERT INTO iclock_terminal (sn, alias) VALUES (?1, ?2)")
        .bind(sn)
        .bind(alias)
        .execute(pool)
        .await
        .unwrap();
}

/// Transacción del reloj más su fila en `notificaciones_pendientes`.
pub(crate) async fn seed_event(
    pool: &Pool<Sqlite>,
    id: i64,
    emp_code: &str,
    punch_state: &str,
    terminal_sn: &str,
    area: Option<&str>,
) {
    sqlx::query(
        r#"
        INSERT INTO iclock_transaction (id, emp_code, punch_time, punch_state, terminal_sn, area_alias)
        VALUES (?1, ?2, '2025-03-07 08:05:09', ?3, ?4, ?5)
        "#,
    )
    .bind(id)
    .bind(emp_code)
    .bind(punch_state)
    .bind(terminal_sn)
    .bind(area)
    .execute(pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO notificaciones_pendientes (iclock_transaction_id) VALUES (?1)")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}

pub(crate) async fn is_processed(pool: &Pool<Sqlite>, id: i64) -> bool {
    let procesado: i64 = sqlx::query(
        "SELECT procesado FROM notificaciones_pendientes WHERE iclock_transaction_id = ?1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .unwrap()
    .try_get("procesado")
    .unwrap();
    procesado != 0
}

/// Canal de prueba: responde según un guion y luego con `fallback`.
pub(crate) struct ScriptedChannel {
    script: Mutex<VecDeque<bool>>,
    fallback: bool,
    pub calls: Mutex<Vec<i64>>,
}

impl ScriptedChannel {
    pub fn always(success: bool) -> Arc<Self> {
        Self::scripted(&[], success)
    }

    pub fn scripted(script: &[bool], fallback: bool) -> Arc<Self> {
        Arc::new(ScriptedChannel {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelAdapter for ScriptedChannel {
    async fn send(&self, punch: &PunchRecord) -> ChannelOutcome {
        self.calls.lock().unwrap().push(punch.event_id);
        let success = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        if success {
            ChannelOutcome::ok()
        } else {
            ChannelOutcome::failed(format!("fallo simulado en {}", punch.event_id))
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingAlerts {
    pub alerts: Mutex<Vec<BlockedAlert>>,
}

#[async_trait]
impl AlertNotifier for RecordingAlerts {
    async fn notify_blocked(&self, alert: &BlockedAlert) -> Result<bool> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(true)
    }
}

pub(crate) struct Harness {
    pub pool: Pool<Sqlite>,
    pub email: Arc<ScriptedChannel>,
    pub saturno: Arc<ScriptedChannel>,
    pub proexsi: Arc<ScriptedChannel>,
    pub alerts: Arc<RecordingAlerts>,
    pub metrics: Arc<DispatchMetrics>,
}

impl Harness {
    pub fn new(
        pool: Pool<Sqlite>,
        email: Arc<ScriptedChannel>,
        saturno: Arc<ScriptedChannel>,
        proexsi: Arc<ScriptedChannel>,
    ) -> Self {
        Harness {
            pool,
            email,
            saturno,
            proexsi,
            alerts: Arc::new(RecordingAlerts::default()),
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    pub fn operations(&self) -> OperationService {
        OperationService::new(self.pool.clone())
    }

    pub fn events(&self) -> EventService {
        EventService::new(self.pool.clone())
    }

    pub fn dispatcher(&self) -> DispatchService {
        self.dispatcher_with(Arc::new(self.operations()))
    }

    pub fn dispatcher_with(&self, operations: Arc<dyn OperationStore>) -> DispatchService {
        DispatchService::new(
            operations,
            Arc::new(self.events()),
            ChannelSet {
                email: self.email.clone(),
                saturno: self.saturno.clone(),
                proexsi: self.proexsi.clone(),
            },
            self.alerts.clone(),
            self.metrics.clone(),
            Arc::new(Semaphore::new(8)),
            THRESHOLD,
        )
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.alerts.lock().unwrap().len()
    }
}
