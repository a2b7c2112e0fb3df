use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::sync::{watch, Semaphore};

use punch_dispatcher::app;
use punch_dispatcher::config::dispatcher_config::DispatcherConfig;
use punch_dispatcher::database::setup_database;
use punch_dispatcher::handlers::status_handler::BlockThreshold;
use punch_dispatcher::logger::init_logger;
use punch_dispatcher::services::alert_service::EmailAlertNotifier;
use punch_dispatcher::services::dispatch_service::DispatchService;
use punch_dispatcher::services::email_service::EmailService;
use punch_dispatcher::services::event_service::EventService;
use punch_dispatcher::services::metrics_service::DispatchMetrics;
use punch_dispatcher::services::notification_channel_service::{ChannelSet, EmailChannel};
use punch_dispatcher::services::operation_service::OperationService;
use punch_dispatcher::services::poller_service::PollerService;
use punch_dispatcher::services::proexsi_service::ProexsiService;
use punch_dispatcher::services::saturno_service::SaturnoService;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = DispatcherConfig::from_env().context("Configuración inválida")?;

    // Conectarnos a la DB y migrar
    let db_pool = setup_database(&config.database_url).await?;
    let operation_service = OperationService::new(db_pool.clone());
    operation_service.run_migrations().await?;
    let event_service = EventService::new(db_pool.clone());

    // Canales
    let mailer = Arc::new(EmailService::new(&config.smtp)?);
    let channels = ChannelSet {
        email: Arc::new(EmailChannel::new(mailer.clone())),
        saturno: Arc::new(SaturnoService::new(config.saturno.clone())?),
        proexsi: Arc::new(ProexsiService::new(config.proexsi.clone())?),
    };
    let alerts = Arc::new(EmailAlertNotifier::new(mailer, config.alert_email.clone()));
    if config.alert_email.is_none() {
        log::warn!("EMAIL_ALERTA no configurado: los bloqueos no se avisarán por correo");
    }

    let metrics = Arc::new(DispatchMetrics::new());
    let operations = Arc::new(operation_service.clone());
    let events = Arc::new(event_service);

    let dispatcher = DispatchService::new(
        operations.clone(),
        events.clone(),
        channels,
        alerts,
        metrics.clone(),
        Arc::new(Semaphore::new(config.max_in_flight_calls)),
        config.block_threshold,
    );
    let poller = PollerService::new(
        events,
        operations,
        dispatcher,
        metrics.clone(),
        config.batch_size,
        config.poll_interval,
        config.block_threshold,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_handle = tokio::spawn(async move { poller.run(shutdown_rx).await });

    // Levantar servidor de estado
    log::info!(
        "Levantando servidor en {}:{}",
        config.http_host,
        config.http_port
    );
    let threshold = BlockThreshold(config.block_threshold);
    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(metrics.clone()))
            .app_data(web::Data::new(operation_service.clone()))
            .app_data(web::Data::new(threshold))
            .configure(app::init_app)
    })
    .workers(1)
    .bind((config.http_host.as_str(), config.http_port))
    .with_context(|| format!("No se pudo abrir {}:{}", config.http_host, config.http_port))?
    .run()
    .await;

    // El servidor terminó (SIGINT/SIGTERM): detener el poller tras su lote actual
    log::info!("Deteniendo poller...");
    shutdown_tx.send(true).ok();
    if let Err(e) = poller_handle.await {
        log::error!("El poller terminó con error: {:?}", e);
    }

    db_pool.close().await;
    log::info!("Despachador detenido");

    server_result.context("Error en servidor HTTP")
}
