//! Desbloquea operaciones Proexsi detenidas por el corte de circuito.
//!
//! ```text
//! unlock_proexsi --transaccion 12345
//! unlock_proexsi --todas
//! ```

use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use dotenv::dotenv;

use punch_dispatcher::config::dispatcher_config::{
    block_threshold_from_env, database_url_from_env,
};
use punch_dispatcher::database::setup_database;
use punch_dispatcher::logger::init_logger;
use punch_dispatcher::services::event_service::EventService;
use punch_dispatcher::services::operation_service::OperationService;
use punch_dispatcher::services::unlock_service::{unlock_proexsi, UnlockOutcome, UnlockTarget};

#[derive(Parser, Debug)]
#[command(
    name = "unlock_proexsi",
    about = "Desbloquea operaciones api_proexsi para que vuelvan a intentarse"
)]
#[command(group(ArgGroup::new("objetivo").required(true).args(["transaccion", "todas"])))]
struct Cli {
    /// ID de la transacción (iclock_transaction) a desbloquear
    #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
    transaccion: Option<i64>,

    /// Desbloquear todas las operaciones api_proexsi bloqueadas
    #[arg(long)]
    todas: bool,
}

impl Cli {
    fn target(&self) -> UnlockTarget {
        match self.transaccion {
            Some(event_id) => UnlockTarget::Event(event_id),
            None => UnlockTarget::All,
        }
    }
}

async fn run(cli: Cli) -> Result<UnlockOutcome> {
    let threshold = block_threshold_from_env()?;
    let db_pool = setup_database(&database_url_from_env()).await?;
    let operations = OperationService::new(db_pool.clone());
    operations.run_migrations().await?;
    let events = EventService::new(db_pool.clone());

    let outcome = unlock_proexsi(&operations, &events, cli.target(), threshold).await;
    db_pool.close().await;
    outcome
}

/// 0 si terminó (aunque la transacción no exista), 1 ante error del store.
fn exit_status(result: &Result<UnlockOutcome>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    init_logger();

    // clap imprime el uso y sale con código != 0 ante argumentos inválidos
    let cli = Cli::parse();

    let result = run(cli).await;
    match &result {
        Ok(outcome) => println!("{}", outcome),
        Err(e) => {
            log::error!("Error al desbloquear: {:?}", e);
            eprintln!("Error: {:#}", e);
        }
    }
    ExitCode::from(exit_status(&result))
}
