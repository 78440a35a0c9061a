pub mod accounts;
pub mod api;
pub mod cli;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod models;
pub mod patients;
pub mod pipeline;
pub mod report;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::accounts::NewOperator;
use crate::cli::{Cli, Command};
use crate::core_state::{CoreError, CoreState};

/// Entry point shared by the binary: set up logging, then dispatch the command.
pub fn run(cli: Cli) -> Result<(), CoreError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cli.settings),
        Command::CreateOperator {
            username,
            display_name,
            password,
            admin,
        } => {
            // Account management never runs inference, so the model is not loaded.
            let path = cli.settings.database_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let conn = db::open_database(&path)?;
            let new = NewOperator {
                username,
                display_name,
                password,
                is_admin: admin,
            };
            let now = chrono::Utc::now().naive_utc();
            let operator = accounts::create_operator(&conn, new, now)?;
            println!("Created operator {} ({})", operator.username, operator.id);
            Ok(())
        }
    }
}

fn serve(settings: config::Settings) -> Result<(), CoreError> {
    let bind = settings.bind;
    let core = Arc::new(CoreState::bootstrap(settings)?);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let mut server = api::start_api_server(core, bind).await?;
        tracing::info!(addr = %server.local_addr, "Listening");

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {e}");
        }
        server.shutdown();
        server.stopped().await;
        Ok::<(), CoreError>(())
    })
}

