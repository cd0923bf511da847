//! athena-relay - run SQL on an Athena-style engine and print typed results.

mod cli;

use athena_relay::config::RelayConfig;
use athena_relay::error::{RelayError, Result};
use athena_relay::logging::init_stderr_logging;
use athena_relay::QueryRelay;
use cli::Cli;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    init_stderr_logging();

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = RelayConfig::load_from_file(&config_path)?;
    config.apply_env_defaults();
    cli.apply_to(&mut config);

    let engine = Arc::new(config.engine_client()?);
    let store = Arc::new(config.store_client()?);
    let relay = QueryRelay::new(engine, store, config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let input = cli.to_input();
    let envelope = if cli.all_pages {
        relay.collect_all_pages(input, &cancel).await?
    } else {
        relay.query_with_cancel(input, &cancel).await?
    };

    let json = serde_json::to_string_pretty(&envelope)
        .map_err(|e| RelayError::Execution(format!("Failed to serialize result: {e}")))?;
    println!("{json}");
    Ok(())
}
