//! batch-fetch server
//!
//! Serves the REST API until SIGINT/SIGTERM, then drains running jobs.

#![allow(missing_docs)]

use batch_fetch::{Config, Orchestrator, api};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "batch-fetch")]
#[command(about = "Deadline-bounded batch URL downloader with a REST API")]
#[command(version)]
struct Args {
    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long, env = "BATCH_FETCH_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind the API server to, overriding the configuration
    #[arg(short, long, env = "BATCH_FETCH_BIND")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "batch-fetch exited with an error");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> batch_fetch::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    if let Some(bind) = args.bind {
        config.server.api.bind_address = bind;
    }

    tracing::info!(
        backend = ?config.persistence.backend,
        max_concurrent_fetches = config.fetch.max_concurrent_fetches,
        "Starting batch-fetch"
    );

    let orchestrator = Arc::new(Orchestrator::from_config(config).await?);
    let config = orchestrator.get_config();

    let served = api::start_api_server_with_shutdown(
        orchestrator.clone(),
        config,
        batch_fetch::wait_for_signal(),
    )
    .await;

    // Drain running jobs even if the server failed
    let drained = orchestrator.shutdown().await;
    served?;
    drained
}
