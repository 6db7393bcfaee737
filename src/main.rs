use afkeeper::cli::{Cli, check_summary};
use afkeeper::config::Config;
use afkeeper::liveness::{LivenessServer, PORT_ENV};
use afkeeper::session::{LoopbackConnector, SessionController};
use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    if cli.check {
        print!("{}", check_summary(&config));
        return Ok(());
    }

    let port_env = std::env::var(PORT_ENV).ok();
    let liveness = LivenessServer::start(cli.liveness_port(port_env.as_deref(), &config))?;

    warn!("No network client is configured; sessions run against the loopback connector");
    let controller = SessionController::from_config(&config, Arc::new(LoopbackConnector::new()))?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                shutdown.cancel();
            }
        });
    }

    controller.run(shutdown).await;
    liveness.shutdown();
    Ok(())
}

/// Log to stderr filtered by `RUST_LOG` (default `afkeeper=info`), or to the
/// file named by `AFKEEPER_LOG`.
fn init_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("afkeeper=info"));

    if let Ok(path) = std::env::var("AFKEEPER_LOG") {
        match std::fs::File::create(&path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false);
                let _ = tracing_subscriber::registry()
                    .with(file_layer.with_filter(filter()))
                    .try_init();
                return;
            }
            Err(err) => {
                eprintln!("Failed to create log file {path}: {err}");
            }
        }
    }

    let _ = tracing_subscriber::fmt().with_env_filter(filter()).try_init();
}
