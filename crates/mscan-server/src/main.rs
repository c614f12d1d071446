use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mscan_infrastructure::ConfigService;
use mscan_server::{AppBootstrap, logging, routes};

#[derive(Parser)]
#[command(name = "mscan-server")]
#[command(about = "mscan - market scan analysis server", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/mscan/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides server.host
    #[arg(long)]
    host: Option<String>,

    /// Overrides server.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigService::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let paths = ConfigService::paths(&config)?;
    let _log_guard = logging::init(&config.log_level, &paths.logs_dir())?;

    let bootstrap = AppBootstrap::initialize(config).await?;
    let host = bootstrap.config.server.host.clone();
    let port = bootstrap.config.server.port;
    let addr = tokio::net::lookup_host((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to resolve {host}:{port}"))?
        .next()
        .with_context(|| format!("No address found for {host}:{port}"))?;

    let state = bootstrap.app_state.clone();
    let (bound, server) = warp::serve(routes::api(state.clone()))
        .try_bind_with_graceful_shutdown(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(address = %bound, "mscan server listening");
    server.await;

    let cancelled = state.analysis.shutdown().await;
    tracing::info!(cancelled, "mscan server stopped");
    Ok(())
}
