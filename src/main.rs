use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tcp_forwarder::{ForwardingService, load_config};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tcp-forwarder")]
#[command(about = "Transparent TCP port forwarder with CIDR-based source filtering")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', default_value = "config.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args.config)?;
    info!(
        config_file = %args.config.display(),
        source = %config.source,
        destination = %config.destination,
        dial_timeout_seconds = config.dial_timeout_seconds,
        admission_range = %config.admission_range,
        "Configuration loaded"
    );

    let service = ForwardingService::new(config).context("Invalid admission range")?;
    let listener = service
        .bind()
        .await
        .context("Failed to start forwarder")?;

    service
        .serve_with_shutdown(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
