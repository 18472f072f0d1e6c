//! r2r-http: REST facade for R2R.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use r2r_mcp::{Config, Gateway};

/// R2R REST facade.
#[derive(Parser)]
#[command(name = "r2r-http")]
#[command(version = r2r_mcp::PKG_VERSION)]
#[command(about = "HTTP API over the R2R tool catalogue")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "R2R_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind, overriding the configuration.
    #[arg(short, long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(address) = args.address {
        config.http.address = address;
    }
    let address = config.http.address.clone();
    info!(version = %r2r_mcp::version_string(), upstream = ?config.upstream, %address, "r2r-http starting");

    let gateway = Arc::new(Gateway::new(config)?);
    let _ = gateway.check_health().await;

    r2r_mcp::http::serve(gateway, &address, shutdown_signal()).await?;
    info!("r2r-http stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
