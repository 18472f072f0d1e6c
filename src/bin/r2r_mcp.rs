//! r2r-mcp: MCP server for R2R over stdio.
//!
//! Reads newline-delimited JSON-RPC from stdin and writes responses to
//! stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use r2r_mcp::mcp::{McpHandler, serve_stdio};
use r2r_mcp::{Config, Gateway};

/// R2R MCP server.
#[derive(Parser)]
#[command(name = "r2r-mcp")]
#[command(version = r2r_mcp::PKG_VERSION)]
#[command(about = "MCP server exposing an R2R deployment")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "R2R_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Skip the startup health check.
    #[arg(long)]
    skip_health_check: bool,
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
    let config = Config::load(args.config.as_deref())?;
    info!(version = %r2r_mcp::version_string(), upstream = ?config.upstream, "r2r-mcp starting");

    let gateway = Arc::new(Gateway::new(config)?);
    if !args.skip_health_check {
        // Failure is logged by check_health; the server starts regardless.
        let _ = gateway.check_health().await;
    }

    let handler = McpHandler::new(gateway);
    serve_stdio(&handler).await?;
    Ok(())
}
