//! MCP stdio transport layer
//!
//! Newline-delimited JSON: one request per input line, one response per
//! output line. Requests are handled in arrival order.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;

use super::handler::McpHandler;
use super::protocol::JsonRpcResponse;
use crate::Result;

/// Write a JSON-RPC response followed by a newline, then flush.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<()> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Serve requests from `reader` until EOF.
pub async fn serve<R, W>(handler: &McpHandler, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(response) = handler.handle_line(line).await {
            write_message(&mut writer, &response).await?;
        }
    }
    info!("input closed, shutting down");
    Ok(())
}

/// Serve over the process's stdin/stdout.
pub async fn serve_stdio(handler: &McpHandler) -> Result<()> {
    serve(
        handler,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}
