//! MCP server surface: JSON-RPC 2.0 over newline-delimited stdio.

mod handler;
pub mod protocol;
pub mod transport;

pub use handler::McpHandler;
pub use protocol::{JsonRpcRequest, JsonRpcResponse, error_codes};
pub use transport::{serve, serve_stdio};
