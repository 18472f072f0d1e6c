//! r2r-mcp - MCP and REST proxy for the R2R retrieval API
//!
//! Exposes an R2R deployment as MCP tools, resources and prompts (and as a
//! small REST facade). Every call runs through a middleware pipeline:
//!
//! ```text
//! logging -> timing -> rate limiting -> retry -> caching -> handler -> R2R
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use r2r_mcp::{Config, Gateway};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> r2r_mcp::Result<()> {
//!     let gateway = Gateway::new(Config::load(None)?)?;
//!
//!     let hits = gateway
//!         .call_tool("search", json!({"query": "vector databases"}), "example")
//!         .await?;
//!     println!("{hits:#}");
//!
//!     println!("{:?}", gateway.stack().stats().await);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
#[cfg(feature = "http")]
pub mod http;
pub mod mcp;
pub mod middleware;
pub mod prompts;
pub mod resources;
pub mod telemetry;
pub mod tools;
pub mod version;

pub use client::R2rClient;
pub use config::Config;
pub use error::{R2rError, Result};
pub use gateway::{Gateway, GatewayBuilder};
pub use middleware::{Invocation, MiddlewareStack, RetryConfig};
pub use tools::{Tool, ToolRegistry};
pub use version::{PKG_VERSION, version_string};

/// Current time as an RFC 3339 string, used in response envelopes.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
