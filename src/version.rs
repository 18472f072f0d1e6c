//! Version and identity strings reported to clients.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name advertised in MCP `serverInfo` and the REST root.
pub const SERVER_NAME: &str = "R2R MCP Server";

/// Full version string: `{name} v{version}`.
pub fn version_string() -> String {
    format!("{SERVER_NAME} v{PKG_VERSION}")
}
