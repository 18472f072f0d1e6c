//! Telemetry metric name constants.
//!
//! Centralised metric names for pipeline operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `r2r_mcp_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: tool, resource or prompt name
//! - `kind`: "tool", "resource" or "prompt"
//! - `status`: "ok" or "error"
//! - `error`: error kind label (e.g. "HTTP503", "Transport")

/// Total invocations entering the pipeline.
///
/// Labels: `kind`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "r2r_mcp_requests_total";

/// Tool execution duration in seconds, as observed by the timing stage.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "r2r_mcp_request_duration_seconds";

/// Total retry attempts (not counting the initial call).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "r2r_mcp_retries_total";

/// Total failures observed by the retry stage, retried or not.
///
/// Labels: `operation`, `error`.
pub const ERRORS_TOTAL: &str = "r2r_mcp_errors_total";

/// Total invocations rejected by the rate limiter.
///
/// Labels: none.
pub const RATE_LIMITED_TOTAL: &str = "r2r_mcp_rate_limited_total";

/// Total tool-result cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "r2r_mcp_cache_hits_total";

/// Total tool-result cache misses.
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "r2r_mcp_cache_misses_total";
