//! Request logging stage.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{error, info};

use super::{Invocation, Middleware, Next};
use crate::{Result, telemetry};

/// Logs every invocation with a monotonically increasing request number
/// and its elapsed time. Never alters the call or its outcome.
#[derive(Debug, Default)]
pub struct LoggingMiddleware {
    request_count: AtomicU64,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invocations seen so far.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn handle(&self, invocation: &Invocation, next: Next<'_>) -> Result<Value> {
        let request = self.request_count.fetch_add(1, Ordering::Relaxed) + 1;
        let method = invocation.kind.method();
        info!(
            request,
            method,
            name = %invocation.name,
            source = %invocation.source,
            "request received"
        );

        let start = Instant::now();
        let result = next.run(invocation).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let status = match &result {
            Ok(_) => {
                info!(request, method, name = %invocation.name, elapsed_ms, "request completed");
                "ok"
            }
            Err(e) => {
                error!(
                    request,
                    method,
                    name = %invocation.name,
                    elapsed_ms,
                    error = %e,
                    "request failed"
                );
                "error"
            }
        };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "kind" => invocation.kind.as_str(),
            "status" => status,
        )
        .increment(1);

        result
    }
}
