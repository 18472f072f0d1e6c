//! Retry stage with exponential backoff and an error tally.
//!
//! Failures classified by [`R2rError::is_retryable`] (upstream 5xx,
//! transport failures, undecodable bodies) are retried up to
//! [`RetryConfig::max_retries`] extra times. Client errors (upstream 4xx,
//! invalid arguments, unknown names) fail immediately. Every failure, final
//! or not, is counted under its (operation, error kind) pair.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use super::{Invocation, Middleware, Next};
use crate::{R2rError, Result, telemetry};

/// Configuration for retry behaviour on retryable errors.
///
/// ```rust
/// # use r2r_mcp::middleware::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_retries(3)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Extra attempts after the first. 0 = no retry. Default: 2.
    pub max_retries: u32,
    /// Delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Cap on exponential growth. Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay after failed attempt `attempt` (0-indexed):
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// Error tally snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorStats {
    pub total_errors: u64,
    /// Keyed `"{operation}:{kind}"`.
    pub errors_by_type: BTreeMap<String, u64>,
}

/// Retries tool invocations and tallies every failure.
///
/// Resource and prompt reads pass through untouched.
#[derive(Debug, Default)]
pub struct RetryMiddleware {
    config: RetryConfig,
    error_counts: Mutex<HashMap<(String, String), u64>>,
}

impl RetryMiddleware {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            error_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Failures recorded for `operation` with error kind `kind`.
    pub fn error_count(&self, operation: &str, kind: &str) -> u64 {
        self.error_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(operation.to_string(), kind.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn stats(&self) -> ErrorStats {
        let counts = self
            .error_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        ErrorStats {
            total_errors: counts.values().sum(),
            errors_by_type: counts
                .iter()
                .map(|((op, kind), n)| (format!("{op}:{kind}"), *n))
                .collect(),
        }
    }

    fn tally(&self, operation: &str, err: &R2rError) {
        let kind = err.kind();
        metrics::counter!(telemetry::ERRORS_TOTAL,
            "operation" => operation.to_owned(),
            "error" => kind.clone(),
        )
        .increment(1);
        *self
            .error_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((operation.to_string(), kind))
            .or_insert(0) += 1;
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    fn name(&self) -> &'static str {
        "retry"
    }

    async fn handle(&self, invocation: &Invocation, next: Next<'_>) -> Result<Value> {
        if !invocation.is_tool() {
            return next.run(invocation).await;
        }

        let operation = invocation.name.as_str();
        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 0;
        loop {
            let err = match next.run(invocation).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            self.tally(operation, &err);

            if !err.is_retryable() {
                error!(operation, error = %err, "non-retryable error");
                return Err(err);
            }
            if attempt + 1 >= max_attempts {
                error!(operation, attempts = max_attempts, error = %err, "retries exhausted");
                return Err(err);
            }

            metrics::counter!(telemetry::RETRIES_TOTAL, "operation" => operation.to_owned())
                .increment(1);
            let delay = self.config.delay_for_attempt(attempt);
            warn!(
                operation,
                attempt = attempt + 1,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after error"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_caps() {
        let config = RetryConfig::new().max_delay(Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(3));
    }

    #[test]
    fn stats_key_by_operation_and_kind() {
        let retry = RetryMiddleware::new(RetryConfig::new());
        retry.tally(
            "search",
            &R2rError::UpstreamHttp {
                status: 503,
                body: String::new(),
            },
        );
        retry.tally("search", &R2rError::InvalidArgument("x".into()));
        retry.tally("search", &R2rError::InvalidArgument("y".into()));

        let stats = retry.stats();
        assert_eq!(stats.total_errors, 3);
        assert_eq!(stats.errors_by_type["search:HTTP503"], 1);
        assert_eq!(stats.errors_by_type["search:InvalidArgument"], 2);
        assert_eq!(retry.error_count("search", "InvalidArgument"), 2);
    }
}
