//! Tool latency tracking stage.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{error, info};

use super::{Invocation, Middleware, Next};
use crate::{Result, telemetry};

/// Records the wall-clock duration of successful tool calls, keyed by tool
/// name, and logs a running average. Failures are logged but not sampled.
/// Resource and prompt reads pass straight through.
#[derive(Debug, Default)]
pub struct TimingMiddleware {
    samples: Mutex<HashMap<String, Vec<f64>>>,
}

/// Snapshot of recorded latencies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingStats {
    pub operations: Vec<String>,
    pub total_calls: usize,
    /// Mean latency in milliseconds per operation.
    pub average_times: BTreeMap<String, f64>,
}

impl TimingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples (milliseconds) recorded for `operation`, oldest first.
    pub fn samples(&self, operation: &str) -> Vec<f64> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(operation)
            .cloned()
            .unwrap_or_default()
    }

    pub fn stats(&self) -> TimingStats {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let mut operations: Vec<String> = samples.keys().cloned().collect();
        operations.sort();
        let average_times = samples
            .iter()
            .filter(|(_, times)| !times.is_empty())
            .map(|(op, times)| (op.clone(), times.iter().sum::<f64>() / times.len() as f64))
            .collect();
        TimingStats {
            operations,
            total_calls: samples.values().map(Vec::len).sum(),
            average_times,
        }
    }

    /// Append a sample and return (running average, sample count).
    fn record(&self, operation: &str, duration_ms: f64) -> (f64, usize) {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        let times = samples.entry(operation.to_string()).or_default();
        times.push(duration_ms);
        (times.iter().sum::<f64>() / times.len() as f64, times.len())
    }
}

#[async_trait]
impl Middleware for TimingMiddleware {
    fn name(&self) -> &'static str {
        "timing"
    }

    async fn handle(&self, invocation: &Invocation, next: Next<'_>) -> Result<Value> {
        if !invocation.is_tool() {
            return next.run(invocation).await;
        }

        let start = Instant::now();
        let result = next.run(invocation).await;
        let elapsed = start.elapsed();
        let duration_ms = elapsed.as_secs_f64() * 1000.0;

        match &result {
            Ok(_) => {
                let (avg_ms, calls) = self.record(&invocation.name, duration_ms);
                metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
                    "operation" => invocation.name.clone(),
                )
                .record(elapsed.as_secs_f64());
                info!(tool = %invocation.name, duration_ms, avg_ms, calls, "tool executed");
            }
            Err(e) => {
                error!(tool = %invocation.name, duration_ms, error = %e, "tool failed");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_average_per_operation() {
        let timing = TimingMiddleware::new();
        timing.record("search", 10.0);
        timing.record("search", 30.0);
        timing.record("rag", 5.0);

        let stats = timing.stats();
        assert_eq!(stats.operations, vec!["rag", "search"]);
        assert_eq!(stats.total_calls, 3);
        assert_eq!(stats.average_times["search"], 20.0);
        assert_eq!(stats.average_times["rag"], 5.0);
    }

    #[test]
    fn empty_stats() {
        let stats = TimingMiddleware::new().stats();
        assert!(stats.operations.is_empty());
        assert_eq!(stats.total_calls, 0);
    }
}
