//! Tests for metrics emitted by the middleware stages.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::{Value, json};

use r2r_mcp::cache::CacheConfig;
use r2r_mcp::middleware::{Endpoint, Invocation, MiddlewareStack, RateLimitConfig, RetryConfig};
use r2r_mcp::telemetry;
use r2r_mcp::{R2rError, Result};

// ============================================================================
// Endpoints
// ============================================================================

struct Echo;

#[async_trait]
impl Endpoint for Echo {
    async fn call(&self, invocation: &Invocation) -> Result<Value> {
        Ok(json!({"echo": invocation.name}))
    }
}

struct Unavailable;

#[async_trait]
impl Endpoint for Unavailable {
    async fn call(&self, _invocation: &Invocation) -> Result<Value> {
        Err(R2rError::UpstreamHttp {
            status: 503,
            body: String::new(),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counters matching `name` whose `label` equals `value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

fn fast_stack(per_minute: u32) -> MiddlewareStack {
    MiddlewareStack::with_configs(
        RetryConfig::new().initial_delay(Duration::from_millis(1)),
        RateLimitConfig::new(per_minute),
        CacheConfig::new(),
    )
}

/// Run `work` with a local recorder installed and return the snapshot.
fn record<F>(work: F) -> SnapshotVec
where
    F: std::future::Future<Output = ()>,
{
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(work))
    });
    snapshotter.snapshot().into_vec()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_calls_record_requests_duration_and_cache_metrics() {
    let stack = fast_stack(100);

    let snapshot = record(async {
        let invocation = Invocation::tool("search", json!({"query": "q"}));
        stack.pipeline().execute(&invocation, &Echo).await.unwrap();
        stack.pipeline().execute(&invocation, &Echo).await.unwrap();
    });

    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "ok"),
        2
    );
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retried_failures_record_retries_and_errors() {
    let stack = fast_stack(100);

    let snapshot = record(async {
        stack
            .pipeline()
            .execute(&Invocation::tool("search", json!({})), &Unavailable)
            .await
            .unwrap_err();
    });

    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 2);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::ERRORS_TOTAL, "error", "HTTP503"),
        3
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "error"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn rejected_calls_record_rate_limit_metric() {
    let stack = fast_stack(1);

    let snapshot = record(async {
        let invocation = Invocation::resource("r2r://config");
        stack.pipeline().execute(&invocation, &Echo).await.unwrap();
        stack.pipeline().execute(&invocation, &Echo).await.unwrap_err();
    });

    assert_eq!(counter_total(&snapshot, telemetry::RATE_LIMITED_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "kind", "resource"),
        2
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let stack = fast_stack(100);
    stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({})), &Echo)
        .await
        .unwrap();
}
