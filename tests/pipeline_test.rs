//! Tests for the standard middleware stack driven by in-process endpoints.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::Instant;

use r2r_mcp::cache::CacheConfig;
use r2r_mcp::middleware::{Endpoint, Invocation, MiddlewareStack, RateLimitConfig, RetryConfig};
use r2r_mcp::{R2rError, Result};

/// Endpoint that fails `failures` times with `fail_with`, then echoes the
/// invocation name. Records the instant of every call.
struct Scripted {
    failures: AtomicU32,
    fail_with: fn() -> R2rError,
    calls: Mutex<Vec<Instant>>,
}

impl Scripted {
    fn new(failures: u32, fail_with: fn() -> R2rError) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            fail_with,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn ok() -> Self {
        Self::new(0, server_error)
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Endpoint for Scripted {
    async fn call(&self, invocation: &Invocation) -> Result<Value> {
        self.calls.lock().unwrap().push(Instant::now());
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err((self.fail_with)());
        }
        Ok(json!({"echo": invocation.name, "args": invocation.arguments}))
    }
}

fn server_error() -> R2rError {
    R2rError::UpstreamHttp {
        status: 500,
        body: "boom".into(),
    }
}

fn bad_request() -> R2rError {
    R2rError::UpstreamHttp {
        status: 400,
        body: "bad".into(),
    }
}

fn unexpected() -> R2rError {
    R2rError::Unexpected("socket closed".into())
}

/// Paused-clock sleeps land on millisecond ticks.
fn assert_close(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(10),
        "expected ~{expected:?}, got {actual:?}"
    );
}

fn stack(retry: RetryConfig, per_minute: u32) -> MiddlewareStack {
    MiddlewareStack::with_configs(retry, RateLimitConfig::new(per_minute), CacheConfig::new())
}

// =========================================================================
// Retry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn persistent_server_error_makes_three_attempts_with_backoff() {
    let stack = stack(RetryConfig::new(), 100);
    let endpoint = Scripted::new(u32::MAX, server_error);

    let err = stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({"query": "q"})), &endpoint)
        .await
        .unwrap_err();

    assert!(matches!(err, R2rError::UpstreamHttp { status: 500, .. }));
    let times = endpoint.call_times();
    assert_eq!(times.len(), 3);
    assert_close(times[1] - times[0], Duration::from_secs(1));
    assert_close(times[2] - times[1], Duration::from_secs(2));
    assert_eq!(stack.retry().error_count("search", "HTTP500"), 3);
}

#[tokio::test(start_paused = true)]
async fn unexpected_failure_is_retried_like_server_error() {
    let stack = stack(RetryConfig::new(), 100);
    let endpoint = Scripted::new(u32::MAX, unexpected);

    let err = stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({"query": "q"})), &endpoint)
        .await
        .unwrap_err();

    assert!(matches!(err, R2rError::Unexpected(ref m) if m == "socket closed"));
    let times = endpoint.call_times();
    assert_eq!(times.len(), 3);
    assert_close(times[1] - times[0], Duration::from_secs(1));
    assert_close(times[2] - times[1], Duration::from_secs(2));
    assert_eq!(stack.retry().error_count("search", "Unexpected"), 3);
}

#[tokio::test(start_paused = true)]
async fn client_error_is_not_retried() {
    let stack = stack(RetryConfig::new(), 100);
    let endpoint = Scripted::new(u32::MAX, bad_request);

    let err = stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({})), &endpoint)
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(endpoint.call_count(), 1);
    assert_eq!(stack.retry().error_count("search", "HTTP400"), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_recovers_and_is_cached() {
    let stack = stack(RetryConfig::new(), 100);
    let endpoint = Scripted::new(1, server_error);
    let invocation = Invocation::tool("rag", json!({"query": "q"}));

    let first = stack.pipeline().execute(&invocation, &endpoint).await.unwrap();
    let second = stack.pipeline().execute(&invocation, &endpoint).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(endpoint.call_count(), 2);
    assert_eq!(stack.retry().stats().total_errors, 1);
    assert_eq!(stack.cache().stats().hits, 1);
}

#[tokio::test(start_paused = true)]
async fn disabled_retry_makes_one_attempt() {
    let stack = stack(RetryConfig::disabled(), 100);
    let endpoint = Scripted::new(u32::MAX, server_error);

    stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({})), &endpoint)
        .await
        .unwrap_err();
    assert_eq!(endpoint.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn resources_are_not_retried() {
    let stack = stack(RetryConfig::new(), 100);
    let endpoint = Scripted::new(u32::MAX, server_error);

    stack
        .pipeline()
        .execute(&Invocation::resource("r2r://config"), &endpoint)
        .await
        .unwrap_err();
    assert_eq!(endpoint.call_count(), 1);
    assert_eq!(stack.retry().stats().total_errors, 0);
}

// =========================================================================
// Caching
// =========================================================================

#[tokio::test]
async fn identical_calls_hit_the_cache() {
    let stack = stack(RetryConfig::disabled(), 100);
    let endpoint = Scripted::ok();

    for _ in 0..3 {
        stack
            .pipeline()
            .execute(&Invocation::tool("search", json!({"query": "q", "limit": 5})), &endpoint)
            .await
            .unwrap();
    }
    assert_eq!(endpoint.call_count(), 1);

    let stats = stack.stats().await;
    assert_eq!(stats.cache.hits, 2);
    assert_eq!(stats.cache.misses, 1);
    assert_eq!(stats.cache.hit_rate, "66.7%");
    assert_eq!(stats.cache.cache_size, 1);
}

#[tokio::test]
async fn argument_key_order_does_not_matter() {
    let stack = stack(RetryConfig::disabled(), 100);
    let endpoint = Scripted::ok();

    let a = Invocation::tool("search", json!({"query": "q", "limit": 5}));
    let b = Invocation::tool("search", json!({"limit": 5, "query": "q"}));
    stack.pipeline().execute(&a, &endpoint).await.unwrap();
    stack.pipeline().execute(&b, &endpoint).await.unwrap();

    assert_eq!(endpoint.call_count(), 1);
}

#[tokio::test]
async fn different_arguments_miss() {
    let stack = stack(RetryConfig::disabled(), 100);
    let endpoint = Scripted::ok();

    stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({"query": "a"})), &endpoint)
        .await
        .unwrap();
    stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({"query": "b"})), &endpoint)
        .await
        .unwrap();

    assert_eq!(endpoint.call_count(), 2);
}

#[tokio::test]
async fn errors_are_never_cached() {
    let stack = stack(RetryConfig::disabled(), 100);
    let endpoint = Scripted::new(1, bad_request);
    let invocation = Invocation::tool("search", json!({"query": "q"}));

    stack.pipeline().execute(&invocation, &endpoint).await.unwrap_err();
    stack.pipeline().execute(&invocation, &endpoint).await.unwrap();
    stack.pipeline().execute(&invocation, &endpoint).await.unwrap();

    assert_eq!(endpoint.call_count(), 2);
}

#[tokio::test]
async fn non_cacheable_calls_always_reach_the_endpoint() {
    let stack = stack(RetryConfig::disabled(), 100);
    let endpoint = Scripted::ok();
    let invocation = Invocation::tool("delete_document", json!({"document_id": "d1"})).cacheable(false);

    stack.pipeline().execute(&invocation, &endpoint).await.unwrap();
    stack.pipeline().execute(&invocation, &endpoint).await.unwrap();

    assert_eq!(endpoint.call_count(), 2);
    assert_eq!(stack.cache().stats().misses, 0);
}

#[tokio::test]
async fn expired_entries_are_refetched() {
    let stack = MiddlewareStack::with_configs(
        RetryConfig::disabled(),
        RateLimitConfig::new(100),
        CacheConfig::new().ttl(Duration::from_millis(100)),
    );
    let endpoint = Scripted::ok();
    let invocation = Invocation::tool("search", json!({"query": "q"}));

    stack.pipeline().execute(&invocation, &endpoint).await.unwrap();
    stack.pipeline().execute(&invocation, &endpoint).await.unwrap();
    assert_eq!(endpoint.call_count(), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;
    stack.pipeline().execute(&invocation, &endpoint).await.unwrap();
    assert_eq!(endpoint.call_count(), 2);
}

#[tokio::test]
async fn clear_empties_cache_and_resets_counters() {
    let stack = stack(RetryConfig::disabled(), 100);
    let endpoint = Scripted::ok();

    for query in ["a", "b", "a"] {
        stack
            .pipeline()
            .execute(&Invocation::tool("search", json!({"query": query})), &endpoint)
            .await
            .unwrap();
    }
    assert_eq!(stack.cache().clear().await, 2);

    let stats = stack.stats().await;
    assert_eq!(stats.cache.cache_size, 0);
    assert_eq!(stats.cache.hits, 0);
    assert_eq!(stats.cache.misses, 0);
    assert_eq!(stats.cache.hit_rate, "N/A");
}

// =========================================================================
// Rate limiting
// =========================================================================

#[tokio::test(start_paused = true)]
async fn ceiling_plus_one_is_rejected_and_window_slides() {
    let stack = stack(RetryConfig::disabled(), 3);
    let endpoint = Scripted::ok();

    for i in 0..3 {
        let invocation = Invocation::tool("search", json!({"query": i})).from_source("alice");
        stack.pipeline().execute(&invocation, &endpoint).await.unwrap();
    }
    let rejected = stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({"query": 9})).from_source("alice"), &endpoint)
        .await
        .unwrap_err();
    match rejected {
        R2rError::RateLimitExceeded { client, limit } => {
            assert_eq!(client, "alice");
            assert_eq!(limit, 3);
        }
        other => panic!("expected RateLimitExceeded, got {other:?}"),
    }
    assert_eq!(endpoint.call_count(), 3);

    // Other sources are unaffected.
    stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({"query": 0})).from_source("bob"), &endpoint)
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({"query": 10})).from_source("alice"), &endpoint)
        .await
        .unwrap();
}

#[tokio::test]
async fn cache_hits_consume_rate_quota() {
    let stack = stack(RetryConfig::disabled(), 2);
    let endpoint = Scripted::ok();
    let invocation = Invocation::tool("search", json!({"query": "q"})).from_source("agent");

    stack.pipeline().execute(&invocation, &endpoint).await.unwrap();
    stack.pipeline().execute(&invocation, &endpoint).await.unwrap();
    let err = stack.pipeline().execute(&invocation, &endpoint).await.unwrap_err();

    assert!(matches!(err, R2rError::RateLimitExceeded { .. }));
    assert_eq!(endpoint.call_count(), 1);
    assert_eq!(stack.rate_limit().in_window("agent"), 2);
}

#[tokio::test]
async fn rate_limit_applies_to_resources_and_prompts() {
    let stack = stack(RetryConfig::disabled(), 2);
    let endpoint = Scripted::ok();

    stack
        .pipeline()
        .execute(&Invocation::resource("r2r://config"), &endpoint)
        .await
        .unwrap();
    stack
        .pipeline()
        .execute(&Invocation::prompt("code_review", json!({})), &endpoint)
        .await
        .unwrap();
    let err = stack
        .pipeline()
        .execute(&Invocation::resource("r2r://config"), &endpoint)
        .await
        .unwrap_err();

    assert!(matches!(err, R2rError::RateLimitExceeded { .. }));
    assert_eq!(stack.stats().await.rate_limiting.active_clients, 1);
}

#[tokio::test]
async fn rate_limited_calls_are_not_tallied_as_errors() {
    let stack = stack(RetryConfig::new(), 1);
    let endpoint = Scripted::ok();

    stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({"query": 1})), &endpoint)
        .await
        .unwrap();
    stack
        .pipeline()
        .execute(&Invocation::tool("search", json!({"query": 2})), &endpoint)
        .await
        .unwrap_err();

    assert_eq!(stack.retry().stats().total_errors, 0);
}

// =========================================================================
// Logging and timing
// =========================================================================

#[tokio::test]
async fn every_call_is_counted_and_successful_tools_are_timed() {
    let stack = stack(RetryConfig::disabled(), 100);
    let endpoint = Scripted::new(1, bad_request);

    let invocation = Invocation::tool("search", json!({"query": "q"}));
    stack.pipeline().execute(&invocation, &endpoint).await.unwrap_err();
    stack.pipeline().execute(&invocation, &endpoint).await.unwrap();
    stack.pipeline().execute(&invocation, &endpoint).await.unwrap();
    stack
        .pipeline()
        .execute(&Invocation::resource("r2r://config"), &endpoint)
        .await
        .unwrap();

    assert_eq!(stack.logging().request_count(), 4);
    assert_eq!(stack.timing().samples("search").len(), 2);
    assert!(stack.timing().samples("r2r://config").is_empty());

    let timing = stack.stats().await.timing;
    assert_eq!(timing.operations, vec!["search".to_string()]);
    assert_eq!(timing.total_calls, 2);
    assert!(timing.average_times.contains_key("search"));
}
