//! Sliding-window rate limiting stage.
//!
//! Each source gets a window of admission timestamps. An invocation is
//! admitted when fewer than `max_requests_per_minute` admissions fall within
//! the trailing window. Pruning, the ceiling check and recording the new
//! admission all happen under one lock, so concurrent callers cannot both
//! slip in under the ceiling.
//!
//! Every check also drops windows whose newest admission has aged out, so
//! the map holds only sources seen within the last window.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::warn;

use super::{Invocation, Middleware, Next};
use crate::{R2rError, Result, telemetry};

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests_per_minute: u32,
    /// Length of the sliding window. Default: 60s.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 100,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests_per_minute: u32) -> Self {
        Self {
            max_requests_per_minute,
            ..Default::default()
        }
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitStats {
    pub max_requests_per_minute: u32,
    pub active_clients: usize,
}

/// Per-source sliding-window limiter.
#[derive(Debug)]
pub struct RateLimitingMiddleware {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimitingMiddleware {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject one request from `source`.
    pub fn check(&self, source: &str) -> Result<()> {
        let now = Instant::now();
        let span = self.config.window;
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows.retain(|_, w| w.back().is_some_and(|&t| now.duration_since(t) < span));
        let window = windows.entry(source.to_string()).or_default();

        while let Some(&oldest) = window.front() {
            if now.duration_since(oldest) < span {
                break;
            }
            window.pop_front();
        }

        if window.len() >= self.config.max_requests_per_minute as usize {
            return Err(R2rError::RateLimitExceeded {
                client: source.to_string(),
                limit: self.config.max_requests_per_minute,
            });
        }

        window.push_back(now);
        Ok(())
    }

    /// Admissions currently inside `source`'s window.
    pub fn in_window(&self, source: &str) -> usize {
        let now = Instant::now();
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .map(|w| {
                w.iter()
                    .filter(|&&t| now.duration_since(t) < self.config.window)
                    .count()
            })
            .unwrap_or(0)
    }

    /// `active_clients` counts sources with an admission inside the window.
    pub fn stats(&self) -> RateLimitStats {
        let now = Instant::now();
        let active_clients = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|w| {
                w.back()
                    .is_some_and(|&t| now.duration_since(t) < self.config.window)
            })
            .count();
        RateLimitStats {
            max_requests_per_minute: self.config.max_requests_per_minute,
            active_clients,
        }
    }
}

#[async_trait]
impl Middleware for RateLimitingMiddleware {
    fn name(&self) -> &'static str {
        "rate_limiting"
    }

    async fn handle(&self, invocation: &Invocation, next: Next<'_>) -> Result<Value> {
        if let Err(e) = self.check(&invocation.source) {
            warn!(
                source = %invocation.source,
                limit = self.config.max_requests_per_minute,
                name = %invocation.name,
                "rate limit exceeded"
            );
            metrics::counter!(telemetry::RATE_LIMITED_TOTAL).increment(1);
            return Err(e);
        }
        next.run(invocation).await
    }
}
