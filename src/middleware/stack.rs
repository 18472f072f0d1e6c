//! The standard five-stage composition and its statistics.

use std::sync::Arc;

use serde::Serialize;

use super::{
    CachingMiddleware, ErrorStats, LoggingMiddleware, Pipeline, RateLimitConfig, RateLimitStats,
    RateLimitingMiddleware, RetryConfig, RetryMiddleware, TimingMiddleware, TimingStats,
};
use crate::cache::{CacheConfig, ResponseCache};
use crate::config::MiddlewareConfig;

/// Owns one instance of each standard stage.
///
/// Stage handles are kept so statistics can be read and the cache cleared
/// while the pipeline is in use.
pub struct MiddlewareStack {
    logging: Arc<LoggingMiddleware>,
    timing: Arc<TimingMiddleware>,
    rate_limit: Arc<RateLimitingMiddleware>,
    retry: Arc<RetryMiddleware>,
    cache: Arc<ResponseCache>,
    pipeline: Pipeline,
}

/// Cache section of [`PipelineStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// `"N/A"` before the first lookup, otherwise e.g. `"66.7%"`.
    pub hit_rate: String,
    pub cache_size: u64,
}

/// Point-in-time view of every stage's bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStats {
    pub timing: TimingStats,
    pub cache: CacheSnapshot,
    pub rate_limiting: RateLimitStats,
    pub errors: ErrorStats,
}

impl MiddlewareStack {
    pub fn new(config: &MiddlewareConfig) -> Self {
        Self::with_configs(config.retry(), config.rate_limit(), config.cache())
    }

    pub fn with_configs(retry: RetryConfig, rate_limit: RateLimitConfig, cache: CacheConfig) -> Self {
        let logging = Arc::new(LoggingMiddleware::new());
        let timing = Arc::new(TimingMiddleware::new());
        let rate_limit = Arc::new(RateLimitingMiddleware::new(rate_limit));
        let retry = Arc::new(RetryMiddleware::new(retry));
        let cache = Arc::new(ResponseCache::new(&cache));

        let pipeline = Pipeline::builder()
            .stage(logging.clone())
            .stage(timing.clone())
            .stage(rate_limit.clone())
            .stage(retry.clone())
            .stage(Arc::new(CachingMiddleware::new(cache.clone())))
            .build();

        Self {
            logging,
            timing,
            rate_limit,
            retry,
            cache,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn logging(&self) -> &LoggingMiddleware {
        &self.logging
    }

    pub fn timing(&self) -> &TimingMiddleware {
        &self.timing
    }

    pub fn rate_limit(&self) -> &RateLimitingMiddleware {
        &self.rate_limit
    }

    pub fn retry(&self) -> &RetryMiddleware {
        &self.retry
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn stats(&self) -> PipelineStats {
        let cache_stats = self.cache.stats();
        PipelineStats {
            timing: self.timing.stats(),
            cache: CacheSnapshot {
                hits: cache_stats.hits,
                misses: cache_stats.misses,
                hit_rate: cache_stats.hit_rate_display(),
                cache_size: self.cache.len().await,
            },
            rate_limiting: self.rate_limit.stats(),
            errors: self.retry.stats(),
        }
    }
}

impl Default for MiddlewareStack {
    fn default() -> Self {
        Self::new(&MiddlewareConfig::default())
    }
}
