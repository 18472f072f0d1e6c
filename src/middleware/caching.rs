//! Response caching stage.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::{Invocation, Middleware, Next};
use crate::Result;
use crate::cache::{CacheKey, ResponseCache};

/// Serves repeated tool calls from the [`ResponseCache`].
///
/// Only tool invocations marked cacheable are looked up or stored. Failed
/// calls are never stored.
pub struct CachingMiddleware {
    cache: Arc<ResponseCache>,
}

impl CachingMiddleware {
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }
}

#[async_trait]
impl Middleware for CachingMiddleware {
    fn name(&self) -> &'static str {
        "caching"
    }

    async fn handle(&self, invocation: &Invocation, next: Next<'_>) -> Result<Value> {
        if !invocation.is_tool() || !invocation.cacheable {
            return next.run(invocation).await;
        }

        let key = CacheKey::new(&invocation.name, &invocation.arguments);
        if let Some(hit) = self.cache.get(&key).await {
            info!(
                tool = %invocation.name,
                hit_rate = %self.cache.stats().hit_rate_display(),
                "cache hit"
            );
            return Ok(hit);
        }
        debug!(tool = %invocation.name, %key, "cache miss");

        let value = next.run(invocation).await?;
        self.cache.insert(key, value.clone()).await;
        Ok(value)
    }
}
