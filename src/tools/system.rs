//! Upstream system endpoints and server introspection tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::args::empty_schema;
use super::{Tool, ToolContext, ToolRegistry};
use crate::version::{PKG_VERSION, SERVER_NAME};
use crate::{Result, timestamp};

pub(super) fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(UpstreamGet {
        name: "system_health",
        description: "Check the health of the R2R service.",
        path: "/v3/health",
        cacheable: false,
    }));
    registry.register(Arc::new(UpstreamGet {
        name: "system_settings",
        description: "Fetch the R2R system settings.",
        path: "/v3/system/settings",
        cacheable: true,
    }));
    registry.register(Arc::new(UpstreamGet {
        name: "analytics_overview",
        description: "Fetch the R2R analytics overview.",
        path: "/v3/analytics",
        cacheable: true,
    }));
    registry.register(Arc::new(ServerCapabilities));
    registry.register(Arc::new(PerformanceStats));
    registry.register(Arc::new(ClearCache));
}

/// Argument-less GET passed straight through.
struct UpstreamGet {
    name: &'static str,
    description: &'static str,
    path: &'static str,
    cacheable: bool,
}

#[async_trait]
impl Tool for UpstreamGet {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    fn cacheable(&self) -> bool {
        self.cacheable
    }

    async fn call(&self, ctx: &ToolContext, _args: &Value) -> Result<Value> {
        ctx.client.get(self.path, None).await
    }
}

struct ServerCapabilities;

#[async_trait]
impl Tool for ServerCapabilities {
    fn name(&self) -> &'static str {
        "get_server_capabilities"
    }

    fn description(&self) -> &'static str {
        "Report server features, upstream health, middleware statistics and catalogue sizes."
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn call(&self, ctx: &ToolContext, _args: &Value) -> Result<Value> {
        let health = match ctx.client.get("/v3/health", None).await {
            Ok(health) => health,
            Err(e) => {
                warn!(error = %e, "upstream health check failed");
                json!({"status": "unavailable", "error": e.to_string()})
            }
        };
        let stats = ctx.stack.stats().await;

        Ok(json!({
            "server": SERVER_NAME,
            "version": PKG_VERSION,
            "r2r_base_url": ctx.client.base_url(),
            "r2r_health": health,
            "features": {
                "middleware": ctx.stack.pipeline().stage_names(),
                "resources": true,
                "prompts": true,
            },
            "statistics": {
                "timing": {
                    "operations_tracked": stats.timing.operations.len(),
                    "total_operations": stats.timing.total_calls,
                },
                "cache": {
                    "hits": stats.cache.hits,
                    "misses": stats.cache.misses,
                    "hit_rate": stats.cache.hit_rate,
                },
            },
            "tools_count": ctx.catalog.tools,
            "resources_count": ctx.catalog.resources,
            "prompts_count": ctx.catalog.prompts,
        }))
    }
}

struct PerformanceStats;

#[async_trait]
impl Tool for PerformanceStats {
    fn name(&self) -> &'static str {
        "get_performance_stats"
    }

    fn description(&self) -> &'static str {
        "Report timing, cache, rate-limit and error statistics from the middleware."
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn call(&self, ctx: &ToolContext, _args: &Value) -> Result<Value> {
        let stats = ctx.stack.stats().await;
        Ok(json!({
            "timestamp": timestamp(),
            "timing": stats.timing,
            "cache": stats.cache,
            "rate_limiting": stats.rate_limiting,
            "errors": stats.errors,
        }))
    }
}

struct ClearCache;

#[async_trait]
impl Tool for ClearCache {
    fn name(&self) -> &'static str {
        "clear_cache"
    }

    fn description(&self) -> &'static str {
        "Drop every cached response and reset cache counters."
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn call(&self, ctx: &ToolContext, _args: &Value) -> Result<Value> {
        let removed = ctx.stack.cache().clear().await;
        info!(removed, "cache cleared");
        Ok(json!({
            "status": "success",
            "message": format!("Cache cleared ({removed} entries removed)"),
            "timestamp": timestamp(),
        }))
    }
}
