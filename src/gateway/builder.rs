//! Builder for configuring gateway instances

use std::sync::Arc;

use tokio::time::Instant;

use super::Gateway;
use crate::Result;
use crate::cache::CacheConfig;
use crate::client::R2rClient;
use crate::config::Config;
use crate::middleware::{MiddlewareStack, RateLimitConfig, RetryConfig};
use crate::tools::{Catalog, ToolContext, ToolRegistry};
use crate::{prompts, resources};

/// Builder for [`Gateway`].
///
/// Stage settings default to those derived from the [`Config`]; the
/// overrides exist mainly so tests can shorten backoff delays or windows.
///
/// ```rust,no_run
/// # use r2r_mcp::{Config, Gateway, RetryConfig};
/// # use std::time::Duration;
/// let gateway = Gateway::builder(Config::default())
///     .retry(RetryConfig::new().initial_delay(Duration::from_millis(50)))
///     .build()?;
/// # Ok::<(), r2r_mcp::R2rError>(())
/// ```
pub struct GatewayBuilder {
    config: Config,
    tools: Option<ToolRegistry>,
    retry: Option<RetryConfig>,
    rate_limit: Option<RateLimitConfig>,
    cache: Option<CacheConfig>,
}

impl GatewayBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            tools: None,
            retry: None,
            rate_limit: None,
            cache: None,
        }
    }

    /// Replace the standard tool catalogue.
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<Gateway> {
        self.config.validate()?;

        let middleware = &self.config.middleware;
        let stack = MiddlewareStack::with_configs(
            self.retry.unwrap_or_else(|| middleware.retry()),
            self.rate_limit.unwrap_or_else(|| middleware.rate_limit()),
            self.cache.unwrap_or_else(|| middleware.cache()),
        );
        let client = R2rClient::new(&self.config.upstream)?;
        let tools = self.tools.unwrap_or_else(ToolRegistry::standard);

        let catalog = Catalog {
            tools: tools.len(),
            resources: resources::static_resources().len() + resources::templates().len(),
            prompts: prompts::list().len(),
        };

        Ok(Gateway {
            config: self.config,
            tools,
            ctx: ToolContext {
                client,
                stack: Arc::new(stack),
                catalog,
            },
            started: Instant::now(),
        })
    }
}
