//! The single entry point both front ends call into.
//!
//! A [`Gateway`] owns the upstream client, the middleware stack and the
//! tool registry. Every tool call, resource read and prompt render becomes
//! an [`Invocation`] and runs through the same pipeline, ending in the
//! gateway's dispatcher.

mod builder;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::client::R2rClient;
use crate::config::Config;
use crate::middleware::{Endpoint, Invocation, InvocationKind, MiddlewareStack};
use crate::resources::{self, ResourceEnv, ResourceTarget};
use crate::tools::{Catalog, ToolContext, ToolRegistry};
use crate::{R2rError, Result, prompts};

pub use builder::GatewayBuilder;

pub struct Gateway {
    config: Config,
    tools: ToolRegistry,
    ctx: ToolContext,
    started: Instant,
}

impl Gateway {
    pub fn builder(config: Config) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    /// Gateway with the standard tool catalogue and stages from `config`.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &R2rClient {
        &self.ctx.client
    }

    pub fn stack(&self) -> &MiddlewareStack {
        &self.ctx.stack
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn catalog(&self) -> Catalog {
        self.ctx.catalog
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Call tool `name` on behalf of `source`.
    ///
    /// Unknown tools fail with [`R2rError::NotFound`] before entering the
    /// pipeline. `null` arguments are treated as `{}`.
    pub async fn call_tool(&self, name: &str, arguments: Value, source: &str) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| R2rError::NotFound(format!("Unknown tool: {name}")))?;
        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => arguments,
            _ => {
                return Err(R2rError::InvalidArgument(
                    "tool arguments must be an object".into(),
                ));
            }
        };
        let invocation = Invocation::tool(name, arguments)
            .from_source(source)
            .cacheable(tool.cacheable());
        self.execute(&invocation).await
    }

    /// Read the resource at `uri`.
    pub async fn read_resource(&self, uri: &str, source: &str) -> Result<Value> {
        ResourceTarget::parse(uri)?;
        self.execute(&Invocation::resource(uri).from_source(source))
            .await
    }

    /// Render prompt `name`. `request_id` is embedded by prompts that
    /// reference the originating request.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Value,
        source: &str,
        request_id: Option<&str>,
    ) -> Result<Value> {
        let mut invocation = Invocation::prompt(name, arguments).from_source(source);
        if let Some(id) = request_id {
            invocation = invocation.with_request_id(id);
        }
        self.execute(&invocation).await
    }

    /// Run an invocation through the pipeline.
    pub async fn execute(&self, invocation: &Invocation) -> Result<Value> {
        self.ctx
            .stack
            .pipeline()
            .execute(invocation, &Dispatcher { gateway: self })
            .await
    }

    /// One-off upstream health check, outside the pipeline.
    pub async fn check_health(&self) -> Result<Value> {
        match self.ctx.client.get("/v3/health", None).await {
            Ok(health) => {
                info!(base_url = %self.ctx.client.base_url(), "upstream reachable");
                Ok(health)
            }
            Err(e) => {
                warn!(
                    base_url = %self.ctx.client.base_url(),
                    error = %e,
                    "upstream health check failed"
                );
                Err(e)
            }
        }
    }
}

/// Innermost pipeline stage: routes an invocation to its handler.
struct Dispatcher<'a> {
    gateway: &'a Gateway,
}

#[async_trait]
impl Endpoint for Dispatcher<'_> {
    async fn call(&self, invocation: &Invocation) -> Result<Value> {
        let gateway = self.gateway;
        match invocation.kind {
            InvocationKind::Tool => {
                let tool = gateway.tools.get(&invocation.name).ok_or_else(|| {
                    R2rError::NotFound(format!("Unknown tool: {}", invocation.name))
                })?;
                tool.call(&gateway.ctx, &invocation.arguments).await
            }
            InvocationKind::Resource => {
                let target = ResourceTarget::parse(&invocation.name)?;
                let env = ResourceEnv {
                    client: &gateway.ctx.client,
                    config: &gateway.config,
                    uptime: gateway.uptime(),
                };
                resources::read(&target, &env).await
            }
            InvocationKind::Prompt => prompts::render(
                &invocation.name,
                &invocation.arguments,
                invocation.request_id.as_deref(),
            ),
        }
    }
}
