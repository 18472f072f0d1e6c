//! Middleware pipeline wrapped around every invocation.
//!
//! A [`Pipeline`] is an ordered list of [`Middleware`] stages ending in an
//! [`Endpoint`]. Stages run in registration order on the way in and unwind
//! in reverse on the way out; each stage receives a [`Next`] handle and
//! decides whether (and how often) to call it.
//!
//! The standard composition, built by [`MiddlewareStack`], is (outer to
//! inner): logging, timing, rate limiting, retry, caching. Because caching
//! is innermost, every call (hit or miss) is logged, timed and consumes
//! rate-limit quota, while only genuine misses reach the retry stage.
//!
//! All stage state lives on the stage values themselves, so tests can build
//! isolated pipelines.

mod caching;
mod logging;
mod rate_limit;
mod retry;
mod stack;
mod timing;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

pub use caching::CachingMiddleware;
pub use logging::LoggingMiddleware;
pub use rate_limit::{RateLimitConfig, RateLimitStats, RateLimitingMiddleware};
pub use retry::{ErrorStats, RetryConfig, RetryMiddleware};
pub use stack::{CacheSnapshot, MiddlewareStack, PipelineStats};
pub use timing::{TimingMiddleware, TimingStats};

/// Source identifier used when a caller does not identify itself.
pub const DEFAULT_SOURCE: &str = "default";

/// What an invocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationKind {
    Tool,
    Resource,
    Prompt,
}

impl InvocationKind {
    /// Protocol method this kind corresponds to.
    pub fn method(&self) -> &'static str {
        match self {
            InvocationKind::Tool => "tools/call",
            InvocationKind::Resource => "resources/read",
            InvocationKind::Prompt => "prompts/get",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationKind::Tool => "tool",
            InvocationKind::Resource => "resource",
            InvocationKind::Prompt => "prompt",
        }
    }
}

/// A single call travelling through the pipeline.
///
/// Created per call and dropped when the call completes.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub kind: InvocationKind,
    /// Tool name, resource URI or prompt name.
    pub name: String,
    /// Caller identity used for rate limiting.
    pub source: String,
    pub arguments: Value,
    pub request_id: Option<String>,
    /// Whether the caching stage may serve or store this call.
    pub cacheable: bool,
}

impl Invocation {
    fn new(kind: InvocationKind, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            kind,
            name: name.into(),
            source: DEFAULT_SOURCE.to_string(),
            arguments,
            request_id: None,
            cacheable: kind == InvocationKind::Tool,
        }
    }

    pub fn tool(name: impl Into<String>, arguments: Value) -> Self {
        Self::new(InvocationKind::Tool, name, arguments)
    }

    pub fn resource(uri: impl Into<String>) -> Self {
        Self::new(InvocationKind::Resource, uri, Value::Object(Default::default()))
    }

    pub fn prompt(name: impl Into<String>, arguments: Value) -> Self {
        Self::new(InvocationKind::Prompt, name, arguments)
    }

    /// Set the caller identity. Empty identities fall back to [`DEFAULT_SOURCE`].
    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        let source = source.into();
        self.source = if source.is_empty() {
            DEFAULT_SOURCE.to_string()
        } else {
            source
        };
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    pub fn is_tool(&self) -> bool {
        self.kind == InvocationKind::Tool
    }
}

/// The innermost call: executes the invocation for real.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, invocation: &Invocation) -> Result<Value>;
}

/// A composable wrapper implementing one cross-cutting concern.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Stage name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Handle the invocation, calling `next` zero or more times.
    async fn handle(&self, invocation: &Invocation, next: Next<'_>) -> Result<Value>;
}

/// Handle to the remainder of the pipeline.
///
/// `Copy`, so a stage may run the rest of the chain more than once (retry).
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining_stages", &self.stages.len())
            .finish()
    }
}

impl<'a> Next<'a> {
    pub fn new(stages: &'a [Arc<dyn Middleware>], endpoint: &'a dyn Endpoint) -> Self {
        Self { stages, endpoint }
    }

    /// Run the next stage, or the endpoint when no stages remain.
    pub async fn run(self, invocation: &Invocation) -> Result<Value> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage
                    .handle(invocation, Next::new(rest, self.endpoint))
                    .await
            }
            None => self.endpoint.call(invocation).await,
        }
    }
}

/// Ordered middleware chain.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Stage names, outer to inner.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run `invocation` through every stage and into `endpoint`.
    pub async fn execute(&self, invocation: &Invocation, endpoint: &dyn Endpoint) -> Result<Value> {
        Next::new(&self.stages, endpoint).run(invocation).await
    }
}

/// Builder for [`Pipeline`]. Stages are applied in the order added.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}
