//! Tool registry and handlers.
//!
//! Each tool is a small stateless value implementing [`Tool`]: it validates
//! its arguments, shapes an upstream request, calls the [`R2rClient`] and
//! returns the JSON result (sometimes narrowed or reshaped). Handlers never
//! retry or catch upstream failures themselves; the middleware pipeline
//! owns retry, caching and accounting.
//!
//! [`ToolRegistry::standard`] registers the full catalogue:
//!
//! | Group         | Tools |
//! |---------------|-------|
//! | retrieval     | `search`, `rag`, `agent`, `smart_collection_search` |
//! | documents     | `list_documents`, `get_document`, `delete_document`, `batch_document_analysis` |
//! | collections   | `list_collections`, `get_collection`, `create_collection`, `update_collection`, `delete_collection` |
//! | conversations | `list_conversations`, `get_conversation`, `delete_conversation`, `conversation_analysis` |
//! | graph         | `knowledge_graph_query`, `graph_exploration` |
//! | system        | `system_health`, `system_settings`, `analytics_overview`, `get_server_capabilities`, `get_performance_stats`, `clear_cache` |

pub mod args;
mod collections;
mod conversations;
mod documents;
pub mod graph;
pub mod retrieval;
mod system;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::Result;
use crate::client::R2rClient;
use crate::middleware::MiddlewareStack;

/// Number of entries in each registry, reported by introspection tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub tools: usize,
    pub resources: usize,
    pub prompts: usize,
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ToolContext {
    pub client: R2rClient,
    pub stack: Arc<MiddlewareStack>,
    pub catalog: Catalog,
}

/// A named operation callable through the pipeline.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema describing the argument object.
    fn input_schema(&self) -> Value;

    /// Whether results may be served from the response cache.
    fn cacheable(&self) -> bool {
        true
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value>;
}

/// Name-indexed tool collection. Listing preserves registration order.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in tool.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        retrieval::register(&mut registry);
        documents::register(&mut registry);
        collections::register(&mut registry);
        conversations::register(&mut registry);
        graph::register(&mut registry);
        system::register(&mut registry);
        registry
    }

    /// Add a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.by_name.get(tool.name()) {
            Some(&idx) => self.tools[idx] = tool,
            None => {
                self.by_name.insert(tool.name(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&idx| &self.tools[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
