//! Knowledge-graph tools.
//!
//! `graph_exploration` walks the graph breadth-first from a seed entity.
//! Each visited node costs two upstream calls (entity details, outgoing
//! relationships). The walk never revisits a node, never enqueues a node
//! deeper than `max_depth`, and stops visiting once `max_nodes` nodes have
//! been seen.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::args::{object_schema, optional_str, path_id, required_str, u64_or};
use super::{Tool, ToolContext, ToolRegistry};
use crate::Result;
use crate::client::R2rClient;

pub(super) fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(KnowledgeGraphQuery));
    registry.register(Arc::new(GraphExploration));
}

fn results(response: &Value) -> Vec<Value> {
    response
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Where the explorer reads entities and relationships from.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Details of `name`, if the graph knows it.
    async fn entity(&self, name: &str) -> Result<Option<Value>>;

    /// Relationships touching `name`.
    async fn relationships(&self, name: &str) -> Result<Vec<Value>>;
}

/// [`GraphSource`] backed by one collection's upstream graph.
pub struct UpstreamGraph<'a> {
    client: &'a R2rClient,
    collection_id: &'a str,
}

impl<'a> UpstreamGraph<'a> {
    pub fn new(client: &'a R2rClient, collection_id: &'a str) -> Self {
        Self {
            client,
            collection_id,
        }
    }
}

#[async_trait]
impl GraphSource for UpstreamGraph<'_> {
    async fn entity(&self, name: &str) -> Result<Option<Value>> {
        let params = json!({"entity_names": name, "limit": 1, "offset": 0});
        let response = self
            .client
            .get(
                &format!("/v3/graphs/{}/entities", self.collection_id),
                Some(&params),
            )
            .await?;
        Ok(results(&response).into_iter().next())
    }

    async fn relationships(&self, name: &str) -> Result<Vec<Value>> {
        let params = json!({"entity_names": name, "limit": 10, "offset": 0});
        let response = self
            .client
            .get(
                &format!("/v3/graphs/{}/relationships", self.collection_id),
                Some(&params),
            )
            .await?;
        Ok(results(&response))
    }
}

/// Target entity of a relationship: `target_entity`, else `object`.
pub fn relationship_target(relationship: &Value) -> Option<&str> {
    ["target_entity", "object"]
        .iter()
        .find_map(|key| relationship.get(*key).and_then(Value::as_str))
        .filter(|target| !target.is_empty())
}

/// Outcome of a bounded walk.
#[derive(Debug, Clone, Default)]
pub struct Exploration {
    /// Visited entity names, in visit order.
    pub visited: Vec<String>,
    pub entities: Map<String, Value>,
    pub relationships: Vec<Value>,
}

/// Breadth-first walk from `start`.
pub async fn explore(
    source: &dyn GraphSource,
    start: &str,
    max_depth: u64,
    max_nodes: usize,
) -> Result<Exploration> {
    let mut out = Exploration::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut frontier: VecDeque<(String, u64)> = VecDeque::from([(start.to_string(), 0)]);

    while let Some((name, depth)) = frontier.pop_front() {
        if out.visited.len() >= max_nodes {
            break;
        }
        if !seen.insert(name.clone()) {
            continue;
        }
        out.visited.push(name.clone());
        debug!(entity = %name, depth, "exploring");

        if let Some(entity) = source.entity(&name).await? {
            out.entities.insert(name.clone(), entity);
        }
        for relationship in source.relationships(&name).await? {
            if depth < max_depth {
                if let Some(target) = relationship_target(&relationship) {
                    if !seen.contains(target) {
                        frontier.push_back((target.to_string(), depth + 1));
                    }
                }
            }
            out.relationships.push(relationship);
        }
    }

    Ok(out)
}

struct KnowledgeGraphQuery;

#[async_trait]
impl Tool for KnowledgeGraphQuery {
    fn name(&self) -> &'static str {
        "knowledge_graph_query"
    }

    fn description(&self) -> &'static str {
        "Fetch a collection's graph entities, relationships and communities in one call."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "collection_id": {"type": "string"},
                "entity_name": {"type": "string", "description": "Entity to focus on"}
            }),
            &["collection_id"],
        )
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let collection_id = path_id(args, "collection_id")?;
        let entity_name = optional_str(args, "entity_name")?;

        let base = format!("/v3/graphs/{collection_id}");
        let entities_path = format!("{base}/entities");
        let relationships_path = format!("{base}/relationships");
        let communities_path = format!("{base}/communities");
        let fifty = json!({"limit": 50, "offset": 0});
        let twenty = json!({"limit": 20, "offset": 0});

        let (entities, relationships, communities) = tokio::try_join!(
            ctx.client.get(&entities_path, Some(&fifty)),
            ctx.client.get(&relationships_path, Some(&fifty)),
            ctx.client.get(&communities_path, Some(&twenty)),
        )?;
        let (entities, relationships, communities) = (
            results(&entities),
            results(&relationships),
            results(&communities),
        );

        Ok(json!({
            "collection_id": collection_id,
            "entity_filter": entity_name,
            "graph_stats": {
                "entity_count": entities.len(),
                "relationship_count": relationships.len(),
                "community_count": communities.len(),
            },
            "entities": entities,
            "relationships": relationships,
            "communities": communities,
        }))
    }
}

struct GraphExploration;

#[async_trait]
impl Tool for GraphExploration {
    fn name(&self) -> &'static str {
        "graph_exploration"
    }

    fn description(&self) -> &'static str {
        "Explore the knowledge graph breadth-first from a starting entity."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "collection_id": {"type": "string"},
                "start_entity": {"type": "string"},
                "max_depth": {"type": "integer", "minimum": 0, "default": 2},
                "max_nodes": {"type": "integer", "minimum": 1, "default": 50}
            }),
            &["collection_id", "start_entity"],
        )
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let collection_id = path_id(args, "collection_id")?;
        let start = required_str(args, "start_entity")?;
        let max_depth = u64_or(args, "max_depth", 2)?;
        let max_nodes = u64_or(args, "max_nodes", 50)? as usize;

        let graph = UpstreamGraph::new(&ctx.client, &collection_id);
        let walk = explore(&graph, &start, max_depth, max_nodes).await?;

        Ok(json!({
            "start_entity": start,
            "max_depth": max_depth,
            "nodes_found": walk.visited.len(),
            "entities": walk.entities,
            "relationships": walk.relationships,
            "exploration_complete": walk.visited.len() < max_nodes,
        }))
    }
}
