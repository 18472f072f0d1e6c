//! Search, RAG and agent tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::info;

use super::args::{f64_or, object_schema, optional_str, required_str, str_or, string_list, u64_or};
use super::{Tool, ToolContext, ToolRegistry};
use crate::{Result, timestamp};

/// Number of hits requested upstream before score filtering.
pub const SMART_SEARCH_FETCH_LIMIT: u64 = 20;

pub(super) fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(Search));
    registry.register(Arc::new(Rag));
    registry.register(Arc::new(Agent));
    registry.register(Arc::new(SmartCollectionSearch));
}

/// Chunk hits inside a search response (`results.chunk_search_results`).
pub fn chunk_results(response: &Value) -> &[Value] {
    response
        .pointer("/results/chunk_search_results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Keep hits whose `score` is at least `min_score`, in original order.
///
/// Hits without a numeric score are treated as scoring 0.
pub fn filter_by_score(results: &[Value], min_score: f64) -> Vec<Value> {
    results
        .iter()
        .filter(|r| r.get("score").and_then(Value::as_f64).unwrap_or(0.0) >= min_score)
        .cloned()
        .collect()
}

struct Search;

#[async_trait]
impl Tool for Search {
    fn name(&self) -> &'static str {
        "search"
    }

    fn description(&self) -> &'static str {
        "Search the R2R knowledge base using vector, hybrid or keyword retrieval."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "query": {"type": "string", "description": "Search query"},
                "limit": {"type": "integer", "minimum": 1, "default": 10},
                "strategy": {
                    "type": "string",
                    "description": "Retrieval strategy; \"hybrid\" enables hybrid search",
                    "default": "hybrid"
                }
            }),
            &["query"],
        )
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let query = required_str(args, "query")?;
        let limit = u64_or(args, "limit", 10)?;
        let strategy = str_or(args, "strategy", "hybrid")?;

        let payload = json!({
            "query": query,
            "limit": limit,
            "search_settings": {
                "use_hybrid_search": strategy == "hybrid",
                "search_strategy": strategy,
                "filters": {}
            }
        });
        let result = ctx.client.post("/v3/retrieval/search", &payload).await?;
        info!(query = %query, hits = chunk_results(&result).len(), "search completed");

        Ok(json!({
            "query": query,
            "strategy": strategy,
            "results": result,
            "timestamp": timestamp(),
        }))
    }
}

struct Rag;

#[async_trait]
impl Tool for Rag {
    fn name(&self) -> &'static str {
        "rag"
    }

    fn description(&self) -> &'static str {
        "Answer a question with retrieval-augmented generation over the knowledge base."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "query": {"type": "string"},
                "max_tokens": {"type": "integer", "minimum": 1, "default": 4000}
            }),
            &["query"],
        )
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let query = required_str(args, "query")?;
        let max_tokens = u64_or(args, "max_tokens", 4000)?;

        let payload = json!({
            "query": query,
            "search_settings": {"use_hybrid_search": true},
            "rag_generation_config": {"max_tokens_to_sample": max_tokens}
        });
        let result = ctx.client.post("/v3/retrieval/rag", &payload).await?;

        Ok(json!({
            "query": query,
            "result": result,
            "timestamp": timestamp(),
        }))
    }
}

struct Agent;

#[async_trait]
impl Tool for Agent {
    fn name(&self) -> &'static str {
        "agent"
    }

    fn description(&self) -> &'static str {
        "Send a message to the R2R agent, optionally continuing an existing conversation."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "message": {"type": "string"},
                "conversation_id": {"type": "string"},
                "max_tokens": {"type": "integer", "minimum": 1, "default": 4000}
            }),
            &["message"],
        )
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let message = required_str(args, "message")?;
        let max_tokens = u64_or(args, "max_tokens", 4000)?;

        let mut payload = Map::new();
        payload.insert("message".into(), json!(message));
        payload.insert(
            "rag_generation_config".into(),
            json!({"max_tokens_to_sample": max_tokens}),
        );
        if let Some(conversation_id) = optional_str(args, "conversation_id")? {
            payload.insert("conversation_id".into(), json!(conversation_id));
        }

        ctx.client
            .post("/v3/retrieval/agent", &Value::Object(payload))
            .await
    }
}

struct SmartCollectionSearch;

#[async_trait]
impl Tool for SmartCollectionSearch {
    fn name(&self) -> &'static str {
        "smart_collection_search"
    }

    fn description(&self) -> &'static str {
        "Hybrid search scoped to collections, keeping only hits above a score threshold."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "query": {"type": "string"},
                "collection_ids": {"type": "array", "items": {"type": "string"}},
                "min_score": {"type": "number", "default": 0.7},
                "max_results": {"type": "integer", "minimum": 1, "default": 10}
            }),
            &["query"],
        )
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let query = required_str(args, "query")?;
        let collection_ids = string_list(args, "collection_ids")?.unwrap_or_default();
        let min_score = f64_or(args, "min_score", 0.7)?;
        let max_results = u64_or(args, "max_results", 10)? as usize;

        let mut filters = Map::new();
        if !collection_ids.is_empty() {
            filters.insert(
                "collection_ids".into(),
                json!({"$overlap": collection_ids}),
            );
        }
        let payload = json!({
            "query": query,
            "limit": SMART_SEARCH_FETCH_LIMIT,
            "search_settings": {
                "use_hybrid_search": true,
                "search_strategy": "hybrid",
                "filters": filters
            }
        });
        let response = ctx.client.post("/v3/retrieval/search", &payload).await?;

        let results = chunk_results(&response);
        let mut filtered = filter_by_score(results, min_score);
        let after_filtering = filtered.len();
        filtered.truncate(max_results);
        info!(
            query = %query,
            kept = after_filtering,
            found = results.len(),
            min_score,
            "smart search filtered"
        );

        Ok(json!({
            "query": query,
            "total_found": results.len(),
            "after_filtering": after_filtering,
            "min_score": min_score,
            "collections": collection_ids,
            "results": filtered,
            "timestamp": timestamp(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keeps_order_and_threshold() {
        let results = vec![
            json!({"id": "a", "score": 0.9}),
            json!({"id": "b", "score": 0.5}),
            json!({"id": "c", "score": 0.8}),
        ];
        let kept = filter_by_score(&results, 0.7);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0]["id"], "a");
        assert_eq!(kept[1]["id"], "c");
    }

    #[test]
    fn filter_is_inclusive_and_treats_missing_score_as_zero() {
        let results = vec![json!({"score": 0.7}), json!({"id": "no-score"})];
        assert_eq!(filter_by_score(&results, 0.7).len(), 1);
        assert_eq!(filter_by_score(&results, 0.0).len(), 2);
    }

    #[test]
    fn chunk_results_tolerates_missing_fields() {
        assert!(chunk_results(&json!({})).is_empty());
        assert!(chunk_results(&json!({"results": []})).is_empty());
        let response = json!({"results": {"chunk_search_results": [{"score": 1.0}]}});
        assert_eq!(chunk_results(&response).len(), 1);
    }
}
