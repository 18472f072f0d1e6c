//! Document tools.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::args::{object_schema, path_id, str_or, string_list, u64_or};
use super::{Tool, ToolContext, ToolRegistry};
use crate::client::R2rClient;
use crate::{R2rError, Result, timestamp};

pub(super) fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(ListDocuments));
    registry.register(Arc::new(GetDocument));
    registry.register(Arc::new(DeleteDocument));
    registry.register(Arc::new(BatchDocumentAnalysis));
}

fn document_id_schema() -> Value {
    object_schema(
        json!({"document_id": {"type": "string"}}),
        &["document_id"],
    )
}

struct ListDocuments;

#[async_trait]
impl Tool for ListDocuments {
    fn name(&self) -> &'static str {
        "list_documents"
    }

    fn description(&self) -> &'static str {
        "List documents in the knowledge base."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "limit": {"type": "integer", "minimum": 1, "default": 10},
                "offset": {"type": "integer", "minimum": 0, "default": 0}
            }),
            &[],
        )
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let params = json!({
            "limit": u64_or(args, "limit", 10)?,
            "offset": u64_or(args, "offset", 0)?,
        });
        ctx.client.get("/v3/documents", Some(&params)).await
    }
}

struct GetDocument;

#[async_trait]
impl Tool for GetDocument {
    fn name(&self) -> &'static str {
        "get_document"
    }

    fn description(&self) -> &'static str {
        "Fetch a document's metadata."
    }

    fn input_schema(&self) -> Value {
        document_id_schema()
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let id = path_id(args, "document_id")?;
        ctx.client.get(&format!("/v3/documents/{id}"), None).await
    }
}

struct DeleteDocument;

#[async_trait]
impl Tool for DeleteDocument {
    fn name(&self) -> &'static str {
        "delete_document"
    }

    fn description(&self) -> &'static str {
        "Delete a document."
    }

    fn input_schema(&self) -> Value {
        document_id_schema()
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let id = path_id(args, "document_id")?;
        ctx.client.delete(&format!("/v3/documents/{id}")).await
    }
}

/// Summary of one document, or the error that prevented fetching it.
async fn summarize_document(client: &R2rClient, id: &str) -> Value {
    let fetched = if id.is_empty() || id.contains(['/', '?', '#']) {
        Err(R2rError::InvalidArgument(format!(
            "not a valid document id: {id:?}"
        )))
    } else {
        client.get(&format!("/v3/documents/{id}"), None).await
    };
    match fetched {
        Ok(doc) => {
            let data = &doc["results"];
            json!({
                "id": id,
                "title": data.get("title").and_then(Value::as_str).unwrap_or("Untitled"),
                "status": data.get("ingestion_status").cloned().unwrap_or(Value::Null),
                "size": data.get("size_in_bytes").and_then(Value::as_u64).unwrap_or(0),
            })
        }
        Err(e) => {
            warn!(document_id = id, error = %e, "document analysis failed");
            json!({"id": id, "error": e.to_string()})
        }
    }
}

struct BatchDocumentAnalysis;

#[async_trait]
impl Tool for BatchDocumentAnalysis {
    fn name(&self) -> &'static str {
        "batch_document_analysis"
    }

    fn description(&self) -> &'static str {
        "Fetch several documents concurrently and summarise each, reporting failures inline."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "document_ids": {"type": "array", "items": {"type": "string"}},
                "analysis_type": {"type": "string", "default": "summary"}
            }),
            &["document_ids"],
        )
    }

    /// Per-document failures come back inside an `Ok` result, so caching
    /// would keep serving them until the TTL expires.
    fn cacheable(&self) -> bool {
        false
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let ids = string_list(args, "document_ids")?.ok_or_else(|| {
            R2rError::InvalidArgument("missing required argument `document_ids`".into())
        })?;
        let analysis_type = str_or(args, "analysis_type", "summary")?;

        let results = join_all(ids.iter().map(|id| summarize_document(&ctx.client, id))).await;
        let failed = results.iter().filter(|r| r.get("error").is_some()).count();
        let successful = results.len() - failed;
        info!(
            total = ids.len(),
            successful,
            failed,
            analysis_type = %analysis_type,
            "batch analysis complete"
        );

        Ok(json!({
            "analysis_type": analysis_type,
            "total_documents": ids.len(),
            "successful": successful,
            "failed": failed,
            "results": results,
            "timestamp": timestamp(),
        }))
    }
}
