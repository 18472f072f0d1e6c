//! Read-only resources addressed by `r2r://` URIs.
//!
//! Two static resources describe the server itself; two templates proxy
//! upstream lookups. Every resource reads as a JSON document.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};

use crate::client::R2rClient;
use crate::config::Config;
use crate::version::version_string;
use crate::{R2rError, Result, timestamp};

const SCHEME: &str = "r2r://";
const JSON_MIME: &str = "application/json";

/// A concrete resource, as listed by `resources/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

/// A parameterised resource, as listed by `resources/templates/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

pub fn static_resources() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor {
            uri: "r2r://server/stats",
            name: "server_statistics",
            description: "Server identity, uptime and upstream URL.",
            mime_type: JSON_MIME,
        },
        ResourceDescriptor {
            uri: "r2r://config",
            name: "server_configuration",
            description: "Effective configuration (API key presence only).",
            mime_type: JSON_MIME,
        },
    ]
}

pub fn templates() -> Vec<ResourceTemplate> {
    vec![
        ResourceTemplate {
            uri_template: "r2r://collection/{collection_id}/info",
            name: "collection_info",
            description: "Collection details fetched from R2R.",
            mime_type: JSON_MIME,
        },
        ResourceTemplate {
            uri_template: "r2r://document/{document_id}/summary",
            name: "document_summary",
            description: "Title, size, status and collection count of a document.",
            mime_type: JSON_MIME,
        },
    ]
}

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceTarget {
    ServerStats,
    Config,
    CollectionInfo(String),
    DocumentSummary(String),
}

impl ResourceTarget {
    pub fn parse(uri: &str) -> Result<Self> {
        let unknown = || R2rError::NotFound(format!("Unknown resource: {uri}"));
        let rest = uri.strip_prefix(SCHEME).ok_or_else(unknown)?;
        let segments: Vec<&str> = rest.split('/').collect();
        match segments.as_slice() {
            ["server", "stats"] => Ok(Self::ServerStats),
            ["config"] => Ok(Self::Config),
            ["collection", id, "info"] if !id.is_empty() => Ok(Self::CollectionInfo(id.to_string())),
            ["document", id, "summary"] if !id.is_empty() => {
                Ok(Self::DocumentSummary(id.to_string()))
            }
            _ => Err(unknown()),
        }
    }
}

/// What resource reads may consult.
pub struct ResourceEnv<'a> {
    pub client: &'a R2rClient,
    pub config: &'a Config,
    pub uptime: Duration,
}

pub async fn read(target: &ResourceTarget, env: &ResourceEnv<'_>) -> Result<Value> {
    match target {
        ResourceTarget::ServerStats => Ok(json!({
            "server": version_string(),
            "uptime_secs": env.uptime.as_secs(),
            "r2r_url": env.client.base_url(),
            "timestamp": timestamp(),
        })),
        ResourceTarget::Config => Ok(config_document(env.config)),
        ResourceTarget::CollectionInfo(id) => {
            env.client
                .get(&format!("/v3/collections/{id}"), None)
                .await
        }
        ResourceTarget::DocumentSummary(id) => {
            let doc = env
                .client
                .get(&format!("/v3/documents/{id}"), None)
                .await?;
            Ok(document_summary(id, &doc))
        }
    }
}

fn config_document(config: &Config) -> Value {
    let middleware = &config.middleware;
    json!({
        "r2r_base_url": config.upstream.base_url,
        "api_key_configured": config.upstream.api_key.is_some(),
        "timeout": config.upstream.timeout_secs,
        "max_retries": middleware.max_retries,
        "rate_limit_per_minute": middleware.rate_limit_per_minute,
        "cache_ttl": middleware.cache_ttl_secs,
        "cache_max_entries": middleware.cache_max_entries,
        "features": {
            "middleware": true,
            "caching": true,
            "rate_limiting": true,
        },
    })
}

pub(crate) fn document_summary(id: &str, response: &Value) -> Value {
    let doc = &response["results"];
    json!({
        "id": id,
        "title": doc.get("title").and_then(Value::as_str).unwrap_or("Untitled"),
        "size_bytes": doc.get("size_in_bytes").and_then(Value::as_u64).unwrap_or(0),
        "status": doc.get("ingestion_status").and_then(Value::as_str).unwrap_or("unknown"),
        "collections": doc
            .get("collection_ids")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
    })
}
