//! REST facade over the gateway.
//!
//! Every route maps onto a tool, resource or prompt and runs through the
//! same middleware pipeline as MCP calls, under the source `api-client`.

mod error;

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::gateway::Gateway;
use crate::version::{PKG_VERSION, SERVER_NAME};
use crate::{Result, timestamp};

pub use error::ApiError;

/// Rate-limit source for REST callers.
pub const API_SOURCE: &str = "api-client";
/// Request id embedded by prompts rendered over REST.
const API_REQUEST_ID: &str = "api-request";

type ApiResult = std::result::Result<Json<Value>, ApiError>;

/// Build the router with permissive CORS.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/capabilities", get(capabilities))
        .route("/search", post(search))
        .route("/rag", post(rag))
        .route("/batch-analysis", post(batch_analysis))
        .route("/smart-search", post(smart_search))
        .route("/stats", get(stats))
        .route("/cache/clear", post(clear_cache))
        .route("/resources/config", get(config_resource))
        .route("/resources/stats", get(stats_resource))
        .route("/resources/collections/:id", get(collection_resource))
        .route("/resources/documents/:id/summary", get(document_resource))
        .route("/prompts/:name", post(prompt))
        .with_state(gateway)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Bind `address` and serve until `shutdown` resolves.
pub async fn serve<F>(gateway: Arc<Gateway>, address: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn call(gateway: &Gateway, tool: &str, arguments: Value) -> ApiResult {
    Ok(Json(gateway.call_tool(tool, arguments, API_SOURCE).await?))
}

async fn root(State(gateway): State<Arc<Gateway>>) -> Json<Value> {
    Json(json!({
        "name": SERVER_NAME,
        "version": PKG_VERSION,
        "r2r_base_url": gateway.client().base_url(),
        "api_key_configured": gateway.client().has_api_key(),
        "endpoints": {
            "GET /": "This info",
            "GET /health": "Health check",
            "GET /capabilities": "Server capabilities",
            "POST /search": "Search",
            "POST /rag": "RAG query",
            "POST /batch-analysis": "Batch document analysis",
            "POST /smart-search": "Smart collection search",
            "GET /stats": "Performance statistics",
            "POST /cache/clear": "Clear cache",
            "GET /resources/config": "Configuration resource",
            "GET /resources/stats": "Server statistics resource",
            "GET /resources/collections/{id}": "Collection info resource",
            "GET /resources/documents/{id}/summary": "Document summary resource",
            "POST /prompts/{name}": "Render a prompt"
        },
        "timestamp": timestamp(),
    }))
}

async fn health(State(gateway): State<Arc<Gateway>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "r2r_base_url": gateway.client().base_url(),
        "api_key_configured": gateway.client().has_api_key(),
        "timestamp": timestamp(),
    }))
}

async fn capabilities(State(gateway): State<Arc<Gateway>>) -> ApiResult {
    call(&gateway, "get_server_capabilities", json!({})).await
}

async fn search(State(gateway): State<Arc<Gateway>>, Json(body): Json<Value>) -> ApiResult {
    call(&gateway, "search", body).await
}

async fn rag(State(gateway): State<Arc<Gateway>>, Json(body): Json<Value>) -> ApiResult {
    call(&gateway, "rag", body).await
}

async fn batch_analysis(
    State(gateway): State<Arc<Gateway>>,
    Json(body): Json<Value>,
) -> ApiResult {
    call(&gateway, "batch_document_analysis", body).await
}

async fn smart_search(State(gateway): State<Arc<Gateway>>, Json(body): Json<Value>) -> ApiResult {
    call(&gateway, "smart_collection_search", body).await
}

async fn stats(State(gateway): State<Arc<Gateway>>) -> ApiResult {
    call(&gateway, "get_performance_stats", json!({})).await
}

async fn clear_cache(State(gateway): State<Arc<Gateway>>) -> ApiResult {
    call(&gateway, "clear_cache", json!({})).await
}

async fn read(gateway: &Gateway, uri: &str) -> ApiResult {
    Ok(Json(gateway.read_resource(uri, API_SOURCE).await?))
}

async fn config_resource(State(gateway): State<Arc<Gateway>>) -> ApiResult {
    read(&gateway, "r2r://config").await
}

async fn stats_resource(State(gateway): State<Arc<Gateway>>) -> ApiResult {
    read(&gateway, "r2r://server/stats").await
}

async fn collection_resource(
    State(gateway): State<Arc<Gateway>>,
    Path(id): Path<String>,
) -> ApiResult {
    read(&gateway, &format!("r2r://collection/{id}/info")).await
}

async fn document_resource(
    State(gateway): State<Arc<Gateway>>,
    Path(id): Path<String>,
) -> ApiResult {
    read(&gateway, &format!("r2r://document/{id}/summary")).await
}

async fn prompt(
    State(gateway): State<Arc<Gateway>>,
    Path(name): Path<String>,
    body: Option<Json<Value>>,
) -> ApiResult {
    let arguments = body.map(|Json(v)| v).unwrap_or_else(|| json!({}));
    let rendered = gateway
        .get_prompt(&name, arguments, API_SOURCE, Some(API_REQUEST_ID))
        .await?;
    Ok(Json(rendered))
}
