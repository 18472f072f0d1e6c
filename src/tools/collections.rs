//! Collection tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::args::{object_schema, optional_str, path_id, required_str, u64_or};
use super::{Tool, ToolContext, ToolRegistry};
use crate::Result;

pub(super) fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(ListCollections));
    registry.register(Arc::new(GetCollection));
    registry.register(Arc::new(CreateCollection));
    registry.register(Arc::new(UpdateCollection));
    registry.register(Arc::new(DeleteCollection));
}

fn collection_id_schema() -> Value {
    object_schema(
        json!({"collection_id": {"type": "string"}}),
        &["collection_id"],
    )
}

/// Body with `name`/`description` set only when given.
fn collection_body(args: &Value) -> Result<Value> {
    let mut body = Map::new();
    if let Some(name) = optional_str(args, "name")? {
        body.insert("name".into(), json!(name));
    }
    if let Some(description) = optional_str(args, "description")? {
        body.insert("description".into(), json!(description));
    }
    Ok(Value::Object(body))
}

struct ListCollections;

#[async_trait]
impl Tool for ListCollections {
    fn name(&self) -> &'static str {
        "list_collections"
    }

    fn description(&self) -> &'static str {
        "List collections."
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
        ctx.client.get("/v3/collections", Some(&params)).await
    }
}

struct GetCollection;

#[async_trait]
impl Tool for GetCollection {
    fn name(&self) -> &'static str {
        "get_collection"
    }

    fn description(&self) -> &'static str {
        "Fetch collection details."
    }

    fn input_schema(&self) -> Value {
        collection_id_schema()
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let id = path_id(args, "collection_id")?;
        ctx.client.get(&format!("/v3/collections/{id}"), None).await
    }
}

struct CreateCollection;

#[async_trait]
impl Tool for CreateCollection {
    fn name(&self) -> &'static str {
        "create_collection"
    }

    fn description(&self) -> &'static str {
        "Create a collection."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "name": {"type": "string"},
                "description": {"type": "string"}
            }),
            &["name"],
        )
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        required_str(args, "name")?;
        ctx.client
            .post("/v3/collections", &collection_body(args)?)
            .await
    }
}

struct UpdateCollection;

#[async_trait]
impl Tool for UpdateCollection {
    fn name(&self) -> &'static str {
        "update_collection"
    }

    fn description(&self) -> &'static str {
        "Update a collection's name or description."
    }

    fn input_schema(&self) -> Value {
        object_schema(
            json!({
                "collection_id": {"type": "string"},
                "name": {"type": "string"},
                "description": {"type": "string"}
            }),
            &["collection_id"],
        )
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let id = path_id(args, "collection_id")?;
        ctx.client
            .post(&format!("/v3/collections/{id}"), &collection_body(args)?)
            .await
    }
}

struct DeleteCollection;

#[async_trait]
impl Tool for DeleteCollection {
    fn name(&self) -> &'static str {
        "delete_collection"
    }

    fn description(&self) -> &'static str {
        "Delete a collection."
    }

    fn input_schema(&self) -> Value {
        collection_id_schema()
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let id = path_id(args, "collection_id")?;
        ctx.client.delete(&format!("/v3/collections/{id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_omits_absent_fields() {
        assert_eq!(collection_body(&json!({})).unwrap(), json!({}));
        assert_eq!(
            collection_body(&json!({"name": "n", "description": ""})).unwrap(),
            json!({"name": "n"})
        );
    }
}
