//! Conversation tools.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::args::{object_schema, path_id, u64_or};
use super::{Tool, ToolContext, ToolRegistry};
use crate::Result;

pub(super) fn register(registry: &mut ToolRegistry) {
    registry.register(Arc::new(ListConversations));
    registry.register(Arc::new(GetConversation));
    registry.register(Arc::new(DeleteConversation));
    registry.register(Arc::new(ConversationAnalysis));
}

fn conversation_id_schema() -> Value {
    object_schema(
        json!({"conversation_id": {"type": "string"}}),
        &["conversation_id"],
    )
}

struct ListConversations;

#[async_trait]
impl Tool for ListConversations {
    fn name(&self) -> &'static str {
        "list_conversations"
    }

    fn description(&self) -> &'static str {
        "List conversations."
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
        ctx.client.get("/v3/conversations", Some(&params)).await
    }
}

struct GetConversation;

#[async_trait]
impl Tool for GetConversation {
    fn name(&self) -> &'static str {
        "get_conversation"
    }

    fn description(&self) -> &'static str {
        "Fetch a conversation and its messages."
    }

    fn input_schema(&self) -> Value {
        conversation_id_schema()
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let id = path_id(args, "conversation_id")?;
        ctx.client
            .get(&format!("/v3/conversations/{id}"), None)
            .await
    }
}

struct DeleteConversation;

#[async_trait]
impl Tool for DeleteConversation {
    fn name(&self) -> &'static str {
        "delete_conversation"
    }

    fn description(&self) -> &'static str {
        "Delete a conversation."
    }

    fn input_schema(&self) -> Value {
        conversation_id_schema()
    }

    fn cacheable(&self) -> bool {
        false
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let id = path_id(args, "conversation_id")?;
        ctx.client.delete(&format!("/v3/conversations/{id}")).await
    }
}

/// Messages of a conversation response.
///
/// Accepts `results.messages`, or `results` itself when it is a list.
/// Entries wrapped as `{"message": {...}}` are unwrapped.
fn messages(response: &Value) -> Vec<&Value> {
    let results = &response["results"];
    let list = results
        .get("messages")
        .and_then(Value::as_array)
        .or_else(|| results.as_array());
    list.map(|items| {
        items
            .iter()
            .map(|m| m.get("message").filter(|inner| inner.is_object()).unwrap_or(m))
            .collect()
    })
    .unwrap_or_default()
}

/// Message count, distinct roles and mean content length.
pub(crate) fn analyze(conversation_id: &str, response: &Value) -> Value {
    let messages = messages(response);
    let participants: BTreeSet<&str> = messages
        .iter()
        .map(|m| m.get("role").and_then(Value::as_str).unwrap_or("unknown"))
        .collect();
    let total_length: usize = messages
        .iter()
        .map(|m| {
            m.get("content")
                .and_then(Value::as_str)
                .map_or(0, |c| c.chars().count())
        })
        .sum();
    let avg_message_length = if messages.is_empty() {
        0.0
    } else {
        total_length as f64 / messages.len() as f64
    };

    json!({
        "conversation_id": conversation_id,
        "message_count": messages.len(),
        "participants": participants,
        "avg_message_length": avg_message_length,
    })
}

struct ConversationAnalysis;

#[async_trait]
impl Tool for ConversationAnalysis {
    fn name(&self) -> &'static str {
        "conversation_analysis"
    }

    fn description(&self) -> &'static str {
        "Summarise a conversation: message count, participants and average message length."
    }

    fn input_schema(&self) -> Value {
        conversation_id_schema()
    }

    async fn call(&self, ctx: &ToolContext, args: &Value) -> Result<Value> {
        let id = path_id(args, "conversation_id")?;
        let response = ctx
            .client
            .get(&format!("/v3/conversations/{id}"), None)
            .await?;
        Ok(analyze(&id, &response))
    }
}
