//! # Conversation Module
//!
//! The append-only message history owned by a single run.
//!
//! A [`Conversation`] is created with the seed question, grows through
//! Draft → ExecuteTools → Revise → (ExecuteTools → Revise)*, and is dropped
//! at the end of the run. There is no removal or reordering API.

use serde::{Deserialize, Serialize};

/// A tool invocation requested by the model.
///
/// `id` is the correlation token linking this request to its
/// [`Message::ToolResult`]. It is opaque and only meaningful within the run
/// that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Model {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        correlation_id: String,
        content: String,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Model {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool_result(correlation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            correlation_id: correlation_id.into(),
            content: content.into(),
        }
    }

    /// Tool calls carried by a model message; empty for every other kind.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Model { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }
}

/// Ordered, append-only message history for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a conversation containing exactly the seed question.
    pub fn seeded(question: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(question)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn tool_result_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_tool_result()).count()
    }
}
