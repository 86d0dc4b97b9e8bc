//! LLM Provider trait definition

use async_trait::async_trait;

use super::ToolDefinition;
use crate::conversation::Message;
use crate::error::ReflexionError;

/// One model turn: system preamble, full history, closing instruction and
/// the single tool the model must call.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub preamble: String,
    pub history: &'a [Message],
    pub closing_instruction: &'a str,
    pub forced_tool: ToolDefinition,
}

/// Provider-agnostic completion interface.
///
/// Implementations return the model's reply as a [`Message::Model`]. They do
/// not validate the reply against the forced tool; the actor does. Transport
/// and authentication failures map to [`ReflexionError::ModelUnavailable`]
/// and are not retried here.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: &ModelRequest<'_>) -> Result<Message, ReflexionError>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model identifier for logging
    fn model(&self) -> &str;
}
