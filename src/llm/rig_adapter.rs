//! Rig-backed [`LLMProvider`].
//!
//! Wraps a Rig `Agent<M>` and uses its completion request builder directly,
//! so the tool call comes back to us instead of being executed by Rig's
//! multi-turn prompt loop. The forced tool is the only tool sent and
//! `tool_choice` is `required`, which pins the model to it.

use std::sync::Arc;

use async_trait::async_trait;
use rig::agent::Agent;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::{Completion, CompletionModel, Message as RigMessage};
use rig::completion::ToolDefinition as RigToolDefinition;
use rig::message::{AssistantContent, ToolChoice};
use rig::providers::{ollama, openai};
use rig::OneOrMany;
use tracing::debug;

use super::{LLMProvider, ModelRequest, ToolDefinition};
use crate::config::{Config, Provider};
use crate::conversation::{Message, ToolCall};
use crate::error::ReflexionError;

/// Adapter from a Rig agent to [`LLMProvider`].
pub struct RigProvider<M>
where
    M: CompletionModel + Send + Sync,
{
    agent: Arc<Agent<M>>,
    provider_name: String,
    model_name: String,
}

impl<M> RigProvider<M>
where
    M: CompletionModel + Send + Sync,
{
    pub fn new(
        agent: Agent<M>,
        provider_name: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            agent: Arc::new(agent),
            provider_name: provider_name.into(),
            model_name: model_name.into(),
        }
    }
}

#[async_trait]
impl<M> LLMProvider for RigProvider<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    async fn complete(&self, request: &ModelRequest<'_>) -> Result<Message, ReflexionError> {
        let unavailable = |e: rig::completion::CompletionError| {
            ReflexionError::ModelUnavailable(format!(
                "{} completion failed: {}",
                self.provider_name, e
            ))
        };

        let history = to_rig_history(request.history);
        // Rig history has no system role after the preamble, so the closing
        // reminder goes last as the user prompt.
        let prompt = RigMessage::user(request.closing_instruction);

        debug!(
            provider = %self.provider_name,
            model = %self.model_name,
            tool = %request.forced_tool.name,
            history = history.len(),
            "Sending completion request"
        );

        let response = self
            .agent
            .completion(prompt, history)
            .await
            .map_err(unavailable)?
            .preamble(request.preamble.clone())
            .tools(vec![to_rig_tool(&request.forced_tool)])
            .tool_choice(ToolChoice::Required)
            .send()
            .await
            .map_err(unavailable)?;

        Ok(message_from_choice(&response.choice))
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}

impl<M> std::fmt::Debug for RigProvider<M>
where
    M: CompletionModel + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigProvider")
            .field("provider_name", &self.provider_name)
            .field("model_name", &self.model_name)
            .finish()
    }
}

/// Build the configured provider.
///
/// Rig's clients read their credentials from the environment
/// (`OPENAI_API_KEY`, `OLLAMA_API_BASE_URL`).
pub fn build_provider(config: &Config) -> Arc<dyn LLMProvider> {
    match config.provider {
        Provider::OpenAI => {
            let client = openai::Client::from_env();
            let mut builder = client.agent(config.model());
            if let Some(temperature) = config.temperature {
                builder = builder.temperature(temperature);
            }
            Arc::new(RigProvider::new(builder.build(), "openai", config.model()))
        }
        Provider::Ollama => {
            std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);
            let client = ollama::Client::from_env();
            let mut builder = client.agent(config.model());
            if let Some(temperature) = config.temperature {
                builder = builder.temperature(temperature);
            }
            Arc::new(RigProvider::new(builder.build(), "ollama", config.model()))
        }
    }
}

fn to_rig_history(messages: &[Message]) -> Vec<RigMessage> {
    messages
        .iter()
        .map(|message| match message {
            Message::User { content } => RigMessage::user(content.clone()),
            Message::Model {
                content,
                tool_calls,
            } => to_rig_assistant(content, tool_calls),
            Message::ToolResult {
                correlation_id,
                content,
            } => RigMessage::tool_result(correlation_id.clone(), content.clone()),
        })
        .collect()
}

fn to_rig_assistant(content: &str, tool_calls: &[ToolCall]) -> RigMessage {
    let mut contents = Vec::new();
    if !content.is_empty() {
        contents.push(AssistantContent::text(content));
    }
    for call in tool_calls {
        contents.push(AssistantContent::tool_call(
            call.id.clone(),
            call.name.clone(),
            call.arguments.clone(),
        ));
    }

    let content = OneOrMany::many(contents)
        .unwrap_or_else(|_| OneOrMany::one(AssistantContent::text("")));
    RigMessage::Assistant { id: None, content }
}

fn to_rig_tool(tool: &ToolDefinition) -> RigToolDefinition {
    RigToolDefinition {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: tool.parameters.clone(),
    }
}

fn message_from_choice(choice: &OneOrMany<AssistantContent>) -> Message {
    let mut text = Vec::new();
    let mut tool_calls = Vec::new();

    for item in choice.iter() {
        match item {
            AssistantContent::Text(part) => text.push(part.text.clone()),
            AssistantContent::ToolCall(call) => tool_calls.push(ToolCall::new(
                call.id.clone(),
                call.function.name.clone(),
                call.function.arguments.clone(),
            )),
            _ => {}
        }
    }

    Message::model(text.join(""), tool_calls)
}
