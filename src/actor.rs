//! # Actor Module
//!
//! The draft/revise step. One call to [`Actor::respond`] is one model turn:
//! the researcher template for the round kind, the whole conversation, and a
//! single forced tool. The reply must contain exactly that one tool call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::conversation::{Conversation, Message};
use crate::error::ReflexionError;
use crate::llm::{LLMProvider, ModelRequest};
use crate::prompts::{actor_preamble, CLOSING_INSTRUCTION};
use crate::schema::{self, Answer, AnswerKind};

/// A validated model turn: the message to append and its decoded answer.
#[derive(Debug, Clone)]
pub struct ActorTurn {
    pub message: Message,
    pub answer: Answer,
}

/// Drafts and revises answers through an [`LLMProvider`].
pub struct Actor {
    provider: Arc<dyn LLMProvider>,
    clock: fn() -> DateTime<Utc>,
}

impl Actor {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            clock: Utc::now,
        }
    }

    /// Replace the clock used to stamp the preamble.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Run one model turn of the given kind.
    ///
    /// `require_queries` is set when a tool-execution step will follow, in
    /// which case an answer without search queries is a schema violation.
    /// The conversation is only read; appending the returned message is the
    /// caller's job.
    pub async fn respond(
        &self,
        conversation: &Conversation,
        kind: AnswerKind,
        require_queries: bool,
    ) -> Result<ActorTurn, ReflexionError> {
        if conversation.is_empty() {
            return Err(ReflexionError::InvalidState(
                "actor invoked on an empty conversation".to_string(),
            ));
        }

        let request = ModelRequest {
            preamble: actor_preamble(kind, (self.clock)()),
            history: conversation.messages(),
            closing_instruction: CLOSING_INSTRUCTION,
            forced_tool: kind.tool_definition(),
        };

        info!(
            provider = self.provider.name(),
            model = self.provider.model(),
            tool = %kind,
            history = conversation.len(),
            "Requesting model turn"
        );

        let message = self.provider.complete(&request).await?;
        if !matches!(message, Message::Model { .. }) {
            return Err(ReflexionError::InvalidState(
                "provider returned a non-model message".to_string(),
            ));
        }

        let call = match message.tool_calls() {
            [] => {
                return Err(ReflexionError::schema(
                    kind.tool_name(),
                    "model response contains no tool call",
                ))
            }
            [call] => call,
            calls => {
                return Err(ReflexionError::InvalidState(format!(
                    "expected exactly one {} call, model returned {}",
                    kind,
                    calls.len()
                )))
            }
        };

        let answer = schema::decode(call, kind, require_queries)?;
        debug!(
            tool_call_id = %call.id,
            queries = answer.search_queries().len(),
            references = answer.references().len(),
            "Decoded model answer"
        );

        Ok(ActorTurn { message, answer })
    }
}
