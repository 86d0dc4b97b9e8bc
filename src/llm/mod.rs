//! LLM boundary for the actor.
//!
//! ```text
//! Actor ──ModelRequest──▶ LLMProvider (trait) ──▶ RigProvider<M> ──▶ OpenAI / Ollama
//! ```
//!
//! The actor never sees provider types. Each request carries exactly one tool
//! definition, and the provider is expected to force the model to call it.

mod provider;
mod rig_adapter;

pub use provider::{LLMProvider, ModelRequest};
pub use rig_adapter::{build_provider, RigProvider};

use serde::{Deserialize, Serialize};

/// A tool offered to the model: name, description and JSON Schema parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}
