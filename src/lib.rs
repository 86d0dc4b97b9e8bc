//! # Reflexion Agent
//!
//! Iterative answer refinement: a draft answer to a question is produced
//! with a self-critique and search queries, the queries are run against a web
//! search engine, and the answer is revised with citations. Revision and
//! search alternate for a bounded number of rounds.
//!
//! ```text
//! question ─▶ Draft ─▶ ExecuteTools ─▶ Revise ─┬─▶ ExecuteTools ─▶ Revise ...
//!                                              └─▶ final answer + References
//! ```
//!
//! ## Quick Start
//! ```rust,ignore
//! let config = Config::from_env()?;
//! let graph = ReflexionGraph::new(build_provider(&config), build_search(&config)?)
//!     .with_max_iterations(config.max_iterations);
//! let outcome = graph.run("What is the Rust borrow checker?").await?;
//! println!("{}", outcome.answer.render());
//! ```

pub mod actor;
pub mod config;
pub mod conversation;
pub mod correlator;
pub mod error;
pub mod graph;
pub mod llm;
pub mod prompts;
pub mod schema;
pub mod tools;

pub use actor::{Actor, ActorTurn};
pub use config::{Config, Provider, SearchBackend};
pub use conversation::{Conversation, Message, ToolCall};
pub use correlator::{Correlator, QueryOutcome, ResultMapping};
pub use error::{ReflexionError, RunFailure};
pub use graph::{LoopState, ReflexionGraph, RunOutcome};
pub use llm::{build_provider, LLMProvider, ModelRequest, ToolDefinition};
pub use schema::{Answer, AnswerKind, AnswerQuestion, Reflection, ReviseAnswer};
pub use tools::{build_search, SearchError, SearchResult, WebSearch};
