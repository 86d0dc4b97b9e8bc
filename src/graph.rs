//! # Reflexion Graph
//!
//! The control loop:
//!
//! ```text
//! Draft ──▶ ExecuteTools ──▶ Revise ──┬──▶ ExecuteTools   (rounds <= max_iterations)
//!                                     └──▶ Terminal
//! ```
//!
//! `rounds` counts completed tool-execution steps and is kept by the loop
//! itself. With the default bound of 2 a run makes at most
//! `max_iterations + 2` model calls and `max_iterations + 1` search batches.
//!
//! Steps run strictly one after another; each step's messages are appended
//! before the next step starts. Any error aborts the run and is reported
//! together with the state it happened in.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::actor::Actor;
use crate::conversation::Conversation;
use crate::correlator::Correlator;
use crate::error::{ReflexionError, RunFailure};
use crate::llm::LLMProvider;
use crate::schema::{Answer, AnswerKind};
use crate::tools::WebSearch;

/// Default loop bound.
pub const DEFAULT_MAX_ITERATIONS: usize = 2;

/// Default number of searches in flight within one batch.
pub const DEFAULT_SEARCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopState {
    Draft,
    ExecuteTools,
    Revise,
    Terminal,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Draft => "Draft",
            LoopState::ExecuteTools => "ExecuteTools",
            LoopState::Revise => "Revise",
            LoopState::Terminal => "Terminal",
        };
        f.write_str(name)
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub conversation: Conversation,
    /// The last answer produced; a revision unless the loop never revised.
    pub answer: Answer,
    pub model_calls: usize,
    pub search_batches: usize,
}

/// Per-run mutable state. Owned by one `run` call and never shared.
struct RunState {
    conversation: Conversation,
    answer: Option<Answer>,
    rounds: usize,
    model_calls: usize,
}

/// Sequences drafting, tool execution and revision for one question at a time.
///
/// The graph itself holds no per-run state, so one instance can serve
/// concurrent runs.
pub struct ReflexionGraph {
    actor: Actor,
    correlator: Correlator,
    max_iterations: usize,
}

impl ReflexionGraph {
    pub fn new(provider: Arc<dyn LLMProvider>, search: Arc<dyn WebSearch>) -> Self {
        Self {
            actor: Actor::new(provider),
            correlator: Correlator::new(search, DEFAULT_SEARCH_CONCURRENCY),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_search_concurrency(mut self, concurrency: usize) -> Self {
        self.correlator = self.correlator.with_concurrency(concurrency);
        self
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Answer `question`, refining it until the loop bound is reached.
    pub async fn run(&self, question: &str) -> Result<RunOutcome, RunFailure> {
        let mut run = RunState {
            conversation: Conversation::seeded(question),
            answer: None,
            rounds: 0,
            model_calls: 0,
        };
        let mut state = LoopState::Draft;

        info!(max_iterations = self.max_iterations, "Starting reflexion run");

        while state != LoopState::Terminal {
            debug!(%state, rounds = run.rounds, "Entering state");
            state = self
                .step(state, &mut run)
                .await
                .map_err(move |error| RunFailure::new(state, error))?;
        }

        let answer = run.answer.ok_or_else(|| {
            RunFailure::new(
                LoopState::Terminal,
                ReflexionError::InvalidState("run finished without an answer".to_string()),
            )
        })?;

        info!(
            model_calls = run.model_calls,
            search_batches = run.rounds,
            "Reflexion run complete"
        );

        Ok(RunOutcome {
            conversation: run.conversation,
            answer,
            model_calls: run.model_calls,
            search_batches: run.rounds,
        })
    }

    async fn step(
        &self,
        state: LoopState,
        run: &mut RunState,
    ) -> Result<LoopState, ReflexionError> {
        match state {
            LoopState::Draft => {
                let turn = self
                    .actor
                    .respond(&run.conversation, AnswerKind::Draft, true)
                    .await?;
                run.model_calls += 1;
                run.conversation.push(turn.message);
                run.answer = Some(turn.answer);
                Ok(LoopState::ExecuteTools)
            }
            LoopState::ExecuteTools => {
                let results = self.correlator.execute(&run.conversation).await?;
                run.conversation.extend(results);
                run.rounds += 1;
                info!(round = run.rounds, "Tool execution round complete");
                Ok(LoopState::Revise)
            }
            LoopState::Revise => {
                let continues = self.should_continue(run.rounds);
                let turn = self
                    .actor
                    .respond(&run.conversation, AnswerKind::Revise, continues)
                    .await?;
                run.model_calls += 1;
                run.conversation.push(turn.message);
                run.answer = Some(turn.answer);
                Ok(if continues {
                    LoopState::ExecuteTools
                } else {
                    LoopState::Terminal
                })
            }
            LoopState::Terminal => Ok(LoopState::Terminal),
        }
    }

    /// Whether another tool-execution step follows a revision made after
    /// `rounds` completed rounds.
    fn should_continue(&self, rounds: usize) -> bool {
        rounds <= self.max_iterations
    }
}
