//! # Error Module
//!
//! Error taxonomy for a reflexion run.
//!
//! Search failures are deliberately absent from [`ReflexionError`]: a failed
//! query is recorded as data inside the tool result (see `correlator`) and
//! never aborts a run. Everything here aborts the run it occurs in.

use thiserror::Error;

use crate::graph::LoopState;

/// Errors raised by the actor, correlator and control loop.
#[derive(Error, Debug)]
pub enum ReflexionError {
    /// The model output does not conform to the forced tool schema.
    #[error("Schema validation failed for {tool}: {reason}")]
    SchemaValidation { tool: String, reason: String },

    /// Transport or authentication failure at the inference boundary.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Internal contract violation. Not user-recoverable.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ReflexionError {
    pub fn schema(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaValidation {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Short, stable name of the error kind for user-facing reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SchemaValidation { .. } => "SchemaValidationError",
            Self::ModelUnavailable(_) => "ModelUnavailableError",
            Self::InvalidState(_) => "InvalidStateError",
        }
    }
}

/// A run that aborted, with the loop state it was in when it failed.
#[derive(Error, Debug)]
#[error("{} in {state} state: {error}", .error.kind())]
pub struct RunFailure {
    pub state: LoopState,
    #[source]
    pub error: ReflexionError,
}

impl RunFailure {
    pub fn new(state: LoopState, error: ReflexionError) -> Self {
        Self { state, error }
    }
}
