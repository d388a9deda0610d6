//! Error taxonomy for agent execution.

use pulse_gateway::{GatewayError, ReasoningError};
use std::time::Duration;
use thiserror::Error;

/// A single input/output schema violation, with the field path that failed.
#[derive(Debug, Clone, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted/bracketed path to the offending field (e.g. `news_items[2].id`).
    pub field: String,
    /// What went wrong.
    pub message: String,
}

impl ValidationError {
    /// Construct a validation error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by the Agent Runtime to the orchestrator.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AgentError {
    /// Input or output failed its schema. Never retried.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The agent exceeded its deadline for this attempt.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The model produced no candidate, invalid JSON, or failed
    /// post-processing (e.g. no causal language after all attempts).
    #[error("reasoning error: {0}")]
    Reasoning(#[from] ReasoningError),

    /// Catch-all for other errors (gateway transport failures not modeled
    /// as `ReasoningError`, task-join failures, etc).
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AgentError {
    /// Whether the retry loop should attempt this agent again: retry on
    /// timeout and transient reasoning failures, never on validation
    /// failures or opaque `Other` errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Validation(_) => false,
            AgentError::Timeout(_) => true,
            AgentError::Reasoning(r) => r.is_retryable(),
            AgentError::Other(_) => false,
        }
    }
}

impl From<GatewayError> for AgentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Reasoning(r) => AgentError::Reasoning(r),
            other => AgentError::Other(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_never_retryable() {
        let err = AgentError::Validation(ValidationError::new("x", "bad"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_is_retryable() {
        assert!(AgentError::Timeout(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn reasoning_is_retryable() {
        let err: AgentError = ReasoningError::EmptyCandidates.into();
        assert!(err.is_retryable());
    }

    #[test]
    fn gateway_reasoning_error_converts() {
        let gw_err: GatewayError = ReasoningError::ToolLoopExceeded(10).into();
        let agent_err: AgentError = gw_err.into();
        assert!(matches!(agent_err, AgentError::Reasoning(ReasoningError::ToolLoopExceeded(10))));
        assert!(agent_err.is_retryable());
    }

    #[test]
    fn gateway_no_backend_is_not_retryable() {
        let gw_err = GatewayError::NoBackend("x".into());
        let agent_err: AgentError = gw_err.into();
        assert!(!agent_err.is_retryable());
    }
}
