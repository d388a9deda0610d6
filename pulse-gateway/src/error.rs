//! Error taxonomy for the Model Gateway.

use thiserror::Error;

/// Errors a reasoning attempt can fail with: no candidate text, a tool loop
/// that never converged, or output that failed to parse/validate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReasoningError {
    /// `generate` produced no usable candidate.
    #[error("model produced no candidates")]
    EmptyCandidates,

    /// `chat_with_tools` exhausted its turn budget without a text-only reply.
    #[error("tool loop exceeded {0} turns")]
    ToolLoopExceeded(usize),

    /// `parse_structured` could not parse the text as JSON at all.
    #[error("failed to parse structured output (near: {prefix})")]
    ParseFailed {
        /// Truncated prefix of the raw text, for diagnostics.
        prefix: String,
    },

    /// `parse_structured` parsed JSON but it failed schema validation.
    #[error("structured output failed schema validation: {reason} (near: {prefix})")]
    SchemaViolation {
        /// What about the schema failed.
        reason: String,
        /// Truncated prefix of the raw text, for diagnostics.
        prefix: String,
    },
}

impl ReasoningError {
    /// All `ReasoningError` variants are retryable once, per the agent
    /// runtime's retry policy.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// Errors from the Model Gateway.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A reasoning failure: empty candidates, tool loop exhaustion, or a
    /// structured-output parse/validation failure.
    #[error(transparent)]
    Reasoning(#[from] ReasoningError),

    /// No scenario/backend is registered for the requesting agent.
    #[error("no model backend registered for agent {0}")]
    NoBackend(String),

    /// The call observed its cancellation token fire before completing.
    #[error("cancelled")]
    Cancelled,

    /// Catch-all for other errors (e.g. a future live-HTTP gateway's
    /// transport failures).
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl GatewayError {
    /// Whether the agent runtime's retry loop should retry this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Reasoning(r) => r.is_retryable(),
            GatewayError::NoBackend(_) => false,
            GatewayError::Cancelled => false,
            GatewayError::Other(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_errors_are_retryable() {
        assert!(ReasoningError::EmptyCandidates.is_retryable());
        assert!(ReasoningError::ToolLoopExceeded(10).is_retryable());
    }

    #[test]
    fn no_backend_is_not_retryable() {
        assert!(!GatewayError::NoBackend("x".into()).is_retryable());
    }

    #[test]
    fn reasoning_wrapped_error_is_retryable() {
        let err: GatewayError = ReasoningError::ParseFailed { prefix: "x".into() }.into();
        assert!(err.is_retryable());
    }
}
