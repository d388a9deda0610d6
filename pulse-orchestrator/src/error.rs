//! Error taxonomy for orchestration-level (not per-agent) failures.

use thiserror::Error;

/// Failures that prevent an [`crate::Orchestrator`] from being constructed
/// or run at all. Per-agent failures never surface here — they degrade the
/// resulting report instead; this type is reserved for configuration
/// mistakes the orchestrator can catch before it starts scheduling work.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A configuration value was out of range.
    #[error("invalid orchestrator configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
