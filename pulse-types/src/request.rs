//! The inbound request and the per-orchestration execution context.

use crate::id::{RequestId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A market pulse request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub user_id: UserId,
    /// Ordered, de-duplication is the caller's responsibility.
    pub selected_indices: Vec<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub preferences: Option<Value>,
}

/// Per-request correlation state, threaded through every agent call and
/// spawned task. Passed by value — cloned rather than shared, since it is
/// small and read-only after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub request_id: RequestId,
    pub user_id: UserId,
    pub start_time: DateTime<Utc>,
}

impl ExecutionContext {
    /// Build a new context, generating a request ID if the caller supplied none.
    pub fn new(request_id: Option<RequestId>, user_id: UserId, start_time: DateTime<Utc>) -> Self {
        Self {
            request_id: request_id.unwrap_or_else(RequestId::generate),
            user_id,
            start_time,
        }
    }

    /// Wall-clock elapsed since `start_time`, as of `now`.
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.start_time
    }
}
