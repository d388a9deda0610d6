#![deny(missing_docs)]
//! Content-addressed response cache, keyed by `(agent_name, input_fingerprint)`
//! with per-entry TTL.
//!
//! Backed by an in-process `RwLock`-guarded map (mirroring the workspace's
//! in-memory state store), not an external cache service — no network
//! dependency for the cache in this repository's scope. All operations are
//! best-effort: when disabled, every call is a miss/no-op; a future backend
//! that can actually fail degrades to the same behavior rather than
//! propagating an error to agent execution.

use chrono::{DateTime, Utc};
use pulse_types::cache_key;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors a cache backend could report. The in-memory backend never
/// produces these — the type exists so a future networked backend (Redis,
/// memcached) slots into the same best-effort-degrade-to-miss contract.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached or returned a transport error.
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

struct Entry {
    agent_name: String,
    value: serde_json::Value,
    expires_at: DateTime<Utc>,
}

/// Content-addressed, TTL-bearing response cache.
pub struct ResponseCache {
    enabled: bool,
    store: RwLock<HashMap<String, Entry>>,
}

impl ResponseCache {
    /// Construct a cache. When `enabled` is false every operation becomes a
    /// cache-miss/no-op without touching the backing map.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            store: RwLock::new(HashMap::new()),
        }
    }

    /// Look up the cached output for `(agent_name, input)`. Returns `None`
    /// on miss, on expiry, or when the cache is disabled.
    pub async fn get(&self, agent_name: &str, input: &serde_json::Value) -> Option<serde_json::Value> {
        if !self.enabled {
            return None;
        }
        let key = cache_key(agent_name, input);
        let store = self.store.read().await;
        let entry = store.get(&key)?;
        if entry.expires_at <= Utc::now() {
            tracing::debug!(agent_name, "cache entry expired");
            return None;
        }
        Some(entry.value.clone())
    }

    /// Store `value` for `(agent_name, input)` with the given TTL. A no-op
    /// when the cache is disabled.
    pub async fn set(&self, agent_name: &str, input: &serde_json::Value, value: serde_json::Value, ttl: Duration) {
        if !self.enabled {
            return;
        }
        let key = cache_key(agent_name, input);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));
        let mut store = self.store.write().await;
        store.insert(
            key,
            Entry {
                agent_name: agent_name.to_string(),
                value,
                expires_at,
            },
        );
    }

    /// Invalidate one entry (`input` given) or every entry for `agent_name`
    /// (`input` omitted). A no-op when the cache is disabled.
    pub async fn invalidate(&self, agent_name: &str, input: Option<&serde_json::Value>) {
        if !self.enabled {
            return;
        }
        let mut store = self.store.write().await;
        match input {
            Some(input) => {
                let key = cache_key(agent_name, input);
                store.remove(&key);
            }
            None => {
                store.retain(|_, entry| entry.agent_name != agent_name);
            }
        }
    }

    /// Whether the cache is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn miss_then_hit_after_set() {
        let cache = ResponseCache::new(true);
        let input = json!({"x": 1});
        assert_eq!(cache.get("agent-a", &input).await, None);

        cache.set("agent-a", &input, json!({"out": "v"}), Duration::from_secs(60)).await;
        assert_eq!(cache.get("agent-a", &input).await, Some(json!({"out": "v"})));
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = ResponseCache::new(false);
        let input = json!({"x": 1});
        cache.set("agent-a", &input, json!({"out": "v"}), Duration::from_secs(60)).await;
        assert_eq!(cache.get("agent-a", &input).await, None);
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = ResponseCache::new(true);
        let input = json!({"x": 1});
        cache.set("agent-a", &input, json!({"out": "v"}), Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("agent-a", &input).await, None);
    }

    #[tokio::test]
    async fn different_inputs_different_keys() {
        let cache = ResponseCache::new(true);
        cache.set("agent-a", &json!({"x": 1}), json!("one"), Duration::from_secs(60)).await;
        cache.set("agent-a", &json!({"x": 2}), json!("two"), Duration::from_secs(60)).await;
        assert_eq!(cache.get("agent-a", &json!({"x": 1})).await, Some(json!("one")));
        assert_eq!(cache.get("agent-a", &json!({"x": 2})).await, Some(json!("two")));
    }

    #[tokio::test]
    async fn key_order_does_not_affect_hit() {
        let cache = ResponseCache::new(true);
        cache
            .set("agent-a", &json!({"a": 1, "b": 2}), json!("v"), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("agent-a", &json!({"b": 2, "a": 1})).await, Some(json!("v")));
    }

    #[tokio::test]
    async fn invalidate_single_entry() {
        let cache = ResponseCache::new(true);
        let input = json!({"x": 1});
        cache.set("agent-a", &input, json!("v"), Duration::from_secs(60)).await;
        cache.invalidate("agent-a", Some(&input)).await;
        assert_eq!(cache.get("agent-a", &input).await, None);
    }

    #[tokio::test]
    async fn invalidate_all_for_agent_leaves_other_agents_alone() {
        let cache = ResponseCache::new(true);
        cache.set("agent-a", &json!({"x": 1}), json!("v1"), Duration::from_secs(60)).await;
        cache.set("agent-a", &json!({"x": 2}), json!("v2"), Duration::from_secs(60)).await;
        cache.set("agent-b", &json!({"x": 1}), json!("v3"), Duration::from_secs(60)).await;

        cache.invalidate("agent-a", None).await;

        assert_eq!(cache.get("agent-a", &json!({"x": 1})).await, None);
        assert_eq!(cache.get("agent-a", &json!({"x": 2})).await, None);
        assert_eq!(cache.get("agent-b", &json!({"x": 1})).await, Some(json!("v3")));
    }
}
