//! Process-wide configuration, loaded once from the environment at startup.
//!
//! Every field here corresponds to an entry in the enumerated configuration
//! surface: model identifiers, cache policy, per-agent timeouts, retry
//! budget, tracing/log level, and the (read-only, closed) allowed-theme
//! catalog. Nothing here is reloadable — a fresh process picks up a fresh
//! environment, matching the "immutable after startup" ownership rule for
//! process-wide singletons.

use std::time::Duration;

/// Per-agent wall-clock timeout budget, keyed by agent role.
#[derive(Debug, Clone)]
pub struct AgentTimeouts {
    /// Market Intelligence agent timeout.
    pub intelligence: Duration,
    /// Portfolio Insight agent timeout.
    pub insight: Duration,
    /// Summary Generation agent timeout.
    pub summary: Duration,
}

impl Default for AgentTimeouts {
    fn default() -> Self {
        Self {
            intelligence: Duration::from_secs(8),
            insight: Duration::from_secs(8),
            summary: Duration::from_secs(6),
        }
    }
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default model identifier used by agents with no fast-path need.
    pub model_id_default: String,
    /// Faster/cheaper model identifier, reserved for latency-sensitive calls.
    pub model_id_fast: String,
    /// Whether the response cache is consulted/populated at all.
    pub cache_enabled: bool,
    /// Cache entry time-to-live.
    pub cache_ttl_seconds: u64,
    /// Per-agent timeout budgets.
    pub agent_timeouts: AgentTimeouts,
    /// Extra attempts after the first, applied uniformly to every agent.
    pub retry_attempts: u32,
    /// Whether tracing spans/events are emitted (vs. a no-op subscriber).
    pub tracing_enabled: bool,
    /// `tracing_subscriber::EnvFilter` directive used when `tracing_enabled`.
    pub log_level: String,
    /// Maximum tool-loop turns per agent attempt (see `SPEC_FULL.md` open
    /// question: not explicit in source, fixed here as a default).
    pub max_tool_loop_turns: usize,
    /// Maximum summary bullets requested of the Summary Generation agent.
    pub max_bullets: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_id_default: "market-pulse-default".to_string(),
            model_id_fast: "market-pulse-fast".to_string(),
            cache_enabled: true,
            cache_ttl_seconds: 300,
            agent_timeouts: AgentTimeouts::default(),
            retry_attempts: 2,
            tracing_enabled: true,
            log_level: "info".to_string(),
            max_tool_loop_turns: 10,
            max_bullets: 3,
        }
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// [`Config::default`] for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_id_default: env_string("PULSE_MODEL_ID_DEFAULT", defaults.model_id_default),
            model_id_fast: env_string("PULSE_MODEL_ID_FAST", defaults.model_id_fast),
            cache_enabled: env_bool("PULSE_CACHE_ENABLED", defaults.cache_enabled),
            cache_ttl_seconds: env_u64("PULSE_CACHE_TTL_SECONDS", defaults.cache_ttl_seconds),
            agent_timeouts: AgentTimeouts {
                intelligence: Duration::from_secs(env_u64("PULSE_TIMEOUT_INTELLIGENCE_SECONDS", defaults.agent_timeouts.intelligence.as_secs())),
                insight: Duration::from_secs(env_u64("PULSE_TIMEOUT_INSIGHT_SECONDS", defaults.agent_timeouts.insight.as_secs())),
                summary: Duration::from_secs(env_u64("PULSE_TIMEOUT_SUMMARY_SECONDS", defaults.agent_timeouts.summary.as_secs())),
            },
            retry_attempts: env_u64("PULSE_RETRY_ATTEMPTS", defaults.retry_attempts as u64) as u32,
            tracing_enabled: env_bool("PULSE_TRACING_ENABLED", defaults.tracing_enabled),
            log_level: env_string("PULSE_LOG_LEVEL", defaults.log_level),
            max_tool_loop_turns: env_u64("PULSE_MAX_TOOL_LOOP_TURNS", defaults.max_tool_loop_turns as u64) as usize,
            max_bullets: env_u64("PULSE_MAX_BULLETS", defaults.max_bullets),
        }
    }

    /// The closed, ordered allowed-theme catalog. Not environment-configurable
    /// — exposed here only so callers have one place to read the whole
    /// enumerated configuration surface from.
    pub fn allowed_themes_catalog(&self) -> &'static [&'static str] {
        pulse_types::ALLOWED_THEMES
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
