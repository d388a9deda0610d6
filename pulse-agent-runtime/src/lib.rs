#![deny(missing_docs)]
//! Agent execution template: validate input, check the response cache, then
//! retry a single agent's tool-loop reasoning attempt with exponential
//! backoff, each attempt bounded by a timeout that cooperatively cancels the
//! in-flight call.
//!
//! [`Agent`] describes one agent's static shape (prompt rendering, schema
//! checks, post-processing); [`AgentRuntime`] is the generic template that
//! drives any `Agent` through validate/cache/retry/timeout, independent of
//! which model gateway or tool registry back it.

pub mod error;

pub use error::{AgentError, ValidationError};

use async_trait::async_trait;
use pulse_cache::ResponseCache;
use pulse_gateway::{parse_structured, GatewayConfig, ModelGateway};
use pulse_tool::ToolRegistry;
use pulse_types::ExecutionContext;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Static shape of one agent: identity, prompt budget, and retry/timeout
/// policy. Cloned cheaply into spawned tasks.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Agent name, also the cache/scenario registration key.
    pub name: String,
    /// Human-readable summary, surfaced in logs.
    pub description: String,
    /// System instruction seeded into every `chat_with_tools` call.
    pub system_prompt: String,
    /// Names of tools this agent is permitted to call.
    pub tool_set: Vec<String>,
    /// Sampling temperature for this agent's calls.
    pub temperature: f64,
    /// Output token ceiling for this agent's calls.
    pub max_output_tokens: u32,
    /// Wall-clock budget for a single attempt.
    pub timeout: Duration,
    /// Extra attempts after the first, on retryable failures.
    pub retry_attempts: u32,
    /// Whether successful output may be served from / written to the cache.
    pub cacheable: bool,
}

/// One agent's behavior: how to render its prompt, what shape its output
/// must take, and how to post-process a structurally valid result.
///
/// Object-safe so the orchestrator can hold a homogeneous collection of
/// `Arc<dyn Agent>` without knowing concrete agent types.
pub trait Agent: Send + Sync {
    /// This agent's static spec.
    fn spec(&self) -> &AgentSpec;

    /// Reject malformed input before spending a model call on it.
    fn validate_input(&self, input: &Value) -> Result<(), ValidationError>;

    /// Render the user-turn prompt from validated input.
    fn render_prompt(&self, input: &Value) -> String;

    /// Field names `parse_structured` must find present in the model's output.
    fn required_output_fields(&self) -> &[&str];

    /// Structural/semantic checks on parsed output beyond field presence.
    fn validate_output(&self, output: &Value) -> Result<(), ValidationError>;

    /// Deterministic post-processing of validated output (enrichment,
    /// normalization, re-ranking). Default is a no-op passthrough.
    fn post_process(&self, output: Value) -> Result<Value, AgentError> {
        Ok(output)
    }
}

/// Exponential backoff with full jitter: `min(100ms * 2^attempt, 2000ms)`,
/// then a uniform random delay in `[0, cap]`. `attempt` is 0-indexed — the
/// delay taken *before* retry attempt `attempt` (so `attempt` is always
/// >= 1 in practice, since the first attempt never sleeps).
pub fn backoff_delay(attempt: u32) -> Duration {
    let capped_ms = 100u64.saturating_mul(1u64 << attempt.min(16)).min(2000);
    let jittered_ms = rand::thread_rng().gen_range(0..=capped_ms);
    Duration::from_millis(jittered_ms)
}

/// The result of driving one agent through [`AgentRuntime::execute`]: its
/// output plus whether that output was served from the response cache,
/// which the orchestrator surfaces in [`pulse_types::OrchestrationMetrics`].
#[derive(Debug, Clone)]
pub struct AgentExecution {
    /// The agent's (possibly cached) validated, post-processed output.
    pub output: Value,
    /// Whether `output` came from the cache rather than a fresh model call.
    pub cache_hit: bool,
}

/// Drives any [`Agent`] through validate → cache → retry-with-backoff →
/// timeout/cancel → parse → validate-output → post-process.
pub struct AgentRuntime {
    gateway: Arc<dyn ModelGateway>,
    cache: Arc<ResponseCache>,
    tools: Arc<ToolRegistry>,
    max_tool_loop_turns: usize,
    cache_ttl: Duration,
}

impl AgentRuntime {
    /// Build a runtime sharing a gateway, cache, and tool registry across
    /// every agent it executes.
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        cache: Arc<ResponseCache>,
        tools: Arc<ToolRegistry>,
        max_tool_loop_turns: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            gateway,
            cache,
            tools,
            max_tool_loop_turns,
            cache_ttl,
        }
    }

    /// Execute `agent` against `input`, bypassing the cache when
    /// `force_refresh` is set or the agent opts out of caching.
    pub async fn execute(
        &self,
        agent: &dyn Agent,
        input: Value,
        force_refresh: bool,
        ctx: &ExecutionContext,
    ) -> Result<AgentExecution, AgentError> {
        agent.validate_input(&input)?;
        let spec = agent.spec();

        if spec.cacheable && !force_refresh {
            if let Some(cached) = self.cache.get(&spec.name, &input).await {
                tracing::debug!(agent = %spec.name, request_id = %ctx.request_id, "cache hit");
                return Ok(AgentExecution { output: cached, cache_hit: true });
            }
        }

        let attempts = spec.retry_attempts + 1;
        let mut last_err: Option<AgentError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff_delay(attempt - 1);
                tracing::debug!(agent = %spec.name, attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }

            match self.try_once(agent, &input, ctx).await {
                Ok(output) => {
                    if spec.cacheable {
                        self.cache.set(&spec.name, &input, output.clone(), self.cache_ttl).await;
                    }
                    return Ok(AgentExecution { output, cache_hit: false });
                }
                Err(err) => {
                    let retryable = err.is_retryable();
                    tracing::warn!(agent = %spec.name, attempt, error = %err, retryable, "agent attempt failed");
                    last_err = Some(err);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        Err(last_err.expect("loop runs at least once"))
    }

    async fn try_once(&self, agent: &dyn Agent, input: &Value, ctx: &ExecutionContext) -> Result<Value, AgentError> {
        let spec = agent.spec().clone();
        let prompt = agent.render_prompt(input);
        let gateway = Arc::clone(&self.gateway);
        let tools = Arc::clone(&self.tools);
        let max_turns = self.max_tool_loop_turns;
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let request_id = ctx.request_id.clone();

        let config = GatewayConfig::new(spec.name.clone())
            .with_temperature(spec.temperature)
            .with_max_output_tokens(spec.max_output_tokens)
            .with_structured_output(true)
            .with_tools(spec.tool_set.clone());

        let tool_set: Vec<String> = spec.tool_set.clone();

        let call = tokio::spawn(async move {
            let tool_set_refs: Vec<&str> = tool_set.iter().map(String::as_str).collect();
            tracing::debug!(agent = %spec.name, %request_id, "starting attempt");
            gateway
                .chat_with_tools(
                    &spec.name,
                    &spec.system_prompt,
                    &prompt,
                    &tools,
                    &tool_set_refs,
                    &config,
                    max_turns,
                    &task_cancel,
                )
                .await
        });

        let text = tokio::select! {
            joined = call => {
                match joined {
                    Ok(Ok(text)) => text,
                    Ok(Err(gw_err)) => return Err(gw_err.into()),
                    Err(join_err) => return Err(AgentError::Other(Box::new(join_err))),
                }
            }
            _ = tokio::time::sleep(spec.timeout) => {
                cancel.cancel();
                return Err(AgentError::Timeout(spec.timeout));
            }
        };

        let parsed = parse_structured(&text, agent.required_output_fields())?;
        agent.validate_output(&parsed)?;
        agent.post_process(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pulse_types::{RequestId, UserId};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Some(RequestId::generate()), UserId::from("u1".to_string()), chrono::Utc::now())
    }

    fn spec(name: &str) -> AgentSpec {
        AgentSpec {
            name: name.to_string(),
            description: "test agent".to_string(),
            system_prompt: "do the thing".to_string(),
            tool_set: vec![],
            temperature: 0.5,
            max_output_tokens: 256,
            timeout: Duration::from_millis(200),
            retry_attempts: 2,
            cacheable: true,
        }
    }

    struct EchoAgent {
        spec: AgentSpec,
    }

    impl Agent for EchoAgent {
        fn spec(&self) -> &AgentSpec {
            &self.spec
        }
        fn validate_input(&self, input: &Value) -> Result<(), ValidationError> {
            if input.get("bad").is_some() {
                return Err(ValidationError::new("bad", "input rejected"));
            }
            Ok(())
        }
        fn render_prompt(&self, input: &Value) -> String {
            input.to_string()
        }
        fn required_output_fields(&self) -> &[&str] {
            &["ok"]
        }
        fn validate_output(&self, _output: &Value) -> Result<(), ValidationError> {
            Ok(())
        }
    }

    struct CountingGateway {
        calls: AtomicU32,
        fail_first_n: u32,
        hang: bool,
    }

    #[async_trait]
    impl ModelGateway for CountingGateway {
        async fn generate(&self, _agent_name: &str, _prompt: &str, _config: &GatewayConfig) -> Result<String, pulse_gateway::GatewayError> {
            unimplemented!("not used in these tests")
        }

        async fn chat_with_tools(
            &self,
            _agent_name: &str,
            _system_instruction: &str,
            _prompt: &str,
            _tools: &ToolRegistry,
            _tool_set: &[&str],
            _config: &GatewayConfig,
            _max_turns: usize,
            _cancel: &CancellationToken,
        ) -> Result<String, pulse_gateway::GatewayError> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!()
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                return Err(pulse_gateway::ReasoningError::EmptyCandidates.into());
            }
            Ok(r#"{"ok": true}"#.to_string())
        }
    }

    fn runtime(gateway: CountingGateway) -> AgentRuntime {
        AgentRuntime::new(
            Arc::new(gateway),
            Arc::new(ResponseCache::new(true)),
            Arc::new(ToolRegistry::new()),
            10,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn succeeds_and_caches_on_first_attempt() {
        let rt = runtime(CountingGateway { calls: AtomicU32::new(0), fail_first_n: 0, hang: false });
        let agent = EchoAgent { spec: spec("echo") };
        let input = json!({"q": 1});
        let out = rt.execute(&agent, input.clone(), false, &ctx()).await.unwrap();
        assert_eq!(out.output, json!({"ok": true}));
        assert!(!out.cache_hit, "first call is always a fresh execution");

        let cached = rt.cache.get("echo", &input).await;
        assert_eq!(cached, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let rt = runtime(CountingGateway { calls: AtomicU32::new(0), fail_first_n: 2, hang: false });
        let agent = EchoAgent { spec: spec("echo") };
        let out = rt.execute(&agent, json!({"q": 1}), false, &ctx()).await.unwrap();
        assert_eq!(out.output, json!({"ok": true}));
    }

    #[tokio::test]
    async fn validation_failure_is_not_retried() {
        let rt = runtime(CountingGateway { calls: AtomicU32::new(0), fail_first_n: 0, hang: false });
        let agent = EchoAgent { spec: spec("echo") };
        let err = rt.execute(&agent, json!({"bad": true}), false, &ctx()).await.unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
    }

    #[tokio::test]
    async fn exhausting_retries_on_persistent_failure_returns_last_error() {
        let rt = runtime(CountingGateway { calls: AtomicU32::new(0), fail_first_n: 100, hang: false });
        let mut s = spec("echo");
        s.retry_attempts = 1;
        let agent = EchoAgent { spec: s };
        let err = rt.execute(&agent, json!({"q": 1}), false, &ctx()).await.unwrap_err();
        assert!(matches!(err, AgentError::Reasoning(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_triggers_cancellation_and_is_retried() {
        let rt = runtime(CountingGateway { calls: AtomicU32::new(0), fail_first_n: 0, hang: true });
        let mut s = spec("echo");
        s.retry_attempts = 0;
        let agent = EchoAgent { spec: s };
        let err = rt.execute(&agent, json!({"q": 1}), false, &ctx()).await.unwrap_err();
        assert!(matches!(err, AgentError::Timeout(_)));
    }

    #[tokio::test]
    async fn force_refresh_bypasses_cache_hit() {
        let gateway = Arc::new(CountingGateway { calls: AtomicU32::new(0), fail_first_n: 0, hang: false });
        let rt = AgentRuntime::new(
            gateway.clone(),
            Arc::new(ResponseCache::new(true)),
            Arc::new(ToolRegistry::new()),
            10,
            Duration::from_secs(60),
        );
        let agent = EchoAgent { spec: spec("echo") };
        let input = json!({"q": 1});
        rt.execute(&agent, input.clone(), false, &ctx()).await.unwrap();
        rt.execute(&agent, input.clone(), true, &ctx()).await.unwrap();
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_identical_call_reports_a_cache_hit() {
        let rt = runtime(CountingGateway { calls: AtomicU32::new(0), fail_first_n: 0, hang: false });
        let agent = EchoAgent { spec: spec("echo") };
        let input = json!({"q": 1});

        let first = rt.execute(&agent, input.clone(), false, &ctx()).await.unwrap();
        let second = rt.execute(&agent, input.clone(), false, &ctx()).await.unwrap();

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.output, second.output);
    }

    #[test]
    fn backoff_delay_is_bounded_and_grows() {
        for attempt in 0..10 {
            let d = backoff_delay(attempt);
            let cap = 100u64.saturating_mul(1u64 << attempt.min(16)).min(2000);
            assert!(d.as_millis() as u64 <= cap);
        }
    }

    #[test]
    fn backoff_delay_caps_at_two_seconds() {
        let d = backoff_delay(20);
        assert!(d.as_millis() as u64 <= 2000);
    }

    #[test]
    fn validation_error_display_includes_field() {
        let e = ValidationError::new("foo", "is missing");
        assert!(e.to_string().contains("foo"));
        assert!(e.to_string().contains("is missing"));
    }
}
