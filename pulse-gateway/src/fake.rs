//! A deterministic, in-process [`ModelGateway`] implementation.
//!
//! Stands in for a live chat-capable LLM so the rest of the workspace can be
//! exercised and tested with no network I/O. Each registered agent gets a
//! [`Scenario`]: a deterministic stand-in for "what the model would decide
//! to do" given the rendered prompt and the tool results seen so far. The
//! fake gateway itself only drives the generic tool-loop shape (dispatch
//! calls, feed results back, repeat until the scenario returns final text);
//! all domain reasoning lives in the scenario the agent registers.

use crate::config::GatewayConfig;
use crate::error::{GatewayError, ReasoningError};
use crate::ModelGateway;
use async_trait::async_trait;
use pulse_tool::ToolRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One function-call part a [`Scenario`] wants dispatched this turn.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Tool name, as registered in the [`ToolRegistry`].
    pub name: String,
    /// Arguments to pass to the tool.
    pub args: serde_json::Value,
}

impl ToolCall {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self { name: name.into(), args }
    }
}

/// What a [`Scenario`] decides to do on a given turn.
#[derive(Debug, Clone)]
pub enum ScenarioStep {
    /// Emit one or more function-call parts, to be dispatched in order.
    ToolCalls(Vec<ToolCall>),
    /// Emit final text and end the tool loop.
    Final(String),
}

/// A deterministic stand-in for a model's reasoning about one agent's
/// prompt. Registered per agent name on a [`FakeGateway`].
///
/// `prior_results` holds the `{"result": ...}` / `{"error": ...}` wrapped
/// response for each tool call issued on the *previous* turn, in the order
/// those calls were made; it is empty on turn 0.
pub trait Scenario: Send + Sync {
    /// Decide the next step.
    fn step(&self, prompt: &str, turn: usize, prior_results: &[serde_json::Value]) -> ScenarioStep;
}

/// In-process fake [`ModelGateway`]: routes each call to the [`Scenario`]
/// registered for the requesting agent and drives the generic tool-loop
/// shape around it.
#[derive(Default)]
pub struct FakeGateway {
    scenarios: HashMap<String, Arc<dyn Scenario>>,
}

impl FakeGateway {
    /// Create a gateway with no scenarios registered.
    pub fn new() -> Self {
        Self { scenarios: HashMap::new() }
    }

    /// Register the scenario driving `agent_name`'s calls. Overwrites any
    /// existing scenario for that name.
    pub fn register_scenario(&mut self, agent_name: impl Into<String>, scenario: Arc<dyn Scenario>) {
        self.scenarios.insert(agent_name.into(), scenario);
    }
}

#[async_trait]
impl ModelGateway for FakeGateway {
    async fn generate(
        &self,
        agent_name: &str,
        prompt: &str,
        _config: &GatewayConfig,
    ) -> Result<String, GatewayError> {
        let scenario = self
            .scenarios
            .get(agent_name)
            .ok_or_else(|| GatewayError::NoBackend(agent_name.to_string()))?;
        match scenario.step(prompt, 0, &[]) {
            ScenarioStep::Final(text) => Ok(text),
            ScenarioStep::ToolCalls(_) => Err(ReasoningError::EmptyCandidates.into()),
        }
    }

    async fn chat_with_tools(
        &self,
        agent_name: &str,
        system_instruction: &str,
        prompt: &str,
        tools: &ToolRegistry,
        _tool_set: &[&str],
        _config: &GatewayConfig,
        max_turns: usize,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let scenario = self
            .scenarios
            .get(agent_name)
            .ok_or_else(|| GatewayError::NoBackend(agent_name.to_string()))?;

        let seeded_prompt = format!("{system_instruction}\n\n{prompt}");
        let mut prior_results: Vec<serde_json::Value> = Vec::new();

        for turn in 0..max_turns {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }
            match scenario.step(&seeded_prompt, turn, &prior_results) {
                ScenarioStep::Final(text) => return Ok(text),
                ScenarioStep::ToolCalls(calls) => {
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        tracing::debug!(agent_name, tool_name = %call.name, turn, "dispatching tool call");
                        results.push(tools.invoke(&call.name, call.args.clone()).await);
                    }
                    prior_results = results;
                }
            }
        }

        Err(ReasoningError::ToolLoopExceeded(max_turns).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ImmediateFinal(&'static str);
    impl Scenario for ImmediateFinal {
        fn step(&self, _prompt: &str, _turn: usize, _prior: &[serde_json::Value]) -> ScenarioStep {
            ScenarioStep::Final(self.0.to_string())
        }
    }

    struct OneToolCallThenFinal {
        calls_made: AtomicUsize,
    }
    impl Scenario for OneToolCallThenFinal {
        fn step(&self, _prompt: &str, turn: usize, prior: &[serde_json::Value]) -> ScenarioStep {
            if turn == 0 {
                self.calls_made.fetch_add(1, Ordering::SeqCst);
                ScenarioStep::ToolCalls(vec![ToolCall::new("echo", json!({"msg": "hi"}))])
            } else {
                ScenarioStep::Final(format!("saw {} results", prior.len()))
            }
        }
    }

    struct NeverFinal;
    impl Scenario for NeverFinal {
        fn step(&self, _prompt: &str, _turn: usize, _prior: &[serde_json::Value]) -> ScenarioStep {
            ScenarioStep::ToolCalls(vec![])
        }
    }

    #[tokio::test]
    async fn generate_returns_final_text() {
        let mut gw = FakeGateway::new();
        gw.register_scenario("agent-a", Arc::new(ImmediateFinal("hello")));
        let out = gw.generate("agent-a", "prompt", &GatewayConfig::new("fake")).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn generate_unknown_agent_errors() {
        let gw = FakeGateway::new();
        let err = gw.generate("nope", "prompt", &GatewayConfig::new("fake")).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoBackend(_)));
    }

    #[tokio::test]
    async fn chat_with_tools_drives_tool_loop_to_completion() {
        let mut registry = ToolRegistry::new();
        struct Echo;
        impl pulse_tool::ToolDyn for Echo {
            fn name(&self) -> &str { "echo" }
            fn description(&self) -> &str { "echoes" }
            fn input_schema(&self) -> serde_json::Value { json!({"type": "object"}) }
            fn call(
                &self,
                args: serde_json::Value,
            ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<serde_json::Value, pulse_tool::ToolError>> + Send + '_>>
            {
                Box::pin(async move { Ok(args) })
            }
        }
        registry.register(Arc::new(Echo)).unwrap();

        let mut gw = FakeGateway::new();
        gw.register_scenario(
            "agent-b",
            Arc::new(OneToolCallThenFinal { calls_made: AtomicUsize::new(0) }),
        );

        let out = gw
            .chat_with_tools(
                "agent-b",
                "system",
                "prompt",
                &registry,
                &["echo"],
                &GatewayConfig::new("fake"),
                10,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out, "saw 1 results");
    }

    #[tokio::test]
    async fn chat_with_tools_exhausting_max_turns_errors() {
        let registry = ToolRegistry::new();
        let mut gw = FakeGateway::new();
        gw.register_scenario("agent-c", Arc::new(NeverFinal));

        let err = gw
            .chat_with_tools(
                "agent-c",
                "system",
                "prompt",
                &registry,
                &[],
                &GatewayConfig::new("fake"),
                3,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Reasoning(ReasoningError::ToolLoopExceeded(3))));
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let registry = ToolRegistry::new();
        let mut gw = FakeGateway::new();
        gw.register_scenario("agent-d", Arc::new(ImmediateFinal("unreachable")));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = gw
            .chat_with_tools("agent-d", "system", "prompt", &registry, &[], &GatewayConfig::new("fake"), 3, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Cancelled));
    }
}
