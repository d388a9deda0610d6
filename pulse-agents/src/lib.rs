#![deny(missing_docs)]
//! Concrete agents: Market Intelligence, Portfolio Insight, and Summary
//! Generation, plus the deterministic fake data-source tools they call.
//!
//! Each agent pairs a static [`pulse_agent_runtime::AgentSpec`] /
//! [`pulse_agent_runtime::Agent`] impl (input/output schema checks and
//! authoritative post-processing) with a [`pulse_gateway::Scenario`]
//! registered under the same name on the shared fake gateway — the scenario
//! stands in for "what the model decided to do," the agent's `post_process`
//! is the deterministic layer that does not trust it.

pub mod fakes;
pub mod market_intelligence;
pub mod portfolio_insight;
pub mod summary_generation;

pub use market_intelligence::{MarketIntelligenceAgent, MarketIntelligenceScenario};
pub use portfolio_insight::{PortfolioInsightAgent, PortfolioInsightScenario};
pub use summary_generation::{SummaryGenerationAgent, SummaryGenerationScenario};

use serde_json::Value;

/// Render an agent input as compact JSON, the textual form seeded after the
/// system instruction in `chat_with_tools`.
pub(crate) fn render_compact(input: &Value) -> String {
    input.to_string()
}

/// Recover the rendered input JSON from the combined
/// `"{system_instruction}\n\n{prompt}"` text a [`pulse_gateway::Scenario`]
/// receives. The renderer always emits compact JSON as the final segment, so
/// splitting on the last double-newline and parsing it back is exact.
pub(crate) fn parse_prompt_input(prompt: &str) -> Value {
    let json_part = prompt.rsplit("\n\n").next().unwrap_or(prompt);
    serde_json::from_str(json_part).unwrap_or(Value::Null)
}

/// Unwrap a tool-invocation result value (`{"result": ...}` or
/// `{"error": ...}`) into `Some(result)`, or `None` on error/unknown shape.
pub(crate) fn tool_result(value: &Value) -> Option<&Value> {
    value.get("result")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_roundtrips_through_render_and_parse() {
        let input = json!({"a": 1, "b": [1, 2, 3]});
        let prompt = format!("system instruction text\n\n{}", render_compact(&input));
        assert_eq!(parse_prompt_input(&prompt), input);
    }
}
