//! Market Intelligence Agent: market phase, index-driven outlook, news
//! aggregation, and free-form preliminary theme clustering.

use crate::{parse_prompt_input, render_compact, tool_result};
use pulse_agent_runtime::{Agent, AgentError, AgentSpec, ValidationError};
use pulse_gateway::{Scenario, ScenarioStep, ToolCall};
use pulse_types::{AggregateSentiment, MarketOutlook};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// System prompt establishing the agent's role and deterministic rules,
/// embedded fixed rather than templated per the surrounding non-goal on
/// tunable prompt configuration.
pub const SYSTEM_PROMPT: &str = "You are a Market Intelligence Agent specializing in Indian stock markets. \
Determine the market phase from IST time first, since it gates the rest of your analysis: pre-market is \
08:00-09:15 IST, mid-market (trading hours) is 09:15-15:30 IST, post-market is 15:30-08:00 IST the next day. \
Fetch and analyze benchmark index data, and omit the market outlook entirely during mid-market. Classify news \
sentiment objectively: bullish for positive earnings, upgrades, expansion, or favorable policy; bearish for \
negative earnings, downgrades, regulatory setbacks, or macro headwinds; neutral for routine or mixed items. \
Flag stale data and non-trading periods, prioritize news from the last 24 hours, surface breaking news first, \
and stay factual rather than speculative.";

/// Agent name, used as the cache/scenario registration key.
pub const NAME: &str = "market_intelligence";

fn default_spec() -> AgentSpec {
    AgentSpec {
        name: NAME.to_string(),
        description: "Determines market phase, index-driven outlook, and aggregates/clusters news".to_string(),
        system_prompt: SYSTEM_PROMPT.to_string(),
        tool_set: vec![
            "fetch_market_indices".to_string(),
            "fetch_market_news".to_string(),
            "get_market_phase".to_string(),
        ],
        temperature: 0.3,
        max_output_tokens: 2048,
        timeout: Duration::from_secs(8),
        retry_attempts: 2,
        cacheable: true,
    }
}

/// The Market Intelligence agent.
pub struct MarketIntelligenceAgent {
    spec: AgentSpec,
}

impl Default for MarketIntelligenceAgent {
    fn default() -> Self {
        Self { spec: default_spec() }
    }
}

impl MarketIntelligenceAgent {
    /// Build the agent with a caller-supplied spec (e.g. to override timeout
    /// or retry policy from process configuration) rather than the default.
    pub fn new(spec: AgentSpec) -> Self {
        Self { spec }
    }
}

impl Agent for MarketIntelligenceAgent {
    fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    fn validate_input(&self, input: &Value) -> Result<(), ValidationError> {
        let indices = input
            .get("selected_indices")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ValidationError::new("selected_indices", "must be a non-empty array"))?;
        if indices.is_empty() {
            return Err(ValidationError::new("selected_indices", "must be a non-empty array"));
        }
        let timestamp = input
            .get("timestamp")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ValidationError::new("timestamp", "must be an RFC 3339 string"))?;
        chrono::DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| ValidationError::new("timestamp", format!("not RFC 3339: {e}")))?;
        Ok(())
    }

    fn render_prompt(&self, input: &Value) -> String {
        render_compact(input)
    }

    fn required_output_fields(&self) -> &[&str] {
        &["market_phase", "indices_data", "market_outlook", "news_items", "preliminary_themes"]
    }

    fn validate_output(&self, output: &Value) -> Result<(), ValidationError> {
        let phase = output
            .get("market_phase")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ValidationError::new("market_phase", "must be a string"))?;
        if !["pre", "mid", "post"].contains(&phase) {
            return Err(ValidationError::new("market_phase", "must be one of pre/mid/post"));
        }
        if !output.get("indices_data").is_some_and(|v| v.is_object()) {
            return Err(ValidationError::new("indices_data", "must be an object"));
        }
        if !output.get("news_items").is_some_and(|v| v.is_array()) {
            return Err(ValidationError::new("news_items", "must be an array"));
        }
        Ok(())
    }

    fn post_process(&self, mut output: Value) -> Result<Value, AgentError> {
        let phase = output["market_phase"].as_str().unwrap_or("post").to_string();

        // Dedup news items by id, preserving first occurrence order — the
        // model is not trusted to have deduplicated correctly itself.
        let mut seen = std::collections::HashSet::new();
        let news_items: Vec<Value> = output["news_items"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|item| {
                let id = item.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                seen.insert(id)
            })
            .collect();
        output["news_items"] = json!(news_items);

        // Recompute the outlook deterministically from index data rather
        // than trusting any sentiment/confidence the model attached.
        if phase == "mid" {
            output["market_outlook"] = Value::Null;
        } else {
            let indices = output["indices_data"].as_object().cloned().unwrap_or_default();
            let benchmark = indices
                .get("NIFTY 50")
                .or_else(|| indices.values().next())
                .cloned()
                .unwrap_or(json!({"change_percent": 0.0}));
            let change_percent = benchmark.get("change_percent").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let breaking_headline = news_items
                .iter()
                .find(|n| n.get("is_breaking").and_then(|v| v.as_bool()).unwrap_or(false))
                .and_then(|n| n.get("headline").and_then(|v| v.as_str()));
            let reasoning = match breaking_headline {
                Some(headline) => format!("Benchmark index moved {change_percent:+.2}% amid: {headline}"),
                None => format!("Benchmark index moved {change_percent:+.2}%"),
            };
            let key_drivers: Vec<String> = news_items
                .iter()
                .take(3)
                .filter_map(|n| n.get("headline").and_then(|v| v.as_str()).map(str::to_string))
                .collect();
            let outlook = MarketOutlook::from_nifty_change(change_percent, reasoning, key_drivers);
            output["market_outlook"] = serde_json::to_value(outlook).map_err(|e| AgentError::Other(Box::new(e)))?;
        }

        Ok(output)
    }
}

/// Deterministic stand-in for the model's reasoning: on turn 0, fetch
/// indices, news, and the market phase; on turn 1, assemble the draft
/// output (imperfect in the ways a real model's first pass would be —
/// free-form theme names, no dedup guarantee — left for `post_process` to
/// correct).
#[derive(Default)]
pub struct MarketIntelligenceScenario;

impl Scenario for MarketIntelligenceScenario {
    fn step(&self, prompt: &str, turn: usize, prior_results: &[Value]) -> ScenarioStep {
        let input = parse_prompt_input(prompt);

        if turn == 0 {
            let selected_indices = input.get("selected_indices").cloned().unwrap_or(json!([]));
            let timestamp = input.get("timestamp").cloned().unwrap_or(json!(""));
            return ScenarioStep::ToolCalls(vec![
                ToolCall::new("fetch_market_indices", json!({"names": selected_indices})),
                ToolCall::new("fetch_market_news", json!({"window_hours": 24})),
                ToolCall::new("get_market_phase", json!({"timestamp": timestamp})),
            ]);
        }

        let indices_data = prior_results.first().and_then(tool_result).cloned().unwrap_or(json!({}));
        let news_items = prior_results.get(1).and_then(tool_result).cloned().unwrap_or(json!([]));
        let phase = prior_results
            .get(2)
            .and_then(tool_result)
            .and_then(|v| v.get("phase"))
            .and_then(|v| v.as_str())
            .unwrap_or("post")
            .to_string();

        let preliminary_themes = cluster_by_sector(&news_items);

        let draft = json!({
            "market_phase": phase,
            "indices_data": indices_data,
            "market_outlook": Value::Null,
            "news_items": news_items,
            "preliminary_themes": preliminary_themes,
        });

        ScenarioStep::Final(draft.to_string())
    }
}

fn cluster_by_sector(news_items: &Value) -> Value {
    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for item in news_items.as_array().cloned().unwrap_or_default() {
        let sector = item
            .get("mentioned_sectors")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_str())
            .unwrap_or("Uncategorized")
            .to_string();
        groups.entry(sector).or_default().push(item);
    }

    let themes: Vec<Value> = groups
        .into_iter()
        .map(|(theme_name, items)| {
            let sentiment = aggregate_sentiment(&items);
            let impacted_stocks: Vec<String> = items
                .iter()
                .flat_map(|i| i.get("mentioned_stocks").and_then(|v| v.as_array()).cloned().unwrap_or_default())
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            json!({
                "theme_name": theme_name,
                "news_items": items,
                "overall_sentiment": sentiment,
                "impacted_stocks": impacted_stocks,
                "reason": format!("{} news item(s) cluster under {}", impacted_stocks.len().max(1), theme_name),
            })
        })
        .collect();
    json!(themes)
}

fn aggregate_sentiment(items: &[Value]) -> &'static str {
    let mut bullish = 0;
    let mut bearish = 0;
    let mut neutral = 0;
    for item in items {
        match item.get("sentiment").and_then(|v| v.as_str()) {
            Some("bullish") => bullish += 1,
            Some("bearish") => bearish += 1,
            _ => neutral += 1,
        }
    }
    let sentiment = if bullish > 0 && bearish > 0 {
        AggregateSentiment::Mixed
    } else if bullish > bearish && bullish > neutral {
        AggregateSentiment::Bullish
    } else if bearish > bullish && bearish > neutral {
        AggregateSentiment::Bearish
    } else {
        AggregateSentiment::Neutral
    };
    match sentiment {
        AggregateSentiment::Bullish => "bullish",
        AggregateSentiment::Bearish => "bearish",
        AggregateSentiment::Neutral => "neutral",
        AggregateSentiment::Mixed => "mixed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_selected_indices() {
        let agent = MarketIntelligenceAgent::default();
        let err = agent.validate_input(&json!({"selected_indices": [], "timestamp": "2026-01-30T05:00:00Z"})).unwrap_err();
        assert_eq!(err.field, "selected_indices");
    }

    #[test]
    fn rejects_bad_timestamp() {
        let agent = MarketIntelligenceAgent::default();
        let err = agent
            .validate_input(&json!({"selected_indices": ["NIFTY 50"], "timestamp": "not-a-date"}))
            .unwrap_err();
        assert_eq!(err.field, "timestamp");
    }

    #[test]
    fn post_process_nulls_outlook_during_mid_market() {
        let agent = MarketIntelligenceAgent::default();
        let draft = json!({
            "market_phase": "mid",
            "indices_data": {"NIFTY 50": {"change_percent": 1.0}},
            "market_outlook": Value::Null,
            "news_items": [],
            "preliminary_themes": [],
        });
        let out = agent.post_process(draft).unwrap();
        assert_eq!(out["market_outlook"], Value::Null);
    }

    #[test]
    fn post_process_computes_outlook_outside_mid_market() {
        let agent = MarketIntelligenceAgent::default();
        let draft = json!({
            "market_phase": "pre",
            "indices_data": {"NIFTY 50": {"change_percent": 0.85}},
            "market_outlook": Value::Null,
            "news_items": [],
            "preliminary_themes": [],
        });
        let out = agent.post_process(draft).unwrap();
        assert_eq!(out["market_outlook"]["sentiment"], "bullish");
        assert!((out["market_outlook"]["confidence"].as_f64().unwrap() - 0.425).abs() < 1e-9);
    }

    #[test]
    fn post_process_dedups_news_by_id() {
        let agent = MarketIntelligenceAgent::default();
        let draft = json!({
            "market_phase": "post",
            "indices_data": {},
            "market_outlook": Value::Null,
            "news_items": [{"id": "x", "headline": "a"}, {"id": "x", "headline": "b"}],
            "preliminary_themes": [],
        });
        let out = agent.post_process(draft).unwrap();
        assert_eq!(out["news_items"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn scenario_drives_tool_calls_then_final() {
        let scenario = MarketIntelligenceScenario;
        let prompt = format!("{SYSTEM_PROMPT}\n\n{}", json!({"selected_indices": ["NIFTY 50"], "timestamp": "2026-01-30T05:00:00Z"}));
        match scenario.step(&prompt, 0, &[]) {
            ScenarioStep::ToolCalls(calls) => assert_eq!(calls.len(), 3),
            ScenarioStep::Final(_) => panic!("expected tool calls on turn 0"),
        }
    }
}
