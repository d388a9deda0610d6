//! Summary Generation Agent: turns refined themes and news impacts into a
//! short, causally-worded market summary during trading hours, or a
//! recency-ranked trending feed mid-session.
//!
//! Causal-language enforcement is a post-processor, not a prompt guarantee:
//! the scenario is allowed to emit bullets that read like bare assertions,
//! and [`SummaryGenerationAgent::post_process`] is what discards and
//! replaces them. Tests treat the scenario as untrustworthy and the
//! deterministic check as authoritative.

use crate::{parse_prompt_input, render_compact, tool_result};
use pulse_agent_runtime::{Agent, AgentError, AgentSpec, ValidationError};
use pulse_gateway::{Scenario, ScenarioStep, ToolCall};
use pulse_types::contains_causal_keyword;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Fixed system prompt for the Summary Generation agent.
pub const SYSTEM_PROMPT: &str = "You are a market summary specialist. Causal language is mandatory in every \
bullet: connect market movement to the specific news that caused it, never state an isolated fact. Produce at \
most three bullets, ordered by importance, and make every claim traceable to a provided news_id — never invent \
facts. During mid-session trading, when there is no fresh directional outlook, report a trending-news feed \
instead of causal bullets. Before returning, re-check each bullet for causal wording.";

/// Agent name, used as the cache/scenario registration key.
pub const NAME: &str = "summary_generation";

const DEFAULT_MAX_BULLETS: u64 = 3;

fn default_spec() -> AgentSpec {
    AgentSpec {
        name: NAME.to_string(),
        description: "Produces the causal market summary or trending feed for the response".to_string(),
        system_prompt: SYSTEM_PROMPT.to_string(),
        tool_set: vec!["rank_news_by_importance".to_string()],
        temperature: 0.4,
        max_output_tokens: 2048,
        timeout: Duration::from_secs(6),
        retry_attempts: 2,
        cacheable: true,
    }
}

/// The Summary Generation agent.
pub struct SummaryGenerationAgent {
    spec: AgentSpec,
}

impl Default for SummaryGenerationAgent {
    fn default() -> Self {
        Self { spec: default_spec() }
    }
}

impl SummaryGenerationAgent {
    /// Build the agent with a caller-supplied spec (e.g. to override timeout
    /// or retry policy from process configuration) rather than the default.
    pub fn new(spec: AgentSpec) -> Self {
        Self { spec }
    }
}

impl Agent for SummaryGenerationAgent {
    fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    fn validate_input(&self, input: &Value) -> Result<(), ValidationError> {
        let phase = input.get("market_phase").and_then(|v| v.as_str());
        if !matches!(phase, Some("pre") | Some("mid") | Some("post")) {
            return Err(ValidationError::new("market_phase", "must be one of pre, mid, post"));
        }
        if !input.get("news_with_impacts").is_some_and(|v| v.is_array()) {
            return Err(ValidationError::new("news_with_impacts", "must be an array"));
        }
        if !input.get("refined_themes").is_some_and(|v| v.is_array()) {
            return Err(ValidationError::new("refined_themes", "must be an array"));
        }
        if !input.get("indices_data").is_some_and(|v| v.is_object()) {
            return Err(ValidationError::new("indices_data", "must be an object"));
        }
        Ok(())
    }

    fn render_prompt(&self, input: &Value) -> String {
        render_compact(input)
    }

    fn required_output_fields(&self) -> &[&str] {
        &["market_summary_bullets", "trending_now_section", "executive_summary", "key_takeaways", "generation_metadata"]
    }

    fn validate_output(&self, output: &Value) -> Result<(), ValidationError> {
        for field in self.required_output_fields() {
            if output.get(*field).is_none() {
                return Err(ValidationError::new(*field, "missing from output"));
            }
        }
        if !output.get("executive_summary").is_some_and(|v| v.is_string()) {
            return Err(ValidationError::new("executive_summary", "must be a string"));
        }
        Ok(())
    }

    fn post_process(&self, mut output: Value) -> Result<Value, AgentError> {
        let raw = output.get("_raw").cloned().unwrap_or(json!({}));
        let market_phase = raw.get("market_phase").and_then(|v| v.as_str()).unwrap_or("mid").to_string();
        let max_bullets = raw.get("max_bullets").and_then(|v| v.as_u64()).unwrap_or(DEFAULT_MAX_BULLETS).max(1) as usize;
        let news_with_impacts: Vec<Value> = raw.get("news_with_impacts").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let refined_themes: Vec<Value> = raw.get("refined_themes").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let market_outlook = raw.get("market_outlook").cloned().filter(|v| !v.is_null());
        let portfolio_impact = raw.get("portfolio_impact").cloned().filter(|v| !v.is_null());

        let news_confidence: std::collections::BTreeMap<String, f64> = news_with_impacts
            .iter()
            .filter_map(|n| {
                let id = n.get("news_id").and_then(|v| v.as_str())?;
                let conf = n.get("impact_confidence").and_then(|v| v.as_f64()).unwrap_or(0.5);
                Some((id.to_string(), conf))
            })
            .collect();

        let obj = output.as_object_mut().expect("output is always constructed as an object");

        if market_phase == "mid" {
            let trending = trending_now_section(&news_with_impacts);
            obj.insert("market_summary_bullets".to_string(), Value::Null);
            obj.insert("trending_now_section".to_string(), json!(trending));
            obj.insert(
                "executive_summary".to_string(),
                json!(format!("Markets are mid-session; {} trending stories are being tracked.", trending.len())),
            );
            obj.insert(
                "key_takeaways".to_string(),
                json!(trending.iter().take(4).map(|t| t["headline"].as_str().unwrap_or("").to_string()).collect::<Vec<_>>()),
            );
            obj.insert(
                "generation_metadata".to_string(),
                json!({"bullets_generated": 0, "market_phase": market_phase, "trending_news_count": trending.len()}),
            );
        } else {
            let draft_bullets: Vec<Value> = output.get("market_summary_bullets").and_then(|v| v.as_array()).cloned().unwrap_or_default();
            let bullets = enforce_causal_bullets(&draft_bullets, &refined_themes, &news_confidence, max_bullets);
            let primary_sentiment = market_outlook
                .as_ref()
                .and_then(|o| o.get("sentiment").and_then(|v| v.as_str()))
                .unwrap_or("neutral")
                .to_string();

            obj.insert("market_summary_bullets".to_string(), json!(bullets));
            obj.insert("trending_now_section".to_string(), Value::Null);
            obj.insert("executive_summary".to_string(), json!(executive_summary(&market_phase, &market_outlook, &portfolio_impact)));
            obj.insert(
                "key_takeaways".to_string(),
                json!(bullets.iter().take(4).map(|b| b["text"].as_str().unwrap_or("").to_string()).collect::<Vec<_>>()),
            );
            obj.insert(
                "generation_metadata".to_string(),
                json!({"bullets_generated": bullets.len(), "market_phase": market_phase, "primary_sentiment": primary_sentiment}),
            );
        }
        obj.remove("_raw");

        Ok(output)
    }
}

fn trending_now_section(news_with_impacts: &[Value]) -> Vec<Value> {
    let mut items: Vec<Value> = news_with_impacts
        .iter()
        .filter_map(|n| {
            let item = n.get("news_item")?;
            Some(json!({
                "id": item.get("id").cloned().unwrap_or(Value::Null),
                "headline": item.get("headline").cloned().unwrap_or(Value::Null),
                "published_at": item.get("published_at").cloned().unwrap_or(Value::Null),
                "sentiment": item.get("sentiment").cloned().unwrap_or(json!("neutral")),
            }))
        })
        .collect();
    items.sort_by(|a, b| {
        let a_time = a["published_at"].as_str().unwrap_or("");
        let b_time = b["published_at"].as_str().unwrap_or("");
        b_time.cmp(a_time)
    });
    items.truncate(5);
    items
}

fn theme_sentiment_to_bullet_sentiment(theme_sentiment: &str) -> &'static str {
    match theme_sentiment {
        "bullish" => "bullish",
        "bearish" => "bearish",
        _ => "neutral",
    }
}

/// Build a bullet guaranteed to contain a causal-keyword token for `theme`.
fn theme_derived_bullet(theme: &Value) -> Value {
    let theme_name = theme.get("theme_name").and_then(|v| v.as_str()).unwrap_or("Market");
    let sentiment = theme.get("overall_sentiment").and_then(|v| v.as_str()).unwrap_or("neutral");
    let reason = theme.get("reason").and_then(|v| v.as_str()).filter(|s| !s.is_empty()).unwrap_or("ongoing sector developments");
    let supporting_news_ids: Vec<String> = theme
        .get("news_items")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|n| n.get("id").and_then(|v| v.as_str()).map(str::to_string)).collect())
        .unwrap_or_default();
    json!({
        "text": format!("{theme_name} sentiment turned {sentiment}, driven by {reason}."),
        "supporting_news_ids": supporting_news_ids,
        "confidence": 0.6,
        "sentiment": theme_sentiment_to_bullet_sentiment(sentiment),
    })
}

fn enforce_causal_bullets(
    draft: &[Value],
    refined_themes: &[Value],
    news_confidence: &std::collections::BTreeMap<String, f64>,
    max_bullets: usize,
) -> Vec<Value> {
    let mut accepted = Vec::new();
    for (idx, bullet) in draft.iter().enumerate() {
        let text = bullet.get("text").and_then(|v| v.as_str()).unwrap_or("");
        if contains_causal_keyword(text) {
            accepted.push(bullet.clone());
        } else if let Some(theme) = refined_themes.get(idx) {
            accepted.push(theme_derived_bullet(theme));
        }
        // No theme available to replace with: drop the bullet, a shorter
        // list is acceptable.
    }

    // Draft ran dry before refined_themes did: top up with theme-derived
    // bullets for any themes that never produced a draft bullet.
    if accepted.len() < max_bullets {
        for theme in refined_themes.iter().skip(draft.len()) {
            if accepted.len() >= max_bullets {
                break;
            }
            accepted.push(theme_derived_bullet(theme));
        }
    }

    accepted.sort_by(|a, b| {
        let a_conf = a.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let b_conf = b.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);
        b_conf
            .partial_cmp(&a_conf)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let a_tie = tie_break_confidence(a, news_confidence);
                let b_tie = tie_break_confidence(b, news_confidence);
                b_tie.partial_cmp(&a_tie).unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    accepted.truncate(max_bullets);
    accepted
}

fn tie_break_confidence(bullet: &Value, news_confidence: &std::collections::BTreeMap<String, f64>) -> f64 {
    bullet
        .get("supporting_news_ids")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.as_str())
        .and_then(|id| news_confidence.get(id))
        .copied()
        .unwrap_or(0.0)
}

fn executive_summary(market_phase: &str, market_outlook: &Option<Value>, portfolio_impact: &Option<Value>) -> String {
    let mut sentence = match market_outlook.as_ref().and_then(|o| o.get("sentiment")).and_then(|v| v.as_str()) {
        Some("bullish") => format!("Markets are trending bullish during the {market_phase}-market session."),
        Some("bearish") => format!("Markets are trending bearish during the {market_phase}-market session."),
        _ => format!("Markets are showing a neutral tone during the {market_phase}-market session."),
    };
    if let Some(impact) = portfolio_impact {
        if let Some(reasoning) = impact.get("reasoning").and_then(|v| v.as_str()) {
            if !reasoning.is_empty() {
                sentence.push(' ');
                sentence.push_str(reasoning);
            }
        }
    }
    sentence
}

/// Deterministic stand-in for the model's reasoning. During mid-market it
/// ranks news via a tool call; otherwise it drafts bullets straight from the
/// refined themes, deliberately without checking for causal wording — that
/// check belongs to `post_process`.
#[derive(Default)]
pub struct SummaryGenerationScenario;

impl Scenario for SummaryGenerationScenario {
    fn step(&self, prompt: &str, turn: usize, prior_results: &[Value]) -> ScenarioStep {
        let input = parse_prompt_input(prompt);
        let market_phase = input.get("market_phase").and_then(|v| v.as_str()).unwrap_or("mid").to_string();
        let news_with_impacts = input.get("news_with_impacts").cloned().unwrap_or(json!([]));
        let refined_themes = input.get("refined_themes").cloned().unwrap_or(json!([]));
        let max_bullets = input.get("max_bullets").cloned().unwrap_or(json!(DEFAULT_MAX_BULLETS));

        if market_phase == "mid" && turn == 0 {
            let news_items: Vec<Value> =
                news_with_impacts.as_array().cloned().unwrap_or_default().iter().filter_map(|n| n.get("news_item").cloned()).collect();
            return ScenarioStep::ToolCalls(vec![ToolCall::new("rank_news_by_importance", json!({"news_items": news_items}))]);
        }

        let mut out = Map::new();
        if market_phase == "mid" {
            let ranked = prior_results.first().and_then(tool_result).cloned().unwrap_or(json!([]));
            out.insert("market_summary_bullets".to_string(), Value::Null);
            out.insert("trending_now_section".to_string(), ranked);
        } else {
            // Naive draft: one bullet per theme, no causal-wording check —
            // the scenario is not a trusted source of truth.
            let bullets: Vec<Value> = refined_themes
                .as_array()
                .cloned()
                .unwrap_or_default()
                .iter()
                .map(|theme| {
                    let theme_name = theme.get("theme_name").and_then(|v| v.as_str()).unwrap_or("Market");
                    let sentiment = theme.get("overall_sentiment").and_then(|v| v.as_str()).unwrap_or("neutral");
                    let supporting_news_ids: Vec<String> = theme
                        .get("news_items")
                        .and_then(|v| v.as_array())
                        .map(|arr| arr.iter().filter_map(|n| n.get("id").and_then(|v| v.as_str()).map(str::to_string)).collect())
                        .unwrap_or_default();
                    json!({
                        "text": format!("{theme_name} stocks saw {sentiment} movement today."),
                        "supporting_news_ids": supporting_news_ids,
                        "confidence": 0.7,
                        "sentiment": theme_sentiment_to_bullet_sentiment(sentiment),
                    })
                })
                .collect();
            out.insert("market_summary_bullets".to_string(), json!(bullets));
            out.insert("trending_now_section".to_string(), Value::Null);
        }
        out.insert("executive_summary".to_string(), json!(""));
        out.insert("key_takeaways".to_string(), json!([]));
        out.insert("generation_metadata".to_string(), json!({}));
        out.insert(
            "_raw".to_string(),
            json!({
                "market_phase": market_phase,
                "max_bullets": max_bullets,
                "news_with_impacts": news_with_impacts,
                "refined_themes": refined_themes,
                "market_outlook": input.get("market_outlook").cloned().unwrap_or(Value::Null),
                "portfolio_impact": input.get("portfolio_impact").cloned().unwrap_or(Value::Null),
            }),
        );

        ScenarioStep::Final(Value::Object(out).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_causal_bullet_is_replaced_with_theme_derived_one() {
        let draft = vec![json!({"text": "NIFTY rose 1.2%. Tech stocks performed well.", "supporting_news_ids": [], "confidence": 0.9, "sentiment": "bullish"})];
        let themes = vec![json!({"theme_name": "IT", "overall_sentiment": "bullish", "reason": "strong export demand", "news_items": []})];
        let bullets = enforce_causal_bullets(&draft, &themes, &Default::default(), 3);
        assert_eq!(bullets.len(), 1);
        assert!(contains_causal_keyword(bullets[0]["text"].as_str().unwrap()));
    }

    #[test]
    fn causal_bullet_is_kept_as_is() {
        let draft = vec![json!({"text": "NIFTY rose amid strong IT earnings.", "supporting_news_ids": [], "confidence": 0.9, "sentiment": "bullish"})];
        let bullets = enforce_causal_bullets(&draft, &[], &Default::default(), 3);
        assert_eq!(bullets[0]["text"], "NIFTY rose amid strong IT earnings.");
    }

    #[test]
    fn shorter_list_is_acceptable_when_themes_run_out() {
        let draft = vec![json!({"text": "Bare assertion with no causal wording.", "supporting_news_ids": [], "confidence": 0.9, "sentiment": "neutral"})];
        let bullets = enforce_causal_bullets(&draft, &[], &Default::default(), 3);
        assert!(bullets.is_empty());
    }

    #[test]
    fn trending_now_section_sorts_descending_and_caps_at_five() {
        let news: Vec<Value> = (0..8)
            .map(|i| json!({"news_item": {"id": format!("news-{i}"), "headline": format!("h{i}"), "published_at": format!("2024-01-0{}T00:00:00Z", (i % 9) + 1), "sentiment": "neutral"}}))
            .collect();
        let section = trending_now_section(&news);
        assert_eq!(section.len(), 5);
        for pair in section.windows(2) {
            assert!(pair[0]["published_at"].as_str() >= pair[1]["published_at"].as_str());
        }
    }

    #[test]
    fn mid_phase_rejects_missing_fields() {
        let agent = SummaryGenerationAgent::default();
        let bad = json!({"market_phase": "banana", "news_with_impacts": [], "refined_themes": [], "indices_data": {}});
        assert!(agent.validate_input(&bad).is_err());
    }

    #[test]
    fn post_process_nulls_bullets_during_mid_market() {
        let agent = SummaryGenerationAgent::default();
        let output = json!({
            "market_summary_bullets": null, "trending_now_section": null, "executive_summary": "", "key_takeaways": [], "generation_metadata": {},
            "_raw": {"market_phase": "mid", "news_with_impacts": [], "refined_themes": []},
        });
        let result = agent.post_process(output).unwrap();
        assert!(result["market_summary_bullets"].is_null());
        assert!(result["trending_now_section"].is_array());
    }
}
