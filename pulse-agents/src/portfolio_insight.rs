//! Portfolio Insight Agent: connects news to portfolio/watchlist holdings
//! (direct mention or indirect sector/supply-chain correlation), builds
//! causal chains, weights portfolio-level impact, refines themes against the
//! allowed catalog, and raises watchlist alerts.
//!
//! The scenario only fetches raw materials and forwards them; every rule in
//! §4.6 is computed by [`PortfolioInsightAgent::post_process`], which is the
//! authoritative layer — the model is not trusted with the arithmetic.

use crate::{parse_prompt_input, render_compact, tool_result};
use pulse_agent_runtime::{Agent, AgentError, AgentSpec, ValidationError};
use pulse_gateway::{Scenario, ScenarioStep, ToolCall};
use pulse_types::{normalize_theme_to_allowed, MAX_THEMED_NEWS_ITEMS};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Fixed system prompt for the Portfolio Insight agent.
pub const SYSTEM_PROMPT: &str = "You are a Portfolio Insight Agent. Retrieve the user's watchlist, portfolio \
holdings, and preferences, then connect each news item to affected holdings — whether by direct mention or by \
indirect supply-chain/sector correlation. Build explicit causal chains (for example: 'Oil prices rise -> \
increased input costs -> negative for paint companies'), weight portfolio-level impact by allocation rather \
than counting holdings equally, and generate watchlist alerts (opportunity, risk, or informational) plus \
user-relevance-scored refined themes. Be specific about causal relationships; avoid generic statements, and \
prioritize holdings that need attention.";

/// Agent name, used as the cache/scenario registration key.
pub const NAME: &str = "portfolio_insight";

fn default_spec() -> AgentSpec {
    AgentSpec {
        name: NAME.to_string(),
        description: "Connects news to portfolio/watchlist holdings and raises watchlist alerts".to_string(),
        system_prompt: SYSTEM_PROMPT.to_string(),
        tool_set: vec![
            "fetch_user_watchlist".to_string(),
            "fetch_user_portfolio".to_string(),
            "get_user_preferences".to_string(),
            "identify_sector_from_stocks".to_string(),
            "analyze_supply_chain_impact".to_string(),
        ],
        temperature: 0.3,
        max_output_tokens: 3072,
        timeout: Duration::from_secs(8),
        retry_attempts: 2,
        cacheable: true,
    }
}

/// The Portfolio Insight agent.
pub struct PortfolioInsightAgent {
    spec: AgentSpec,
}

impl Default for PortfolioInsightAgent {
    fn default() -> Self {
        Self { spec: default_spec() }
    }
}

impl PortfolioInsightAgent {
    /// Build the agent with a caller-supplied spec (e.g. to override timeout
    /// or retry policy from process configuration) rather than the default.
    pub fn new(spec: AgentSpec) -> Self {
        Self { spec }
    }
}

impl Agent for PortfolioInsightAgent {
    fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    fn validate_input(&self, input: &Value) -> Result<(), ValidationError> {
        if !input.get("user_id").is_some_and(|v| v.is_string()) {
            return Err(ValidationError::new("user_id", "must be a string"));
        }
        if !input.get("news_items").is_some_and(|v| v.is_array()) {
            return Err(ValidationError::new("news_items", "must be an array"));
        }
        if !input.get("preliminary_themes").is_some_and(|v| v.is_array()) {
            return Err(ValidationError::new("preliminary_themes", "must be an array"));
        }
        Ok(())
    }

    fn render_prompt(&self, input: &Value) -> String {
        render_compact(input)
    }

    fn required_output_fields(&self) -> &[&str] {
        &[
            "watchlist",
            "portfolio_holdings",
            "sector_exposure",
            "news_with_impacts",
            "refined_themes",
            "portfolio_impact",
            "watchlist_alerts",
        ]
    }

    fn validate_output(&self, output: &Value) -> Result<(), ValidationError> {
        for field in self.required_output_fields() {
            if output.get(*field).is_none() {
                return Err(ValidationError::new(*field, "missing from output"));
            }
        }
        Ok(())
    }

    fn post_process(&self, mut output: Value) -> Result<Value, AgentError> {
        let raw = output.get("_raw").cloned().unwrap_or(json!({}));
        let sector_map: BTreeMap<String, String> = raw
            .get("sector_map")
            .and_then(|v| v.as_object())
            .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
            .unwrap_or_default();
        let supply_chain: Vec<Value> = raw.get("supply_chain_matches").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let news_items: Vec<Value> = raw.get("news_items").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let preliminary_themes: Vec<Value> = raw.get("preliminary_themes").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let portfolio: Vec<Value> = output.get("portfolio_holdings").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let watchlist: BTreeSet<String> = output
            .get("watchlist")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let portfolio_sectors: BTreeMap<String, String> = portfolio
            .iter()
            .filter_map(|h| {
                let ticker = h.get("ticker")?.as_str()?.to_string();
                let sector = h.get("sector")?.as_str()?.to_string();
                Some((ticker, sector))
            })
            .collect();

        let news_with_impacts = build_news_with_impacts(&news_items, &sector_map, &supply_chain, &portfolio_sectors, &watchlist);
        let sector_exposure = sector_exposure(&portfolio);
        let refined_themes = refine_themes(&preliminary_themes, &news_with_impacts, &portfolio_sectors);
        let portfolio_impact = portfolio_impact(&portfolio, &news_with_impacts);
        let watchlist_alerts = watchlist_alerts(&watchlist, &news_with_impacts);

        let obj = output.as_object_mut().expect("output is always constructed as an object");
        obj.insert("sector_exposure".to_string(), sector_exposure);
        obj.insert(
            "news_with_impacts".to_string(),
            Value::Array(news_with_impacts.iter().map(NewsImpact::to_value).collect()),
        );
        obj.insert("refined_themes".to_string(), json!(refined_themes));
        obj.insert("portfolio_impact".to_string(), portfolio_impact);
        obj.insert("watchlist_alerts".to_string(), json!(watchlist_alerts));
        obj.remove("_raw");

        Ok(output)
    }
}

fn impact_for_sentiment(sentiment: &str) -> &'static str {
    match sentiment {
        "bullish" => "positive",
        "bearish" => "negative",
        _ => "neutral",
    }
}

struct NewsImpact {
    news_id: String,
    news_item: Value,
    impacted_stocks: Vec<Value>,
    sector_impacts: BTreeMap<String, String>,
    causal_chain: String,
    impact_confidence: f64,
}

fn build_news_with_impacts(
    news_items: &[Value],
    sector_map: &BTreeMap<String, String>,
    supply_chain: &[Value],
    portfolio_sectors: &BTreeMap<String, String>,
    watchlist: &BTreeSet<String>,
) -> Vec<NewsImpact> {
    news_items
        .iter()
        .map(|item| {
            let news_id = item.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let headline = item.get("headline").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let sentiment = item.get("sentiment").and_then(|v| v.as_str()).unwrap_or("neutral");
            let direct_impact = impact_for_sentiment(sentiment);
            let mentioned_stocks: Vec<String> = item
                .get("mentioned_stocks")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            let mentioned_sectors: BTreeSet<String> = item
                .get("mentioned_sectors")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();

            let mut impacted_stocks = Vec::new();
            let mut seen_tickers = BTreeSet::new();
            let mut chains = Vec::new();

            for ticker in &mentioned_stocks {
                seen_tickers.insert(ticker.clone());
                let chain = format!("{headline} directly references {ticker}");
                impacted_stocks.push(json!({
                    "ticker": ticker, "impact": direct_impact, "magnitude": "medium", "causal_chain": chain,
                }));
                chains.push(chain);
            }

            // Indirect: any portfolio or watchlist ticker whose sector matches a
            // supply-chain rule triggered by this item's sectors, not already
            // covered directly.
            let mut candidate_tickers: BTreeSet<String> = portfolio_sectors.keys().cloned().collect();
            candidate_tickers.extend(watchlist.iter().cloned());
            candidate_tickers.extend(sector_map.keys().cloned());

            for rule in supply_chain {
                let rule_sector = rule.get("sector").and_then(|v| v.as_str()).unwrap_or_default();
                if !mentioned_sectors.contains(rule_sector) && !mentioned_sectors.iter().any(|s| s == rule_sector) {
                    continue;
                }
                let impact = rule.get("impact").and_then(|v| v.as_str()).unwrap_or("neutral");
                let magnitude = rule.get("magnitude").and_then(|v| v.as_str()).unwrap_or("low");
                let chain = rule.get("causal_chain").and_then(|v| v.as_str()).unwrap_or("indirect sector impact").to_string();

                for ticker in &candidate_tickers {
                    if seen_tickers.contains(ticker) {
                        continue;
                    }
                    let ticker_sector = portfolio_sectors.get(ticker).or_else(|| sector_map.get(ticker));
                    if ticker_sector.map(|s| s.as_str()) != Some(rule_sector) {
                        continue;
                    }
                    seen_tickers.insert(ticker.clone());
                    impacted_stocks.push(json!({
                        "ticker": ticker, "impact": impact, "magnitude": magnitude, "causal_chain": chain,
                    }));
                    chains.push(chain.clone());
                }
            }

            let mut sector_impacts = BTreeMap::new();
            for sector in &mentioned_sectors {
                sector_impacts.insert(sector.clone(), direct_impact.to_string());
            }
            for rule in supply_chain {
                if let Some(sector) = rule.get("sector").and_then(|v| v.as_str()) {
                    if mentioned_sectors.contains(sector) {
                        if let Some(impact) = rule.get("impact").and_then(|v| v.as_str()) {
                            sector_impacts.insert(sector.to_string(), impact.to_string());
                        }
                    }
                }
            }

            let causal_chain = if chains.is_empty() {
                format!("{headline} affects broader market sentiment")
            } else {
                chains.join("; ")
            };
            let impact_confidence = (0.5 + 0.1 * impacted_stocks.len() as f64).min(1.0);

            NewsImpact {
                news_id,
                news_item: item.clone(),
                impacted_stocks,
                sector_impacts,
                causal_chain,
                impact_confidence,
            }
        })
        .collect()
}

impl NewsImpact {
    fn to_value(&self) -> Value {
        json!({
            "news_id": self.news_id,
            "news_item": self.news_item,
            "impacted_stocks": self.impacted_stocks,
            "sector_impacts": self.sector_impacts,
            "causal_chain": self.causal_chain,
            "impact_confidence": self.impact_confidence,
        })
    }
}

fn sector_exposure(portfolio: &[Value]) -> Value {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for holding in portfolio {
        let sector = holding.get("sector").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();
        let value = holding.get("current_value").and_then(|v| v.as_f64()).unwrap_or(0.0);
        *totals.entry(sector).or_insert(0.0) += value;
    }
    json!(totals)
}

fn refine_themes(preliminary_themes: &[Value], news_with_impacts: &[NewsImpact], portfolio_sectors: &BTreeMap<String, String>) -> Vec<Value> {
    let portfolio_tickers: BTreeSet<&String> = portfolio_sectors.keys().collect();

    let mut ranked: Vec<(Value, usize, f64)> = preliminary_themes
        .iter()
        .filter_map(|theme| {
            let raw_name = theme.get("theme_name").and_then(|v| v.as_str())?;
            let normalized = normalize_theme_to_allowed(raw_name)?;
            let impacted_stocks: Vec<String> = theme
                .get("impacted_stocks")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            let count_impacted_holdings = impacted_stocks.iter().filter(|t| portfolio_tickers.contains(t)).count();

            let theme_news_ids: BTreeSet<String> = theme
                .get("news_items")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|n| n.get("id").and_then(|v| v.as_str()).map(str::to_string)).collect())
                .unwrap_or_default();
            let matching: Vec<f64> = news_with_impacts
                .iter()
                .filter(|n| theme_news_ids.contains(&n.news_id))
                .map(|n| n.impact_confidence)
                .collect();
            let confidence = if matching.is_empty() { 0.5 } else { matching.iter().sum::<f64>() / matching.len() as f64 };

            Some((
                json!({
                    "theme_name": normalized,
                    "news_items": theme.get("news_items").cloned().unwrap_or(json!([])),
                    "overall_sentiment": theme.get("overall_sentiment").cloned().unwrap_or(json!("neutral")),
                    "impacted_stocks": impacted_stocks,
                    "reason": theme.get("reason").cloned().unwrap_or(json!("")),
                }),
                count_impacted_holdings,
                confidence,
            ))
        })
        .collect();

    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal)));
    ranked.into_iter().take(MAX_THEMED_NEWS_ITEMS).map(|(v, _, _)| v).collect()
}

fn portfolio_impact(portfolio: &[Value], news_with_impacts: &[NewsImpact]) -> Value {
    let total_value: f64 = portfolio.iter().filter_map(|h| h.get("current_value").and_then(|v| v.as_f64())).sum();

    let mut weight_by_ticker: BTreeMap<String, (f64, String)> = BTreeMap::new();
    for news in news_with_impacts {
        for stock in &news.impacted_stocks {
            let Some(ticker) = stock.get("ticker").and_then(|v| v.as_str()) else { continue };
            let Some(holding) = portfolio.iter().find(|h| h.get("ticker").and_then(|v| v.as_str()) == Some(ticker)) else { continue };
            let value = holding.get("current_value").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let impact = stock.get("impact").and_then(|v| v.as_str()).unwrap_or("neutral").to_string();
            weight_by_ticker.insert(ticker.to_string(), (value, impact));
        }
    }

    let positive_weight: f64 = weight_by_ticker.values().filter(|(_, i)| i == "positive").map(|(v, _)| v).sum();
    let negative_weight: f64 = weight_by_ticker.values().filter(|(_, i)| i == "negative").map(|(v, _)| v).sum();

    let overall_sentiment = if total_value > 0.0 && positive_weight / total_value >= 0.2 && negative_weight / total_value >= 0.2 {
        "mixed"
    } else if positive_weight > negative_weight && positive_weight > 0.0 {
        "positive"
    } else if negative_weight > positive_weight && negative_weight > 0.0 {
        "negative"
    } else {
        "neutral"
    };

    let mut top_affected: Vec<(String, f64)> = weight_by_ticker.iter().map(|(t, (v, _))| (t.clone(), *v)).collect();
    top_affected.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let top_affected_holdings: Vec<String> = top_affected.into_iter().take(3).map(|(t, _)| t).collect();

    let reasoning = if weight_by_ticker.is_empty() {
        "No portfolio holdings were referenced by today's news.".to_string()
    } else {
        format!(
            "{} holding(s) referenced: {:.0} in positive-impact value, {:.0} in negative-impact value, out of a portfolio of {:.0}.",
            weight_by_ticker.len(),
            positive_weight,
            negative_weight,
            total_value
        )
    };

    json!({
        "overall_sentiment": overall_sentiment,
        "top_affected_holdings": top_affected_holdings,
        "reasoning": reasoning,
    })
}

fn watchlist_alerts(watchlist: &BTreeSet<String>, news_with_impacts: &[NewsImpact]) -> Vec<Value> {
    let mut alerts = Vec::new();
    for ticker in watchlist {
        let mut referenced_news_ids = Vec::new();
        let mut impacts = Vec::new();
        let mut reason = None;
        for news in news_with_impacts {
            if let Some(stock) = news.impacted_stocks.iter().find(|s| s.get("ticker").and_then(|v| v.as_str()) == Some(ticker.as_str())) {
                referenced_news_ids.push(news.news_id.clone());
                impacts.push(stock.get("impact").and_then(|v| v.as_str()).unwrap_or("neutral").to_string());
                if reason.is_none() {
                    reason = stock.get("causal_chain").and_then(|v| v.as_str()).map(str::to_string);
                }
            }
        }
        if referenced_news_ids.is_empty() {
            continue;
        }
        let kind = if impacts.iter().any(|i| i == "positive") && !impacts.iter().any(|i| i == "negative") {
            "opportunity"
        } else if impacts.iter().any(|i| i == "negative") && !impacts.iter().any(|i| i == "positive") {
            "risk"
        } else if impacts.iter().any(|i| i == "negative") {
            "risk"
        } else {
            "informational"
        };
        alerts.push(json!({
            "ticker": ticker,
            "kind": kind,
            "reason": reason.unwrap_or_else(|| format!("{ticker} referenced in recent news")),
            "referenced_news_ids": referenced_news_ids,
        }));
    }
    alerts
}

/// Deterministic stand-in for the model's reasoning: fetch raw materials on
/// turn 0, then forward them (plus empty-shaped placeholders for the
/// computed fields) for `post_process` to fill in authoritatively.
#[derive(Default)]
pub struct PortfolioInsightScenario;

impl Scenario for PortfolioInsightScenario {
    fn step(&self, prompt: &str, turn: usize, prior_results: &[Value]) -> ScenarioStep {
        let input = parse_prompt_input(prompt);

        if turn == 0 {
            let user_id = input.get("user_id").cloned().unwrap_or(json!(""));
            let news_items = input.get("news_items").cloned().unwrap_or(json!([]));
            let all_stocks: Vec<String> = news_items
                .as_array()
                .cloned()
                .unwrap_or_default()
                .iter()
                .flat_map(|n| n.get("mentioned_stocks").and_then(|v| v.as_array()).cloned().unwrap_or_default())
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            let headlines: Vec<String> = news_items
                .as_array()
                .cloned()
                .unwrap_or_default()
                .iter()
                .filter_map(|n| n.get("headline").and_then(|v| v.as_str()).map(str::to_string))
                .collect();
            return ScenarioStep::ToolCalls(vec![
                ToolCall::new("fetch_user_watchlist", json!({"user_id": user_id})),
                ToolCall::new("fetch_user_portfolio", json!({"user_id": user_id})),
                ToolCall::new("get_user_preferences", json!({"user_id": user_id})),
                ToolCall::new("identify_sector_from_stocks", json!({"tickers": all_stocks})),
                ToolCall::new("analyze_supply_chain_impact", json!({"trigger": headlines.join(". ")})),
            ]);
        }

        let watchlist = prior_results.first().and_then(tool_result).cloned().unwrap_or(json!([]));
        let portfolio_holdings = prior_results.get(1).and_then(tool_result).cloned().unwrap_or(json!([]));
        let sector_map = prior_results.get(3).and_then(tool_result).cloned().unwrap_or(json!({}));
        let supply_chain_matches = prior_results.get(4).and_then(tool_result).cloned().unwrap_or(json!([]));

        let mut out = Map::new();
        out.insert("watchlist".to_string(), watchlist);
        out.insert("portfolio_holdings".to_string(), portfolio_holdings);
        out.insert("sector_exposure".to_string(), json!({}));
        out.insert("news_with_impacts".to_string(), json!([]));
        out.insert("refined_themes".to_string(), json!([]));
        out.insert("portfolio_impact".to_string(), json!({"overall_sentiment": "neutral", "top_affected_holdings": [], "reasoning": ""}));
        out.insert("watchlist_alerts".to_string(), json!([]));
        out.insert(
            "_raw".to_string(),
            json!({
                "sector_map": sector_map,
                "supply_chain_matches": supply_chain_matches,
                "news_items": input.get("news_items").cloned().unwrap_or(json!([])),
                "preliminary_themes": input.get("preliminary_themes").cloned().unwrap_or(json!([])),
            }),
        );

        ScenarioStep::Final(Value::Object(out).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_news() -> Vec<Value> {
        vec![json!({
            "id": "news-1", "headline": "Reliance surges after crude oil prices rally",
            "sentiment": "bullish", "mentioned_stocks": ["RELIANCE"], "mentioned_sectors": ["Oil, Gas & Energy"],
        })]
    }

    fn sample_portfolio() -> Vec<Value> {
        vec![json!({"ticker": "RELIANCE", "quantity": 10.0, "current_value": 100000.0, "sector": "Oil, Gas & Energy"})]
    }

    #[test]
    fn news_with_impacts_picks_up_direct_mention() {
        let news = sample_news();
        let impacts = build_news_with_impacts(&news, &BTreeMap::new(), &[], &BTreeMap::new(), &BTreeSet::new());
        assert_eq!(impacts.len(), 1);
        assert_eq!(impacts[0].impacted_stocks[0]["ticker"], "RELIANCE");
        assert_eq!(impacts[0].impacted_stocks[0]["impact"], "positive");
    }

    #[test]
    fn watchlist_alert_generated_only_when_referenced() {
        let news = sample_news();
        let impacts = build_news_with_impacts(&news, &BTreeMap::new(), &[], &BTreeMap::new(), &BTreeSet::new());
        let mut watchlist = BTreeSet::new();
        watchlist.insert("RELIANCE".to_string());
        watchlist.insert("UNRELATED".to_string());
        let alerts = watchlist_alerts(&watchlist, &impacts);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["ticker"], "RELIANCE");
        assert_eq!(alerts[0]["kind"], "opportunity");
    }

    #[test]
    fn portfolio_impact_is_positive_when_only_positive_weight_present() {
        let news = sample_news();
        let portfolio = sample_portfolio();
        let impacts = build_news_with_impacts(&news, &BTreeMap::new(), &[], &BTreeMap::new(), &BTreeSet::new());
        let impact = portfolio_impact(&portfolio, &impacts);
        assert_eq!(impact["overall_sentiment"], "positive");
        assert_eq!(impact["top_affected_holdings"][0], "RELIANCE");
    }

    #[test]
    fn refine_themes_drops_unnormalizable_theme_and_caps_at_five() {
        let themes: Vec<Value> = (0..8)
            .map(|i| json!({"theme_name": "Banking & Financials", "news_items": [], "impacted_stocks": [], "overall_sentiment": "bullish", "reason": format!("r{i}")}))
            .chain(std::iter::once(json!({"theme_name": "Nonexistent Theme", "news_items": [], "impacted_stocks": []})))
            .collect();
        let refined = refine_themes(&themes, &[], &BTreeMap::new());
        assert_eq!(refined.len(), MAX_THEMED_NEWS_ITEMS);
        assert!(refined.iter().all(|t| t["theme_name"] == "Banking & Financials"));
    }

    #[test]
    fn sector_exposure_sums_by_sector() {
        let portfolio = vec![
            json!({"ticker": "A", "current_value": 100.0, "sector": "X"}),
            json!({"ticker": "B", "current_value": 50.0, "sector": "X"}),
        ];
        let exposure = sector_exposure(&portfolio);
        assert_eq!(exposure["X"], 150.0);
    }
}
