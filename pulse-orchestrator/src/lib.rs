#![deny(missing_docs)]
//! Three-phase orchestration: a blocking Market Intelligence phase, a
//! concurrent Portfolio Insight + Summary Generation fan-out, and a
//! synchronous assembly step that projects everything into a [`Report`].
//!
//! Per-agent failures never fail the whole request — they degrade it: the
//! orchestrator substitutes an empty-shaped output, sets `degraded_mode`,
//! and records a warning. Only a hard wall-clock ceiling being exceeded
//! (defensive, since each agent already enforces its own timeout/retry
//! budget) forces a fully degraded report.

pub mod error;

pub use error::OrchestratorError;

use chrono::Utc;
use pulse_agent_runtime::{Agent, AgentRuntime, AgentSpec};
use pulse_agents::{MarketIntelligenceAgent, PortfolioInsightAgent, SummaryGenerationAgent};
use pulse_types::{
    market_phase_from_timestamp, ExecutionContext, MarketOutlook, MarketPhase, NewsImpactSummary, OrchestrationMetrics, Report, Request,
    ThemedNews, TrendingNewsItem, WatchlistAlert,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Worst-case wall-clock budget for one agent: every retry attempt at its
/// own timeout, plus the worst-case backoff sleep between attempts.
fn agent_budget(spec: &AgentSpec) -> Duration {
    let attempts = spec.retry_attempts + 1;
    let total_timeout = spec.timeout.saturating_mul(attempts);
    let total_backoff = Duration::from_millis(2000).saturating_mul(spec.retry_attempts);
    total_timeout + total_backoff
}

/// Drives the three concrete agents through the request/response lifecycle.
pub struct Orchestrator {
    runtime: Arc<AgentRuntime>,
    intelligence: Arc<MarketIntelligenceAgent>,
    insight: Arc<PortfolioInsightAgent>,
    summary: Arc<SummaryGenerationAgent>,
    max_bullets: u64,
}

impl Orchestrator {
    /// Build an orchestrator over the given runtime and concrete agents.
    pub fn new(
        runtime: Arc<AgentRuntime>,
        intelligence: Arc<MarketIntelligenceAgent>,
        insight: Arc<PortfolioInsightAgent>,
        summary: Arc<SummaryGenerationAgent>,
        max_bullets: u64,
    ) -> Result<Self, OrchestratorError> {
        if max_bullets == 0 {
            return Err(OrchestratorError::InvalidConfig("max_bullets must be at least 1".to_string()));
        }
        Ok(Self {
            runtime,
            intelligence,
            insight,
            summary,
            max_bullets,
        })
    }

    /// The hard wall-clock ceiling for one orchestration: Phase A's worst
    /// case plus the slower of Phase B's two agents, plus slack for the
    /// (trivial, synchronous) assembly step.
    pub fn hard_ceiling(&self) -> Duration {
        let phase_a = agent_budget(self.intelligence.spec());
        let phase_b = agent_budget(self.insight.spec()).max(agent_budget(self.summary.spec()));
        phase_a + phase_b + Duration::from_millis(500)
    }

    /// Run one request through all three phases, always returning a report
    /// — agent failures degrade the result rather than propagating.
    pub async fn orchestrate(&self, request: Request) -> Report {
        let ctx = ExecutionContext::new(None, request.user_id.clone(), Utc::now());
        let span = tracing::info_span!("orchestrate", request_id = %ctx.request_id, user_id = %ctx.user_id);
        let ceiling = self.hard_ceiling();

        match tokio::time::timeout(ceiling, self.run_phases(request.clone(), ctx.clone())).instrument(span).await {
            Ok(report) => report,
            Err(_) => {
                tracing::warn!(request_id = %ctx.request_id, ceiling_ms = ceiling.as_millis() as u64, "hard ceiling exceeded");
                self.hard_ceiling_report(&request, &ctx)
            }
        }
    }

    async fn run_phases(&self, request: Request, ctx: ExecutionContext) -> Report {
        let mut warnings = Vec::new();
        let mut degraded = false;
        let mut latency_ms = BTreeMap::new();
        let mut cache_hits = BTreeMap::new();

        // Phase A: Market Intelligence, blocking.
        let intelligence_input = json!({
            "selected_indices": request.selected_indices,
            "timestamp": request.timestamp,
            "force_refresh": request.force_refresh,
        });
        let t0 = Instant::now();
        let intelligence_output = match self.runtime.execute(&*self.intelligence, intelligence_input, request.force_refresh, &ctx).await {
            Ok(execution) => {
                cache_hits.insert("market_intelligence".to_string(), execution.cache_hit);
                execution.output
            }
            Err(err) => {
                tracing::warn!(request_id = %ctx.request_id, error = %err, "market_intelligence failed, degrading");
                warnings.push(if matches!(err, pulse_agent_runtime::AgentError::Timeout(_)) {
                    "market_intelligence timeout".to_string()
                } else {
                    format!("market_intelligence failed: {err}")
                });
                degraded = true;
                cache_hits.insert("market_intelligence".to_string(), false);
                empty_intelligence_blob(request.timestamp)
            }
        };
        latency_ms.insert("market_intelligence".to_string(), t0.elapsed().as_millis() as u64);

        // Phase B: Portfolio Insight + Summary Generation, concurrent,
        // isolated failure (one agent's failure never cancels the other).
        let insight_input = json!({
            "user_id": request.user_id,
            "news_items": intelligence_output.get("news_items").cloned().unwrap_or(json!([])),
            "preliminary_themes": intelligence_output.get("preliminary_themes").cloned().unwrap_or(json!([])),
            "market_outlook": intelligence_output.get("market_outlook").cloned().unwrap_or(Value::Null),
        });
        let summary_input = json!({
            "market_phase": intelligence_output.get("market_phase").cloned().unwrap_or(json!("mid")),
            "news_with_impacts": derive_news_with_impacts_placeholder(&intelligence_output),
            "refined_themes": intelligence_output.get("preliminary_themes").cloned().unwrap_or(json!([])),
            "market_outlook": intelligence_output.get("market_outlook").cloned().unwrap_or(Value::Null),
            "portfolio_impact": Value::Null,
            "indices_data": intelligence_output.get("indices_data").cloned().unwrap_or(json!({})),
            "max_bullets": self.max_bullets,
        });

        let runtime_insight = Arc::clone(&self.runtime);
        let insight_agent = Arc::clone(&self.insight);
        let force_refresh = request.force_refresh;
        let ctx_insight = ctx.clone();
        let insight_task = tokio::spawn(
            async move { runtime_insight.execute(&*insight_agent, insight_input, force_refresh, &ctx_insight).await }
                .instrument(tracing::info_span!("portfolio_insight", request_id = %ctx.request_id)),
        );

        let runtime_summary = Arc::clone(&self.runtime);
        let summary_agent = Arc::clone(&self.summary);
        let ctx_summary = ctx.clone();
        let summary_task = tokio::spawn(
            async move { runtime_summary.execute(&*summary_agent, summary_input, force_refresh, &ctx_summary).await }
                .instrument(tracing::info_span!("summary_generation", request_id = %ctx.request_id)),
        );

        let t1 = Instant::now();
        let insight_result = insight_task.await;
        latency_ms.insert("portfolio_insight".to_string(), t1.elapsed().as_millis() as u64);
        let t2 = Instant::now();
        let summary_result = summary_task.await;
        latency_ms.insert("summary_generation".to_string(), t2.elapsed().as_millis() as u64);

        let insight_output = match insight_result {
            Ok(Ok(execution)) => {
                cache_hits.insert("portfolio_insight".to_string(), execution.cache_hit);
                execution.output
            }
            Ok(Err(err)) => {
                tracing::warn!(request_id = %ctx.request_id, error = %err, "portfolio_insight failed, degrading");
                warnings.push(if matches!(err, pulse_agent_runtime::AgentError::Timeout(_)) {
                    "portfolio_insight timeout".to_string()
                } else {
                    format!("portfolio_insight failed: {err}")
                });
                degraded = true;
                cache_hits.insert("portfolio_insight".to_string(), false);
                empty_insight_blob()
            }
            Err(join_err) => {
                tracing::warn!(request_id = %ctx.request_id, error = %join_err, "portfolio_insight task panicked, degrading");
                warnings.push(format!("portfolio_insight failed: {join_err}"));
                degraded = true;
                cache_hits.insert("portfolio_insight".to_string(), false);
                empty_insight_blob()
            }
        };

        let summary_output = match summary_result {
            Ok(Ok(execution)) => {
                cache_hits.insert("summary_generation".to_string(), execution.cache_hit);
                execution.output
            }
            Ok(Err(err)) => {
                tracing::warn!(request_id = %ctx.request_id, error = %err, "summary_generation failed, degrading");
                warnings.push(if matches!(err, pulse_agent_runtime::AgentError::Timeout(_)) {
                    "summary_generation timeout".to_string()
                } else {
                    format!("summary_generation failed: {err}")
                });
                degraded = true;
                cache_hits.insert("summary_generation".to_string(), false);
                empty_summary_blob()
            }
            Err(join_err) => {
                tracing::warn!(request_id = %ctx.request_id, error = %join_err, "summary_generation task panicked, degrading");
                warnings.push(format!("summary_generation failed: {join_err}"));
                degraded = true;
                cache_hits.insert("summary_generation".to_string(), false);
                empty_summary_blob()
            }
        };

        // Phase C: assembly, synchronous.
        assemble(&ctx, &intelligence_output, &insight_output, &summary_output, degraded, warnings, latency_ms, cache_hits)
    }

    fn hard_ceiling_report(&self, request: &Request, ctx: &ExecutionContext) -> Report {
        let market_phase = market_phase_from_timestamp(request.timestamp);
        Report {
            generated_at: Utc::now(),
            request_id: ctx.request_id.clone(),
            market_phase,
            market_outlook: None,
            indices_data: BTreeMap::new(),
            market_summary: None,
            executive_summary: None,
            trending_now: None,
            themed_news: Vec::new(),
            all_news: Vec::new(),
            watchlist_impacted: Vec::new(),
            watchlist_alerts: Vec::new(),
            portfolio_impact_summary: None,
            portfolio_sentiment: None,
            metrics: None,
            degraded_mode: true,
            warnings: vec!["orchestration hard ceiling exceeded".to_string()],
        }
    }
}

fn empty_intelligence_blob(timestamp: chrono::DateTime<Utc>) -> Value {
    json!({
        "market_phase": market_phase_from_timestamp(timestamp).to_string(),
        "indices_data": {},
        "market_outlook": Value::Null,
        "news_items": [],
        "preliminary_themes": [],
    })
}

fn empty_insight_blob() -> Value {
    json!({
        "watchlist": [],
        "portfolio_holdings": [],
        "sector_exposure": {},
        "news_with_impacts": [],
        "refined_themes": [],
        "portfolio_impact": {"overall_sentiment": "neutral", "top_affected_holdings": [], "reasoning": ""},
        "watchlist_alerts": [],
    })
}

fn empty_summary_blob() -> Value {
    json!({
        "market_summary_bullets": Value::Null,
        "trending_now_section": Value::Null,
        "executive_summary": "",
        "key_takeaways": [],
        "generation_metadata": {},
    })
}

/// Build the minimal `news_with_impacts` shape Summary Generation's schema
/// expects, out of Market Intelligence's raw `news_items` — Phase B agents
/// fan out from the same intelligence blob rather than chaining through
/// each other, so Summary Generation never sees Portfolio Insight's richer
/// impact analysis. See `DESIGN.md` for this open-question resolution.
fn derive_news_with_impacts_placeholder(intelligence_output: &Value) -> Value {
    let news_items = intelligence_output.get("news_items").and_then(|v| v.as_array()).cloned().unwrap_or_default();
    let placeholders: Vec<Value> = news_items
        .into_iter()
        .map(|item| {
            let id = item.get("id").cloned().unwrap_or(json!(""));
            let summary = item.get("summary").and_then(|v| v.as_str()).unwrap_or_default();
            json!({
                "news_id": id,
                "news_item": item,
                "impacted_stocks": [],
                "sector_impacts": {},
                "causal_chain": summary,
                "impact_confidence": 0.5,
            })
        })
        .collect();
    json!(placeholders)
}

fn assemble(
    ctx: &ExecutionContext,
    intelligence_output: &Value,
    insight_output: &Value,
    summary_output: &Value,
    degraded: bool,
    warnings: Vec<String>,
    latency_ms: BTreeMap<String, u64>,
    cache_hits: BTreeMap<String, bool>,
) -> Report {
    let market_phase: MarketPhase = intelligence_output
        .get("market_phase")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or(MarketPhase::Mid);

    let market_outlook: Option<MarketOutlook> = intelligence_output.get("market_outlook").and_then(|v| {
        if v.is_null() {
            None
        } else {
            serde_json::from_value(v.clone()).ok()
        }
    });

    let indices_data = intelligence_output
        .get("indices_data")
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| serde_json::from_value(v.clone()).ok().map(|idx| (k.clone(), idx)))
                .collect()
        })
        .unwrap_or_default();

    let market_summary = summary_output.get("market_summary_bullets").and_then(|v| {
        if v.is_null() {
            None
        } else {
            serde_json::from_value(v.clone()).ok()
        }
    });

    let executive_summary = summary_output.get("executive_summary").and_then(|v| v.as_str()).map(str::to_string).filter(|s| !s.is_empty());

    let trending_now: Option<Vec<TrendingNewsItem>> = summary_output.get("trending_now_section").and_then(|v| {
        if v.is_null() {
            None
        } else {
            serde_json::from_value(v.clone()).ok()
        }
    });

    let themed_news = project_themed_news(insight_output);
    let all_news = project_all_news(insight_output);

    let watchlist_alerts: Vec<WatchlistAlert> =
        insight_output.get("watchlist_alerts").and_then(|v| serde_json::from_value(v.clone()).ok()).unwrap_or_default();
    let watchlist_impacted = watchlist_alerts.iter().map(|a| a.ticker.clone()).collect();

    let portfolio_impact_summary = insight_output
        .get("portfolio_impact")
        .and_then(|v| v.get("reasoning"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .filter(|s| !s.is_empty());
    let portfolio_sentiment =
        insight_output.get("portfolio_impact").and_then(|v| v.get("overall_sentiment")).and_then(|v| serde_json::from_value(v.clone()).ok());

    let metrics = Some(OrchestrationMetrics {
        agent_latency_ms: latency_ms,
        cache_hits,
        retry_counts: BTreeMap::new(),
    });

    Report {
        generated_at: Utc::now(),
        request_id: ctx.request_id.clone(),
        market_phase,
        market_outlook,
        indices_data,
        market_summary,
        executive_summary,
        trending_now,
        themed_news,
        all_news,
        watchlist_impacted,
        watchlist_alerts,
        portfolio_impact_summary,
        portfolio_sentiment,
        metrics,
        degraded_mode: degraded,
        warnings,
    }
}

fn project_themed_news(insight_output: &Value) -> Vec<ThemedNews> {
    insight_output
        .get("refined_themes")
        .and_then(|v| v.as_array())
        .map(|themes| {
            themes
                .iter()
                .filter_map(|theme| {
                    let theme_name = theme.get("theme_name")?.as_str()?.to_string();
                    let overall_sentiment = serde_json::from_value(theme.get("overall_sentiment")?.clone()).ok()?;
                    let impacted_stocks = theme
                        .get("impacted_stocks")
                        .and_then(|v| v.as_array())
                        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                        .unwrap_or_default();
                    let headlines = theme
                        .get("news_items")
                        .and_then(|v| v.as_array())
                        .map(|arr| arr.iter().filter_map(|n| n.get("headline").and_then(|v| v.as_str()).map(str::to_string)).collect())
                        .unwrap_or_default();
                    Some(ThemedNews {
                        theme_name,
                        headlines,
                        overall_sentiment,
                        impacted_stocks,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn project_all_news(insight_output: &Value) -> Vec<NewsImpactSummary> {
    insight_output
        .get("news_with_impacts")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|entry| {
                    let news_id = entry.get("news_id")?.as_str()?.to_string();
                    let headline = entry.get("news_item").and_then(|n| n.get("headline")).and_then(|v| v.as_str()).unwrap_or_default().to_string();
                    let sentiment = entry
                        .get("news_item")
                        .and_then(|n| n.get("sentiment"))
                        .and_then(|v| serde_json::from_value(v.clone()).ok())
                        .unwrap_or(pulse_types::Sentiment::Neutral);
                    let impacted_stocks = entry
                        .get("impacted_stocks")
                        .and_then(|v| v.as_array())
                        .map(|arr| arr.iter().filter_map(|s| s.get("ticker").and_then(|v| v.as_str()).map(str::to_string)).collect())
                        .unwrap_or_default();
                    let causal_chain = entry.get("causal_chain").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                    Some(NewsImpactSummary {
                        news_id,
                        headline,
                        sentiment,
                        impacted_stocks,
                        causal_chain,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_agent_runtime::AgentRuntime;
    use pulse_cache::ResponseCache;
    use pulse_gateway::FakeGateway;
    use pulse_tool::ToolRegistry;
    use pulse_types::UserId;

    fn build_orchestrator() -> Orchestrator {
        let mut gateway = FakeGateway::new();
        gateway.register_scenario(pulse_agents::market_intelligence::NAME, Arc::new(pulse_agents::MarketIntelligenceScenario));
        gateway.register_scenario(pulse_agents::portfolio_insight::NAME, Arc::new(pulse_agents::PortfolioInsightScenario));
        gateway.register_scenario(pulse_agents::summary_generation::NAME, Arc::new(pulse_agents::SummaryGenerationScenario));

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(pulse_agents::fakes::FetchMarketIndicesTool)).unwrap();
        tools.register(Arc::new(pulse_agents::fakes::FetchMarketNewsTool)).unwrap();
        tools.register(Arc::new(pulse_agents::fakes::FetchUserWatchlistTool)).unwrap();
        tools.register(Arc::new(pulse_agents::fakes::FetchUserPortfolioTool)).unwrap();
        tools.register(Arc::new(pulse_agents::fakes::GetUserPreferencesTool)).unwrap();
        tools.register(Arc::new(pulse_agents::fakes::GetMarketPhaseTool)).unwrap();
        tools.register(Arc::new(pulse_agents::fakes::IdentifySectorFromStocksTool)).unwrap();
        tools.register(Arc::new(pulse_agents::fakes::AnalyzeSupplyChainImpactTool)).unwrap();
        tools.register(Arc::new(pulse_agents::fakes::GetCompanyFundamentalsTool)).unwrap();
        tools.register(Arc::new(pulse_agents::fakes::RankNewsByImportanceTool)).unwrap();

        let runtime = Arc::new(AgentRuntime::new(Arc::new(gateway), Arc::new(ResponseCache::new(true)), Arc::new(tools), 10, Duration::from_secs(300)));

        Orchestrator::new(
            runtime,
            Arc::new(MarketIntelligenceAgent::default()),
            Arc::new(PortfolioInsightAgent::default()),
            Arc::new(SummaryGenerationAgent::default()),
            3,
        )
        .unwrap()
    }

    fn sample_request(timestamp: chrono::DateTime<Utc>) -> Request {
        Request {
            user_id: UserId::new("user-1"),
            selected_indices: vec!["NIFTY 50".to_string()],
            timestamp,
            force_refresh: false,
            preferences: None,
        }
    }

    #[tokio::test]
    async fn orchestrate_produces_a_non_degraded_report_on_the_happy_path() {
        let orchestrator = build_orchestrator();
        let timestamp = Utc::now();
        let report = orchestrator.orchestrate(sample_request(timestamp)).await;
        assert!(!report.degraded_mode, "warnings: {:?}", report.warnings);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn rejects_zero_max_bullets() {
        let mut gateway = FakeGateway::new();
        gateway.register_scenario(pulse_agents::market_intelligence::NAME, Arc::new(pulse_agents::MarketIntelligenceScenario));
        let tools = ToolRegistry::new();
        let runtime = Arc::new(AgentRuntime::new(Arc::new(gateway), Arc::new(ResponseCache::new(false)), Arc::new(tools), 10, Duration::from_secs(60)));
        let result = Orchestrator::new(
            runtime,
            Arc::new(MarketIntelligenceAgent::default()),
            Arc::new(PortfolioInsightAgent::default()),
            Arc::new(SummaryGenerationAgent::default()),
            0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn hard_ceiling_is_sum_of_phase_budgets_plus_slack() {
        let orchestrator = build_orchestrator();
        let ceiling = orchestrator.hard_ceiling();
        assert!(ceiling >= Duration::from_secs(8 + 8));
    }

    #[tokio::test]
    async fn repeated_request_reports_real_cache_hits_in_metrics() {
        let orchestrator = build_orchestrator();
        let timestamp = Utc::now();

        let first = orchestrator.orchestrate(sample_request(timestamp)).await;
        let second = orchestrator.orchestrate(sample_request(timestamp)).await;

        let first_hits = first.metrics.unwrap().cache_hits;
        assert!(first_hits.values().all(|hit| !hit), "first request is never served from cache");

        let second_hits = second.metrics.unwrap().cache_hits;
        assert!(second_hits.values().all(|hit| *hit), "identical repeat request should hit the cache for every agent");
    }
}
