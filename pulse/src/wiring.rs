//! Constructs the process-wide singletons — tool registry, fake model
//! gateway, response cache, agents, and orchestrator — from a [`Config`].
//!
//! Mirrors `neuron`'s umbrella-crate role: a place that wires concrete
//! implementations together behind the trait boundaries every other crate
//! defines, adapted here from feature-gated re-exports to direct
//! construction since this repository has no alternative backends to
//! choose between at compile time.

use crate::Config;
use pulse_agent_runtime::{Agent, AgentRuntime, AgentSpec};
use pulse_agents::{
    fakes, MarketIntelligenceAgent, MarketIntelligenceScenario, PortfolioInsightAgent, PortfolioInsightScenario, SummaryGenerationAgent,
    SummaryGenerationScenario,
};
use pulse_cache::ResponseCache;
use pulse_gateway::FakeGateway;
use pulse_orchestrator::{Orchestrator, OrchestratorError};
use pulse_tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Every long-lived, process-wide handle a running orchestrator needs.
/// Built once at startup and passed around by reference/`Arc`, never as an
/// ambient global.
pub struct Singletons {
    /// The assembled orchestrator, ready to run requests.
    pub orchestrator: Orchestrator,
}

fn with_timeout(mut spec: AgentSpec, timeout: Duration, retry_attempts: u32) -> AgentSpec {
    spec.timeout = timeout;
    spec.retry_attempts = retry_attempts;
    spec
}

/// Build the tool registry with every deterministic data-source and
/// analysis tool named in the external-interfaces section registered.
fn build_tool_registry() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(fakes::FetchMarketIndicesTool)).expect("fetch_market_indices registers once");
    tools.register(Arc::new(fakes::FetchMarketNewsTool)).expect("fetch_market_news registers once");
    tools.register(Arc::new(fakes::FetchUserWatchlistTool)).expect("fetch_user_watchlist registers once");
    tools.register(Arc::new(fakes::FetchUserPortfolioTool)).expect("fetch_user_portfolio registers once");
    tools.register(Arc::new(fakes::GetUserPreferencesTool)).expect("get_user_preferences registers once");
    tools.register(Arc::new(fakes::GetMarketPhaseTool)).expect("get_market_phase registers once");
    tools.register(Arc::new(fakes::IdentifySectorFromStocksTool)).expect("identify_sector_from_stocks registers once");
    tools.register(Arc::new(fakes::AnalyzeSupplyChainImpactTool)).expect("analyze_supply_chain_impact registers once");
    tools.register(Arc::new(fakes::GetCompanyFundamentalsTool)).expect("get_company_fundamentals registers once");
    tools.register(Arc::new(fakes::RankNewsByImportanceTool)).expect("rank_news_by_importance registers once");
    tools
}

/// Build the fake model gateway, seeded with the canned scenario for each
/// of the three concrete agents. A live HTTP-backed gateway would replace
/// this construction alone — nothing downstream cares which `ModelGateway`
/// impl it receives.
fn build_gateway() -> FakeGateway {
    let mut gateway = FakeGateway::new();
    gateway.register_scenario(pulse_agents::market_intelligence::NAME, Arc::new(MarketIntelligenceScenario));
    gateway.register_scenario(pulse_agents::portfolio_insight::NAME, Arc::new(PortfolioInsightScenario));
    gateway.register_scenario(pulse_agents::summary_generation::NAME, Arc::new(SummaryGenerationScenario));
    gateway
}

/// Assemble every singleton from `config` into a ready-to-run orchestrator.
pub fn build(config: &Config) -> Result<Singletons, OrchestratorError> {
    let tools = Arc::new(build_tool_registry());
    let gateway = Arc::new(build_gateway());
    let cache = Arc::new(ResponseCache::new(config.cache_enabled));

    let runtime = Arc::new(AgentRuntime::new(
        gateway,
        cache,
        tools,
        config.max_tool_loop_turns,
        Duration::from_secs(config.cache_ttl_seconds),
    ));

    let intelligence = Arc::new(MarketIntelligenceAgent::new(with_timeout(
        MarketIntelligenceAgent::default().spec().clone(),
        config.agent_timeouts.intelligence,
        config.retry_attempts,
    )));
    let insight = Arc::new(PortfolioInsightAgent::new(with_timeout(
        PortfolioInsightAgent::default().spec().clone(),
        config.agent_timeouts.insight,
        config.retry_attempts,
    )));
    let summary = Arc::new(SummaryGenerationAgent::new(with_timeout(
        SummaryGenerationAgent::default().spec().clone(),
        config.agent_timeouts.summary,
        config.retry_attempts,
    )));

    let orchestrator = Orchestrator::new(runtime, intelligence, insight, summary, config.max_bullets)?;

    Ok(Singletons { orchestrator })
}
