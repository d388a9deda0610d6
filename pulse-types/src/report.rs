//! The response-boundary projection and its diagnostic metrics sidecar.
//!
//! `Report` is the only type that crosses the response boundary. Internal
//! per-phase structures (`NewsWithImpact`, refined `ThemeGroup`s) never
//! appear here directly — Phase C of the orchestrator explicitly projects
//! them down, which resolves the "two divergent response envelopes" open
//! question in favor of the stripped projection: there is only ever one
//! type a caller can construct a response from.

use crate::domain::{AggregateSentiment, IndexData, MarketOutlook, MarketSummaryBullet, Sentiment, WatchlistAlert};
use crate::id::RequestId;
use crate::time::MarketPhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A themed news entry as exposed on the response boundary: theme name is
/// already catalog-normalized, headlines are flattened out of `NewsItem`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemedNews {
    pub theme_name: String,
    pub headlines: Vec<String>,
    pub overall_sentiment: AggregateSentiment,
    pub impacted_stocks: Vec<String>,
}

/// A flattened, response-boundary view of a news item's impact analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsImpactSummary {
    pub news_id: String,
    pub headline: String,
    pub sentiment: Sentiment,
    pub impacted_stocks: Vec<String>,
    pub causal_chain: String,
}

/// A lightweight trending-news entry used during mid-market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingNewsItem {
    pub id: String,
    pub headline: String,
    pub published_at: DateTime<Utc>,
    pub sentiment: Sentiment,
}

/// Per-agent diagnostics attached for debugging, never load-bearing for the
/// invariants a caller depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationMetrics {
    pub agent_latency_ms: BTreeMap<String, u64>,
    pub cache_hits: BTreeMap<String, bool>,
    pub retry_counts: BTreeMap<String, u32>,
}

/// The complete market pulse report: the only type that crosses the
/// response boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub request_id: RequestId,

    pub market_phase: MarketPhase,
    pub market_outlook: Option<MarketOutlook>,
    pub indices_data: BTreeMap<String, IndexData>,

    pub market_summary: Option<Vec<MarketSummaryBullet>>,
    pub executive_summary: Option<String>,

    pub trending_now: Option<Vec<TrendingNewsItem>>,

    pub themed_news: Vec<ThemedNews>,
    pub all_news: Vec<NewsImpactSummary>,

    pub watchlist_impacted: Vec<String>,
    pub watchlist_alerts: Vec<WatchlistAlert>,
    pub portfolio_impact_summary: Option<String>,
    pub portfolio_sentiment: Option<AggregateSentiment>,

    pub metrics: Option<OrchestrationMetrics>,
    pub degraded_mode: bool,
    pub warnings: Vec<String>,
}
