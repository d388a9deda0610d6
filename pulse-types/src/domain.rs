//! Domain value types shared across agents, the cache, and the orchestrator.

use serde::{Deserialize, Serialize};

/// Sentiment polarity used throughout market and news analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

/// Sentiment with a `mixed` option, used for aggregate portfolio/theme views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateSentiment {
    Bullish,
    Bearish,
    Neutral,
    Mixed,
}

/// Polarity of a stock/sector impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Positive,
    Negative,
    Neutral,
}

/// Relative size of an impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Magnitude {
    High,
    Medium,
    Low,
}

/// Kind of watchlist alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Opportunity,
    Risk,
    Informational,
}

/// A single market index reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexData {
    pub name: String,
    pub value: f64,
    pub change_percent: f64,
    pub change_abs: f64,
    pub as_of: chrono::DateTime<chrono::Utc>,
}

impl IndexData {
    /// Whether `change_abs`'s sign agrees with `change_percent`'s sign (or
    /// either is exactly zero).
    pub fn signs_agree(&self) -> bool {
        self.change_percent == 0.0
            || self.change_abs == 0.0
            || self.change_percent.signum() == self.change_abs.signum()
    }
}

/// Overall market outlook, present only outside mid-market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOutlook {
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub reasoning: String,
    pub nifty_change_percent: f64,
    pub key_drivers: Vec<String>,
}

impl MarketOutlook {
    /// Derive sentiment and confidence from a benchmark percent change,
    /// per the fixed thresholds: bullish above 0.5, bearish below -0.5.
    pub fn from_nifty_change(p: f64, reasoning: impl Into<String>, key_drivers: Vec<String>) -> Self {
        let sentiment = if p > 0.5 {
            Sentiment::Bullish
        } else if p < -0.5 {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        };
        let confidence = (p.abs() / 2.0).min(1.0);
        Self {
            sentiment,
            confidence,
            reasoning: reasoning.into(),
            nifty_change_percent: p,
            key_drivers,
        }
    }
}

/// A single news item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub headline: String,
    pub summary: String,
    pub source: String,
    pub published_at: chrono::DateTime<chrono::Utc>,
    pub sentiment: Sentiment,
    pub mentioned_stocks: Vec<String>,
    pub mentioned_sectors: Vec<String>,
    pub is_breaking: bool,
}

/// A cluster of news items under a theme, prior to catalog normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeGroup {
    pub theme_name: String,
    pub news_items: Vec<NewsItem>,
    pub overall_sentiment: AggregateSentiment,
    pub impacted_stocks: Vec<String>,
    pub reason: String,
}

/// A stock impacted by a news item, with a causal explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactedStock {
    pub ticker: String,
    pub impact: Impact,
    pub magnitude: Magnitude,
    pub causal_chain: String,
}

/// A news item enriched with its impact analysis on stocks and sectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsWithImpact {
    pub news_id: String,
    pub news_item: NewsItem,
    pub impacted_stocks: Vec<ImpactedStock>,
    pub sector_impacts: std::collections::BTreeMap<String, Impact>,
    pub causal_chain: String,
    pub impact_confidence: f64,
}

/// One causal summary bullet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummaryBullet {
    pub text: String,
    pub supporting_news_ids: Vec<String>,
    pub confidence: f64,
    pub sentiment: Sentiment,
}

/// Aggregate portfolio-level impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioImpact {
    pub overall_sentiment: AggregateSentiment,
    pub top_affected_holdings: Vec<String>,
    pub reasoning: String,
}

/// An alert surfaced for a watchlist ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistAlert {
    pub ticker: String,
    pub kind: AlertKind,
    pub reason: String,
    pub referenced_news_ids: Vec<String>,
}

/// A single portfolio holding as returned by the portfolio data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHolding {
    pub ticker: String,
    pub quantity: f64,
    pub current_value: f64,
    pub sector: String,
}
