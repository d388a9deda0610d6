//! Deterministic, in-memory stand-ins for the market-data/news/portfolio
//! backends. No network I/O: fixed fixture data, shaped to exercise every
//! scenario in the testable-properties table.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use pulse_tool::{ToolDyn, ToolError};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// `(ticker, sector)` fixture used by sector lookup and fundamentals tools.
const TICKER_SECTORS: &[(&str, &str)] = &[
    ("HDFCBANK", "Banking & Financials"),
    ("ICICIBANK", "Banking & Financials"),
    ("INFY", "Information Technology (IT)"),
    ("TCS", "Information Technology (IT)"),
    ("RELIANCE", "Oil, Gas & Energy"),
    ("ONGC", "Oil, Gas & Energy"),
    ("HINDUNILVR", "FMCG & Consumer Staples"),
    ("MARUTI", "Automobiles & Auto Ancillaries"),
    ("TATAMOTORS", "Automobiles & Auto Ancillaries"),
    ("SUNPHARMA", "Pharma & Healthcare"),
    ("TATASTEEL", "Metals & Mining"),
    ("ASIANPAINT", "FMCG & Consumer Staples"),
    ("LT", "Infrastructure & Capital Goods"),
    ("DLF", "Real Estate"),
];

fn sector_for(ticker: &str) -> &'static str {
    TICKER_SECTORS
        .iter()
        .find(|(t, _)| *t == ticker)
        .map(|(_, s)| *s)
        .unwrap_or("Global Market Cues")
}

fn fixture_indices() -> Vec<Value> {
    let t = now();
    vec![
        json!({"name": "NIFTY 50", "value": 24150.25, "change_percent": 0.85, "change_abs": 204.1, "as_of": t.to_rfc3339()}),
        json!({"name": "SENSEX", "value": 79620.5, "change_percent": 0.78, "change_abs": 617.3, "as_of": t.to_rfc3339()}),
        json!({"name": "BANKNIFTY", "value": 51320.0, "change_percent": -0.3, "change_abs": -154.2, "as_of": t.to_rfc3339()}),
    ]
}

fn fixture_news() -> Vec<Value> {
    let t = now();
    let at = |hours_ago: i64| (t - ChronoDuration::hours(hours_ago)).to_rfc3339();
    vec![
        json!({
            "id": "news-1", "headline": "Reliance surges after crude oil prices rally",
            "summary": "Integrated energy major gains as Brent crude rises on supply concerns.",
            "source": "wire", "published_at": at(1), "sentiment": "bullish",
            "mentioned_stocks": ["RELIANCE", "ONGC"], "mentioned_sectors": ["Oil, Gas & Energy"], "is_breaking": true
        }),
        json!({
            "id": "news-2", "headline": "IT exporters rally as rupee weakens",
            "summary": "TCS and Infosys gain as a softer rupee boosts export margins.",
            "source": "wire", "published_at": at(3), "sentiment": "bullish",
            "mentioned_stocks": ["TCS", "INFY"], "mentioned_sectors": ["Information Technology (IT)"], "is_breaking": false
        }),
        json!({
            "id": "news-3", "headline": "RBI holds rates steady, signals caution on inflation",
            "summary": "Central bank keeps repo rate unchanged, weighs on rate-sensitive stocks.",
            "source": "wire", "published_at": at(5), "sentiment": "neutral",
            "mentioned_stocks": ["HDFCBANK", "DLF"], "mentioned_sectors": ["RBI & Interest Rates"], "is_breaking": false
        }),
        json!({
            "id": "news-4", "headline": "Auto stocks slide on rate-hike worries",
            "summary": "Maruti and Tata Motors fall amid expectations of tighter monetary policy.",
            "source": "wire", "published_at": at(6), "sentiment": "bearish",
            "mentioned_stocks": ["MARUTI", "TATAMOTORS"], "mentioned_sectors": ["Automobiles & Auto Ancillaries"], "is_breaking": false
        }),
        json!({
            "id": "news-5", "headline": "Steel prices climb on export demand",
            "summary": "Tata Steel gains as global steel prices firm up.",
            "source": "wire", "published_at": at(8), "sentiment": "bullish",
            "mentioned_stocks": ["TATASTEEL"], "mentioned_sectors": ["Metals & Mining"], "is_breaking": false
        }),
        json!({
            "id": "news-6", "headline": "FII outflows weigh on broader market sentiment",
            "summary": "Foreign institutional investors pulled out amid global risk aversion.",
            "source": "wire", "published_at": at(10), "sentiment": "bearish",
            "mentioned_stocks": [], "mentioned_sectors": ["FII & DII Flows"], "is_breaking": false
        }),
        json!({
            "id": "news-7", "headline": "Pharma majors gain on strong export pipeline",
            "summary": "Sun Pharma advances on a robust generics export outlook.",
            "source": "wire", "published_at": at(12), "sentiment": "bullish",
            "mentioned_stocks": ["SUNPHARMA"], "mentioned_sectors": ["Pharma & Healthcare"], "is_breaking": false
        }),
        json!({
            "id": "news-8", "headline": "FMCG demand stays resilient amid rural recovery",
            "summary": "Hindustan Unilever and Asian Paints see steady volume growth.",
            "source": "wire", "published_at": at(14), "sentiment": "neutral",
            "mentioned_stocks": ["HINDUNILVR", "ASIANPAINT"], "mentioned_sectors": ["FMCG & Consumer Staples"], "is_breaking": false
        }),
        json!({
            "id": "news-9", "headline": "Global market cues turn cautious overnight",
            "summary": "Asian markets trade mixed following a soft close on Wall Street.",
            "source": "wire", "published_at": at(16), "sentiment": "neutral",
            "mentioned_stocks": [], "mentioned_sectors": ["Global Market Cues"], "is_breaking": false
        }),
        json!({
            "id": "news-10", "headline": "Infrastructure order wins lift capital goods stocks",
            "summary": "L&T bags a large order, lifting sentiment in the capital goods space.",
            "source": "wire", "published_at": at(18), "sentiment": "bullish",
            "mentioned_stocks": ["LT"], "mentioned_sectors": ["Infrastructure & Capital Goods"], "is_breaking": false
        }),
    ]
}

fn fixture_watchlist(_user_id: &str) -> Vec<&'static str> {
    vec!["RELIANCE", "TCS", "MARUTI", "TATASTEEL", "DLF"]
}

fn fixture_portfolio(_user_id: &str) -> Vec<Value> {
    vec![
        json!({"ticker": "RELIANCE", "quantity": 50.0, "current_value": 145000.0, "sector": "Oil, Gas & Energy"}),
        json!({"ticker": "TCS", "quantity": 20.0, "current_value": 82000.0, "sector": "Information Technology (IT)"}),
        json!({"ticker": "MARUTI", "quantity": 10.0, "current_value": 125000.0, "sector": "Automobiles & Auto Ancillaries"}),
        json!({"ticker": "HDFCBANK", "quantity": 80.0, "current_value": 120000.0, "sector": "Banking & Financials"}),
    ]
}

fn fixture_preferences(_user_id: &str) -> Value {
    json!({"risk_tolerance": "moderate", "news_window_hours": 24})
}

macro_rules! sync_tool {
    ($struct_name:ident, $name:expr, $desc:expr, $schema:expr, $handler:expr) => {
        pub struct $struct_name;

        impl ToolDyn for $struct_name {
            fn name(&self) -> &str {
                $name
            }
            fn description(&self) -> &str {
                $desc
            }
            fn input_schema(&self) -> Value {
                $schema
            }
            fn call(&self, args: Value) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + '_>> {
                let result = ($handler)(args);
                Box::pin(async move { result })
            }
        }
    };
}

sync_tool!(
    FetchMarketIndicesTool,
    "fetch_market_indices",
    "Fetch the latest reading for a set of market indices by name.",
    json!({"type": "object", "properties": {"names": {"type": "array", "items": {"type": "string"}}}, "required": ["names"]}),
    |args: Value| -> Result<Value, ToolError> {
        let names: Vec<String> = args
            .get("names")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let mut out = serde_json::Map::new();
        for idx in fixture_indices() {
            let idx_name = idx.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            if names.is_empty() || names.iter().any(|n| n == &idx_name) {
                out.insert(idx_name, idx);
            }
        }
        Ok(Value::Object(out))
    }
);

sync_tool!(
    FetchMarketNewsTool,
    "fetch_market_news",
    "Fetch recent market news, optionally limited to a recency window in hours.",
    json!({"type": "object", "properties": {"window_hours": {"type": "number"}}, "required": []}),
    |args: Value| -> Result<Value, ToolError> {
        let window_hours = args.get("window_hours").and_then(|v| v.as_f64());
        let items: Vec<Value> = fixture_news()
            .into_iter()
            .filter(|item| {
                let Some(window) = window_hours else { return true };
                let Some(published) = item.get("published_at").and_then(|v| v.as_str()) else {
                    return true;
                };
                let Ok(published) = DateTime::parse_from_rfc3339(published) else {
                    return true;
                };
                (now() - published.with_timezone(&Utc)) <= ChronoDuration::hours(window as i64)
            })
            .collect();
        Ok(json!(items))
    }
);

sync_tool!(
    FetchUserWatchlistTool,
    "fetch_user_watchlist",
    "Fetch a user's watchlist tickers.",
    json!({"type": "object", "properties": {"user_id": {"type": "string"}}, "required": ["user_id"]}),
    |args: Value| -> Result<Value, ToolError> {
        let user_id = args.get("user_id").and_then(|v| v.as_str()).unwrap_or_default();
        Ok(json!(fixture_watchlist(user_id)))
    }
);

sync_tool!(
    FetchUserPortfolioTool,
    "fetch_user_portfolio",
    "Fetch a user's portfolio holdings.",
    json!({"type": "object", "properties": {"user_id": {"type": "string"}}, "required": ["user_id"]}),
    |args: Value| -> Result<Value, ToolError> {
        let user_id = args.get("user_id").and_then(|v| v.as_str()).unwrap_or_default();
        Ok(json!(fixture_portfolio(user_id)))
    }
);

sync_tool!(
    GetUserPreferencesTool,
    "get_user_preferences",
    "Fetch a user's display/notification preferences.",
    json!({"type": "object", "properties": {"user_id": {"type": "string"}}, "required": ["user_id"]}),
    |args: Value| -> Result<Value, ToolError> {
        let user_id = args.get("user_id").and_then(|v| v.as_str()).unwrap_or_default();
        Ok(fixture_preferences(user_id))
    }
);

sync_tool!(
    GetMarketPhaseTool,
    "get_market_phase",
    "Derive the market phase (pre/mid/post) for an RFC 3339 timestamp.",
    json!({"type": "object", "properties": {"timestamp": {"type": "string"}}, "required": ["timestamp"]}),
    |args: Value| -> Result<Value, ToolError> {
        let timestamp = args
            .get("timestamp")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing timestamp".to_string()))?;
        let parsed = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid timestamp: {e}")))?;
        let phase = pulse_types::market_phase_from_timestamp(parsed.with_timezone(&Utc));
        Ok(json!({"phase": phase.to_string()}))
    }
);

sync_tool!(
    IdentifySectorFromStocksTool,
    "identify_sector_from_stocks",
    "Map a list of tickers to their sector.",
    json!({"type": "object", "properties": {"tickers": {"type": "array", "items": {"type": "string"}}}, "required": ["tickers"]}),
    |args: Value| -> Result<Value, ToolError> {
        let tickers: Vec<String> = args
            .get("tickers")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let mut out = serde_json::Map::new();
        for ticker in tickers {
            let sector = sector_for(&ticker);
            out.insert(ticker, json!(sector));
        }
        Ok(Value::Object(out))
    }
);

/// One fixed supply-chain causal rule: a trigger keyword maps to a set of
/// sector impacts, adopted verbatim from the original source's rule table.
struct SupplyChainRule {
    trigger_keywords: &'static [&'static str],
    impacts: &'static [(&'static str, &'static str, &'static str, &'static str)], // sector, impact, magnitude, causal_chain
}

const SUPPLY_CHAIN_RULES: &[SupplyChainRule] = &[
    SupplyChainRule {
        trigger_keywords: &["oil", "crude"],
        impacts: &[
            ("Consumer Discretionary", "negative", "medium", "Oil prices rise -> higher fuel and input costs -> negative for airlines"),
            ("FMCG & Consumer Staples", "negative", "low", "Oil prices rise -> higher input costs -> negative for paints and chemicals"),
            ("Oil, Gas & Energy", "positive", "high", "Oil prices rise -> higher realizations -> positive for upstream and integrated energy majors"),
        ],
    },
    SupplyChainRule {
        trigger_keywords: &["rupee", "inr depreciat"],
        impacts: &[
            ("Consumer Discretionary", "negative", "medium", "Rupee depreciates -> costlier imports -> negative for import-dependent businesses"),
            ("Information Technology (IT)", "positive", "high", "Rupee depreciates -> favorable export realization -> positive for IT exporters"),
        ],
    },
    SupplyChainRule {
        trigger_keywords: &["rate hike", "rate increase", "tighter monetary"],
        impacts: &[
            ("Real Estate", "negative", "high", "Rate hike -> higher mortgage costs -> negative for real estate demand"),
            ("Automobiles & Auto Ancillaries", "negative", "medium", "Rate hike -> costlier auto loans -> negative for auto sales"),
            ("Banking & Financials", "neutral", "medium", "Rate hike -> wider lending margins offset by slower credit growth -> mixed for banks"),
        ],
    },
    SupplyChainRule {
        trigger_keywords: &["steel price"],
        impacts: &[
            ("Metals & Mining", "positive", "high", "Steel prices rise -> higher realizations -> positive for steel makers"),
            ("Automobiles & Auto Ancillaries", "negative", "medium", "Steel prices rise -> higher input costs -> negative for auto makers"),
            ("Infrastructure & Capital Goods", "negative", "low", "Steel prices rise -> higher input costs -> negative for construction"),
        ],
    },
];

sync_tool!(
    AnalyzeSupplyChainImpactTool,
    "analyze_supply_chain_impact",
    "Apply the fixed supply-chain causal rule set to a trigger phrase.",
    json!({"type": "object", "properties": {"trigger": {"type": "string"}}, "required": ["trigger"]}),
    |args: Value| -> Result<Value, ToolError> {
        let trigger = args.get("trigger").and_then(|v| v.as_str()).unwrap_or_default().to_lowercase();
        let matches: Vec<Value> = SUPPLY_CHAIN_RULES
            .iter()
            .filter(|rule| rule.trigger_keywords.iter().any(|kw| trigger.contains(kw)))
            .flat_map(|rule| rule.impacts.iter())
            .map(|(sector, impact, magnitude, chain)| json!({
                "sector": sector, "impact": impact, "magnitude": magnitude, "causal_chain": chain,
            }))
            .collect();
        Ok(json!(matches))
    }
);

sync_tool!(
    GetCompanyFundamentalsTool,
    "get_company_fundamentals",
    "Fetch a fixed fundamentals snapshot for a ticker.",
    json!({"type": "object", "properties": {"ticker": {"type": "string"}}, "required": ["ticker"]}),
    |args: Value| -> Result<Value, ToolError> {
        let ticker = args
            .get("ticker")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("missing ticker".to_string()))?;
        Ok(json!({"ticker": ticker, "sector": sector_for(ticker), "pe_ratio": 22.5, "market_cap_cr": 150000.0}))
    }
);

sync_tool!(
    RankNewsByImportanceTool,
    "rank_news_by_importance",
    "Rank a set of news items by importance: breaking news first, then most recent.",
    json!({"type": "object", "properties": {"news_items": {"type": "array"}}, "required": ["news_items"]}),
    |args: Value| -> Result<Value, ToolError> {
        let mut items: Vec<Value> = args
            .get("news_items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        items.sort_by(|a, b| {
            let a_breaking = a.get("is_breaking").and_then(|v| v.as_bool()).unwrap_or(false);
            let b_breaking = b.get("is_breaking").and_then(|v| v.as_bool()).unwrap_or(false);
            let a_time = a.get("published_at").and_then(|v| v.as_str()).unwrap_or_default();
            let b_time = b.get("published_at").and_then(|v| v.as_str()).unwrap_or_default();
            b_breaking.cmp(&a_breaking).then(b_time.cmp(a_time))
        });
        Ok(json!(items))
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_market_indices_filters_by_name() {
        let tool = FetchMarketIndicesTool;
        let out = tool.call(json!({"names": ["NIFTY 50"]})).await.unwrap();
        let obj = out.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj.contains_key("NIFTY 50"));
    }

    #[tokio::test]
    async fn get_market_phase_parses_timestamp() {
        let tool = GetMarketPhaseTool;
        let out = tool.call(json!({"timestamp": "2026-01-30T05:45:00+00:00"})).await.unwrap();
        assert_eq!(out, json!({"phase": "mid"}));
    }

    #[tokio::test]
    async fn get_market_phase_rejects_bad_timestamp() {
        let tool = GetMarketPhaseTool;
        let err = tool.call(json!({"timestamp": "not-a-date"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn analyze_supply_chain_impact_matches_oil_rule() {
        let tool = AnalyzeSupplyChainImpactTool;
        let out = tool.call(json!({"trigger": "Crude oil prices rally"})).await.unwrap();
        let arr = out.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert!(arr.iter().any(|v| v["sector"] == "Oil, Gas & Energy" && v["impact"] == "positive"));
    }

    #[tokio::test]
    async fn rank_news_by_importance_puts_breaking_first() {
        let tool = RankNewsByImportanceTool;
        let items = json!([
            {"id": "a", "is_breaking": false, "published_at": "2026-01-01T10:00:00Z"},
            {"id": "b", "is_breaking": true, "published_at": "2026-01-01T09:00:00Z"},
        ]);
        let out = tool.call(json!({"news_items": items})).await.unwrap();
        assert_eq!(out[0]["id"], "b");
    }

    #[tokio::test]
    async fn identify_sector_from_stocks_maps_known_tickers() {
        let tool = IdentifySectorFromStocksTool;
        let out = tool.call(json!({"tickers": ["RELIANCE", "UNKNOWNTICKER"]})).await.unwrap();
        assert_eq!(out["RELIANCE"], "Oil, Gas & Energy");
        assert_eq!(out["UNKNOWNTICKER"], "Global Market Cues");
    }
}
