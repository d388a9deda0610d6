//! Domain types, catalogs, and canonical-JSON keys for market pulse orchestration.
//!
//! This crate has no I/O and no async — it is the shared vocabulary every
//! other crate in the workspace builds on.

pub mod canon;
pub mod causal;
pub mod domain;
pub mod id;
pub mod report;
pub mod request;
pub mod themes;
pub mod time;

pub use canon::{cache_key, canonical_json};
pub use causal::{contains_causal_keyword, CAUSAL_KEYWORDS};
pub use domain::*;
pub use id::{RequestId, UserId};
pub use report::{NewsImpactSummary, OrchestrationMetrics, Report, ThemedNews, TrendingNewsItem};
pub use request::{ExecutionContext, Request};
pub use themes::{normalize_theme_to_allowed, ALLOWED_THEMES, MAX_THEMED_NEWS_ITEMS};
pub use time::{market_phase_from_timestamp, MarketPhase};
