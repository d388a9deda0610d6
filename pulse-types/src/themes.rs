//! The closed allowed-theme catalog and the normalization function that maps
//! arbitrary agent-supplied theme strings onto it.
//!
//! Adopted from the source system's theme catalog: Sector-Driven (Core),
//! Macro/Flow-Driven, and Structural/Emerging groups.

/// Maximum number of themed news entries exposed on the response boundary.
pub const MAX_THEMED_NEWS_ITEMS: usize = 5;

/// The closed, ordered catalog of allowed theme display names.
pub const ALLOWED_THEMES: &[&str] = &[
    // Sector-Driven (Core)
    "Banking & Financials",
    "Information Technology (IT)",
    "Oil, Gas & Energy",
    "FMCG & Consumer Staples",
    "Consumer Discretionary",
    "Automobiles & Auto Ancillaries",
    "Pharma & Healthcare",
    "Metals & Mining",
    "Infrastructure & Capital Goods",
    "Real Estate",
    // Macro / Flow-Driven
    "Global Market Cues",
    "RBI & Interest Rates",
    "Commodities & Crude Prices",
    "FII & DII Flows",
    // Structural / Emerging
    "EV, Green Energy & New-Age Themes",
];

const NEWS_TYPE_TO_THEME: &[(&str, &str)] = &[
    ("economy", "RBI & Interest Rates"),
    ("economic & policy updates", "RBI & Interest Rates"),
    ("foreign markets", "Global Market Cues"),
    ("global market updates", "Global Market Cues"),
    ("other markets", "Commodities & Crude Prices"),
    ("commodities & forex", "Commodities & Crude Prices"),
    ("general", "Global Market Cues"),
];

const SECTOR_KEYWORDS_TO_THEME: &[(&[&str], &str)] = &[
    (&["banking", "banks", "nbfc", "financials", "insurer", "lending"], "Banking & Financials"),
    (&["it", "information technology", "software", "tech", "export"], "Information Technology (IT)"),
    (&["oil", "gas", "energy", "power", "utilities", "upstream", "downstream"], "Oil, Gas & Energy"),
    (&["fmcg", "consumer staples", "staples", "defensive"], "FMCG & Consumer Staples"),
    (&["consumer discretionary", "retail", "durables"], "Consumer Discretionary"),
    (&["auto", "automobile", "oem", "ancillar"], "Automobiles & Auto Ancillaries"),
    (&["pharma", "healthcare", "diagnostic", "hospital"], "Pharma & Healthcare"),
    (&["metals", "mining", "steel", "aluminium"], "Metals & Mining"),
    (&["infrastructure", "capital goods", "construction", "engineering"], "Infrastructure & Capital Goods"),
    (&["real estate", "realty", "housing"], "Real Estate"),
    (&["global", "us ", "europe", "asia", "overnight", "cues"], "Global Market Cues"),
    (&["rbi", "interest rate", "monetary", "liquidity", "yield"], "RBI & Interest Rates"),
    (&["commodit", "crude", "agri"], "Commodities & Crude Prices"),
    (&["fii", "dii", "flow", "institutional"], "FII & DII Flows"),
    (&["ev", "green energy", "renewable", "energy transition", "new-age"], "EV, Green Energy & New-Age Themes"),
];

fn match_news_type(key: &str) -> Option<&'static str> {
    NEWS_TYPE_TO_THEME
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

fn match_sector_keywords(key: &str) -> Option<&'static str> {
    SECTOR_KEYWORDS_TO_THEME
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|kw| key.contains(kw)))
        .map(|(_, allowed)| *allowed)
}

/// Map a theme name (from an agent or clustering step) onto the allowed
/// catalog, or `None` if nothing matches.
///
/// Tries, in order: exact catalog match, lowercased news-type match,
/// sector-keyword substring match, then the same three with a trailing
/// `" news"`/`" update"` suffix stripped.
pub fn normalize_theme_to_allowed(theme_name: &str) -> Option<&'static str> {
    let name = theme_name.trim();
    if name.is_empty() {
        return None;
    }
    if let Some(exact) = ALLOWED_THEMES.iter().find(|t| **t == name) {
        return Some(exact);
    }

    let key = name.to_lowercase();
    if let Some(hit) = match_news_type(&key) {
        return Some(hit);
    }
    if let Some(hit) = match_sector_keywords(&key) {
        return Some(hit);
    }

    for suffix in [" news", " update"] {
        if let Some(base) = key.strip_suffix(suffix) {
            if let Some(exact) = ALLOWED_THEMES.iter().find(|t| t.to_lowercase() == base) {
                return Some(exact);
            }
            if let Some(hit) = match_news_type(base) {
                return Some(hit);
            }
            if let Some(hit) = match_sector_keywords(base) {
                return Some(hit);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_passes_through() {
        assert_eq!(normalize_theme_to_allowed("Real Estate"), Some("Real Estate"));
    }

    #[test]
    fn suffix_stripped_sector_keyword_match() {
        assert_eq!(
            normalize_theme_to_allowed("Banking & Financials News"),
            Some("Banking & Financials")
        );
    }

    #[test]
    fn news_type_alias_resolves() {
        assert_eq!(normalize_theme_to_allowed("Foreign Markets"), Some("Global Market Cues"));
    }

    #[test]
    fn unknown_theme_rejected() {
        assert_eq!(normalize_theme_to_allowed("Lunar Mining Futures"), None);
    }

    #[test]
    fn empty_theme_rejected() {
        assert_eq!(normalize_theme_to_allowed("   "), None);
    }

    #[test]
    fn normalization_is_idempotent() {
        for theme in ["Banking & Financials News", "auto update", "EV, Green Energy & New-Age Themes"] {
            let once = normalize_theme_to_allowed(theme);
            if let Some(name) = once {
                assert_eq!(normalize_theme_to_allowed(name), once);
            }
        }
    }
}
