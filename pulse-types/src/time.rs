//! Market phase derivation from IST wall-clock time.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// IST has a fixed UTC+5:30 offset and observes no daylight saving.
fn ist_offset() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("IST offset is a valid fixed offset")
}

/// Which of the three trading windows a timestamp falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketPhase {
    /// 08:00–09:15 IST.
    Pre,
    /// 09:15–15:30 IST, trading hours.
    Mid,
    /// 15:30 IST–08:00 IST next day.
    Post,
}

impl fmt::Display for MarketPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketPhase::Pre => "pre",
            MarketPhase::Mid => "mid",
            MarketPhase::Post => "post",
        };
        write!(f, "{s}")
    }
}

/// Derive the market phase for a UTC timestamp, against fixed IST boundaries.
pub fn market_phase_from_timestamp(ts: DateTime<Utc>) -> MarketPhase {
    let ist = ts.with_timezone(&ist_offset());
    let minutes_since_midnight = ist.hour() as i32 * 60 + ist.minute() as i32;

    const PRE_START: i32 = 8 * 60; // 08:00
    const MID_START: i32 = 9 * 60 + 15; // 09:15
    const POST_START: i32 = 15 * 60 + 30; // 15:30

    if (PRE_START..MID_START).contains(&minutes_since_midnight) {
        MarketPhase::Pre
    } else if (MID_START..POST_START).contains(&minutes_since_midnight) {
        MarketPhase::Mid
    } else {
        MarketPhase::Post
    }
}
