//! Synthetic fixtures for degraded slots.
//!
//! When the monthly quota is exhausted or the feed is unreachable, the
//! pipeline still has to produce something. These fixtures are fully
//! deterministic and span all three tier bands so every slot can find a
//! candidate.

use chrono::{Duration, Utc};
use std::collections::HashMap;

use crate::types::{
    Fixture, MarketPrice, MARKET_AWAY_WIN, MARKET_BTTS_YES, MARKET_DRAW, MARKET_HOME_WIN,
    MARKET_OVER_2_5, MARKET_UNDER_2_5,
};

struct SampleRow {
    id: &'static str,
    home: &'static str,
    away: &'static str,
    /// (home_win, draw, away_win, over_2_5, under_2_5, btts_yes)
    odds: (f64, f64, f64, f64, f64, f64),
}

const SAMPLE_ROWS: &[SampleRow] = &[
    SampleRow {
        id: "sample-001",
        home: "Manchester City",
        away: "Luton Town",
        odds: (1.30, 5.80, 9.50, 1.55, 2.40, 1.80),
    },
    SampleRow {
        id: "sample-002",
        home: "Newcastle",
        away: "Brighton",
        odds: (1.95, 3.60, 3.90, 1.85, 1.95, 1.70),
    },
    SampleRow {
        id: "sample-003",
        home: "Fulham",
        away: "Liverpool",
        odds: (4.80, 4.00, 1.68, 1.75, 2.05, 1.65),
    },
    SampleRow {
        id: "sample-004",
        home: "Everton",
        away: "Wolves",
        odds: (2.45, 3.10, 3.05, 2.15, 1.70, 1.95),
    },
    SampleRow {
        id: "sample-005",
        home: "Aston Villa",
        away: "West Ham",
        odds: (1.75, 3.90, 4.40, 1.80, 2.00, 1.72),
    },
];

/// Deterministic sample fixtures for a league, kicking off a few hours
/// from now.
pub fn sample_fixtures(league_name: &str) -> Vec<Fixture> {
    SAMPLE_ROWS
        .iter()
        .map(|row| {
            let (h, d, a, over, under, btts) = row.odds;
            let mut markets = HashMap::new();
            markets.insert(
                MARKET_HOME_WIN.to_string(),
                MarketPrice::from_quotes(&[("sample", h)]),
            );
            markets.insert(
                MARKET_DRAW.to_string(),
                MarketPrice::from_quotes(&[("sample", d)]),
            );
            markets.insert(
                MARKET_AWAY_WIN.to_string(),
                MarketPrice::from_quotes(&[("sample", a)]),
            );
            markets.insert(
                MARKET_OVER_2_5.to_string(),
                MarketPrice::from_quotes(&[("sample", over)]),
            );
            markets.insert(
                MARKET_UNDER_2_5.to_string(),
                MarketPrice::from_quotes(&[("sample", under)]),
            );
            markets.insert(
                MARKET_BTTS_YES.to_string(),
                MarketPrice::from_quotes(&[("sample", btts)]),
            );
            Fixture {
                id: row.id.to_string(),
                league: league_name.to_string(),
                home_team: row.home.to_string(),
                away_team: row.away.to_string(),
                kickoff: Utc::now() + Duration::hours(3),
                markets,
            }
        })
        .collect()
}
