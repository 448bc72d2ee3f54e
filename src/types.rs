//! Shared types for the TIPSTER engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that the odds, cache, engine,
//! and storage modules can depend on them without circular references.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

/// The canonical market keys a fixture's odds map may contain.
pub const MARKET_HOME_WIN: &str = "home_win";
pub const MARKET_DRAW: &str = "draw";
pub const MARKET_AWAY_WIN: &str = "away_win";
pub const MARKET_OVER_2_5: &str = "over_2_5";
pub const MARKET_UNDER_2_5: &str = "under_2_5";
pub const MARKET_BTTS_YES: &str = "btts_yes";

/// Market family a pick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketKind {
    OneXTwo,
    DoubleChance,
    Goals,
    Btts,
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketKind::OneXTwo => write!(f, "1X2"),
            MarketKind::DoubleChance => write!(f, "Double Chance"),
            MarketKind::Goals => write!(f, "Goals"),
            MarketKind::Btts => write!(f, "BTTS"),
        }
    }
}

/// Where a candidate price came from.
///
/// `Derived` prices (double chance, alternate goal lines, BTTS No) are
/// heuristic approximations computed from a sourced price and must never
/// be mistaken for bookmaker quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    Sourced,
    Derived,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Sourced => write!(f, "sourced"),
            PriceSource::Derived => write!(f, "derived"),
        }
    }
}

/// Per-bookmaker prices for one market plus the precomputed average.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketPrice {
    pub bookmakers: HashMap<String, f64>,
    pub average: f64,
}

impl MarketPrice {
    /// Build from a list of (bookmaker, price) pairs, computing the average.
    /// Zero or negative prices are dropped.
    pub fn from_quotes(quotes: &[(&str, f64)]) -> Self {
        let bookmakers: HashMap<String, f64> = quotes
            .iter()
            .filter(|(_, p)| *p > 0.0)
            .map(|(b, p)| (b.to_string(), *p))
            .collect();
        let average = if bookmakers.is_empty() {
            0.0
        } else {
            bookmakers.values().sum::<f64>() / bookmakers.len() as f64
        };
        Self { bookmakers, average }
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// A fixture with per-market odds. Immutable once fetched; lives only as
/// long as its cache TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub id: String,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    /// Market key (e.g. `home_win`) → per-bookmaker prices + average.
    pub markets: HashMap<String, MarketPrice>,
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} vs {} ({})",
            self.league,
            self.home_team,
            self.away_team,
            self.kickoff.format("%Y-%m-%d %H:%M"),
        )
    }
}

impl Fixture {
    /// Average price for a market key, or None if the market is missing
    /// or carries a zero/invalid price (excluded from candidate pools).
    pub fn average(&self, market: &str) -> Option<f64> {
        self.markets
            .get(market)
            .map(|m| m.average)
            .filter(|a| *a > 0.0)
    }
}

// ---------------------------------------------------------------------------
// Risk tiers
// ---------------------------------------------------------------------------

/// Named risk tier for a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Safe,
    Value,
    Risky,
}

impl RiskLevel {
    pub const ALL: &'static [RiskLevel] =
        &[RiskLevel::Safe, RiskLevel::Value, RiskLevel::Risky];
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Safe => write!(f, "SAFE"),
            RiskLevel::Value => write!(f, "VALUE"),
            RiskLevel::Risky => write!(f, "RISKY"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "safe" => Ok(RiskLevel::Safe),
            "value" | "moderate" => Ok(RiskLevel::Value),
            "risky" | "high" => Ok(RiskLevel::Risky),
            _ => Err(anyhow::anyhow!("Unknown risk level: {s}")),
        }
    }
}

/// Odds and confidence bounds for one risk tier. Configuration, not derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierBand {
    pub min_odds: f64,
    pub max_odds: f64,
    pub min_confidence: u8,
    pub max_confidence: u8,
}

impl TierBand {
    /// Whether a price falls inside the closed odds interval.
    pub fn contains(&self, odds: f64) -> bool {
        odds >= self.min_odds && odds <= self.max_odds
    }

    /// Midpoint of the odds interval (fallback target).
    pub fn midpoint(&self) -> f64 {
        (self.min_odds + self.max_odds) / 2.0
    }

    /// Map odds to confidence: saturates at `max_confidence` below the
    /// band and `min_confidence` above it, interpolating linearly inside.
    /// Monotonically non-increasing in odds.
    pub fn confidence(&self, odds: f64) -> u8 {
        if odds <= self.min_odds {
            return self.max_confidence;
        }
        if odds >= self.max_odds {
            return self.min_confidence;
        }
        let t = (odds - self.min_odds) / (self.max_odds - self.min_odds);
        let conf = f64::from(self.max_confidence)
            - t * f64::from(self.max_confidence - self.min_confidence);
        conf.round() as u8
    }
}

// ---------------------------------------------------------------------------
// Picks
// ---------------------------------------------------------------------------

/// Settlement status of a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickStatus {
    Pending,
    Settled,
}

impl fmt::Display for PickStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickStatus::Pending => write!(f, "pending"),
            PickStatus::Settled => write!(f, "settled"),
        }
    }
}

/// Win/loss outcome of a settled pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetOutcome {
    Win,
    Loss,
}

impl fmt::Display for BetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetOutcome::Win => write!(f, "WIN"),
            BetOutcome::Loss => write!(f, "LOSS"),
        }
    }
}

/// A persisted prediction.
///
/// Created once on selection, mutated exactly once on settlement.
/// Invariant: `status == Settled` ⇔ `result`, `final_score`, and `profit`
/// are all `Some`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    pub id: String,
    pub date: NaiveDate,
    /// Slot index for the day (1-based).
    pub post_number: u32,
    pub risk_level: RiskLevel,
    pub market: MarketKind,
    /// Human-readable selection, e.g. "Home Win", "Over 2.5 Goals".
    pub selection: String,
    /// Decimal odds (> 1.0).
    pub odds: f64,
    pub price_source: PriceSource,
    /// Confidence score, 0–100.
    pub confidence: u8,
    pub fixture_id: String,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    /// Short justification strings (cosmetic; no numeric contract).
    pub reasons: Vec<String>,
    pub status: PickStatus,
    pub result: Option<BetOutcome>,
    /// `"H-A"` score line once settled.
    pub final_score: Option<String>,
    /// Profit on a 1-unit stake once settled.
    pub profit: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Pick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} vs {} | {} @ {:.2} ({}, conf {}%)",
            self.risk_level,
            self.home_team,
            self.away_team,
            self.selection,
            self.odds,
            self.market,
            self.confidence,
        )
    }
}

impl Pick {
    pub fn is_settled(&self) -> bool {
        self.status == PickStatus::Settled
    }

    /// Age of the pick in whole days relative to `today`.
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        (today - self.date).num_days()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Final score of a fixture as reported by the results collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MatchResult {
    pub home_score: u32,
    pub away_score: u32,
    pub completed: bool,
}

impl MatchResult {
    pub fn total_goals(&self) -> u32 {
        self.home_score + self.away_score
    }

    /// `"H-A"` score line.
    pub fn score_line(&self) -> String {
        format!("{}-{}", self.home_score, self.away_score)
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.score_line(),
            if self.completed { "FT" } else { "in play" },
        )
    }
}

// ---------------------------------------------------------------------------
// Aggregate stats
// ---------------------------------------------------------------------------

/// Daily rollup over stored picks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub pending: usize,
    /// Sum of unit profits over settled picks.
    pub profit: f64,
    /// wins / (wins + losses) × 100, or 0.0 with nothing settled.
    pub hit_rate: f64,
}

impl fmt::Display for DailyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} picks (W{}/L{}, {} pending) | profit {:+.2}u | hit rate {:.1}%",
            self.date, self.total, self.wins, self.losses, self.pending, self.profit, self.hit_rate,
        )
    }
}

/// Weekly rollup (week starts Monday).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub week_start: NaiveDate,
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub pending: usize,
    pub profit: f64,
    pub hit_rate: f64,
}

impl fmt::Display for WeeklyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "week of {}: {} picks (W{}/L{}, {} pending) | profit {:+.2}u | hit rate {:.1}%",
            self.week_start, self.total, self.wins, self.losses, self.pending, self.profit,
            self.hit_rate,
        )
    }
}

/// Compute hit rate as a percentage, guarding the empty case.
pub fn hit_rate(wins: usize, losses: usize) -> f64 {
    let settled = wins + losses;
    if settled == 0 {
        0.0
    } else {
        wins as f64 / settled as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for TIPSTER.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Odds API error: {0}")]
    OddsApi(String),

    #[error("Odds API rate limited (HTTP 429)")]
    RateLimited,

    #[error("Malformed odds payload: {0}")]
    Payload(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
