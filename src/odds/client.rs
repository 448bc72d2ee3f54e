//! HTTP client for The-Odds-API-shaped feeds.
//!
//! Fetches upcoming fixtures with h2h/totals/BTTS bookmaker prices and
//! final scores, aggregating per-bookmaker quotes into the canonical
//! market map with precomputed averages.
//!
//! Auth: API key via `apiKey` query param. Transient transport and 5xx
//! failures are retried with exponential backoff; HTTP 429 surfaces as
//! `EngineError::RateLimited` so the quota cache can apply its fixed
//! backoff-and-degrade policy.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::OddsSource;
use crate::config::OddsApiConfig;
use crate::types::{
    EngineError, Fixture, MarketPrice, MatchResult, MARKET_AWAY_WIN, MARKET_BTTS_YES,
    MARKET_DRAW, MARKET_HOME_WIN, MARKET_OVER_2_5, MARKET_UNDER_2_5,
};

const SOURCE_NAME: &str = "odds-api";

// ---------------------------------------------------------------------------
// API response types (feed JSON → Rust)
// ---------------------------------------------------------------------------

/// One upcoming event with bookmaker odds. Only the fields we need.
#[derive(Debug, Deserialize)]
struct OddsEvent {
    id: String,
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<BookmakerQuotes>,
}

#[derive(Debug, Deserialize)]
struct BookmakerQuotes {
    key: String,
    #[serde(default)]
    markets: Vec<MarketQuotes>,
}

#[derive(Debug, Deserialize)]
struct MarketQuotes {
    key: String,
    #[serde(default)]
    outcomes: Vec<OutcomeQuote>,
}

#[derive(Debug, Deserialize)]
struct OutcomeQuote {
    name: String,
    price: f64,
    /// Goal line for totals markets (e.g. 2.5).
    #[serde(default)]
    point: Option<f64>,
}

/// One event from the scores endpoint.
#[derive(Debug, Deserialize)]
struct ScoreEvent {
    id: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    scores: Option<Vec<TeamScore>>,
    home_team: String,
    away_team: String,
}

#[derive(Debug, Deserialize)]
struct TeamScore {
    name: String,
    /// The feed reports scores as strings.
    score: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Odds feed client with bounded timeout and retry.
pub struct OddsApiClient {
    http: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    retry_backoff_secs: u64,
    fixture_window_hours: i64,
}

impl OddsApiClient {
    pub fn new(cfg: &OddsApiConfig, api_key: String) -> anyhow::Result<Self> {
        use anyhow::Context;
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .user_agent("TIPSTER/0.1.0")
            .build()
            .context("Failed to build odds HTTP client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: cfg.max_retries,
            retry_backoff_secs: cfg.retry_backoff_secs,
            fixture_window_hours: cfg.fixture_window_hours,
        })
    }

    /// GET a JSON payload with bounded retries and exponential backoff.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, EngineError> {
        let mut attempt = 0u32;
        loop {
            let req = self
                .http
                .get(url)
                .query(params)
                .query(&[("apiKey", self.api_key.as_str())]);

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp
                            .json::<T>()
                            .await
                            .map_err(|e| EngineError::Payload(e.to_string()));
                    }
                    if status.as_u16() == 429 {
                        return Err(EngineError::RateLimited);
                    }
                    if !status.is_server_error() {
                        // Client errors won't improve on retry
                        return Err(EngineError::OddsApi(format!(
                            "HTTP {status} from {url}"
                        )));
                    }
                    warn!(%status, attempt, "Odds feed server error");
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Odds feed request failed");
                }
            }

            if attempt >= self.max_retries {
                return Err(EngineError::OddsApi(format!(
                    "retries exhausted after {} attempts for {url}",
                    attempt + 1
                )));
            }
            let backoff = self.retry_backoff_secs * 2u64.pow(attempt);
            tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
            attempt += 1;
        }
    }

    /// Aggregate an event's bookmaker quotes into the canonical market map.
    fn event_to_fixture(event: &OddsEvent, league_name: &str) -> Fixture {
        let mut quotes: std::collections::HashMap<&str, Vec<(&str, f64)>> = Default::default();

        for bookie in &event.bookmakers {
            for market in &bookie.markets {
                match market.key.as_str() {
                    "h2h" => {
                        for o in &market.outcomes {
                            let key = if o.name == event.home_team {
                                MARKET_HOME_WIN
                            } else if o.name == event.away_team {
                                MARKET_AWAY_WIN
                            } else if o.name == "Draw" {
                                MARKET_DRAW
                            } else {
                                continue;
                            };
                            quotes.entry(key).or_default().push((&bookie.key, o.price));
                        }
                    }
                    "totals" => {
                        for o in &market.outcomes {
                            // Only the 2.5 line is sourced; other lines
                            // are derived downstream by the analyzer.
                            if o.point != Some(2.5) {
                                continue;
                            }
                            let key = match o.name.as_str() {
                                "Over" => MARKET_OVER_2_5,
                                "Under" => MARKET_UNDER_2_5,
                                _ => continue,
                            };
                            quotes.entry(key).or_default().push((&bookie.key, o.price));
                        }
                    }
                    "btts" => {
                        for o in &market.outcomes {
                            if o.name == "Yes" {
                                quotes
                                    .entry(MARKET_BTTS_YES)
                                    .or_default()
                                    .push((&bookie.key, o.price));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let markets = quotes
            .into_iter()
            .map(|(key, qs)| (key.to_string(), MarketPrice::from_quotes(&qs)))
            .filter(|(_, mp)| mp.average > 0.0)
            .collect();

        Fixture {
            id: event.id.clone(),
            league: league_name.to_string(),
            home_team: event.home_team.clone(),
            away_team: event.away_team.clone(),
            kickoff: event.commence_time,
            markets,
        }
    }

    /// Map a score event onto a `MatchResult`, or None when no usable
    /// score is present yet.
    fn score_to_result(event: &ScoreEvent) -> Option<MatchResult> {
        let scores = event.scores.as_ref()?;
        let mut home = None;
        let mut away = None;
        for ts in scores {
            let parsed: u32 = ts.score.parse().ok()?;
            if ts.name == event.home_team {
                home = Some(parsed);
            } else if ts.name == event.away_team {
                away = Some(parsed);
            }
        }
        Some(MatchResult {
            home_score: home?,
            away_score: away?,
            completed: event.completed,
        })
    }
}

#[async_trait]
impl OddsSource for OddsApiClient {
    async fn fetch_fixtures(
        &self,
        league_key: &str,
        league_name: &str,
    ) -> Result<Vec<Fixture>, EngineError> {
        let url = format!("{}/{}/odds", self.base_url, league_key);
        let events: Vec<OddsEvent> = self
            .get_json(
                &url,
                &[
                    ("regions", "eu,uk"),
                    ("markets", "h2h,totals"),
                    ("oddsFormat", "decimal"),
                ],
            )
            .await?;

        let cutoff = Utc::now() + Duration::hours(self.fixture_window_hours);
        let fixtures: Vec<Fixture> = events
            .iter()
            .filter(|e| e.commence_time <= cutoff)
            .map(|e| Self::event_to_fixture(e, league_name))
            .filter(|f| !f.markets.is_empty())
            .collect();

        debug!(
            league = league_key,
            raw = events.len(),
            kept = fixtures.len(),
            "Fixtures fetched"
        );
        Ok(fixtures)
    }

    async fn fetch_result(
        &self,
        league_key: &str,
        fixture_id: &str,
    ) -> Result<Option<MatchResult>, EngineError> {
        let url = format!("{}/{}/scores", self.base_url, league_key);
        let events: Vec<ScoreEvent> = self
            .get_json(&url, &[("daysFrom", "2"), ("eventIds", fixture_id)])
            .await?;

        Ok(events
            .iter()
            .find(|e| e.id == fixture_id)
            .and_then(Self::score_to_result))
    }

    async fn fetch_sports(&self) -> Result<Vec<String>, EngineError> {
        #[derive(Deserialize)]
        struct SportEntry {
            key: String,
        }
        let entries: Vec<SportEntry> = self.get_json(&self.base_url, &[]).await?;
        Ok(entries.into_iter().map(|s| s.key).collect())
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event_json() -> &'static str {
        r#"{
            "id": "abc123",
            "commence_time": "2026-01-10T15:00:00Z",
            "home_team": "Arsenal",
            "away_team": "Chelsea",
            "bookmakers": [
                {
                    "key": "pinnacle",
                    "markets": [
                        {
                            "key": "h2h",
                            "outcomes": [
                                {"name": "Arsenal", "price": 1.80},
                                {"name": "Chelsea", "price": 4.20},
                                {"name": "Draw", "price": 3.60}
                            ]
                        },
                        {
                            "key": "totals",
                            "outcomes": [
                                {"name": "Over", "price": 1.90, "point": 2.5},
                                {"name": "Under", "price": 1.95, "point": 2.5},
                                {"name": "Over", "price": 1.30, "point": 1.5}
                            ]
                        }
                    ]
                },
                {
                    "key": "bet365",
                    "markets": [
                        {
                            "key": "h2h",
                            "outcomes": [
                                {"name": "Arsenal", "price": 1.90},
                                {"name": "Chelsea", "price": 4.00},
                                {"name": "Draw", "price": 3.50}
                            ]
                        }
                    ]
                }
            ]
        }"#
    }

    #[test]
    fn test_event_to_fixture_averages() {
        let event: OddsEvent = serde_json::from_str(sample_event_json()).unwrap();
        let fx = OddsApiClient::event_to_fixture(&event, "Premier League");

        assert_eq!(fx.id, "abc123");
        assert_eq!(fx.league, "Premier League");
        // home_win averages 1.80 and 1.90
        assert!((fx.average(MARKET_HOME_WIN).unwrap() - 1.85).abs() < 1e-10);
        assert!((fx.average(MARKET_AWAY_WIN).unwrap() - 4.10).abs() < 1e-10);
        assert!((fx.average(MARKET_DRAW).unwrap() - 3.55).abs() < 1e-10);
        // totals only from pinnacle, and only the 2.5 line
        assert!((fx.average(MARKET_OVER_2_5).unwrap() - 1.90).abs() < 1e-10);
        assert!((fx.average(MARKET_UNDER_2_5).unwrap() - 1.95).abs() < 1e-10);
    }

    #[test]
    fn test_event_to_fixture_ignores_other_goal_lines() {
        let event: OddsEvent = serde_json::from_str(sample_event_json()).unwrap();
        let fx = OddsApiClient::event_to_fixture(&event, "Premier League");
        // The 1.5 line must not leak into the canonical map
        assert!((fx.average(MARKET_OVER_2_5).unwrap() - 1.90).abs() < 1e-10);
    }

    #[test]
    fn test_event_without_bookmakers_has_no_markets() {
        let event: OddsEvent = serde_json::from_str(
            r#"{"id":"x","commence_time":"2026-01-10T15:00:00Z",
                "home_team":"A","away_team":"B"}"#,
        )
        .unwrap();
        let fx = OddsApiClient::event_to_fixture(&event, "L");
        assert!(fx.markets.is_empty());
    }

    #[test]
    fn test_score_to_result_completed() {
        let event: ScoreEvent = serde_json::from_str(
            r#"{"id":"abc","completed":true,
                "scores":[{"name":"Arsenal","score":"2"},{"name":"Chelsea","score":"1"}],
                "home_team":"Arsenal","away_team":"Chelsea"}"#,
        )
        .unwrap();
        let r = OddsApiClient::score_to_result(&event).unwrap();
        assert_eq!(r.home_score, 2);
        assert_eq!(r.away_score, 1);
        assert!(r.completed);
    }

    #[test]
    fn test_score_to_result_missing_scores() {
        let event: ScoreEvent = serde_json::from_str(
            r#"{"id":"abc","completed":false,
                "home_team":"Arsenal","away_team":"Chelsea"}"#,
        )
        .unwrap();
        assert!(OddsApiClient::score_to_result(&event).is_none());
    }

    #[test]
    fn test_score_to_result_unparseable_score() {
        let event: ScoreEvent = serde_json::from_str(
            r#"{"id":"abc","completed":true,
                "scores":[{"name":"Arsenal","score":"n/a"},{"name":"Chelsea","score":"1"}],
                "home_team":"Arsenal","away_team":"Chelsea"}"#,
        )
        .unwrap();
        assert!(OddsApiClient::score_to_result(&event).is_none());
    }
}
