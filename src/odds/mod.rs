//! Odds feed integrations.
//!
//! Defines the `OddsSource` trait and provides:
//! - `OddsApiClient` — live fixtures, odds, and results over HTTP
//! - `sample` — deterministic synthetic fixtures for degraded slots
//!   (quota exhausted, feed unreachable, or no API key configured)

pub mod client;
pub mod sample;

use async_trait::async_trait;

use crate::types::{EngineError, Fixture, MatchResult};

/// Abstraction over the odds/results feed.
///
/// Implementors return raw fixtures with per-bookmaker decimal odds and
/// final scores for finished matches. Errors use `EngineError` so the
/// quota cache can distinguish a 429 from other failures.
#[async_trait]
pub trait OddsSource: Send + Sync {
    /// Upcoming fixtures for a league within the configured kickoff window.
    async fn fetch_fixtures(
        &self,
        league_key: &str,
        league_name: &str,
    ) -> Result<Vec<Fixture>, EngineError>;

    /// Final score for a fixture, or None if no finished result is
    /// available yet.
    async fn fetch_result(
        &self,
        league_key: &str,
        fixture_id: &str,
    ) -> Result<Option<MatchResult>, EngineError>;

    /// Available sport/league keys (static reference data).
    async fn fetch_sports(&self) -> Result<Vec<String>, EngineError>;

    /// Source name for logging and cache keys.
    fn name(&self) -> &str;
}
