//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`. Tier bands, cache TTLs, and
//! the monthly call quota are configuration, never hardcoded at call
//! sites.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::types::{RiskLevel, TierBand};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: OddsApiConfig,
    pub tiers: TiersConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub leagues: Vec<LeagueConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OddsApiConfig {
    pub base_url: String,
    pub api_key_env: String,
    /// Hard monthly call quota.
    pub monthly_limit: u32,
    pub timeout_secs: u64,
    /// Bounded retries for transient transport/5xx failures.
    pub max_retries: u32,
    /// Base of the exponential backoff between retries.
    pub retry_backoff_secs: u64,
    /// Fixed sleep after an HTTP 429 before giving up the attempt.
    pub rate_limit_backoff_secs: u64,
    /// Only fixtures kicking off within this window are considered.
    pub fixture_window_hours: i64,
}

/// Odds/confidence bounds per risk tier. Intervals are disjoint and
/// confidence decreases as odds increase.
#[derive(Debug, Deserialize, Clone)]
pub struct TiersConfig {
    pub safe: TierBand,
    pub value: TierBand,
    pub risky: TierBand,
}

impl TiersConfig {
    pub fn band(&self, level: RiskLevel) -> TierBand {
        match level {
            RiskLevel::Safe => self.safe,
            RiskLevel::Value => self.value,
            RiskLevel::Risky => self.risky,
        }
    }
}

/// Cache TTLs (hours) by data kind.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Fixtures carry their per-bookmaker odds, so this TTL governs
    /// both.
    pub fixtures_ttl_hours: i64,
    pub results_ttl_hours: i64,
    pub reference_ttl_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub data_file: String,
    /// Picks older than this many days are removed by the cleanup sweep.
    pub retention_days: i64,
}

/// A league to scan, with its feed key and display name.
#[derive(Debug, Deserialize, Clone)]
pub struct LeagueConfig {
    pub key: String,
    pub name: String,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: OddsApiConfig {
                base_url: "https://odds-feed.example.com/v4/sports".to_string(),
                api_key_env: "ODDS_API_KEY".to_string(),
                monthly_limit: 200,
                timeout_secs: 30,
                max_retries: 3,
                retry_backoff_secs: 2,
                rate_limit_backoff_secs: 60,
                fixture_window_hours: 24,
            },
            tiers: TiersConfig {
                safe: TierBand {
                    min_odds: 1.20,
                    max_odds: 1.55,
                    min_confidence: 85,
                    max_confidence: 95,
                },
                value: TierBand {
                    min_odds: 1.60,
                    max_odds: 2.20,
                    min_confidence: 65,
                    max_confidence: 80,
                },
                risky: TierBand {
                    min_odds: 2.30,
                    max_odds: 10.00,
                    min_confidence: 45,
                    max_confidence: 60,
                },
            },
            cache: CacheConfig {
                fixtures_ttl_hours: 4,
                results_ttl_hours: 24,
                reference_ttl_hours: 24,
            },
            store: StoreConfig {
                data_file: "data/tipster.json".to_string(),
                retention_days: 30,
            },
            leagues: vec![
                LeagueConfig { key: "soccer_epl".into(), name: "Premier League".into() },
                LeagueConfig { key: "soccer_spain_la_liga".into(), name: "La Liga".into() },
                LeagueConfig { key: "soccer_germany_bundesliga".into(), name: "Bundesliga".into() },
                LeagueConfig { key: "soccer_italy_serie_a".into(), name: "Serie A".into() },
                LeagueConfig { key: "soccer_france_ligue_one".into(), name: "Ligue 1".into() },
            ],
        }
    }
}
