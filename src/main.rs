//! TIPSTER — Football Bet Selection & Settlement Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the store, cache, and feed client together, and dispatches the
//! requested slot: one of the three daily tip tiers, the results sweep,
//! a stats report, or the retention cleanup.

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use tipster::cache::QuotaCache;
use tipster::config::AppConfig;
use tipster::engine::{resolve, MatchAnalyzer};
use tipster::odds::client::OddsApiClient;
use tipster::odds::sample::sample_fixtures;
use tipster::odds::OddsSource;
use tipster::storage::PredictionStore;
use tipster::types::{EngineError, Fixture, Pick, PickStatus, RiskLevel};

const BANNER: &str = r#"
 _____ ___ ____  ____ _____ _____ ____
|_   _|_ _|  _ \/ ___|_   _| ____|  _ \
  | |  | || |_) \___ \ | | |  _| | |_) |
  | |  | ||  __/ ___) || | | |___|  _ <
  |_| |___|_|   |____/ |_| |_____|_| \_\

  Football Bet Selection & Settlement Engine
  v0.1.0
"#;

const USAGE: &str = "usage: tipster <safe|value|risky|results|stats|leagues|cleanup>";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML, falling back to built-in defaults
    let (cfg, cfg_defaulted) = match AppConfig::load("config.toml") {
        Ok(c) => (c, false),
        Err(_) => (AppConfig::default(), true),
    };

    // Initialise structured logging
    init_logging();

    println!("{BANNER}");
    if cfg_defaulted {
        warn!("config.toml not found or unreadable, using built-in defaults");
    }

    let command = std::env::args().nth(1).ok_or_else(|| anyhow!(USAGE))?;

    // -- Initialise components -------------------------------------------

    let store = Arc::new(PredictionStore::new(&cfg.store.data_file));
    let cache = QuotaCache::new(
        store.clone(),
        cfg.api.monthly_limit,
        cfg.api.rate_limit_backoff_secs,
    );

    // Feed client is optional: without an API key every slot degrades to
    // cached or sample data
    let client = match AppConfig::resolve_env(&cfg.api.api_key_env) {
        Ok(key) => {
            let client = OddsApiClient::new(&cfg.api, key)?;
            info!(source = client.name(), "Odds feed client ready");
            Some(client)
        }
        Err(_) => {
            warn!(
                env = %cfg.api.api_key_env,
                "No API key configured, running on cached/sample data only"
            );
            None
        }
    };

    info!(
        command = %command,
        leagues = cfg.leagues.len(),
        quota_remaining = cache.remaining()?,
        "TIPSTER starting"
    );

    match command.as_str() {
        "results" => run_results_slot(&cfg, &store, &cache, client.as_ref()).await,
        "stats" => run_stats(&store),
        "leagues" => run_leagues(&cfg, &cache, client.as_ref()).await,
        "cleanup" => run_cleanup(&cfg, &store),
        // Tip slots, including the moderate/high aliases
        tier => match tier.parse::<RiskLevel>() {
            Ok(level) => run_tip_slot(&cfg, &store, &cache, client.as_ref(), level).await,
            Err(_) => Err(anyhow!("unknown command {tier:?}\n{USAGE}")),
        },
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// Gather fixtures for all configured leagues through the quota cache,
/// falling back to deterministic sample data when nothing is available.
async fn gather_fixtures(
    cfg: &AppConfig,
    cache: &QuotaCache,
    client: Option<&OddsApiClient>,
) -> Result<Vec<Fixture>> {
    let mut fixtures = Vec::new();
    if let Some(client) = client {
        for league in &cfg.leagues {
            let key = format!("fixtures_{}", league.key);
            let league_key = league.key.clone();
            let league_name = league.name.clone();
            let fetched: Option<Vec<Fixture>> = cache
                .fetch(&key, cfg.cache.fixtures_ttl_hours, move || async move {
                    client.fetch_fixtures(&league_key, &league_name).await
                })
                .await?;
            if let Some(batch) = fetched {
                info!(league = %league.name, count = batch.len(), "Fixtures loaded");
                fixtures.extend(batch);
            }
        }
    }
    if fixtures.is_empty() {
        warn!("No live fixtures available, falling back to sample data");
        let league = cfg
            .leagues
            .first()
            .map(|l| l.name.clone())
            .unwrap_or_else(|| "Premier League".to_string());
        fixtures = sample_fixtures(&league);
    }
    Ok(fixtures)
}

/// Produce one pick for a tier, persist it, and emit it as JSON on stdout.
async fn run_tip_slot(
    cfg: &AppConfig,
    store: &Arc<PredictionStore>,
    cache: &QuotaCache,
    client: Option<&OddsApiClient>,
    level: RiskLevel,
) -> Result<()> {
    let fixtures = gather_fixtures(cfg, cache, client).await?;
    let today = Utc::now().date_naive();

    // Never tip a fixture an earlier slot already used today
    let mut analyzer = MatchAnalyzer::new();
    for pick in store.get_by_date(today)? {
        analyzer.mark_used(&pick.fixture_id);
    }

    let band = cfg.tiers.band(level);
    // No unused fixture left means nothing to post today, not a failure
    let Some((fixture, analysis)) = analyzer.select(&fixtures, level, band) else {
        warn!(%level, "No selectable fixture left, skipping slot");
        return Ok(());
    };

    let created_at = Utc::now();
    let post_number = store.next_post_number(today)?;
    let pick = Pick {
        // Time-derived id; the slot index disambiguates same-millisecond runs
        id: format!("{}-{}", created_at.format("%Y%m%d%H%M%S%3f"), post_number),
        date: today,
        post_number,
        risk_level: analysis.risk_level,
        market: analysis.market,
        selection: analysis.selection,
        odds: analysis.odds,
        price_source: analysis.price_source,
        confidence: analysis.confidence,
        fixture_id: fixture.id,
        league: fixture.league,
        home_team: fixture.home_team,
        away_team: fixture.away_team,
        kickoff: fixture.kickoff,
        reasons: analysis.reasons,
        status: PickStatus::Pending,
        result: None,
        final_score: None,
        profit: None,
        created_at,
    };
    store.append_pick(&pick)?;

    println!("{}", serde_json::to_string_pretty(&pick)?);
    Ok(())
}

/// Settle pending picks from today and yesterday, then log the daily
/// rollup.
async fn run_results_slot(
    cfg: &AppConfig,
    store: &Arc<PredictionStore>,
    cache: &QuotaCache,
    client: Option<&OddsApiClient>,
) -> Result<()> {
    let today = Utc::now().date_naive();
    let mut settled = 0usize;

    for date in [today, today - Duration::days(1)] {
        for pick in store.get_pending(date)? {
            let Some(client) = client else {
                info!(id = %pick.id, "No feed client, leaving pick pending");
                continue;
            };
            let Some(league_key) = cfg
                .leagues
                .iter()
                .find(|l| l.name == pick.league)
                .map(|l| l.key.clone())
            else {
                warn!(id = %pick.id, league = %pick.league, "League not configured, skipping");
                continue;
            };

            // A result is only cached once the match has finished, so a
            // pending fixture is retried on the next sweep
            let key = format!("result_{}", pick.fixture_id);
            let fixture_id = pick.fixture_id.clone();
            let result = cache
                .fetch(&key, cfg.cache.results_ttl_hours, move || async move {
                    match client.fetch_result(&league_key, &fixture_id).await? {
                        Some(r) if r.completed => Ok(r),
                        _ => Err(EngineError::OddsApi(format!(
                            "no finished result for {fixture_id}"
                        ))),
                    }
                })
                .await?;

            if let Some(result) = result {
                let (outcome, profit) = resolve(&pick, &result);
                if store.update_result(&pick.id, outcome, &result.score_line(), profit)? {
                    settled += 1;
                    info!(
                        id = %pick.id,
                        selection = %pick.selection,
                        score = %result.score_line(),
                        %outcome,
                        profit,
                        "Pick settled"
                    );
                }
            }
        }
    }

    let stats = store.daily_stats(today)?;
    info!(settled, "Results sweep complete");
    println!("{stats}");
    Ok(())
}

/// Print the daily and weekly rollups plus a per-tier breakdown.
fn run_stats(store: &Arc<PredictionStore>) -> Result<()> {
    let today = Utc::now().date_naive();
    println!("{}", store.daily_stats(today)?);
    println!("{}", store.weekly_stats()?);

    let picks = store.get_by_date(today)?;
    for level in RiskLevel::ALL {
        for pick in picks.iter().filter(|p| p.risk_level == *level) {
            println!("{pick}");
        }
    }
    Ok(())
}

/// List the sport keys the feed currently offers.
async fn run_leagues(
    cfg: &AppConfig,
    cache: &QuotaCache,
    client: Option<&OddsApiClient>,
) -> Result<()> {
    let Some(client) = client else {
        for league in &cfg.leagues {
            println!("{}  {}", league.key, league.name);
        }
        return Ok(());
    };
    let sports: Option<Vec<String>> = cache
        .fetch("sports_list", cfg.cache.reference_ttl_hours, move || async move {
            client.fetch_sports().await
        })
        .await?;
    match sports {
        Some(keys) => {
            for key in keys {
                println!("{key}");
            }
        }
        None => warn!("Sports list unavailable"),
    }
    Ok(())
}

/// Drop picks past the retention window and expired cache entries.
fn run_cleanup(cfg: &AppConfig, store: &Arc<PredictionStore>) -> Result<()> {
    let today = Utc::now().date_naive();
    let removed = store.cleanup(cfg.store.retention_days, today)?;
    let expired = store.clear_expired_cache()?;
    info!(removed, expired, "Cleanup complete");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tipster=info"));

    let json_logging = std::env::var("TIPSTER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
