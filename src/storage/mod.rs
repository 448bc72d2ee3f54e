//! Persistence layer.
//!
//! A JSON-file row store holding the three collections the engine needs
//! across slot invocations: picks, API usage counters, and TTL cache
//! entries. Every operation is read-modify-write on the whole file —
//! slots are single-writer batch processes, so no locking is needed
//! (the orchestrator never runs two slots simultaneously).

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::{
    hit_rate, BetOutcome, DailyStats, Pick, PickStatus, WeeklyStats,
};

// ---------------------------------------------------------------------------
// On-disk layout
// ---------------------------------------------------------------------------

/// Per-day API call counter. Monthly usage is the sum of daily counts
/// since the 1st — the month boundary reset falls out of the date-range
/// query, no physical deletion involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageDay {
    pub date: NaiveDate,
    pub count: u32,
    pub last_call: Option<DateTime<Utc>>,
}

/// A cached payload. Reads treat an entry past `expires_at` as a miss;
/// writes overwrite the entry for the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: serde_json::Value,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    picks: Vec<Pick>,
    usage: Vec<UsageDay>,
    cache: Vec<CacheEntry>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Handle to the prediction store file.
pub struct PredictionStore {
    path: PathBuf,
}

impl PredictionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<StoreData> {
        if !Path::new(&self.path).exists() {
            debug!(path = %self.path.display(), "No store file yet, starting empty");
            return Ok(StoreData::default());
        }
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read store from {}", self.path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse store from {}", self.path.display()))
    }

    fn persist(&self, data: &StoreData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let json =
            serde_json::to_string_pretty(data).context("Failed to serialise store data")?;
        std::fs::write(&self.path, &json)
            .with_context(|| format!("Failed to write store to {}", self.path.display()))?;
        Ok(())
    }

    // -- Pick operations ---------------------------------------------------

    /// Append a new pick.
    pub fn append_pick(&self, pick: &Pick) -> Result<()> {
        let mut data = self.load()?;
        data.picks.push(pick.clone());
        self.persist(&data)?;
        info!(
            id = %pick.id,
            selection = %pick.selection,
            odds = pick.odds,
            risk = %pick.risk_level,
            "Pick saved"
        );
        Ok(())
    }

    pub fn get_pick(&self, id: &str) -> Result<Option<Pick>> {
        Ok(self.load()?.picks.into_iter().find(|p| p.id == id))
    }

    /// All picks for a date, ordered by post number.
    pub fn get_by_date(&self, date: NaiveDate) -> Result<Vec<Pick>> {
        let mut picks: Vec<Pick> = self
            .load()?
            .picks
            .into_iter()
            .filter(|p| p.date == date)
            .collect();
        picks.sort_by_key(|p| p.post_number);
        Ok(picks)
    }

    /// Pending picks for a date.
    pub fn get_pending(&self, date: NaiveDate) -> Result<Vec<Pick>> {
        Ok(self
            .get_by_date(date)?
            .into_iter()
            .filter(|p| p.status == PickStatus::Pending)
            .collect())
    }

    /// Next slot index for a date (1-based).
    pub fn next_post_number(&self, date: NaiveDate) -> Result<u32> {
        Ok(self.get_by_date(date)?.len() as u32 + 1)
    }

    /// Settle a pick. No-op returning `Ok(false)` when the pick is
    /// already settled, so settlement slots can re-scan a day safely.
    pub fn update_result(
        &self,
        id: &str,
        outcome: BetOutcome,
        final_score: &str,
        profit: f64,
    ) -> Result<bool> {
        let mut data = self.load()?;
        let Some(pick) = data.picks.iter_mut().find(|p| p.id == id) else {
            warn!(id, "update_result: pick not found");
            return Ok(false);
        };
        if pick.status == PickStatus::Settled {
            warn!(id, "update_result: pick already settled, skipping");
            return Ok(false);
        }
        pick.status = PickStatus::Settled;
        pick.result = Some(outcome);
        pick.final_score = Some(final_score.to_string());
        pick.profit = Some(profit);
        self.persist(&data)?;
        info!(id, result = %outcome, score = final_score, profit, "Result updated");
        Ok(true)
    }

    /// Delete picks older than the retention window. Returns the number
    /// removed.
    pub fn cleanup(&self, retention_days: i64, today: NaiveDate) -> Result<usize> {
        let mut data = self.load()?;
        let before = data.picks.len();
        data.picks.retain(|p| p.age_days(today) <= retention_days);
        let removed = before - data.picks.len();
        if removed > 0 {
            self.persist(&data)?;
            info!(removed, retention_days, "Old picks removed");
        }
        Ok(removed)
    }

    // -- Statistics ---------------------------------------------------------

    /// Daily rollup over stored picks.
    pub fn daily_stats(&self, date: NaiveDate) -> Result<DailyStats> {
        let picks = self.get_by_date(date)?;
        let wins = picks.iter().filter(|p| p.result == Some(BetOutcome::Win)).count();
        let losses = picks.iter().filter(|p| p.result == Some(BetOutcome::Loss)).count();
        let pending = picks.iter().filter(|p| !p.is_settled()).count();
        let profit: f64 = picks.iter().filter_map(|p| p.profit).sum();
        Ok(DailyStats {
            date,
            total: picks.len(),
            wins,
            losses,
            pending,
            profit: (profit * 100.0).round() / 100.0,
            hit_rate: hit_rate(wins, losses),
        })
    }

    /// Weekly rollup for the week containing `today` (weeks start Monday).
    pub fn weekly_stats_for(&self, today: NaiveDate) -> Result<WeeklyStats> {
        let week_start =
            today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        let picks: Vec<Pick> = self
            .load()?
            .picks
            .into_iter()
            .filter(|p| p.date >= week_start && p.date <= today)
            .collect();
        let wins = picks.iter().filter(|p| p.result == Some(BetOutcome::Win)).count();
        let losses = picks.iter().filter(|p| p.result == Some(BetOutcome::Loss)).count();
        let pending = picks.iter().filter(|p| !p.is_settled()).count();
        let profit: f64 = picks.iter().filter_map(|p| p.profit).sum();
        Ok(WeeklyStats {
            week_start,
            total: picks.len(),
            wins,
            losses,
            pending,
            profit: (profit * 100.0).round() / 100.0,
            hit_rate: hit_rate(wins, losses),
        })
    }

    /// Weekly rollup for the current week.
    pub fn weekly_stats(&self) -> Result<WeeklyStats> {
        self.weekly_stats_for(Utc::now().date_naive())
    }

    // -- API usage tracking -------------------------------------------------

    /// Increment the call counter for a given day.
    pub fn increment_usage_on(&self, date: NaiveDate) -> Result<()> {
        let mut data = self.load()?;
        match data.usage.iter_mut().find(|u| u.date == date) {
            Some(day) => {
                day.count += 1;
                day.last_call = Some(Utc::now());
            }
            None => data.usage.push(UsageDay {
                date,
                count: 1,
                last_call: Some(Utc::now()),
            }),
        }
        self.persist(&data)?;
        Ok(())
    }

    /// Increment today's call counter.
    pub fn increment_usage(&self) -> Result<()> {
        self.increment_usage_on(Utc::now().date_naive())
    }

    pub fn daily_usage(&self, date: NaiveDate) -> Result<u32> {
        Ok(self
            .load()?
            .usage
            .iter()
            .find(|u| u.date == date)
            .map(|u| u.count)
            .unwrap_or(0))
    }

    /// Total calls since the 1st of the month containing `today`.
    pub fn monthly_usage_at(&self, today: NaiveDate) -> Result<u32> {
        let month_start = today.with_day(1).unwrap_or(today);
        Ok(self
            .load()?
            .usage
            .iter()
            .filter(|u| u.date >= month_start && u.date <= today)
            .map(|u| u.count)
            .sum())
    }

    /// Total calls this month.
    pub fn monthly_usage(&self) -> Result<u32> {
        self.monthly_usage_at(Utc::now().date_naive())
    }

    // -- Cache operations ---------------------------------------------------

    /// Live cached payload for a key, or None on miss/expiry.
    pub fn cache_get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let now = Utc::now();
        Ok(self
            .load()?
            .cache
            .into_iter()
            .find(|e| e.key == key && e.expires_at > now)
            .map(|e| e.payload))
    }

    /// Cache a payload under a key with a TTL; overwrites any existing
    /// entry for the key.
    pub fn cache_put(
        &self,
        key: &str,
        payload: serde_json::Value,
        ttl_hours: i64,
    ) -> Result<()> {
        let now = Utc::now();
        let mut data = self.load()?;
        data.cache.retain(|e| e.key != key);
        data.cache.push(CacheEntry {
            key: key.to_string(),
            payload,
            cached_at: now,
            expires_at: now + Duration::hours(ttl_hours),
        });
        self.persist(&data)?;
        debug!(key, ttl_hours, "Payload cached");
        Ok(())
    }

    /// Drop expired cache entries. Returns the number removed.
    pub fn clear_expired_cache(&self) -> Result<usize> {
        let now = Utc::now();
        let mut data = self.load()?;
        let before = data.cache.len();
        data.cache.retain(|e| e.expires_at > now);
        let removed = before - data.cache.len();
        if removed > 0 {
            self.persist(&data)?;
            debug!(removed, "Expired cache entries cleared");
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketKind, PriceSource, RiskLevel};

    fn temp_store() -> PredictionStore {
        let mut p = std::env::temp_dir();
        p.push(format!("tipster_test_store_{}.json", uuid::Uuid::new_v4()));
        PredictionStore::new(p)
    }

    fn make_pick(id: &str, date: NaiveDate, post_number: u32) -> Pick {
        Pick {
            id: id.to_string(),
            date,
            post_number,
            risk_level: RiskLevel::Safe,
            market: MarketKind::OneXTwo,
            selection: "Home Win".to_string(),
            odds: 1.50,
            price_source: PriceSource::Sourced,
            confidence: 88,
            fixture_id: format!("fx-{id}"),
            league: "Premier League".to_string(),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            kickoff: Utc::now(),
            reasons: vec![],
            status: PickStatus::Pending,
            result: None,
            final_score: None,
            profit: None,
            created_at: Utc::now(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_append_and_get_by_date() {
        let store = temp_store();
        let d = day(2026, 1, 10);
        store.append_pick(&make_pick("p2", d, 2)).unwrap();
        store.append_pick(&make_pick("p1", d, 1)).unwrap();
        store.append_pick(&make_pick("p3", day(2026, 1, 11), 1)).unwrap();

        let picks = store.get_by_date(d).unwrap();
        assert_eq!(picks.len(), 2);
        // Ordered by post number
        assert_eq!(picks[0].id, "p1");
        assert_eq!(picks[1].id, "p2");
    }

    #[test]
    fn test_next_post_number() {
        let store = temp_store();
        let d = day(2026, 1, 10);
        assert_eq!(store.next_post_number(d).unwrap(), 1);
        store.append_pick(&make_pick("p1", d, 1)).unwrap();
        assert_eq!(store.next_post_number(d).unwrap(), 2);
    }

    #[test]
    fn test_update_result_settles_once() {
        let store = temp_store();
        let d = day(2026, 1, 10);
        store.append_pick(&make_pick("p1", d, 1)).unwrap();

        let updated = store.update_result("p1", BetOutcome::Win, "2-1", 0.50).unwrap();
        assert!(updated);

        let pick = store.get_pick("p1").unwrap().unwrap();
        assert!(pick.is_settled());
        assert_eq!(pick.result, Some(BetOutcome::Win));
        assert_eq!(pick.final_score.as_deref(), Some("2-1"));
        assert_eq!(pick.profit, Some(0.50));

        // Second attempt is a no-op
        let again = store.update_result("p1", BetOutcome::Loss, "0-3", -1.0).unwrap();
        assert!(!again);
        let pick = store.get_pick("p1").unwrap().unwrap();
        assert_eq!(pick.result, Some(BetOutcome::Win));
        assert_eq!(pick.profit, Some(0.50));
    }

    #[test]
    fn test_update_result_unknown_id() {
        let store = temp_store();
        assert!(!store.update_result("nope", BetOutcome::Win, "1-0", 0.4).unwrap());
    }

    #[test]
    fn test_get_pending_excludes_settled() {
        let store = temp_store();
        let d = day(2026, 1, 10);
        store.append_pick(&make_pick("p1", d, 1)).unwrap();
        store.append_pick(&make_pick("p2", d, 2)).unwrap();
        store.update_result("p1", BetOutcome::Loss, "0-1", -1.0).unwrap();

        let pending = store.get_pending(d).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "p2");
    }

    #[test]
    fn test_daily_stats() {
        let store = temp_store();
        let d = day(2026, 1, 10);
        for (i, id) in ["p1", "p2", "p3"].iter().enumerate() {
            store.append_pick(&make_pick(id, d, i as u32 + 1)).unwrap();
        }
        store.update_result("p1", BetOutcome::Win, "2-0", 0.50).unwrap();
        store.update_result("p2", BetOutcome::Loss, "0-1", -1.0).unwrap();

        let stats = store.daily_stats(d).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.pending, 1);
        assert!((stats.profit - (-0.50)).abs() < 1e-10);
        assert!((stats.hit_rate - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_daily_stats_empty_day_zero_hit_rate() {
        let store = temp_store();
        let stats = store.daily_stats(day(2026, 1, 10)).unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn test_weekly_stats_window() {
        let store = temp_store();
        // 2026-01-07 is a Wednesday; week starts Monday 2026-01-05
        let wed = day(2026, 1, 7);
        store.append_pick(&make_pick("mon", day(2026, 1, 5), 1)).unwrap();
        store.append_pick(&make_pick("sun_prev", day(2026, 1, 4), 1)).unwrap();
        store.update_result("mon", BetOutcome::Win, "1-0", 0.45).unwrap();

        let stats = store.weekly_stats_for(wed).unwrap();
        assert_eq!(stats.week_start, day(2026, 1, 5));
        // Previous Sunday excluded
        assert_eq!(stats.total, 1);
        assert_eq!(stats.wins, 1);
        assert!((stats.hit_rate - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_cleanup_respects_retention() {
        let store = temp_store();
        let today = day(2026, 2, 10);
        store.append_pick(&make_pick("old", day(2026, 1, 1), 1)).unwrap();
        store.append_pick(&make_pick("recent", day(2026, 2, 8), 1)).unwrap();

        let removed = store.cleanup(30, today).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_pick("old").unwrap().is_none());
        assert!(store.get_pick("recent").unwrap().is_some());
    }

    #[test]
    fn test_usage_counters_and_month_window() {
        let store = temp_store();
        store.increment_usage_on(day(2026, 1, 31)).unwrap();
        store.increment_usage_on(day(2026, 2, 1)).unwrap();
        store.increment_usage_on(day(2026, 2, 1)).unwrap();
        store.increment_usage_on(day(2026, 2, 5)).unwrap();

        assert_eq!(store.daily_usage(day(2026, 2, 1)).unwrap(), 2);
        // January's count falls out of February's window
        assert_eq!(store.monthly_usage_at(day(2026, 2, 28)).unwrap(), 3);
        assert_eq!(store.monthly_usage_at(day(2026, 1, 31)).unwrap(), 1);
    }

    #[test]
    fn test_cache_roundtrip_and_overwrite() {
        let store = temp_store();
        let v1 = serde_json::json!({"fixtures": 3});
        store.cache_put("fixtures_epl", v1.clone(), 4).unwrap();
        assert_eq!(store.cache_get("fixtures_epl").unwrap(), Some(v1));

        let v2 = serde_json::json!({"fixtures": 7});
        store.cache_put("fixtures_epl", v2.clone(), 4).unwrap();
        assert_eq!(store.cache_get("fixtures_epl").unwrap(), Some(v2));
    }

    #[test]
    fn test_cache_expired_entry_is_miss() {
        let store = temp_store();
        // Negative TTL → already expired
        store
            .cache_put("stale", serde_json::json!({"x": 1}), -1)
            .unwrap();
        assert!(store.cache_get("stale").unwrap().is_none());
    }

    #[test]
    fn test_clear_expired_cache() {
        let store = temp_store();
        store.cache_put("stale", serde_json::json!(1), -1).unwrap();
        store.cache_put("live", serde_json::json!(2), 4).unwrap();

        let removed = store.clear_expired_cache().unwrap();
        assert_eq!(removed, 1);
        assert!(store.cache_get("live").unwrap().is_some());
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let store = temp_store();
        assert!(store.get_by_date(day(2026, 1, 1)).unwrap().is_empty());
        assert_eq!(store.monthly_usage_at(day(2026, 1, 1)).unwrap(), 0);
    }
}
