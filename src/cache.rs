//! Quota-aware cache in front of the odds feed.
//!
//! Every outbound API call funnels through `QuotaCache::fetch`: serve
//! from the TTL cache when possible, refuse to spend calls once the
//! monthly quota is reached, and degrade to `None` on any feed failure
//! so slots can fall back to sample data instead of aborting.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::storage::PredictionStore;
use crate::types::EngineError;

/// Remaining-call threshold below which a warning is logged.
const LOW_QUOTA_WARN: u32 = 20;

pub struct QuotaCache {
    store: Arc<PredictionStore>,
    monthly_limit: u32,
    rate_limit_backoff_secs: u64,
}

impl QuotaCache {
    pub fn new(
        store: Arc<PredictionStore>,
        monthly_limit: u32,
        rate_limit_backoff_secs: u64,
    ) -> Self {
        Self {
            store,
            monthly_limit,
            rate_limit_backoff_secs,
        }
    }

    /// Calls left in the current monthly quota.
    pub fn remaining(&self) -> Result<u32> {
        let used = self.store.monthly_usage()?;
        Ok(self.monthly_limit.saturating_sub(used))
    }

    /// Fetch a payload through the cache.
    ///
    /// Resolution order:
    /// 1. Live cache entry for `key` → returned without spending a call.
    /// 2. Monthly quota exhausted → `Ok(None)`, no call made.
    /// 3. Origin call. Success is counted, cached under `key` with
    ///    `ttl_hours`, and returned. A 429 sleeps out the backoff and
    ///    degrades to `Ok(None)`; other feed errors degrade immediately.
    ///
    /// `Err` is reserved for store failures — feed trouble never
    /// propagates past this point.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &str,
        ttl_hours: i64,
        origin: F,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        if let Some(payload) = self.store.cache_get(key)? {
            debug!(key, "Cache hit");
            let value = serde_json::from_value(payload)
                .with_context(|| format!("Corrupt cache payload for key {key}"))?;
            return Ok(Some(value));
        }

        let used = self.store.monthly_usage()?;
        if used >= self.monthly_limit {
            warn!(
                used,
                limit = self.monthly_limit,
                key,
                "Monthly API quota exhausted, skipping call"
            );
            return Ok(None);
        }

        match origin().await {
            Ok(value) => {
                self.store.increment_usage()?;
                let remaining = self.monthly_limit.saturating_sub(used + 1);
                if remaining < LOW_QUOTA_WARN {
                    warn!(remaining, limit = self.monthly_limit, "API quota running low");
                }
                let payload = serde_json::to_value(&value)
                    .with_context(|| format!("Failed to serialise payload for key {key}"))?;
                self.store.cache_put(key, payload, ttl_hours)?;
                info!(key, used = used + 1, limit = self.monthly_limit, "API call spent");
                Ok(Some(value))
            }
            Err(EngineError::RateLimited) => {
                warn!(
                    key,
                    backoff_secs = self.rate_limit_backoff_secs,
                    "Feed rate limited, backing off"
                );
                tokio::time::sleep(std::time::Duration::from_secs(
                    self.rate_limit_backoff_secs,
                ))
                .await;
                Ok(None)
            }
            Err(err) => {
                warn!(key, error = %err, "Feed call failed, degrading");
                Ok(None)
            }
        }
    }
}
