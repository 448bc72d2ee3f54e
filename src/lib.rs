//! TIPSTER: Football Bet Selection & Settlement Engine
//!
//! A batch engine that turns bookmaker odds feeds into three daily
//! risk-tiered picks, settles them against final scores, and tracks
//! performance — all through a quota-aware cache so a hard monthly API
//! budget is never exceeded.
//!
//! Modules:
//! - `config` — TOML configuration with env-var secret resolution
//! - `types` — domain model: fixtures, picks, tiers, results, errors
//! - `odds` — the `OddsSource` trait, HTTP client, and sample fixtures
//! - `cache` — quota-aware TTL cache in front of the feed
//! - `engine` — pick selection and settlement grading
//! - `storage` — JSON-file store for picks, usage, and cache entries

pub mod cache;
pub mod config;
pub mod engine;
pub mod odds;
pub mod storage;
pub mod types;
