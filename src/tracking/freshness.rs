// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tagwatch-rs

//! Freshness classification
//!
//! One threshold table drives both presentations: the per-entity status
//! (`active` / `idle` / `missing`) and the raw-line row classes
//! (`row-fresh` / `row-warm` / `row-stale`).

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::FreshnessConfig;

/// Liveness derived from the time since the last detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    #[serde(alias = "active")]
    Fresh,
    #[serde(alias = "idle")]
    Warm,
    #[serde(alias = "missing")]
    Stale,
}

impl Freshness {
    /// Entity status label
    pub fn entity_label(self) -> &'static str {
        match self {
            Freshness::Fresh => "active",
            Freshness::Warm => "idle",
            Freshness::Stale => "missing",
        }
    }

    /// Raw-line row class
    pub fn row_class(self) -> &'static str {
        match self {
            Freshness::Fresh => "row-fresh",
            Freshness::Warm => "row-warm",
            Freshness::Stale => "row-stale",
        }
    }

    /// Parse a status label from either vocabulary
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "fresh" | "active" | "row-fresh" => Some(Freshness::Fresh),
            "warm" | "idle" | "row-warm" => Some(Freshness::Warm),
            "stale" | "missing" | "row-stale" => Some(Freshness::Stale),
            _ => None,
        }
    }
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.entity_label())
    }
}

/// Threshold policy mapping an age to a [`Freshness`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    fresh: Duration,
    warm: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::from_config(&FreshnessConfig::default())
    }
}

impl FreshnessPolicy {
    pub fn new(fresh_secs: u64, warm_secs: u64) -> Self {
        let fresh = Duration::seconds(fresh_secs as i64);
        let warm = Duration::seconds(warm_secs.max(fresh_secs) as i64);
        Self { fresh, warm }
    }

    pub fn from_config(config: &FreshnessConfig) -> Self {
        Self::new(config.fresh_threshold_secs, config.warm_threshold_secs)
    }

    /// Classify an age. Negative ages (clock skew) count as fresh.
    pub fn classify_age(&self, age: Duration) -> Freshness {
        if age <= self.fresh {
            Freshness::Fresh
        } else if age <= self.warm {
            Freshness::Warm
        } else {
            Freshness::Stale
        }
    }

    pub fn classify(&self, last_seen: DateTime<Utc>, now: DateTime<Utc>) -> Freshness {
        self.classify_age(now - last_seen)
    }

    /// Missing timestamps are stale
    pub fn classify_opt(&self, last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Freshness {
        last_seen
            .map(|ts| self.classify(ts, now))
            .unwrap_or(Freshness::Stale)
    }

    /// Classify a timestamp as received on the wire; garbage is stale
    pub fn classify_raw(&self, raw: &str, now: DateTime<Utc>) -> Freshness {
        self.classify_opt(parse_timestamp(raw), now)
    }

    /// Like [`classify_raw`](Self::classify_raw), with naive wall-clock times read in `tz`
    pub fn classify_local(&self, raw: &str, tz: Tz, now: DateTime<Utc>) -> Freshness {
        self.classify_opt(parse_local_timestamp(raw, tz), now)
    }
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 with offset and the naive `YYYY-MM-DDTHH:MM:SS[.f]` /
/// `YYYY-MM-DD HH:MM:SS[.f]` forms, which are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    parse_naive(raw).map(|naive| naive.and_utc())
}

/// Parse a wall-clock timestamp printed in `tz`.
///
/// An explicit offset wins over `tz`. Repeated autumn hours resolve to the
/// earlier instant; times inside the spring gap do not exist and yield `None`.
pub fn parse_local_timestamp(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = parse_naive(raw)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    if raw.is_empty() {
        return None;
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
