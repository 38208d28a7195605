//! Per-bus insight cache.
//!
//! Entries expire after an optional TTL and the cache never holds more than
//! `capacity` buses; the oldest-stored entry is evicted first. Writes are
//! last-writer-wins per bus id.

use crate::analyzers::types::PerformanceInsight;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Whether an insight was computed from the latest successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    /// Kept after a failed refresh; still displayable.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedInsight {
    pub insight: PerformanceInsight,
    pub stored_at: DateTime<Utc>,
    pub freshness: Freshness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// Seconds an entry stays readable. `None` disables expiry.
    pub ttl_secs: Option<u64>,
    pub capacity: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl_secs: Some(300),
            capacity: 5000,
        }
    }
}

impl CachePolicy {
    /// Largest TTL representable as a chrono duration.
    pub const MAX_TTL_SECS: u64 = i64::MAX as u64 / 1000;

    /// The TTL as a duration; `None` when expiry is disabled or the TTL is
    /// too large to represent, which means never expiring.
    fn ttl(&self) -> Option<TimeDelta> {
        let secs = i64::try_from(self.ttl_secs?).ok()?;
        TimeDelta::try_seconds(secs)
    }

    fn is_expired(&self, entry: &CachedInsight, now: DateTime<Utc>) -> bool {
        self.ttl().is_some_and(|ttl| now - entry.stored_at >= ttl)
    }
}

#[derive(Debug)]
pub struct InsightCache {
    policy: CachePolicy,
    entries: RwLock<HashMap<String, CachedInsight>>,
}

impl InsightCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn get(&self, bus_id: &str) -> Option<CachedInsight> {
        self.get_at(bus_id, Utc::now())
    }

    /// Looks up an entry as of `now`; expired entries are treated as absent.
    pub fn get_at(&self, bus_id: &str, now: DateTime<Utc>) -> Option<CachedInsight> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(bus_id)
            .filter(|e| !self.policy.is_expired(e, now))
            .cloned()
    }

    pub fn put(&self, bus_id: &str, insight: PerformanceInsight) {
        self.put_at(bus_id, insight, Utc::now());
    }

    /// Stores a fresh insight, replacing any previous entry for the bus.
    pub fn put_at(&self, bus_id: &str, insight: PerformanceInsight, now: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        entries.retain(|_, e| !self.policy.is_expired(e, now));

        entries.insert(
            bus_id.to_string(),
            CachedInsight {
                insight,
                stored_at: now,
                freshness: Freshness::Fresh,
            },
        );

        while entries.len() > self.policy.capacity {
            let Some(oldest) = entries
                .iter()
                .filter(|(id, _)| id.as_str() != bus_id)
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            debug!(bus_id = %oldest, "Evicting oldest cached insight");
            entries.remove(&oldest);
        }
    }

    pub fn invalidate(&self, bus_id: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(bus_id).is_some()
    }

    /// Drops every entry whose bus is not in `keep`.
    pub fn retain<'a>(&self, keep: impl IntoIterator<Item = &'a str>) {
        let keep: std::collections::HashSet<&str> = keep.into_iter().collect();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|id, _| keep.contains(id.as_str()));
    }

    /// Flags all entries as stale, e.g. after a failed refresh.
    pub fn mark_stale(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for entry in entries.values_mut() {
            entry.freshness = Freshness::Stale;
        }
    }

    /// Owned, consistent copy of every unexpired insight as of `now`.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> HashMap<String, PerformanceInsight> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|(_, e)| !self.policy.is_expired(e, now))
            .map(|(id, e)| (id.clone(), e.insight.clone()))
            .collect()
    }

    pub fn snapshot(&self) -> HashMap<String, PerformanceInsight> {
        self.snapshot_at(Utc::now())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for InsightCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}
