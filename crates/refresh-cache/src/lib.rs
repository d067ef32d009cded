//! TTL'd refresh cache with single-flight fetches and stale fallback.
//!
//! Entries live for the process lifetime; a failed refresh never evicts the
//! last good payload. Callers must treat "not found" and "found but stale"
//! as distinct states: an entry with no successful fetch ever recorded is
//! absent from the cache, not present-with-null-value.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use signal_core::{DataCategory, DataHealth, ProviderError, RawSeries};

/// Category -> TTL table. The semantic category, not the literal source,
/// determines refresh cadence.
#[derive(Debug, Clone, Default)]
pub struct TtlPolicy {
    overrides: HashMap<DataCategory, Duration>,
}

impl TtlPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, category: DataCategory, ttl: Duration) -> Self {
        self.overrides.insert(category, ttl);
        self
    }

    pub fn ttl_for(&self, category: DataCategory) -> Duration {
        if let Some(ttl) = self.overrides.get(&category) {
            return *ttl;
        }
        match category {
            DataCategory::Intraday => Duration::minutes(5),
            DataCategory::Daily => Duration::hours(1),
            DataCategory::DailySlow => Duration::hours(24),
            DataCategory::Monthly => Duration::hours(24),
            DataCategory::Quarterly => Duration::days(7),
        }
    }
}

/// Last good value for a key. Only ever stored after a successful fetch.
struct StoredEntry {
    category: DataCategory,
    payload: Arc<RawSeries>,
    fetched_at: DateTime<Utc>,
    last_error: Option<String>,
}

/// Snapshot returned to callers. `is_stale` is computed at snapshot time;
/// the payload is either the old series or the fully new one, never a
/// partial update.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub category: DataCategory,
    /// None only for keys with no successful fetch ever recorded
    pub payload: Option<Arc<RawSeries>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub is_stale: bool,
    pub last_error: Option<String>,
}

impl CacheEntry {
    fn unavailable(key: &str, category: DataCategory, error: String) -> Self {
        Self {
            key: key.to_string(),
            category,
            payload: None,
            fetched_at: None,
            is_stale: false,
            last_error: Some(error),
        }
    }

    pub fn health(&self) -> DataHealth {
        if self.payload.is_none() {
            DataHealth::Unavailable
        } else if self.is_stale {
            DataHealth::Stale
        } else {
            DataHealth::Fresh
        }
    }
}

/// Explicit, injectable store: created at process start, cleared only via
/// explicit invalidation. The cache map is the only shared mutable state in
/// the engine; access is single-flight per key.
pub struct RefreshCache {
    entries: DashMap<String, StoredEntry>,
    /// One in-flight fetch per key; late arrivals share its result
    inflight: DashMap<String, Arc<Mutex<Option<CacheEntry>>>>,
    ttl: TtlPolicy,
}

impl RefreshCache {
    pub fn new(ttl: TtlPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            inflight: DashMap::new(),
            ttl,
        }
    }

    /// Return the cached value for `key`, refreshing it through `fetch_fn`
    /// if it is absent or past its category TTL.
    ///
    /// Concurrent callers for the same key observe exactly one fetch. On
    /// fetch failure the previous payload is kept and returned stale; a key
    /// that never fetched successfully yields an unavailable entry that is
    /// not stored.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        key: &str,
        category: DataCategory,
        fetch_fn: F,
    ) -> CacheEntry
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RawSeries, ProviderError>>,
    {
        if let Some(entry) = self.fresh_snapshot(key) {
            return entry;
        }

        let flight = self
            .inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();
        let mut slot = flight.lock().await;

        // A concurrent caller may have completed this flight while we waited
        if let Some(entry) = slot.as_ref() {
            return entry.clone();
        }

        // ... or an earlier flight may have landed a fresh entry already
        if let Some(entry) = self.fresh_snapshot(key) {
            *slot = Some(entry.clone());
            drop(slot);
            self.inflight.remove(key);
            return entry;
        }

        let entry = match fetch_fn().await {
            Ok(series) => {
                let fetched_at = Utc::now();
                let payload = Arc::new(series);
                self.entries.insert(
                    key.to_string(),
                    StoredEntry {
                        category,
                        payload: Arc::clone(&payload),
                        fetched_at,
                        last_error: None,
                    },
                );
                tracing::debug!("Refreshed {} ({})", key, category.name());
                CacheEntry {
                    key: key.to_string(),
                    category,
                    payload: Some(payload),
                    fetched_at: Some(fetched_at),
                    is_stale: false,
                    last_error: None,
                }
            }
            Err(err) => {
                // Every failure kind degrades the same way; the kind is
                // only logged.
                tracing::warn!("Fetch failed for {} ({}): {}", key, category.name(), err);
                match self.entries.get_mut(key) {
                    Some(mut stored) => {
                        stored.last_error = Some(err.to_string());
                        CacheEntry {
                            key: key.to_string(),
                            category: stored.category,
                            payload: Some(Arc::clone(&stored.payload)),
                            fetched_at: Some(stored.fetched_at),
                            is_stale: true,
                            last_error: Some(err.to_string()),
                        }
                    }
                    None => CacheEntry::unavailable(key, category, err.to_string()),
                }
            }
        };

        *slot = Some(entry.clone());
        drop(slot);
        self.inflight.remove(key);
        entry
    }

    /// Snapshot of the stored entry regardless of freshness, with
    /// `is_stale` computed against the category TTL. None if the key never
    /// fetched successfully.
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        let stored = self.entries.get(key)?;
        let ttl = self.ttl.ttl_for(stored.category);
        let is_stale = Utc::now() - stored.fetched_at > ttl;
        Some(CacheEntry {
            key: key.to_string(),
            category: stored.category,
            payload: Some(Arc::clone(&stored.payload)),
            fetched_at: Some(stored.fetched_at),
            is_stale,
            last_error: stored.last_error.clone(),
        })
    }

    /// Drop the stored value so the next `get_or_refresh` treats the key as
    /// absent (always refetches once, with no stale fallback).
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Manual full clear (process-restart equivalent)
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fresh_snapshot(&self, key: &str) -> Option<CacheEntry> {
        let stored = self.entries.get(key)?;
        let ttl = self.ttl.ttl_for(stored.category);
        if Utc::now() - stored.fetched_at > ttl {
            return None;
        }
        Some(CacheEntry {
            key: key.to_string(),
            category: stored.category,
            payload: Some(Arc::clone(&stored.payload)),
            fetched_at: Some(stored.fetched_at),
            is_stale: false,
            last_error: stored.last_error.clone(),
        })
    }

    /// Backdate an entry so tests can cross TTL boundaries without sleeping
    #[cfg(test)]
    fn force_age(&self, key: &str, age: Duration) {
        if let Some(mut stored) = self.entries.get_mut(key) {
            stored.fetched_at = Utc::now() - age;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::SeriesPoint;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn series(values: &[f64]) -> RawSeries {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| SeriesPoint {
                timestamp: Utc::now() - Duration::days(values.len() as i64 - i as i64),
                value: *v,
            })
            .collect();
        RawSeries::new(points, Utc::now())
    }

    #[tokio::test]
    async fn test_fresh_entry_is_a_cache_hit() {
        let cache = RefreshCache::new(TtlPolicy::new());
        let fetches = AtomicUsize::new(0);

        for _ in 0..3 {
            let entry = cache
                .get_or_refresh("stooq:^GSPC", DataCategory::Intraday, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(series(&[100.0, 101.0]))
                })
                .await;
            assert_eq!(entry.health(), DataHealth::Fresh);
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_triggers_exactly_one_refresh() {
        let cache = RefreshCache::new(TtlPolicy::new());
        let fetches = AtomicUsize::new(0);

        let fetch = || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(series(&[100.0]))
        };

        cache
            .get_or_refresh("stooq:^GSPC", DataCategory::Intraday, fetch)
            .await;

        // T+4min: still within the 5 minute intraday TTL
        cache.force_age("stooq:^GSPC", Duration::minutes(4));
        cache
            .get_or_refresh("stooq:^GSPC", DataCategory::Intraday, fetch)
            .await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        // T+6min: past TTL, one refresh
        cache.force_age("stooq:^GSPC", Duration::minutes(6));
        cache
            .get_or_refresh("stooq:^GSPC", DataCategory::Intraday, fetch)
            .await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_stale_payload() {
        let cache = RefreshCache::new(TtlPolicy::new());

        cache
            .get_or_refresh("fred:CAPE", DataCategory::Monthly, || async {
                Ok(series(&[28.0, 29.5]))
            })
            .await;
        cache.force_age("fred:CAPE", Duration::hours(25));

        let entry = cache
            .get_or_refresh("fred:CAPE", DataCategory::Monthly, || async {
                Err(ProviderError::Timeout)
            })
            .await;

        assert!(entry.is_stale);
        assert_eq!(entry.health(), DataHealth::Stale);
        assert_eq!(entry.payload.unwrap().values(), vec![28.0, 29.5]);
        assert!(entry.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_never_fetched_key_yields_unavailable_and_is_not_stored() {
        let cache = RefreshCache::new(TtlPolicy::new());

        let entry = cache
            .get_or_refresh("coingecko:bitcoin", DataCategory::Daily, || async {
                Err(ProviderError::NotFound("bitcoin".to_string()))
            })
            .await;

        assert_eq!(entry.health(), DataHealth::Unavailable);
        assert!(entry.payload.is_none());
        // Not-found and found-but-stale are distinct states
        assert!(cache.peek("coingecko:bitcoin").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_single_flight_under_concurrent_callers() {
        let cache = Arc::new(RefreshCache::new(TtlPolicy::new()));
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let fetches = Arc::clone(&fetches);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh("stooq:^GSPC", DataCategory::Daily, || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                        Ok(series(&[4500.0]))
                    })
                    .await
            }));
        }

        for handle in handles {
            let entry = handle.await.unwrap();
            assert_eq!(entry.health(), DataHealth::Fresh);
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failure_is_shared_not_retried() {
        let cache = Arc::new(RefreshCache::new(TtlPolicy::new()));
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let fetches = Arc::clone(&fetches);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh("fred:GDP", DataCategory::Quarterly, || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                        Err(ProviderError::RateLimited)
                    })
                    .await
            }));
        }

        for handle in handles {
            let entry = handle.await.unwrap();
            assert_eq!(entry.health(), DataHealth::Unavailable);
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch_without_stale_fallback() {
        let cache = RefreshCache::new(TtlPolicy::new());
        let fetches = AtomicUsize::new(0);

        cache
            .get_or_refresh("stooq:^SPX", DataCategory::Daily, || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(series(&[4400.0]))
            })
            .await;

        cache.invalidate("stooq:^SPX");
        assert!(cache.peek("stooq:^SPX").is_none());

        // Post-invalidate failure has no prior value to fall back to
        let entry = cache
            .get_or_refresh("stooq:^SPX", DataCategory::Daily, || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Timeout)
            })
            .await;

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(entry.health(), DataHealth::Unavailable);
    }

    #[tokio::test]
    async fn test_ttl_override_changes_cadence() {
        let ttl = TtlPolicy::new().with_override(DataCategory::Intraday, Duration::hours(2));
        let cache = RefreshCache::new(ttl);
        let fetches = AtomicUsize::new(0);

        let fetch = || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok(series(&[1.0]))
        };

        cache
            .get_or_refresh("stooq:^GSPC", DataCategory::Intraday, fetch)
            .await;
        cache.force_age("stooq:^GSPC", Duration::minutes(30));
        cache
            .get_or_refresh("stooq:^GSPC", DataCategory::Intraday, fetch)
            .await;

        // 30 minutes old but the override allows 2 hours
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}
