//! Memoized metrics computation.
//!
//! Entries are keyed by `(store version, as-of date)`. A rebuilt store has a
//! new version, so stale entries are never served; they are purged the next
//! time a different version is inserted. An optional TTL expires entries
//! regardless of version.

use crate::domain::metrics::{MetricsEngine, MetricsRow};
use crate::domain::store::PriceSeriesStore;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePolicy {
    /// `None` keeps entries until the store version changes.
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    rows: Vec<MetricsRow>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|t| now < t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

#[derive(Debug)]
pub struct MetricsCache {
    engine: MetricsEngine,
    policy: CachePolicy,
    entries: HashMap<(u64, NaiveDate), CacheEntry>,
    stats: CacheStats,
}

impl MetricsCache {
    pub fn new(engine: MetricsEngine, policy: CachePolicy) -> Self {
        Self {
            engine,
            policy,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Same result as `MetricsEngine::compute`, served from cache when a
    /// live entry exists.
    pub fn get_or_compute(&mut self, store: &PriceSeriesStore, as_of: NaiveDate) -> &[MetricsRow] {
        let key = (store.version(), as_of);
        let now = Instant::now();

        let live = self.entries.get(&key).is_some_and(|e| e.is_live(now));
        if live {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            self.entries.retain(|(version, _), e| *version == key.0 && e.is_live(now));
            let rows = self.engine.compute(store, as_of);
            let expires_at = self.policy.ttl.map(|ttl| now + ttl);
            self.entries.insert(key, CacheEntry { rows, expires_at });
        }

        self.entries
            .get(&key)
            .map(|e| e.rows.as_slice())
            .unwrap_or(&[])
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::observation::Observation;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store(price: f64) -> PriceSeriesStore {
        PriceSeriesStore::from_observations(vec![
            Observation::new("Ore 62", date(2024, 1, 5), 100.0),
            Observation::new("Ore 62", date(2024, 1, 8), price),
        ])
    }

    #[test]
    fn second_call_is_a_hit_with_identical_rows() {
        let mut cache = MetricsCache::new(MetricsEngine::default(), CachePolicy::default());
        let s = store(110.0);
        let first = cache.get_or_compute(&s, date(2024, 1, 8)).to_vec();
        let second = cache.get_or_compute(&s, date(2024, 1, 8)).to_vec();
        assert_eq!(first, second);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn rebuilt_store_misses_and_purges_old_version() {
        let mut cache = MetricsCache::new(MetricsEngine::default(), CachePolicy::default());
        cache.get_or_compute(&store(110.0), date(2024, 1, 8));
        let rows = cache.get_or_compute(&store(120.0), date(2024, 1, 8)).to_vec();
        assert_eq!(rows[0].current_price, 120.0);
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_ttl_always_recomputes() {
        let policy = CachePolicy {
            ttl: Some(Duration::ZERO),
        };
        let mut cache = MetricsCache::new(MetricsEngine::default(), policy);
        let s = store(110.0);
        cache.get_or_compute(&s, date(2024, 1, 8));
        cache.get_or_compute(&s, date(2024, 1, 8));
        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn invalidate_clears_entries() {
        let mut cache = MetricsCache::new(MetricsEngine::default(), CachePolicy::default());
        cache.get_or_compute(&store(110.0), date(2024, 1, 8));
        cache.invalidate();
        assert!(cache.is_empty());
    }
}
