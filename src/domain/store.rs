//! In-memory price series store.
//!
//! Built wholesale from a batch of records and read-only afterwards. Each
//! instrument's observations are kept sorted ascending by date, so point
//! lookups and window slices are binary searches.

use crate::domain::error::DashboardError;
use crate::domain::observation::{Observation, RawPriceRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeriesStore {
    series: BTreeMap<String, Vec<Observation>>,
    version: u64,
}

/// Outcome of [`PriceSeriesStore::load`]: the store built from the valid
/// subset plus every row that was dropped.
#[derive(Debug)]
pub struct LoadReport {
    pub store: PriceSeriesStore,
    pub rejected: Vec<DashboardError>,
    pub duplicates: usize,
}

impl PriceSeriesStore {
    /// Parse and index raw records. Malformed rows are dropped and reported;
    /// loading never fails as a whole.
    pub fn load(records: &[RawPriceRecord]) -> LoadReport {
        let mut rejected = Vec::new();
        let mut valid = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            match record.parse(i + 1) {
                Ok(obs) => valid.push(obs),
                Err(e) => {
                    warn!("dropping price row: {}", e);
                    rejected.push(e);
                }
            }
        }

        let total = valid.len();
        let store = Self::from_observations(valid);
        let duplicates = total - store.observation_count();
        if duplicates > 0 {
            debug!("collapsed {} duplicate (instrument, date) rows", duplicates);
        }

        LoadReport {
            store,
            rejected,
            duplicates,
        }
    }

    /// Index already-validated observations. Non-positive prices are
    /// skipped; for duplicate (instrument, date) pairs the first one wins.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut series: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for obs in observations {
            if obs.price.is_nan() || obs.price <= 0.0 {
                continue;
            }
            series.entry(obs.instrument_id.clone()).or_default().push(obs);
        }

        for observations in series.values_mut() {
            observations.sort_by_key(|o| o.date);
            observations.dedup_by_key(|o| o.date);
        }

        let version = content_hash(&series);
        Self { series, version }
    }

    /// Deterministic hash of the store contents. Two stores built from the
    /// same observations share a version.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn instrument_count(&self) -> usize {
        self.series.len()
    }

    pub fn observation_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn contains(&self, instrument_id: &str) -> bool {
        self.series.contains_key(instrument_id)
    }

    /// All observations for an instrument, ascending by date.
    pub fn get(&self, instrument_id: &str) -> &[Observation] {
        self.series
            .get(instrument_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The latest observation dated on or before `date`.
    pub fn as_of(&self, instrument_id: &str, date: NaiveDate) -> Option<&Observation> {
        let observations = self.get(instrument_id);
        let idx = observations.partition_point(|o| o.date <= date);
        if idx == 0 {
            None
        } else {
            Some(&observations[idx - 1])
        }
    }

    /// Observations with `start <= date <= end`.
    pub fn window(&self, instrument_id: &str, start: NaiveDate, end: NaiveDate) -> &[Observation] {
        let observations = self.get(instrument_id);
        let lo = observations.partition_point(|o| o.date < start);
        let hi = observations.partition_point(|o| o.date <= end);
        if lo >= hi { &[] } else { &observations[lo..hi] }
    }

    /// Price on exactly `date`, if observed.
    pub fn price_on(&self, instrument_id: &str, date: NaiveDate) -> Option<f64> {
        let observations = self.get(instrument_id);
        observations
            .binary_search_by_key(&date, |o| o.date)
            .ok()
            .map(|i| observations[i].price)
    }

    /// Earliest and latest observation date across all instruments.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.series.values().filter_map(|v| v.first()).map(|o| o.date).min()?;
        let last = self.series.values().filter_map(|v| v.last()).map(|o| o.date).max()?;
        Some((first, last))
    }
}

fn content_hash(series: &BTreeMap<String, Vec<Observation>>) -> u64 {
    let mut hasher = DefaultHasher::new();
    for (id, observations) in series {
        id.hash(&mut hasher);
        for obs in observations {
            obs.date.hash(&mut hasher);
            obs.price.to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}
