//! Point-in-time metrics table: one row per instrument for an as-of date.

use crate::domain::horizon::{Horizon, PointInTimeResolver};
use crate::domain::store::PriceSeriesStore;
use chrono::{Days, NaiveDate};
use std::fmt;

pub const HIGH_LOW_WINDOW_WEEKS: u64 = 52;
pub const TRAILING_AVG_DAYS: u64 = 30;

/// Direction of the week-over-week move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeClass {
    Positive,
    Negative,
    Neutral,
}

impl ChangeClass {
    /// Positive above zero, Negative below, Neutral for exactly zero or no data.
    pub fn from_change(change: Option<f64>) -> Self {
        match change {
            Some(c) if c > 0.0 => ChangeClass::Positive,
            Some(c) if c < 0.0 => ChangeClass::Negative,
            _ => ChangeClass::Neutral,
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "positive" => Some(ChangeClass::Positive),
            "negative" => Some(ChangeClass::Negative),
            "neutral" => Some(ChangeClass::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeClass::Positive => write!(f, "Positive"),
            ChangeClass::Negative => write!(f, "Negative"),
            ChangeClass::Neutral => write!(f, "Neutral"),
        }
    }
}

/// Fractional change against each horizon's baseline. `None` means no
/// baseline observation existed, which is distinct from a zero change.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PctChanges {
    pub day: Option<f64>,
    pub week: Option<f64>,
    pub month: Option<f64>,
    pub quarter: Option<f64>,
    pub ytd: Option<f64>,
}

impl PctChanges {
    pub fn get(&self, horizon: Horizon) -> Option<f64> {
        match horizon {
            Horizon::Day => self.day,
            Horizon::Week => self.week,
            Horizon::Month => self.month,
            Horizon::Quarter => self.quarter,
            Horizon::Year => self.ytd,
        }
    }

    fn set(&mut self, horizon: Horizon, value: Option<f64>) {
        match horizon {
            Horizon::Day => self.day = value,
            Horizon::Week => self.week = value,
            Horizon::Month => self.month = value,
            Horizon::Quarter => self.quarter = value,
            Horizon::Year => self.ytd = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub instrument_id: String,
    pub current_price: f64,
    pub current_date: NaiveDate,
    pub pct_change: PctChanges,
    pub trailing_30d_avg: Option<f64>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
    pub change_class: ChangeClass,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsEngine {
    pub resolver: PointInTimeResolver,
}

impl MetricsEngine {
    pub fn new(resolver: PointInTimeResolver) -> Self {
        Self { resolver }
    }

    /// Build the metrics table for `as_of`. Instruments with no observation
    /// on or before `as_of` are left out; an empty store yields an empty
    /// table. Rows are ordered by instrument id.
    pub fn compute(&self, store: &PriceSeriesStore, as_of: NaiveDate) -> Vec<MetricsRow> {
        store
            .instruments()
            .filter_map(|id| self.compute_row(store, id, as_of))
            .collect()
    }

    pub fn compute_row(
        &self,
        store: &PriceSeriesStore,
        instrument_id: &str,
        as_of: NaiveDate,
    ) -> Option<MetricsRow> {
        let current = store.as_of(instrument_id, as_of)?;

        let mut pct_change = PctChanges::default();
        for horizon in Horizon::ALL {
            let change = self
                .resolver
                .resolve(store, instrument_id, horizon, as_of)
                .map(|baseline| pct_change_between(baseline.price, current.price));
            pct_change.set(horizon, change);
        }

        let year_start = window_start(as_of, HIGH_LOW_WINDOW_WEEKS * 7);
        let year_window = store.window(instrument_id, year_start, as_of);
        let high_52w = year_window.iter().map(|o| o.price).reduce(f64::max);
        let low_52w = year_window.iter().map(|o| o.price).reduce(f64::min);

        let month_start = window_start(as_of, TRAILING_AVG_DAYS);
        let month_window = store.window(instrument_id, month_start, as_of);
        let trailing_30d_avg = mean(month_window.iter().map(|o| o.price));

        Some(MetricsRow {
            instrument_id: instrument_id.to_string(),
            current_price: current.price,
            current_date: current.date,
            change_class: ChangeClass::from_change(pct_change.week),
            pct_change,
            trailing_30d_avg,
            high_52w,
            low_52w,
        })
    }
}

/// First day of a trailing window, clamped to the earliest representable
/// date.
fn window_start(as_of: NaiveDate, days: u64) -> NaiveDate {
    as_of.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

/// `current / baseline - 1`.
pub fn pct_change_between(baseline: f64, current: f64) -> f64 {
    current / baseline - 1.0
}

fn mean<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::observation::Observation;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ore_store() -> PriceSeriesStore {
        PriceSeriesStore::from_observations(vec![
            Observation::new("Ore 62", date(2024, 1, 1), 100.0),
            Observation::new("Ore 62", date(2024, 1, 8), 105.0),
            Observation::new("Ore 62", date(2024, 1, 15), 110.0),
        ])
    }

    #[test]
    fn change_class_from_sign() {
        assert_eq!(ChangeClass::from_change(Some(0.01)), ChangeClass::Positive);
        assert_eq!(ChangeClass::from_change(Some(-0.01)), ChangeClass::Negative);
        assert_eq!(ChangeClass::from_change(Some(0.0)), ChangeClass::Neutral);
        assert_eq!(ChangeClass::from_change(None), ChangeClass::Neutral);
    }

    #[test]
    fn change_class_parse_is_case_insensitive() {
        assert_eq!(ChangeClass::parse("POSITIVE"), Some(ChangeClass::Positive));
        assert_eq!(ChangeClass::parse(" neutral "), Some(ChangeClass::Neutral));
        assert_eq!(ChangeClass::parse("flat"), None);
    }

    #[test]
    fn current_price_and_week_change() {
        let rows = MetricsEngine::default().compute(&ore_store(), date(2024, 1, 15));
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.current_price, 110.0);
        assert!((row.pct_change.week.unwrap() - (110.0 / 105.0 - 1.0)).abs() < 1e-12);
        assert_eq!(row.change_class, ChangeClass::Positive);
    }

    #[test]
    fn horizons_without_baseline_are_none() {
        let rows = MetricsEngine::default().compute(&ore_store(), date(2024, 1, 15));
        let row = &rows[0];
        // nothing on or before 2023-12-31
        assert_eq!(row.pct_change.month, None);
        assert_eq!(row.pct_change.quarter, None);
        assert_eq!(row.pct_change.ytd, None);
        // day baseline is 2024-01-14 which resolves to the 8th
        assert!((row.pct_change.day.unwrap() - (110.0 / 105.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn high_low_and_trailing_average() {
        let rows = MetricsEngine::default().compute(&ore_store(), date(2024, 1, 15));
        let row = &rows[0];
        assert_eq!(row.high_52w, Some(110.0));
        assert_eq!(row.low_52w, Some(100.0));
        assert!((row.trailing_30d_avg.unwrap() - 105.0).abs() < 1e-12);
    }

    #[test]
    fn instruments_without_history_are_excluded() {
        let store = PriceSeriesStore::from_observations(vec![
            Observation::new("Ore 62", date(2024, 1, 1), 100.0),
            Observation::new("Scrap", date(2024, 2, 1), 400.0),
        ]);
        let rows = MetricsEngine::default().compute(&store, date(2024, 1, 15));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].instrument_id, "Ore 62");
    }

    #[test]
    fn empty_store_gives_empty_table() {
        let rows = MetricsEngine::default().compute(&PriceSeriesStore::default(), date(2024, 1, 15));
        assert!(rows.is_empty());
    }

    #[test]
    fn stale_current_price_uses_latest_observation() {
        let store = PriceSeriesStore::from_observations(vec![Observation::new(
            "Scrap",
            date(2023, 1, 2),
            400.0,
        )]);
        let row = MetricsEngine::default()
            .compute_row(&store, "Scrap", date(2024, 6, 1))
            .unwrap();
        assert_eq!(row.current_price, 400.0);
        assert_eq!(row.current_date, date(2023, 1, 2));
        // outside both trailing windows
        assert_eq!(row.high_52w, None);
        assert_eq!(row.trailing_30d_avg, None);
        assert_eq!(row.pct_change.ytd, Some(0.0));
    }

    #[test]
    fn windows_near_earliest_date_are_clamped() {
        let first = NaiveDate::MIN;
        let second = first.checked_add_days(Days::new(3)).unwrap();
        let store = PriceSeriesStore::from_observations(vec![
            Observation::new("Scrap", first, 400.0),
            Observation::new("Scrap", second, 420.0),
        ]);
        let row = MetricsEngine::default().compute_row(&store, "Scrap", second).unwrap();
        assert_eq!(row.current_price, 420.0);
        assert_eq!(row.high_52w, Some(420.0));
        assert_eq!(row.low_52w, Some(400.0));
        assert_eq!(row.trailing_30d_avg, Some(410.0));
    }

    #[test]
    fn unchanged_week_is_neutral() {
        let store = PriceSeriesStore::from_observations(vec![
            Observation::new("Coal", date(2024, 1, 5), 200.0),
            Observation::new("Coal", date(2024, 1, 8), 200.0),
        ]);
        let row = MetricsEngine::default()
            .compute_row(&store, "Coal", date(2024, 1, 8))
            .unwrap();
        assert_eq!(row.pct_change.week, Some(0.0));
        assert_eq!(row.change_class, ChangeClass::Neutral);
    }
}
