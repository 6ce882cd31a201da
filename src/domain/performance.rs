//! Period-to-date performance: change from the first observation of the
//! current week, month and year to the latest observation.
//!
//! Unlike the metrics table this anchors on the instrument's own latest
//! observation, not on a shared as-of date, and on period starts instead of
//! previous period ends.

use crate::domain::horizon::{month_start, week_start, year_start};
use crate::domain::metrics::pct_change_between;
use crate::domain::store::PriceSeriesStore;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodPerformance {
    pub instrument_id: String,
    pub latest_date: NaiveDate,
    pub latest_price: f64,
    pub wtd: f64,
    pub mtd: f64,
    pub ytd: f64,
}

/// Performance for every instrument with an observation on or before
/// `as_of`, restricted to `instruments` when it is non-empty.
pub fn period_performance(
    store: &PriceSeriesStore,
    instruments: &[String],
    as_of: NaiveDate,
) -> Vec<PeriodPerformance> {
    store
        .instruments()
        .filter(|id| instruments.is_empty() || instruments.iter().any(|i| i.as_str() == *id))
        .filter_map(|id| instrument_performance(store, id, as_of))
        .collect()
}

pub fn instrument_performance(
    store: &PriceSeriesStore,
    instrument_id: &str,
    as_of: NaiveDate,
) -> Option<PeriodPerformance> {
    let latest = store.as_of(instrument_id, as_of)?;

    // the window always contains `latest`, so a first observation exists
    let change_since = |start: NaiveDate| {
        store
            .window(instrument_id, start, latest.date)
            .first()
            .map(|o| pct_change_between(o.price, latest.price))
            .unwrap_or(0.0)
    };

    Some(PeriodPerformance {
        instrument_id: instrument_id.to_string(),
        latest_date: latest.date,
        latest_price: latest.price,
        wtd: change_since(week_start(latest.date)),
        mtd: change_since(month_start(latest.date)),
        ytd: change_since(year_start(latest.date)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::observation::Observation;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> PriceSeriesStore {
        PriceSeriesStore::from_observations(vec![
            Observation::new("China HRC", date(2023, 12, 29), 90.0),
            Observation::new("China HRC", date(2024, 1, 2), 100.0),
            Observation::new("China HRC", date(2024, 2, 1), 110.0),
            Observation::new("China HRC", date(2024, 2, 12), 120.0),
            Observation::new("China HRC", date(2024, 2, 14), 132.0),
        ])
    }

    #[test]
    fn changes_from_period_starts() {
        let perf = instrument_performance(&store(), "China HRC", date(2024, 2, 16)).unwrap();
        assert_eq!(perf.latest_date, date(2024, 2, 14));
        assert!((perf.wtd - 0.1).abs() < 1e-12);
        assert!((perf.mtd - 0.2).abs() < 1e-12);
        assert!((perf.ytd - 0.32).abs() < 1e-12);
    }

    #[test]
    fn single_observation_in_period_is_zero() {
        let perf = instrument_performance(&store(), "China HRC", date(2024, 1, 2)).unwrap();
        assert_eq!(perf.ytd, 0.0);
        assert_eq!(perf.wtd, 0.0);
    }

    #[test]
    fn filter_by_instrument_list() {
        let s = store();
        assert_eq!(period_performance(&s, &[], date(2024, 3, 1)).len(), 1);
        assert!(period_performance(&s, &["Scrap".to_string()], date(2024, 3, 1)).is_empty());
        assert!(period_performance(&s, &[], date(2023, 1, 1)).is_empty());
    }
}
