//! Year-indexed exchange-rate table.

use crate::domain::error::DashboardError;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct FxTable {
    rates: BTreeMap<i32, f64>,
}

impl FxTable {
    /// An empty table cannot convert anything, so it is rejected here
    /// instead of producing zeros later.
    pub fn new(rates: BTreeMap<i32, f64>) -> Result<Self, DashboardError> {
        if rates.is_empty() {
            return Err(DashboardError::MissingCoefficient {
                name: "fx_rates".into(),
            });
        }
        if let Some((year, _)) = rates.iter().find(|(_, r)| !(r.is_finite() && **r > 0.0)) {
            return Err(DashboardError::ConfigInvalid {
                section: "fx_rates".into(),
                key: year.to_string(),
                reason: "rate must be positive".into(),
            });
        }
        Ok(Self { rates })
    }

    /// VND per USD rates used by the steel dashboard.
    pub fn vnd_per_usd_default() -> Self {
        Self {
            rates: BTreeMap::from([(2022, 23_000.0), (2023, 24_500.0), (2024, 25_000.0), (2025, 26_500.0)]),
        }
    }

    /// Rate for `year`. A year missing from the table takes the latest rate
    /// defined before it; a year before the whole table takes the most
    /// recent rate in the table.
    pub fn rate_for(&self, year: i32) -> f64 {
        if let Some((_, rate)) = self.rates.range(..=year).next_back() {
            return *rate;
        }
        // non-empty by construction
        self.rates.values().next_back().copied().unwrap_or(1.0)
    }

    pub fn rate_on(&self, date: NaiveDate) -> f64 {
        self.rate_for(date.year())
    }
}
