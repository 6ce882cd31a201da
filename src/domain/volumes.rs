//! Production volumes keyed by (product, company).
//!
//! Source files carry one column per pair with a `"<Product> - <Company>"`
//! header. The header is split once here; nothing downstream re-parses it.

use crate::domain::error::DashboardError;
use crate::domain::horizon::month_start;
use crate::domain::rolling::sum_defined;
use chrono::{Months, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

const HEADER_SEPARATOR: &str = " - ";

/// Company name used for the whole-market total column.
pub const MARKET: &str = "Market";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeKey {
    pub product: String,
    pub company: String,
}

impl VolumeKey {
    pub fn new(product: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            company: company.into(),
        }
    }

    pub fn parse_header(header: &str) -> Result<Self, DashboardError> {
        let (product, company) = header.split_once(HEADER_SEPARATOR).ok_or_else(|| {
            DashboardError::malformed(1, format!("volume header '{}' is not 'Product - Company'", header))
        })?;
        let (product, company) = (product.trim(), company.trim());
        if product.is_empty() || company.is_empty() {
            return Err(DashboardError::malformed(
                1,
                format!("volume header '{}' has an empty part", header),
            ));
        }
        Ok(Self::new(product, company))
    }

    pub fn is_market(&self) -> bool {
        self.company == MARKET
    }
}

impl fmt::Display for VolumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.product, HEADER_SEPARATOR, self.company)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeTable {
    series: BTreeMap<VolumeKey, BTreeMap<NaiveDate, f64>>,
}

impl VolumeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a volume. Negative or non-finite values are ignored.
    pub fn insert(&mut self, key: VolumeKey, date: NaiveDate, volume: f64) {
        if !volume.is_finite() || volume < 0.0 {
            return;
        }
        self.series.entry(key).or_default().insert(date, volume);
    }

    pub fn get(&self, key: &VolumeKey, date: NaiveDate) -> Option<f64> {
        self.series.get(key).and_then(|s| s.get(&date)).copied()
    }

    pub fn series(&self, key: &VolumeKey) -> Option<&BTreeMap<NaiveDate, f64>> {
        self.series.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &VolumeKey> {
        self.series.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn products(&self) -> BTreeSet<&str> {
        self.series.keys().map(|k| k.product.as_str()).collect()
    }

    /// Companies that reported a positive volume for `product` at some
    /// point. The market total column is not a company.
    pub fn companies(&self, product: &str) -> BTreeSet<&str> {
        self.series
            .iter()
            .filter(|(k, s)| k.product == product && !k.is_market() && s.values().sum::<f64>() > 0.0)
            .map(|(k, _)| k.company.as_str())
            .collect()
    }

    /// Whole-market volume for a product on `date`: the market column when
    /// the product has one, otherwise the sum of the companies' volumes.
    pub fn market_total(&self, product: &str, date: NaiveDate) -> Option<f64> {
        let market = VolumeKey::new(product, MARKET);
        if self.series.contains_key(&market) {
            return self.get(&market, date);
        }
        sum_defined(
            self.series
                .iter()
                .filter(|(k, _)| k.product == product)
                .map(|(_, s)| s.get(&date).copied()),
        )
    }

    /// Company volume as a fraction of the product's market total.
    pub fn market_share(&self, key: &VolumeKey, date: NaiveDate) -> Option<f64> {
        let volume = self.get(key, date)?;
        let market = self.market_total(&key.product, date)?;
        if market > 0.0 { Some(volume / market) } else { None }
    }

    /// Change against the volume reported in the same month a year earlier.
    pub fn yoy_growth(&self, key: &VolumeKey, date: NaiveDate) -> Option<f64> {
        let series = self.series.get(key)?;
        let current = series.get(&date)?;
        let from = month_start(date.checked_sub_months(Months::new(12))?);
        let until = from.checked_add_months(Months::new(1))?;
        let (_, previous) = series.range(from..until).next_back()?;
        if *previous > 0.0 { Some(current / previous - 1.0) } else { None }
    }

    /// Volume, market share and year-over-year growth for every reporting
    /// company on every date its product has data. Empty `products` selects
    /// all products; `company` narrows to one company. Rows are ordered by
    /// product, date, then company.
    pub fn share_report(&self, products: &[String], company: Option<&str>) -> Vec<VolumeShareRow> {
        let mut rows = Vec::new();
        for product in self.products() {
            if !products.is_empty() && !products.iter().any(|p| p == product) {
                continue;
            }
            let companies: Vec<&str> = self
                .companies(product)
                .into_iter()
                .filter(|c| company.is_none_or(|wanted| wanted == *c))
                .collect();
            if companies.is_empty() {
                continue;
            }

            let dates: BTreeSet<NaiveDate> = self
                .series
                .iter()
                .filter(|(k, _)| k.product == product)
                .flat_map(|(_, s)| s.keys().copied())
                .collect();

            for date in dates {
                for name in &companies {
                    let key = VolumeKey::new(product, *name);
                    rows.push(VolumeShareRow {
                        date,
                        volume: self.get(&key, date),
                        market_share: self.market_share(&key, date),
                        yoy_growth: self.yoy_growth(&key, date),
                        product: key.product,
                        company: key.company,
                    });
                }
            }
        }
        rows
    }
}

/// One company's volume on one date. Undefined cells are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeShareRow {
    pub date: NaiveDate,
    pub product: String,
    pub company: String,
    pub volume: Option<f64>,
    pub market_share: Option<f64>,
    pub yoy_growth: Option<f64>,
}
