//! Price observations and the raw records they are parsed from.

use crate::domain::error::DashboardError;
use chrono::NaiveDate;

/// Date formats accepted at the ingestion boundary, tried in order.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// One price for one instrument on one trading day.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub instrument_id: String,
    pub date: NaiveDate,
    pub price: f64,
}

impl Observation {
    pub fn new(instrument_id: impl Into<String>, date: NaiveDate, price: f64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            date,
            price,
        }
    }
}

/// A price row as delivered by a data source, before validation.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RawPriceRecord {
    #[serde(rename = "Commodities")]
    pub instrument_name: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Price")]
    pub price: String,
}

impl RawPriceRecord {
    pub fn new(instrument_name: &str, date: &str, price: &str) -> Self {
        Self {
            instrument_name: instrument_name.to_string(),
            date: date.to_string(),
            price: price.to_string(),
        }
    }

    /// Validate the row into an [`Observation`]. `line` is only used for the
    /// error message.
    pub fn parse(&self, line: usize) -> Result<Observation, DashboardError> {
        let instrument_id = self.instrument_name.trim();
        if instrument_id.is_empty() {
            return Err(DashboardError::malformed(line, "empty instrument name"));
        }
        let date = parse_date(&self.date).ok_or_else(|| {
            DashboardError::malformed(line, format!("invalid date '{}'", self.date))
        })?;
        let price = parse_price(&self.price).ok_or_else(|| {
            DashboardError::malformed(line, format!("invalid price '{}'", self.price))
        })?;
        if price <= 0.0 {
            return Err(DashboardError::malformed(
                line,
                format!("non-positive price {}", price),
            ));
        }
        Ok(Observation::new(instrument_id, date, price))
    }
}

pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Parse a decimal that may carry thousands separators ("1,234.5").
pub fn parse_price(input: &str) -> Option<f64> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}
