//! Data access port traits.
//!
//! Sources hand over raw rows; validation happens in the domain when the
//! store is built.

use crate::domain::enrichment::{QuoteRecord, RawMetadataRecord};
use crate::domain::error::DashboardError;
use crate::domain::observation::RawPriceRecord;
use crate::domain::volumes::VolumeTable;
use chrono::NaiveDate;

pub trait DataPort {
    fn fetch_prices(&self) -> Result<Vec<RawPriceRecord>, DashboardError>;

    fn fetch_metadata(&self) -> Result<Vec<RawMetadataRecord>, DashboardError>;

    fn fetch_volumes(&self) -> Result<VolumeTable, DashboardError>;
}

/// Equity closes for ticker enrichment. Never required for the metrics
/// table itself.
pub trait QuotePort {
    fn fetch_quotes(
        &self,
        tickers: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<QuoteRecord>, DashboardError>;
}
