#![allow(dead_code)]

use chrono::NaiveDate;
use commodash::domain::enrichment::{QuoteRecord, RawMetadataRecord};
use commodash::domain::error::DashboardError;
pub use commodash::domain::observation::{Observation, RawPriceRecord};
use commodash::domain::store::PriceSeriesStore;
use commodash::domain::volumes::VolumeTable;
use commodash::ports::data_port::{DataPort, QuotePort};

pub struct MockDataPort {
    pub prices: Vec<RawPriceRecord>,
    pub metadata: Vec<RawMetadataRecord>,
    pub volumes: VolumeTable,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            prices: Vec::new(),
            metadata: Vec::new(),
            volumes: VolumeTable::new(),
            error: None,
        }
    }

    pub fn with_price(mut self, instrument: &str, date: &str, price: &str) -> Self {
        self.prices.push(RawPriceRecord::new(instrument, date, price));
        self
    }

    pub fn with_series(mut self, instrument: &str, points: &[(NaiveDate, f64)]) -> Self {
        for (d, p) in points {
            self.prices
                .push(RawPriceRecord::new(instrument, &d.to_string(), &p.to_string()));
        }
        self
    }

    pub fn with_metadata(mut self, instrument: &str, sector: &str, nation: &str, tickers: &str) -> Self {
        self.metadata.push(RawMetadataRecord {
            instrument_name: instrument.to_string(),
            sector: sector.to_string(),
            nation: nation.to_string(),
            associated_tickers: tickers.to_string(),
        });
        self
    }

    pub fn with_volumes(mut self, volumes: VolumeTable) -> Self {
        self.volumes = volumes;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    fn check(&self) -> Result<(), DashboardError> {
        match &self.error {
            Some(reason) => Err(DashboardError::DataSource {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_prices(&self) -> Result<Vec<RawPriceRecord>, DashboardError> {
        self.check()?;
        Ok(self.prices.clone())
    }

    fn fetch_metadata(&self) -> Result<Vec<RawMetadataRecord>, DashboardError> {
        self.check()?;
        Ok(self.metadata.clone())
    }

    fn fetch_volumes(&self) -> Result<VolumeTable, DashboardError> {
        self.check()?;
        Ok(self.volumes.clone())
    }
}

pub struct MockQuotePort {
    pub quotes: Vec<QuoteRecord>,
}

impl MockQuotePort {
    pub fn new() -> Self {
        Self { quotes: Vec::new() }
    }

    pub fn with_quote(mut self, ticker: &str, date: NaiveDate, close_price: f64) -> Self {
        self.quotes.push(QuoteRecord {
            ticker: ticker.to_string(),
            date,
            close_price,
        });
        self
    }
}

impl QuotePort for MockQuotePort {
    fn fetch_quotes(
        &self,
        tickers: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<QuoteRecord>, DashboardError> {
        Ok(self
            .quotes
            .iter()
            .filter(|q| q.date >= start_date && q.date <= end_date)
            .filter(|q| tickers.contains(&q.ticker))
            .cloned()
            .collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn obs(instrument: &str, d: NaiveDate, price: f64) -> Observation {
    Observation::new(instrument, d, price)
}

/// A series priced on every day in `[start, end]` with `price_at(i)` for
/// the i-th day.
pub fn daily_series<F>(instrument: &str, start: NaiveDate, end: NaiveDate, price_at: F) -> Vec<Observation>
where
    F: Fn(usize) -> f64,
{
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .enumerate()
        .map(|(i, d)| obs(instrument, d, price_at(i)))
        .collect()
}

pub fn store_of(observations: Vec<Observation>) -> PriceSeriesStore {
    PriceSeriesStore::from_observations(observations)
}

/// The "Ore 62" series: 100, 105, 110 on three consecutive Mondays.
pub fn ore_store() -> PriceSeriesStore {
    store_of(vec![
        obs("Ore 62", date(2024, 1, 1), 100.0),
        obs("Ore 62", date(2024, 1, 8), 105.0),
        obs("Ore 62", date(2024, 1, 15), 110.0),
    ])
}
