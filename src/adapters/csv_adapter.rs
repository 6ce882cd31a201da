//! CSV file data adapter.
//!
//! Reads the long-format price file (`Date, Commodities, Price`), the
//! instrument list (`Commodities, Sector, Nation, Impact`), the wide volume
//! file (`Date, <Product> - <Company>, ...`) and an optional quote file
//! (`Ticker, Date, Close`).

use crate::domain::enrichment::{QuoteRecord, RawMetadataRecord};
use crate::domain::error::DashboardError;
use crate::domain::observation::{RawPriceRecord, parse_date, parse_price};
use crate::domain::volumes::{VolumeKey, VolumeTable};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{DataPort, QuotePort};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CsvAdapter {
    prices_path: PathBuf,
    metadata_path: Option<PathBuf>,
    volumes_path: Option<PathBuf>,
    quotes_path: Option<PathBuf>,
}

#[derive(Debug, serde::Deserialize)]
struct QuoteRow {
    #[serde(rename = "Ticker")]
    ticker: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Close")]
    close: String,
}

impl CsvAdapter {
    pub fn new(prices_path: PathBuf) -> Self {
        Self {
            prices_path,
            metadata_path: None,
            volumes_path: None,
            quotes_path: None,
        }
    }

    pub fn with_metadata(mut self, path: PathBuf) -> Self {
        self.metadata_path = Some(path);
        self
    }

    pub fn with_volumes(mut self, path: PathBuf) -> Self {
        self.volumes_path = Some(path);
        self
    }

    pub fn with_quotes(mut self, path: PathBuf) -> Self {
        self.quotes_path = Some(path);
        self
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, DashboardError> {
        let prices = config
            .get_string("data", "prices")
            .ok_or_else(|| DashboardError::ConfigMissing {
                section: "data".into(),
                key: "prices".into(),
            })?;
        let mut adapter = Self::new(PathBuf::from(prices));
        if let Some(path) = config.get_string("data", "metadata") {
            adapter = adapter.with_metadata(PathBuf::from(path));
        }
        if let Some(path) = config.get_string("data", "volumes") {
            adapter = adapter.with_volumes(PathBuf::from(path));
        }
        if let Some(path) = config.get_string("data", "quotes") {
            adapter = adapter.with_quotes(PathBuf::from(path));
        }
        Ok(adapter)
    }

    pub fn has_quotes(&self) -> bool {
        self.quotes_path.is_some()
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, DashboardError> {
    let file = File::open(path).map_err(|e| DashboardError::DataSource {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(file))
}

/// Deserialize every row, skipping the ones that do not fit the shape.
fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DashboardError> {
    let mut reader = open_reader(path)?;
    let mut rows = Vec::new();
    for (i, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            // header is line 1
            Err(e) => warn!("{}: skipping line {}: {}", path.display(), i + 2, e),
        }
    }
    Ok(rows)
}

impl DataPort for CsvAdapter {
    fn fetch_prices(&self) -> Result<Vec<RawPriceRecord>, DashboardError> {
        let rows: Vec<RawPriceRecord> = read_rows(&self.prices_path)?;
        info!("Loaded {} price rows from {}", rows.len(), self.prices_path.display());
        Ok(rows)
    }

    fn fetch_metadata(&self) -> Result<Vec<RawMetadataRecord>, DashboardError> {
        match &self.metadata_path {
            Some(path) => {
                let rows: Vec<RawMetadataRecord> = read_rows(path)?;
                info!("Loaded {} metadata rows from {}", rows.len(), path.display());
                Ok(rows)
            }
            None => Ok(Vec::new()),
        }
    }

    fn fetch_volumes(&self) -> Result<VolumeTable, DashboardError> {
        let Some(path) = &self.volumes_path else {
            return Ok(VolumeTable::new());
        };

        let mut reader = open_reader(path)?;
        let headers = reader.headers()?.clone();
        let keys = headers
            .iter()
            .skip(1)
            .map(VolumeKey::parse_header)
            .collect::<Result<Vec<_>, _>>()?;

        let mut table = VolumeTable::new();
        for (i, result) in reader.records().enumerate() {
            let record = result?;
            let Some(date) = record.get(0).and_then(parse_date) else {
                warn!("{}: skipping line {}: invalid date", path.display(), i + 2);
                continue;
            };
            for (key, cell) in keys.iter().zip(record.iter().skip(1)) {
                if let Some(volume) = parse_price(cell) {
                    table.insert(key.clone(), date, volume);
                }
            }
        }

        info!("Loaded {} volume series from {}", keys.len(), path.display());
        Ok(table)
    }
}

impl QuotePort for CsvAdapter {
    fn fetch_quotes(
        &self,
        tickers: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<QuoteRecord>, DashboardError> {
        let Some(path) = &self.quotes_path else {
            return Ok(Vec::new());
        };

        let rows: Vec<QuoteRow> = read_rows(path)?;
        let quotes = rows
            .into_iter()
            .filter_map(|row| {
                let ticker = row.ticker.trim().to_uppercase();
                let date = parse_date(&row.date)?;
                let close_price = parse_price(&row.close)?;
                Some(QuoteRecord {
                    ticker,
                    date,
                    close_price,
                })
            })
            .filter(|q| q.date >= start_date && q.date <= end_date)
            .filter(|q| tickers.is_empty() || tickers.contains(&q.ticker))
            .collect();
        Ok(quotes)
    }
}
