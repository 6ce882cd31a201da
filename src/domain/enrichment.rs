//! Left join of the metrics table against static instrument metadata, plus
//! the optional equity-quote lookup by associated ticker.

use crate::domain::metrics::{ChangeClass, MetricsRow};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentMetadata {
    pub instrument_id: String,
    pub sector: String,
    pub nation: String,
    pub associated_tickers: BTreeSet<String>,
}

/// A metadata row as delivered by a data source.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RawMetadataRecord {
    #[serde(rename = "Commodities")]
    pub instrument_name: String,
    #[serde(rename = "Sector", default)]
    pub sector: String,
    #[serde(rename = "Nation", default)]
    pub nation: String,
    #[serde(rename = "Impact", default)]
    pub associated_tickers: String,
}

impl RawMetadataRecord {
    /// `None` when the instrument name is blank.
    pub fn normalize(&self) -> Option<InstrumentMetadata> {
        let instrument_id = normalize_key(&self.instrument_name);
        if instrument_id.is_empty() {
            return None;
        }
        Some(InstrumentMetadata {
            instrument_id: instrument_id.to_string(),
            sector: self.sector.trim().to_string(),
            nation: self.nation.trim().to_string(),
            associated_tickers: parse_tickers(&self.associated_tickers),
        })
    }
}

/// Split a comma-separated ticker list, dropping blanks.
pub fn parse_tickers(input: &str) -> BTreeSet<String> {
    input
        .split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Join key: surrounding whitespace removed, case preserved.
pub fn normalize_key(id: &str) -> &str {
    id.trim()
}

/// An equity close used for ticker enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRecord {
    pub ticker: String,
    pub date: NaiveDate,
    pub close_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerQuote {
    pub ticker: String,
    pub date: NaiveDate,
    pub close_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub metrics: MetricsRow,
    pub metadata: Option<InstrumentMetadata>,
    pub quotes: Vec<TickerQuote>,
}

impl EnrichedRow {
    pub fn sector(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.sector.as_str())
    }

    pub fn nation(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.nation.as_str())
    }
}

/// Collapse duplicate instrument ids, first occurrence wins.
pub fn dedup_metadata(metadata: &[InstrumentMetadata]) -> HashMap<String, InstrumentMetadata> {
    let mut by_key: HashMap<String, InstrumentMetadata> = HashMap::with_capacity(metadata.len());
    for m in metadata {
        let key = normalize_key(&m.instrument_id).to_string();
        by_key.entry(key).or_insert_with(|| m.clone());
    }
    by_key
}

/// Left join: every metrics row is kept, in order. Rows without a metadata
/// match carry `metadata: None`.
pub fn join(metrics: Vec<MetricsRow>, metadata: &[InstrumentMetadata]) -> Vec<EnrichedRow> {
    let by_key = dedup_metadata(metadata);
    metrics
        .into_iter()
        .map(|row| {
            let metadata = by_key.get(normalize_key(&row.instrument_id)).cloned();
            EnrichedRow {
                metrics: row,
                metadata,
                quotes: Vec::new(),
            }
        })
        .collect()
}

/// For each associated ticker, attach the latest close on or before
/// `as_of`. Tickers with no such quote are skipped.
pub fn attach_quotes(rows: &mut [EnrichedRow], quotes: &[QuoteRecord], as_of: NaiveDate) {
    let mut latest: HashMap<String, &QuoteRecord> = HashMap::new();
    for q in quotes.iter().filter(|q| q.date <= as_of) {
        let ticker = q.ticker.trim().to_uppercase();
        match latest.get(&ticker) {
            Some(existing) if existing.date >= q.date => {}
            _ => {
                latest.insert(ticker, q);
            }
        }
    }

    for row in rows.iter_mut() {
        let Some(meta) = &row.metadata else {
            continue;
        };
        row.quotes = meta
            .associated_tickers
            .iter()
            .filter_map(|t| {
                latest.get(t).map(|q| TickerQuote {
                    ticker: t.clone(),
                    date: q.date,
                    close_price: q.close_price,
                })
            })
            .collect();
    }
}

/// Row selection for the presentation layer. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsFilter {
    pub sectors: Vec<String>,
    pub nations: Vec<String>,
    pub change_class: Option<ChangeClass>,
    pub name_contains: Option<String>,
}

impl MetricsFilter {
    pub fn matches(&self, row: &EnrichedRow) -> bool {
        if !self.sectors.is_empty() && !row.sector().is_some_and(|s| self.sectors.iter().any(|x| x == s)) {
            return false;
        }
        if !self.nations.is_empty() && !row.nation().is_some_and(|n| self.nations.iter().any(|x| x == n)) {
            return false;
        }
        if let Some(class) = self.change_class {
            if row.metrics.change_class != class {
                return false;
            }
        }
        if let Some(needle) = &self.name_contains {
            let needle = needle.to_lowercase();
            if !row.metrics.instrument_id.to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, rows: &'a [EnrichedRow]) -> Vec<&'a EnrichedRow> {
        rows.iter().filter(|r| self.matches(r)).collect()
    }
}
