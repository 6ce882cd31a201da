//! CSV table writer implementing ReportPort.
//!
//! Undefined cells are written as empty fields so they never read as zero.

use crate::domain::cost_model::{CostModelRow, ProfitRow};
use crate::domain::enrichment::EnrichedRow;
use crate::domain::error::DashboardError;
use crate::domain::horizon::Horizon;
use crate::domain::performance::PeriodPerformance;
use crate::domain::volumes::VolumeShareRow;
use crate::ports::report_port::ReportPort;
use std::collections::BTreeSet;
use std::io::Write;

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableWriter;

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl ReportPort for CsvTableWriter {
    fn write_metrics(&self, rows: &[&EnrichedRow], out: &mut dyn Write) -> Result<(), DashboardError> {
        let mut wtr = csv::Writer::from_writer(out);

        let mut header = vec![
            "Commodities".to_string(),
            "Sector".to_string(),
            "Nation".to_string(),
            "Date".to_string(),
            "Price".to_string(),
        ];
        header.extend(Horizon::ALL.iter().map(|h| h.to_string()));
        header.extend(
            ["30D Avg", "52W High", "52W Low", "Change", "Tickers"]
                .iter()
                .map(|s| s.to_string()),
        );
        wtr.write_record(&header)?;

        for row in rows {
            let m = &row.metrics;
            let mut record = vec![
                m.instrument_id.clone(),
                row.sector().unwrap_or_default().to_string(),
                row.nation().unwrap_or_default().to_string(),
                m.current_date.to_string(),
                m.current_price.to_string(),
            ];
            record.extend(Horizon::ALL.iter().map(|h| cell(m.pct_change.get(*h))));
            record.push(cell(m.trailing_30d_avg));
            record.push(cell(m.high_52w));
            record.push(cell(m.low_52w));
            record.push(m.change_class.to_string());
            record.push(
                row.quotes
                    .iter()
                    .map(|q| format!("{}={}", q.ticker, q.close_price))
                    .collect::<Vec<_>>()
                    .join(";"),
            );
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    fn write_cost_rows(&self, rows: &[CostModelRow], out: &mut dyn Write) -> Result<(), DashboardError> {
        let mut wtr = csv::Writer::from_writer(out);
        let products: BTreeSet<&String> = rows
            .iter()
            .flat_map(|r| r.output_profit_by_product.keys())
            .collect();

        let mut header = vec![
            "Date".to_string(),
            "Raw Material Cost".to_string(),
            "Production Cost".to_string(),
        ];
        for product in &products {
            header.push(format!("{} Spot", product));
            header.push(format!("{} Profit", product));
            header.push(format!("{} After Tax", product));
        }
        wtr.write_record(&header)?;

        for row in rows {
            let mut record = vec![
                row.date.to_string(),
                cell(row.raw_material_cost),
                cell(row.production_cost),
            ];
            for product in &products {
                let profit = row
                    .output_profit_by_product
                    .get(*product)
                    .copied()
                    .unwrap_or_default();
                record.push(cell(profit.spot_price));
                record.push(cell(profit.pre_tax));
                record.push(cell(profit.after_tax));
            }
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    fn write_profits(&self, rows: &[ProfitRow], out: &mut dyn Write) -> Result<(), DashboardError> {
        let mut wtr = csv::Writer::from_writer(out);
        let products: BTreeSet<&String> = rows.iter().flat_map(|r| r.by_product.keys()).collect();

        let mut header = vec!["Date".to_string()];
        header.extend(products.iter().map(|p| p.to_string()));
        header.push("Total".to_string());
        wtr.write_record(&header)?;

        for row in rows {
            let mut record = vec![row.date.to_string()];
            record.extend(
                products
                    .iter()
                    .map(|p| cell(row.by_product.get(*p).copied().flatten())),
            );
            record.push(cell(row.total));
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    fn write_performance(
        &self,
        rows: &[PeriodPerformance],
        out: &mut dyn Write,
    ) -> Result<(), DashboardError> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(["Commodities", "Date", "Price", "WTD", "MTD", "YTD"])?;
        for row in rows {
            wtr.write_record([
                row.instrument_id.clone(),
                row.latest_date.to_string(),
                row.latest_price.to_string(),
                row.wtd.to_string(),
                row.mtd.to_string(),
                row.ytd.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_volumes(&self, rows: &[VolumeShareRow], out: &mut dyn Write) -> Result<(), DashboardError> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(["Date", "Product", "Company", "Volume", "Market Share", "YoY Growth"])?;
        for row in rows {
            wtr.write_record([
                row.date.to_string(),
                row.product.clone(),
                row.company.clone(),
                cell(row.volume),
                cell(row.market_share),
                cell(row.yoy_growth),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}
