//! CLI definition and dispatch.
//!
//! Tables go to stdout as CSV; progress goes through `tracing` and errors
//! are reported on stderr and mapped to exit codes.

use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::table_writer::CsvTableWriter;
use crate::domain::config_validation::{
    build_cache_policy, build_cost_model_config, build_fx_table, build_resolver, company,
    validate_dashboard_config,
};
use crate::domain::cost_model::{CostModel, aggregate_profits, convert_profits};
use crate::domain::enrichment::{self, EnrichedRow, MetricsFilter};
use crate::domain::error::DashboardError;
use crate::domain::memo::MetricsCache;
use crate::domain::metrics::{ChangeClass, MetricsEngine};
use crate::domain::performance::period_performance;
use crate::domain::rolling::Granularity;
use crate::domain::store::PriceSeriesStore;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{DataPort, QuotePort};
use crate::ports::report_port::ReportPort;

/// Look-back for equity quotes attached to the metrics table.
const QUOTE_LOOKBACK_DAYS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "commodash", about = "Commodity price metrics and derived cost model")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the point-in-time metrics table
    Metrics {
        #[arg(short, long)]
        config: PathBuf,
        /// Defaults to the latest observation date in the store
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        sector: Vec<String>,
        #[arg(long)]
        nation: Vec<String>,
        #[arg(long, value_parser = parse_change_class)]
        change: Option<ChangeClass>,
        /// Case-insensitive substring of the instrument name
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        with_quotes: bool,
    },
    /// Print per-unit production cost and profit
    CostModel {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, value_parser = parse_granularity, default_value = "daily")]
        granularity: Granularity,
    },
    /// Print volume-weighted profit for a company
    Profit {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        company: Option<String>,
        #[arg(long, value_parser = parse_granularity, default_value = "quarterly")]
        granularity: Granularity,
        /// Convert with the [fx_rates] table
        #[arg(long)]
        fx: bool,
        /// Divisor applied after conversion (1e9 reports billions)
        #[arg(long, default_value_t = 1.0)]
        unit_scale: f64,
    },
    /// Print week-, month- and year-to-date performance
    Performance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long)]
        instrument: Vec<String>,
    },
    /// Print production volumes with market share and year-over-year growth
    Volumes {
        #[arg(short, long)]
        config: PathBuf,
        /// Volume product name as in the file header, e.g. Rebar
        #[arg(long)]
        product: Vec<String>,
        #[arg(long)]
        company: Option<String>,
    },
    /// Validate a dashboard configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn parse_granularity(s: &str) -> Result<Granularity, String> {
    Granularity::parse(s).ok_or_else(|| format!("unknown granularity '{}'", s))
}

fn parse_change_class(s: &str) -> Result<ChangeClass, String> {
    ChangeClass::parse(s).ok_or_else(|| format!("unknown change class '{}'", s))
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Metrics {
            config,
            as_of,
            sector,
            nation,
            change,
            name,
            with_quotes,
        } => {
            let filter = MetricsFilter {
                sectors: sector,
                nations: nation,
                change_class: change,
                name_contains: name,
            };
            run_metrics(&config, as_of, &filter, with_quotes)
        }
        Command::CostModel {
            config,
            from,
            to,
            granularity,
        } => run_cost_model(&config, from, to, granularity),
        Command::Profit {
            config,
            company,
            granularity,
            fx,
            unit_scale,
        } => run_profit(&config, company.as_deref(), granularity, fx, unit_scale),
        Command::Performance {
            config,
            as_of,
            instrument,
        } => run_performance(&config, as_of, &instrument),
        Command::Volumes {
            config,
            product,
            company,
        } => run_volumes(&config, &product, company.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load and validate the INI file, then open its data sources.
pub fn load_config(path: &PathBuf) -> Result<(FileConfigAdapter, CsvAdapter), DashboardError> {
    info!("Loading config from {}", path.display());
    let config = FileConfigAdapter::from_file(path)?;
    validate_dashboard_config(&config)?;
    let data = CsvAdapter::from_config(&config)?;
    Ok((config, data))
}

fn run_metrics(
    config_path: &PathBuf,
    as_of: Option<NaiveDate>,
    filter: &MetricsFilter,
    with_quotes: bool,
) -> Result<(), DashboardError> {
    let (config, data) = load_config(config_path)?;
    if with_quotes && !data.has_quotes() {
        return Err(DashboardError::ConfigMissing {
            section: "data".into(),
            key: "quotes".into(),
        });
    }
    let quotes: Option<&dyn QuotePort> = if with_quotes { Some(&data as &dyn QuotePort) } else { None };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_metrics_pipeline(&config, &data, quotes, as_of, filter, &CsvTableWriter, &mut out)
}

fn run_cost_model(
    config_path: &PathBuf,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    granularity: Granularity,
) -> Result<(), DashboardError> {
    let (config, data) = load_config(config_path)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_cost_model_pipeline(&config, &data, from, to, granularity, &CsvTableWriter, &mut out)
}

fn run_profit(
    config_path: &PathBuf,
    company: Option<&str>,
    granularity: Granularity,
    fx: bool,
    unit_scale: f64,
) -> Result<(), DashboardError> {
    let (config, data) = load_config(config_path)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let options = ProfitOptions {
        company: company.map(str::to_string),
        granularity,
        fx,
        unit_scale,
    };
    run_profit_pipeline(&config, &data, &options, &CsvTableWriter, &mut out)
}

fn run_performance(
    config_path: &PathBuf,
    as_of: Option<NaiveDate>,
    instruments: &[String],
) -> Result<(), DashboardError> {
    let (_config, data) = load_config(config_path)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_performance_pipeline(&data, as_of, instruments, &CsvTableWriter, &mut out)
}

fn run_volumes(config_path: &PathBuf, products: &[String], company: Option<&str>) -> Result<(), DashboardError> {
    let (_config, data) = load_config(config_path)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_volumes_pipeline(&data, products, company, &CsvTableWriter, &mut out)
}

fn run_validate(config_path: &PathBuf) -> Result<(), DashboardError> {
    let config = FileConfigAdapter::from_file(config_path)?;
    validate_dashboard_config(&config)?;
    let model = build_cost_model_config(&config)?;
    eprintln!("Configuration is valid");
    eprintln!(
        "  cost model: {} inputs, {} outputs, window {}, tax {}",
        model.inputs.len(),
        model.outputs.len(),
        model.window,
        model.tax_rate
    );
    Ok(())
}

/// Build the store from a data source. An empty result is an error at this
/// boundary; rejected rows are only logged.
pub fn load_store(data: &dyn DataPort) -> Result<PriceSeriesStore, DashboardError> {
    let records = data.fetch_prices()?;
    let report = PriceSeriesStore::load(&records);
    info!(
        "Loaded {} observations for {} instruments ({} rejected, {} duplicates)",
        report.store.observation_count(),
        report.store.instrument_count(),
        report.rejected.len(),
        report.duplicates
    );
    if report.store.is_empty() {
        return Err(DashboardError::NoData {
            instrument: "any instrument".into(),
        });
    }
    Ok(report.store)
}

/// The requested date, or the latest observation date in the store.
pub fn resolve_as_of(store: &PriceSeriesStore, as_of: Option<NaiveDate>) -> Result<NaiveDate, DashboardError> {
    match as_of {
        Some(d) => Ok(d),
        None => store
            .date_range()
            .map(|(_, last)| last)
            .ok_or_else(|| DashboardError::NoData {
                instrument: "any instrument".into(),
            }),
    }
}

pub fn run_metrics_pipeline(
    config: &dyn ConfigPort,
    data: &dyn DataPort,
    quotes: Option<&dyn QuotePort>,
    as_of: Option<NaiveDate>,
    filter: &MetricsFilter,
    writer: &dyn ReportPort,
    out: &mut dyn Write,
) -> Result<(), DashboardError> {
    let store = load_store(data)?;
    let as_of = resolve_as_of(&store, as_of)?;

    let engine = MetricsEngine::new(build_resolver(config)?);
    let mut cache = MetricsCache::new(engine, build_cache_policy(config)?);
    let metrics = cache.get_or_compute(&store, as_of).to_vec();
    info!("Computed {} metrics rows as of {}", metrics.len(), as_of);

    let metadata: Vec<_> = data
        .fetch_metadata()?
        .iter()
        .filter_map(|m| m.normalize())
        .collect();
    let mut rows = enrichment::join(metrics, &metadata);

    if let Some(quote_port) = quotes {
        attach_recent_quotes(&mut rows, quote_port, as_of)?;
    }

    let selected = filter.apply(&rows);
    writer.write_metrics(&selected, out)
}

fn attach_recent_quotes(
    rows: &mut [EnrichedRow],
    quote_port: &dyn QuotePort,
    as_of: NaiveDate,
) -> Result<(), DashboardError> {
    let tickers: Vec<String> = rows
        .iter()
        .filter_map(|r| r.metadata.as_ref())
        .flat_map(|m| m.associated_tickers.iter().cloned())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    if tickers.is_empty() {
        return Ok(());
    }
    let start = as_of
        .checked_sub_days(Days::new(QUOTE_LOOKBACK_DAYS))
        .unwrap_or(NaiveDate::MIN);
    let quotes = quote_port.fetch_quotes(&tickers, start, as_of)?;
    info!("Fetched {} quotes for {} tickers", quotes.len(), tickers.len());
    enrichment::attach_quotes(rows, &quotes, as_of);
    Ok(())
}

pub fn run_cost_model_pipeline(
    config: &dyn ConfigPort,
    data: &dyn DataPort,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    granularity: Granularity,
    writer: &dyn ReportPort,
    out: &mut dyn Write,
) -> Result<(), DashboardError> {
    let store = load_store(data)?;
    let model = CostModel::new(build_cost_model_config(config)?);
    let (first, last) = store.date_range().ok_or_else(|| DashboardError::NoData {
        instrument: "any instrument".into(),
    })?;
    let rows = model.series(&store, from.unwrap_or(first), to.unwrap_or(last), granularity);
    info!("Computed {} {} cost model rows", rows.len(), granularity);
    writer.write_cost_rows(&rows, out)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfitOptions {
    /// Falls back to `[cost_model] company`.
    pub company: Option<String>,
    pub granularity: Granularity,
    pub fx: bool,
    pub unit_scale: f64,
}

pub fn run_profit_pipeline(
    config: &dyn ConfigPort,
    data: &dyn DataPort,
    options: &ProfitOptions,
    writer: &dyn ReportPort,
    out: &mut dyn Write,
) -> Result<(), DashboardError> {
    if !(options.unit_scale.is_finite() && options.unit_scale > 0.0) {
        return Err(DashboardError::ConfigInvalid {
            section: "cli".into(),
            key: "unit_scale".into(),
            reason: "unit_scale must be positive".into(),
        });
    }

    let store = load_store(data)?;
    let model = CostModel::new(build_cost_model_config(config)?);
    let volumes = data.fetch_volumes()?;
    let company_name = options.company.clone().unwrap_or_else(|| company(config));

    let rows = model.compute(&store);
    let weighted = model.volume_weighted(&rows, &volumes, &company_name);
    if weighted.is_empty() {
        return Err(DashboardError::NoData {
            instrument: format!("{} volumes", company_name),
        });
    }
    let mut profits = aggregate_profits(&weighted, options.granularity);
    if options.fx {
        profits = convert_profits(&profits, &build_fx_table(config)?, options.unit_scale);
    }
    info!("Computed {} {} profit rows for {}", profits.len(), options.granularity, company_name);
    writer.write_profits(&profits, out)
}

pub fn run_performance_pipeline(
    data: &dyn DataPort,
    as_of: Option<NaiveDate>,
    instruments: &[String],
    writer: &dyn ReportPort,
    out: &mut dyn Write,
) -> Result<(), DashboardError> {
    let store = load_store(data)?;
    let as_of = resolve_as_of(&store, as_of)?;
    let rows = period_performance(&store, instruments, as_of);
    writer.write_performance(&rows, out)
}

pub fn run_volumes_pipeline(
    data: &dyn DataPort,
    products: &[String],
    company: Option<&str>,
    writer: &dyn ReportPort,
    out: &mut dyn Write,
) -> Result<(), DashboardError> {
    let volumes = data.fetch_volumes()?;
    let rows = volumes.share_report(products, company);
    if rows.is_empty() {
        return Err(DashboardError::NoData {
            instrument: company.map_or_else(|| "volumes".to_string(), |c| format!("{} volumes", c)),
        });
    }
    info!("Computed {} volume rows", rows.len());
    writer.write_volumes(&rows, out)
}
