//! Configuration validation and model construction.
//!
//! Every section is checked before any computation runs, so a bad
//! coefficient fails the whole command instead of producing a partial table.

use crate::domain::cost_model::CostModelConfig;
use crate::domain::error::DashboardError;
use crate::domain::fx::FxTable;
use crate::domain::horizon::PointInTimeResolver;
use crate::domain::memo::CachePolicy;
use crate::ports::config_port::ConfigPort;
use chrono::Weekday;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_COMPANY: &str = "HPG";

pub fn validate_dashboard_config(config: &dyn ConfigPort) -> Result<(), DashboardError> {
    validate_data(config)?;
    build_resolver(config)?;
    build_cache_policy(config)?;
    build_cost_model_config(config)?;
    build_fx_table(config)?;
    Ok(())
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), DashboardError> {
    match config.get_string("data", "prices") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(DashboardError::ConfigMissing {
            section: "data".to_string(),
            key: "prices".to_string(),
        }),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> DashboardError {
    DashboardError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// `Ok(None)` when absent, an error when present but not a number.
fn number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, DashboardError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(_) => config
            .get_double_opt(section, key)
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(section, key, "expected a number")),
    }
}

fn list(config: &dyn ConfigPort, section: &str, key: &str) -> Vec<String> {
    config
        .get_string(section, key)
        .map(|s| {
            s.split(',')
                .map(|item| item.trim().to_lowercase())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, DashboardError> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DashboardError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

/// Week horizon anchor from `[metrics] week_anchor`, Friday when unset.
pub fn build_resolver(config: &dyn ConfigPort) -> Result<PointInTimeResolver, DashboardError> {
    match config.get_string("metrics", "week_anchor") {
        None => Ok(PointInTimeResolver::default()),
        Some(s) => s
            .trim()
            .parse::<Weekday>()
            .map(PointInTimeResolver::new)
            .map_err(|_| invalid("metrics", "week_anchor", format!("'{}' is not a weekday", s.trim()))),
    }
}

/// `[metrics] cache_ttl_secs`; zero or unset keeps entries until the store
/// changes.
pub fn build_cache_policy(config: &dyn ConfigPort) -> Result<CachePolicy, DashboardError> {
    let Some(raw) = config.get_string("metrics", "cache_ttl_secs") else {
        return Ok(CachePolicy::default());
    };
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid("metrics", "cache_ttl_secs", "expected a non-negative integer"))?;
    Ok(CachePolicy {
        ttl: (secs > 0).then(|| Duration::from_secs(secs)),
    })
}

/// Cost model from `[cost_model]` and its `[input.*]`, `[overhead.*]` and
/// `[output.*]` sections. Without `[cost_model]` the steel basket is used.
pub fn build_cost_model_config(config: &dyn ConfigPort) -> Result<CostModelConfig, DashboardError> {
    if !config.has_section("cost_model") {
        return Ok(CostModelConfig::steel_default());
    }

    let mut builder = CostModelConfig::builder();

    if let Some(raw) = config.get_string("cost_model", "window") {
        let window: usize = raw
            .trim()
            .parse()
            .map_err(|_| invalid("cost_model", "window", "expected a positive integer"))?;
        builder = builder.window(window);
    }
    if let Some(rate) = number(config, "cost_model", "tax_rate")? {
        builder = builder.tax_rate(rate);
    }

    for name in list(config, "cost_model", "inputs") {
        let section = format!("input.{}", name);
        let instrument = required(config, &section, "instrument")?;
        builder = builder.input(&name, &instrument);
        if let Some(coefficient) = number(config, &section, "coefficient")? {
            if coefficient < 0.0 {
                return Err(invalid(&section, "coefficient", "coefficient must be non-negative"));
            }
            builder = builder.coefficient(&name, coefficient);
        }
    }

    for name in list(config, "cost_model", "overheads") {
        let section = format!("overhead.{}", name);
        builder = builder.overhead(&name, number(config, &section, "per_unit")?);
    }

    for name in list(config, "cost_model", "outputs") {
        let section = format!("output.{}", name);
        let instrument = required(config, &section, "instrument")?;
        builder = builder.output(&name, &instrument);
        if let Some(volume_product) = config.get_string(&section, "volume_product") {
            builder = builder.volume_product(&name, volume_product.trim());
        }
    }

    builder.build()
}

/// Year-indexed rates from `[fx_rates]`. The built-in steel setup (no
/// `[cost_model]` section) falls back to the VND table; a configured model
/// must bring its own rates.
pub fn build_fx_table(config: &dyn ConfigPort) -> Result<FxTable, DashboardError> {
    if !config.has_section("fx_rates") && !config.has_section("cost_model") {
        return Ok(FxTable::vnd_per_usd_default());
    }

    let mut rates = BTreeMap::new();
    for key in config.keys("fx_rates") {
        let year: i32 = key
            .trim()
            .parse()
            .map_err(|_| invalid("fx_rates", &key, "key must be a year"))?;
        if let Some(rate) = number(config, "fx_rates", &key)? {
            rates.insert(year, rate);
        }
    }
    FxTable::new(rates)
}

pub fn company(config: &dyn ConfigPort) -> String {
    config
        .get_string("cost_model", "company")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_COMPANY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const FULL: &str = r#"
[data]
prices = Data.csv

[metrics]
week_anchor = thu
cache_ttl_secs = 60

[cost_model]
window = 20
tax_rate = 0.2
inputs = ore, scrap
overheads = sga
outputs = hrc
company = HSG

[input.ore]
instrument = Ore 62
coefficient = 1.6

[input.scrap]
instrument = Scrap
coefficient = 0.1

[overhead.sga]
per_unit = 19

[output.hrc]
instrument = China HRC
volume_product = Coil

[fx_rates]
2024 = 25000
2025 = 26500
"#;

    #[test]
    fn valid_config_passes() {
        assert!(validate_dashboard_config(&make_config(FULL)).is_ok());
    }

    #[test]
    fn cost_model_built_from_sections() {
        let model = build_cost_model_config(&make_config(FULL)).unwrap();
        assert_eq!(model.window, 20);
        assert_eq!(model.tax_rate, 0.2);
        assert_eq!(model.inputs.len(), 2);
        assert_eq!(model.inputs[0].instrument, "Ore 62");
        assert_eq!(model.inputs[1].coefficient, 0.1);
        assert_eq!(model.fixed_overhead(), 19.0);
        assert_eq!(model.outputs[0].volume_product.as_deref(), Some("Coil"));
        assert_eq!(company(&make_config(FULL)), "HSG");
    }

    #[test]
    fn missing_coefficient_is_named() {
        let content = FULL.replace("coefficient = 0.1\n", "");
        let err = build_cost_model_config(&make_config(&content)).unwrap_err();
        match err {
            DashboardError::MissingCoefficient { name } => assert_eq!(name, "input.scrap.coefficient"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_overhead_is_named() {
        let content = FULL.replace("per_unit = 19\n", "");
        assert!(matches!(
            build_cost_model_config(&make_config(&content)),
            Err(DashboardError::MissingCoefficient { name }) if name == "overhead.sga.per_unit"
        ));
    }

    #[test]
    fn non_numeric_coefficient_is_invalid() {
        let content = FULL.replace("coefficient = 1.6", "coefficient = lots");
        assert!(matches!(
            validate_dashboard_config(&make_config(&content)),
            Err(DashboardError::ConfigInvalid { key, .. }) if key == "coefficient"
        ));
    }

    #[test]
    fn tax_rate_out_of_range_fails() {
        let content = FULL.replace("tax_rate = 0.2", "tax_rate = 1.5");
        assert!(matches!(
            validate_dashboard_config(&make_config(&content)),
            Err(DashboardError::ConfigInvalid { key, .. }) if key == "tax_rate"
        ));
    }

    #[test]
    fn zero_window_fails() {
        let content = FULL.replace("window = 20", "window = 0");
        assert!(validate_dashboard_config(&make_config(&content)).is_err());
    }

    #[test]
    fn missing_prices_path_fails() {
        let content = FULL.replace("prices = Data.csv", "");
        assert!(matches!(
            validate_dashboard_config(&make_config(&content)),
            Err(DashboardError::ConfigMissing { key, .. }) if key == "prices"
        ));
    }

    #[test]
    fn week_anchor_parses_weekday_names() {
        let resolver = build_resolver(&make_config(FULL)).unwrap();
        assert_eq!(resolver.week_anchor, Weekday::Thu);
        let bad = FULL.replace("week_anchor = thu", "week_anchor = someday");
        assert!(build_resolver(&make_config(&bad)).is_err());
        assert_eq!(
            build_resolver(&make_config("[data]\nprices = x\n")).unwrap(),
            PointInTimeResolver::default()
        );
    }

    #[test]
    fn cache_ttl_zero_disables_expiry() {
        let policy = build_cache_policy(&make_config(FULL)).unwrap();
        assert_eq!(policy.ttl, Some(Duration::from_secs(60)));
        let zero = FULL.replace("cache_ttl_secs = 60", "cache_ttl_secs = 0");
        assert_eq!(build_cache_policy(&make_config(&zero)).unwrap().ttl, None);
        let negative = FULL.replace("cache_ttl_secs = 60", "cache_ttl_secs = -1");
        assert!(build_cache_policy(&make_config(&negative)).is_err());
    }

    #[test]
    fn fx_table_from_section() {
        let fx = build_fx_table(&make_config(FULL)).unwrap();
        assert_eq!(fx.rate_for(2024), 25_000.0);
        assert_eq!(fx.rate_for(2026), 26_500.0);
    }

    #[test]
    fn fx_table_required_with_custom_model() {
        let content = FULL.replace("[fx_rates]\n2024 = 25000\n2025 = 26500\n", "");
        assert!(matches!(
            build_fx_table(&make_config(&content)),
            Err(DashboardError::MissingCoefficient { name }) if name == "fx_rates"
        ));
    }

    #[test]
    fn fx_year_keys_must_be_years() {
        let content = FULL.replace("2025 = 26500", "next = 26500");
        assert!(validate_dashboard_config(&make_config(&content)).is_err());
    }

    #[test]
    fn defaults_without_cost_model_section() {
        let config = make_config("[data]\nprices = Data.csv\n");
        assert!(validate_dashboard_config(&config).is_ok());
        assert_eq!(build_cost_model_config(&config).unwrap(), CostModelConfig::steel_default());
        assert_eq!(build_fx_table(&config).unwrap(), FxTable::vnd_per_usd_default());
        assert_eq!(company(&config), DEFAULT_COMPANY);
    }
}
