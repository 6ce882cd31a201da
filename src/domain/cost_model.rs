//! Derived production cost and profit model.
//!
//! Input materials are smoothed with a trailing moving average and weighted
//! by fixed per-unit coefficients; output products are valued at spot. One
//! parameterised model covers every basket: the steel basket is just the
//! default configuration.
//!
//! Any undefined input makes every figure that depends on it undefined. An
//! input that is not observed on a date leaves that date's cost undefined:
//! its moving average is never carried across the gap.

use crate::domain::error::DashboardError;
use crate::domain::fx::FxTable;
use crate::domain::rolling::{Granularity, group_by_period, mean_defined, sum_defined, trailing_mean};
use crate::domain::store::PriceSeriesStore;
use crate::domain::volumes::{VolumeKey, VolumeTable};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

pub const DEFAULT_WINDOW: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct CostInput {
    pub name: String,
    pub instrument: String,
    /// Units of input consumed per unit of output.
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overhead {
    pub name: String,
    pub per_unit: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductOutput {
    pub product: String,
    pub instrument: String,
    /// Product name in the volume table, when volumes are tracked.
    pub volume_product: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostModelConfig {
    pub window: usize,
    pub tax_rate: f64,
    pub inputs: Vec<CostInput>,
    pub overheads: Vec<Overhead>,
    pub outputs: Vec<ProductOutput>,
}

impl CostModelConfig {
    pub fn builder() -> CostModelBuilder {
        CostModelBuilder::default()
    }

    /// Blast-furnace steel basket per tonne: 1.6 t iron ore, 0.6 t coking
    /// coal, 0.1 t scrap, USD 35 depreciation and USD 19 SG&A, 12% tax.
    pub fn steel_default() -> Self {
        CostModelConfig {
            window: DEFAULT_WINDOW,
            tax_rate: 0.12,
            inputs: vec![
                CostInput { name: "ore".into(), instrument: "Ore 62".into(), coefficient: 1.6 },
                CostInput { name: "coal".into(), instrument: "Aus Met Coal".into(), coefficient: 0.6 },
                CostInput { name: "scrap".into(), instrument: "Scrap".into(), coefficient: 0.1 },
            ],
            overheads: vec![
                Overhead { name: "depreciation".into(), per_unit: 35.0 },
                Overhead { name: "sga".into(), per_unit: 19.0 },
            ],
            outputs: vec![
                ProductOutput {
                    product: "hrc".into(),
                    instrument: "China HRC".into(),
                    volume_product: Some("Coil".into()),
                },
                ProductOutput {
                    product: "long_steel".into(),
                    instrument: "China Long steel".into(),
                    volume_product: Some("Rebar".into()),
                },
            ],
        }
    }

    pub fn fixed_overhead(&self) -> f64 {
        self.overheads.iter().map(|o| o.per_unit).sum()
    }

    fn basket_instruments(&self) -> BTreeSet<&str> {
        self.inputs
            .iter()
            .map(|i| i.instrument.as_str())
            .chain(self.outputs.iter().map(|o| o.instrument.as_str()))
            .collect()
    }
}

/// Collects model parameters and refuses to build while any coefficient is
/// missing.
#[derive(Debug, Clone, Default)]
pub struct CostModelBuilder {
    window: Option<usize>,
    tax_rate: Option<f64>,
    inputs: Vec<(String, String)>,
    coefficients: BTreeMap<String, f64>,
    overheads: Vec<(String, Option<f64>)>,
    outputs: Vec<(String, String)>,
    volume_products: BTreeMap<String, String>,
}

impl CostModelBuilder {
    pub fn window(mut self, window: usize) -> Self {
        self.window = Some(window);
        self
    }

    pub fn tax_rate(mut self, rate: f64) -> Self {
        self.tax_rate = Some(rate);
        self
    }

    pub fn input(mut self, name: &str, instrument: &str) -> Self {
        self.inputs.push((name.to_string(), instrument.to_string()));
        self
    }

    pub fn coefficient(mut self, input: &str, value: f64) -> Self {
        self.coefficients.insert(input.to_string(), value);
        self
    }

    pub fn overhead(mut self, name: &str, per_unit: Option<f64>) -> Self {
        self.overheads.push((name.to_string(), per_unit));
        self
    }

    pub fn output(mut self, product: &str, instrument: &str) -> Self {
        self.outputs.push((product.to_string(), instrument.to_string()));
        self
    }

    pub fn volume_product(mut self, product: &str, volume_product: &str) -> Self {
        self.volume_products
            .insert(product.to_string(), volume_product.to_string());
        self
    }

    pub fn build(self) -> Result<CostModelConfig, DashboardError> {
        let window = self.window.unwrap_or(DEFAULT_WINDOW);
        if window == 0 {
            return Err(DashboardError::ConfigInvalid {
                section: "cost_model".into(),
                key: "window".into(),
                reason: "window must be at least 1".into(),
            });
        }

        let tax_rate = self.tax_rate.ok_or_else(|| DashboardError::MissingCoefficient {
            name: "cost_model.tax_rate".into(),
        })?;
        if !(0.0..1.0).contains(&tax_rate) {
            return Err(DashboardError::ConfigInvalid {
                section: "cost_model".into(),
                key: "tax_rate".into(),
                reason: "tax_rate must be in [0, 1)".into(),
            });
        }

        if self.inputs.is_empty() {
            return Err(DashboardError::ConfigInvalid {
                section: "cost_model".into(),
                key: "inputs".into(),
                reason: "at least one input is required".into(),
            });
        }

        let inputs = self
            .inputs
            .into_iter()
            .map(|(name, instrument)| {
                let coefficient = self.coefficients.get(&name).copied().ok_or_else(|| {
                    DashboardError::MissingCoefficient {
                        name: format!("input.{}.coefficient", name),
                    }
                })?;
                Ok(CostInput { name, instrument, coefficient })
            })
            .collect::<Result<Vec<_>, DashboardError>>()?;

        let overheads = self
            .overheads
            .into_iter()
            .map(|(name, per_unit)| match per_unit {
                Some(per_unit) => Ok(Overhead { name, per_unit }),
                None => Err(DashboardError::MissingCoefficient {
                    name: format!("overhead.{}.per_unit", name),
                }),
            })
            .collect::<Result<Vec<_>, DashboardError>>()?;

        let mut volume_products = self.volume_products;
        let outputs = self
            .outputs
            .into_iter()
            .map(|(product, instrument)| ProductOutput {
                volume_product: volume_products.remove(&product),
                product,
                instrument,
            })
            .collect();

        Ok(CostModelConfig {
            window,
            tax_rate,
            inputs,
            overheads,
            outputs,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProductProfit {
    pub spot_price: Option<f64>,
    pub pre_tax: Option<f64>,
    pub after_tax: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostModelRow {
    pub date: NaiveDate,
    pub raw_material_cost: Option<f64>,
    pub production_cost: Option<f64>,
    pub output_profit_by_product: BTreeMap<String, ProductProfit>,
}

/// Volume-weighted profit for one period.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitRow {
    pub date: NaiveDate,
    pub by_product: BTreeMap<String, Option<f64>>,
    pub total: Option<f64>,
}

/// Moving average of one input over the model timeline, alongside whether
/// the input was actually observed on each date.
struct SmoothedInput {
    average: Vec<Option<f64>>,
    observed: Vec<bool>,
}

impl SmoothedInput {
    fn at(&self, row: usize) -> Option<f64> {
        if self.observed[row] { self.average[row] } else { None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostModel {
    pub config: CostModelConfig,
}

impl CostModel {
    pub fn new(config: CostModelConfig) -> Self {
        Self { config }
    }

    /// Per-date cost and profit over the union of the basket's observation
    /// dates. Moving averages run over the whole history so that the first
    /// rows of a later range still see a full window. A date on which any
    /// input has no observation has undefined cost and profit.
    pub fn compute(&self, store: &PriceSeriesStore) -> Vec<CostModelRow> {
        let config = &self.config;
        let basket = config.basket_instruments();
        for instrument in &basket {
            if !store.contains(instrument) {
                warn!("cost model instrument '{}' has no observations", instrument);
            }
        }

        let timeline: Vec<NaiveDate> = basket
            .iter()
            .flat_map(|id| store.get(id).iter().map(|o| o.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let smoothed_inputs: Vec<SmoothedInput> = config
            .inputs
            .iter()
            .map(|input| {
                let raw: Vec<Option<f64>> = timeline
                    .iter()
                    .map(|d| store.price_on(&input.instrument, *d))
                    .collect();
                SmoothedInput {
                    average: trailing_mean(&raw, config.window),
                    observed: raw.iter().map(Option::is_some).collect(),
                }
            })
            .collect();

        let overhead = config.fixed_overhead();

        timeline
            .iter()
            .enumerate()
            .map(|(row, date)| {
                let raw_material_cost = config
                    .inputs
                    .iter()
                    .zip(&smoothed_inputs)
                    .map(|(input, smoothed)| smoothed.at(row).map(|p| p * input.coefficient))
                    .sum::<Option<f64>>();
                let production_cost = raw_material_cost.map(|c| c + overhead);

                let output_profit_by_product = config
                    .outputs
                    .iter()
                    .map(|output| {
                        let spot_price = store.price_on(&output.instrument, *date);
                        let pre_tax = spot_price.zip(production_cost).map(|(p, c)| p - c);
                        let after_tax = pre_tax.map(|p| p * (1.0 - config.tax_rate));
                        (
                            output.product.clone(),
                            ProductProfit {
                                spot_price,
                                pre_tax,
                                after_tax,
                            },
                        )
                    })
                    .collect();

                CostModelRow {
                    date: *date,
                    raw_material_cost,
                    production_cost,
                    output_profit_by_product,
                }
            })
            .collect()
    }

    /// Rows with `start <= date <= end`, aggregated to `granularity`.
    pub fn series(
        &self,
        store: &PriceSeriesStore,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> Vec<CostModelRow> {
        let rows: Vec<CostModelRow> = self
            .compute(store)
            .into_iter()
            .filter(|r| r.date >= start && r.date <= end)
            .collect();
        aggregate_rows(&rows, granularity)
    }

    /// Multiply per-unit after-tax profit by the company's volume for each
    /// product. Only dates present in both the cost rows and the volume
    /// table are kept.
    pub fn volume_weighted(&self, rows: &[CostModelRow], volumes: &VolumeTable, company: &str) -> Vec<ProfitRow> {
        let tracked: Vec<(&str, VolumeKey)> = self
            .config
            .outputs
            .iter()
            .filter_map(|o| {
                o.volume_product
                    .as_ref()
                    .map(|vp| (o.product.as_str(), VolumeKey::new(vp.clone(), company)))
            })
            .collect();

        rows.iter()
            .filter(|row| tracked.iter().any(|(_, key)| volumes.get(key, row.date).is_some()))
            .map(|row| {
                let by_product: BTreeMap<String, Option<f64>> = tracked
                    .iter()
                    .map(|(product, key)| {
                        let per_unit = row
                            .output_profit_by_product
                            .get(*product)
                            .and_then(|p| p.after_tax);
                        let volume = volumes.get(key, row.date);
                        (product.to_string(), per_unit.zip(volume).map(|(p, v)| p * v))
                    })
                    .collect();
                let total = by_product.values().copied().sum::<Option<f64>>();
                ProfitRow {
                    date: row.date,
                    by_product,
                    total,
                }
            })
            .collect()
    }
}

/// Per-unit figures averaged per period over defined values. Each row is
/// dated at its period start. Since a daily cost is only defined where every
/// input was observed, a period in which some input never traded has
/// undefined cost and profit.
pub fn aggregate_rows(rows: &[CostModelRow], granularity: Granularity) -> Vec<CostModelRow> {
    if granularity == Granularity::Daily {
        return rows.to_vec();
    }

    group_by_period(rows, granularity, |r| r.date)
        .into_iter()
        .map(|(period, members)| {
            let products: BTreeSet<&String> = members
                .iter()
                .flat_map(|r| r.output_profit_by_product.keys())
                .collect();
            let output_profit_by_product = products
                .into_iter()
                .map(|product| {
                    let field = |f: fn(&ProductProfit) -> Option<f64>| {
                        mean_defined(
                            members
                                .iter()
                                .map(|r| r.output_profit_by_product.get(product).and_then(f)),
                        )
                    };
                    (
                        product.clone(),
                        ProductProfit {
                            spot_price: field(|p| p.spot_price),
                            pre_tax: field(|p| p.pre_tax),
                            after_tax: field(|p| p.after_tax),
                        },
                    )
                })
                .collect();

            CostModelRow {
                date: period,
                raw_material_cost: mean_defined(members.iter().map(|r| r.raw_material_cost)),
                production_cost: mean_defined(members.iter().map(|r| r.production_cost)),
                output_profit_by_product,
            }
        })
        .collect()
}

/// Absolute profits summed per period over defined values. The period total
/// is the sum of the period's product columns.
pub fn aggregate_profits(rows: &[ProfitRow], granularity: Granularity) -> Vec<ProfitRow> {
    group_by_period(rows, granularity, |r| r.date)
        .into_iter()
        .map(|(period, members)| {
            let products: BTreeSet<&String> = members.iter().flat_map(|r| r.by_product.keys()).collect();
            let by_product: BTreeMap<String, Option<f64>> = products
                .into_iter()
                .map(|product| {
                    let total = sum_defined(members.iter().map(|r| r.by_product.get(product).copied().flatten()));
                    (product.clone(), total)
                })
                .collect();
            // undefined when any product column is, as for a single row
            let total = by_product.values().copied().sum::<Option<f64>>();
            ProfitRow {
                date: period,
                by_product,
                total,
            }
        })
        .collect()
}

/// Convert each row at its own year's rate, then divide by `unit_scale`
/// (1e9 reports billions).
pub fn convert_profits(rows: &[ProfitRow], fx: &FxTable, unit_scale: f64) -> Vec<ProfitRow> {
    rows.iter()
        .map(|row| {
            let rate = fx.rate_on(row.date) / unit_scale;
            ProfitRow {
                date: row.date,
                by_product: row
                    .by_product
                    .iter()
                    .map(|(k, v)| (k.clone(), v.map(|x| x * rate)))
                    .collect(),
                total: row.total.map(|x| x * rate),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::observation::Observation;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn simple_config() -> CostModelConfig {
        CostModelConfig::builder()
            .window(2)
            .tax_rate(0.1)
            .input("ore", "Ore")
            .coefficient("ore", 2.0)
            .overhead("fixed", Some(10.0))
            .output("steel", "Steel")
            .volume_product("steel", "Coil")
            .build()
            .unwrap()
    }

    fn simple_store() -> PriceSeriesStore {
        PriceSeriesStore::from_observations(vec![
            Observation::new("Ore", date(2024, 1, 1), 100.0),
            Observation::new("Ore", date(2024, 1, 2), 200.0),
            Observation::new("Ore", date(2024, 1, 3), 300.0),
            Observation::new("Steel", date(2024, 1, 1), 400.0),
            Observation::new("Steel", date(2024, 1, 3), 700.0),
        ])
    }

    #[test]
    fn builder_reports_missing_coefficient_by_name() {
        let err = CostModelConfig::builder()
            .tax_rate(0.1)
            .input("coal", "Coal")
            .build()
            .unwrap_err();
        assert!(
            matches!(err, DashboardError::MissingCoefficient { ref name } if name == "input.coal.coefficient")
        );
    }

    #[test]
    fn builder_requires_tax_rate() {
        let err = CostModelConfig::builder()
            .input("ore", "Ore")
            .coefficient("ore", 1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, DashboardError::MissingCoefficient { ref name } if name == "cost_model.tax_rate"));
    }

    #[test]
    fn builder_rejects_missing_overhead_value() {
        let err = CostModelConfig::builder()
            .tax_rate(0.1)
            .input("ore", "Ore")
            .coefficient("ore", 1.0)
            .overhead("sga", None)
            .build()
            .unwrap_err();
        assert!(matches!(err, DashboardError::MissingCoefficient { ref name } if name == "overhead.sga.per_unit"));
    }

    #[test]
    fn steel_default_overhead() {
        assert_relative_eq!(CostModelConfig::steel_default().fixed_overhead(), 54.0, epsilon = 1e-9);
    }

    #[test]
    fn cost_uses_moving_average_and_profit_uses_spot() {
        let rows = CostModel::new(simple_config()).compute(&simple_store());
        assert_eq!(rows.len(), 3);

        // day 1: ma = 100
        assert_relative_eq!(rows[0].production_cost.unwrap(), 210.0, epsilon = 1e-9);
        // day 2: ma = 150
        assert_relative_eq!(rows[1].production_cost.unwrap(), 310.0, epsilon = 1e-9);
        // day 3: ma = 250
        assert_relative_eq!(rows[2].production_cost.unwrap(), 510.0, epsilon = 1e-9);

        let steel = rows[2].output_profit_by_product["steel"];
        assert_eq!(steel.spot_price, Some(700.0));
        assert_relative_eq!(steel.pre_tax.unwrap(), 190.0, epsilon = 1e-9);
        assert_relative_eq!(steel.after_tax.unwrap(), 171.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_spot_price_leaves_profit_undefined() {
        let rows = CostModel::new(simple_config()).compute(&simple_store());
        let steel = rows[1].output_profit_by_product["steel"];
        assert!(rows[1].production_cost.is_some());
        assert_eq!(steel.spot_price, None);
        assert_eq!(steel.pre_tax, None);
        assert_eq!(steel.after_tax, None);
    }

    #[test]
    fn missing_input_series_leaves_cost_undefined() {
        let config = CostModelConfig::builder()
            .tax_rate(0.1)
            .input("ore", "Ore")
            .coefficient("ore", 1.0)
            .input("coal", "Coal")
            .coefficient("coal", 1.0)
            .output("steel", "Steel")
            .build()
            .unwrap();
        let rows = CostModel::new(config).compute(&simple_store());
        assert!(rows.iter().all(|r| r.raw_material_cost.is_none()));
        assert!(rows.iter().all(|r| r.production_cost.is_none()));
        assert!(rows
            .iter()
            .all(|r| r.output_profit_by_product["steel"].after_tax.is_none()));
    }

    #[test]
    fn aggregate_rows_monthly_means_defined_values() {
        let rows = CostModel::new(simple_config()).compute(&simple_store());
        let monthly = aggregate_rows(&rows, Granularity::Monthly);
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].date, date(2024, 1, 1));
        assert_relative_eq!(monthly[0].production_cost.unwrap(), (210.0 + 310.0 + 510.0) / 3.0, epsilon = 1e-9);
        // only days 1 and 3 had a spot price
        assert_relative_eq!(monthly[0].output_profit_by_product["steel"].spot_price.unwrap(), 550.0, epsilon = 1e-9);
    }

    #[test]
    fn volume_weighted_profit_on_common_dates() {
        let model = CostModel::new(simple_config());
        let rows = model.compute(&simple_store());
        let mut volumes = VolumeTable::new();
        volumes.insert(VolumeKey::new("Coil", "HPG"), date(2024, 1, 3), 10.0);
        volumes.insert(VolumeKey::new("Coil", "HPG"), date(2024, 2, 1), 99.0);

        let profits = model.volume_weighted(&rows, &volumes, "HPG");
        assert_eq!(profits.len(), 1);
        assert_eq!(profits[0].date, date(2024, 1, 3));
        assert_relative_eq!(profits[0].by_product["steel"].unwrap(), 1710.0, epsilon = 1e-9);
        assert_relative_eq!(profits[0].total.unwrap(), 1710.0, epsilon = 1e-9);
    }

    #[test]
    fn aggregate_profits_sums_and_skips_undefined() {
        let mk = |d: NaiveDate, v: Option<f64>| ProfitRow {
            date: d,
            by_product: BTreeMap::from([("steel".to_string(), v)]),
            total: v,
        };
        let rows = vec![
            mk(date(2024, 1, 31), Some(10.0)),
            mk(date(2024, 2, 29), None),
            mk(date(2024, 3, 31), Some(5.0)),
            mk(date(2024, 4, 30), None),
        ];
        let quarterly = aggregate_profits(&rows, Granularity::Quarterly);
        assert_eq!(quarterly.len(), 2);
        assert_eq!(quarterly[0].total, Some(15.0));
        assert_eq!(quarterly[1].total, None);
    }

    #[test]
    fn convert_profits_uses_row_year() {
        let rows = vec![ProfitRow {
            date: date(2026, 3, 1),
            by_product: BTreeMap::from([("steel".to_string(), Some(2.0))]),
            total: Some(2.0),
        }];
        let converted = convert_profits(&rows, &FxTable::vnd_per_usd_default(), 1.0);
        assert_relative_eq!(converted[0].total.unwrap(), 53_000.0, epsilon = 1e-9);
    }
}
