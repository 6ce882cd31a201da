//! Table output port trait.

use crate::domain::cost_model::{CostModelRow, ProfitRow};
use crate::domain::enrichment::EnrichedRow;
use crate::domain::error::DashboardError;
use crate::domain::performance::PeriodPerformance;
use crate::domain::volumes::VolumeShareRow;
use std::io::Write;

/// Port for writing computed tables. Undefined cells must stay
/// distinguishable from zero in the output.
pub trait ReportPort {
    fn write_metrics(&self, rows: &[&EnrichedRow], out: &mut dyn Write) -> Result<(), DashboardError>;

    fn write_cost_rows(&self, rows: &[CostModelRow], out: &mut dyn Write) -> Result<(), DashboardError>;

    fn write_profits(&self, rows: &[ProfitRow], out: &mut dyn Write) -> Result<(), DashboardError>;

    fn write_performance(
        &self,
        rows: &[PeriodPerformance],
        out: &mut dyn Write,
    ) -> Result<(), DashboardError>;

    fn write_volumes(&self, rows: &[VolumeShareRow], out: &mut dyn Write) -> Result<(), DashboardError>;
}
