//! Report output port trait.

use crate::domain::error::PerpLedgerError;
use crate::domain::metrics::Metrics;
use crate::domain::replay::ReplayResult;
use std::path::Path;

/// Port for writing replay reports.
pub trait ReportPort {
    fn write(
        &self,
        result: &ReplayResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), PerpLedgerError>;
}
