mod coefficients;
mod engine;
mod error;
mod report;
mod rounding;
mod trace;
mod types;
mod validate;

pub use coefficients::{CoefficientSet, Coefficients, DEFAULT_REGION};
pub use engine::{compute, compute_for_region};
pub use error::CostError;
pub use report::{CellWrite, REPORT_CELLS, ReportCell, map_report_cells};
pub use rounding::{numeric_or_default, round_half_away_from_zero};
pub(crate) use rounding::null_as_default;
pub use trace::{Step, Trace, TraceNode};
pub use types::{
    AssetRow, BasicParams, ComputationResult, CostLine, EntryData, LandParcel, RoadRow, SalesRow,
    Summary, Unit,
};
pub use validate::{Tolerance, ValidationReport, ValidationRow, validate};
