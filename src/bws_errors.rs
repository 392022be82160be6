use thiserror::Error;

use crate::constants::Seconds;

/// Error taxonomy of the reconstruction pipeline.
///
/// Fatal variants (`InvalidTimeRange`, `InvalidBeam`, `AmbiguousVariable`, `StaleData`,
/// `SeriesShape`, `MissingVariable`, `Archive`) abort the whole
/// [`reconstruct`](crate::dataset::BwsDataset::reconstruct) call. `AlignmentGap` and
/// `FitDivergence` are recoverable: the offending acquisition (respectively fit) is skipped
/// or recorded as invalid, and the run continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BwsError {
    #[error("end time smaller than start time, t2 = {end} < {start} = t1")]
    InvalidTimeRange { start: Seconds, end: Seconds },

    #[error("beam = {0} must be either 'B1' or 'B2'")]
    InvalidBeam(String),

    #[error("exactly one variable name expected for search('{pattern}'), got {matches:?}")]
    AmbiguousVariable {
        pattern: String,
        matches: Vec<String>,
    },

    #[error("last logging time for {variable} exceeds {lookback_days:.0} days before the window start, check your data")]
    StaleData {
        variable: String,
        lookback_days: f64,
    },

    #[error("unexpected sample shape for variable {0}")]
    SeriesShape(String),

    #[error("variable {0} missing from archive response")]
    MissingVariable(String),

    #[error("logging backend error: {0}")]
    Archive(String),

    #[error("acquisition at t = {time} has no matching {channel} sample")]
    AlignmentGap {
        time: Seconds,
        channel: &'static str,
    },

    #[error("gaussian profile fit failed to converge")]
    FitDivergence,
}
