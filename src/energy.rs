//! # Beam-energy resolution
//!
//! The reference beam energy is logged far less frequently than wire-scanner
//! profiles, so the sample covering the start of a reconstruction window usually
//! predates the window itself. [`resolve_energy`] extends the query window backward
//! in one-day steps until the returned series covers the window start, and gives up
//! once the cumulative extension exceeds one month: an energy value that old would
//! silently produce a wrong emittance, so staleness is a hard validity check.

use crate::bws_errors::BwsError;
use crate::constants::{Seconds, ENERGY_BACKSTEP, ENERGY_MAX_LOOKBACK, SECONDS_PER_DAY};
use crate::timber::{ArchiveReader, ENERGY_VARIABLE};
use crate::timeseries::TimeSeries;

/// Resolve an energy time series covering the window `[t1, t2]`.
///
/// The series is valid once its first sample's timestamp is `≤ t1`, so a
/// nearest-preceding energy value exists for every acquisition in the window.
/// While the returned series is empty or starts after `t1`, the query start is
/// pushed back by [`ENERGY_BACKSTEP`] and the query repeated.
///
/// Arguments
/// -----------------
/// * `reader`: the time-range fetch capability.
/// * `t1`, `t2`: the reconstruction window, unix-time seconds.
///
/// Return
/// ----------
/// * The energy series, or [`BwsError::StaleData`] once the backward extension
///   exceeds [`ENERGY_MAX_LOOKBACK`].
pub fn resolve_energy(
    reader: &impl ArchiveReader,
    t1: Seconds,
    t2: Seconds,
) -> Result<TimeSeries<f64>, BwsError> {
    let names = [ENERGY_VARIABLE.to_string()];
    let fetch = |start: Seconds| -> Result<TimeSeries<f64>, BwsError> {
        match reader.get(&names, start, t2)?.remove(ENERGY_VARIABLE) {
            Some(series) => series.into_scalar(ENERGY_VARIABLE),
            None => Ok(TimeSeries::default()),
        }
    };

    let mut start = t1;
    let mut series = fetch(start)?;
    while series.first_time().map_or(true, |first| first > t1) {
        if (t1 - start).abs() > ENERGY_MAX_LOOKBACK {
            return Err(BwsError::StaleData {
                variable: ENERGY_VARIABLE.to_string(),
                lookback_days: ENERGY_MAX_LOOKBACK / SECONDS_PER_DAY,
            });
        }
        start -= ENERGY_BACKSTEP;
        series = fetch(start)?;
    }
    Ok(series)
}

#[cfg(test)]
mod energy_test {
    use std::cell::Cell;

    use super::*;
    use crate::constants::ArchiveData;
    use crate::timeseries::ArchiveSeries;

    /// Returns a series covering `t1` only once the query start has been pushed
    /// back by at least `covered_after` whole days; counts the issued queries.
    struct BackstepStub {
        t1: Seconds,
        covered_after: f64,
        calls: Cell<usize>,
    }

    impl ArchiveReader for BackstepStub {
        fn get(&self, _: &[String], start: Seconds, _: Seconds) -> Result<ArchiveData, BwsError> {
            self.calls.set(self.calls.get() + 1);
            let mut data = ArchiveData::default();
            let steps = (self.t1 - start) / SECONDS_PER_DAY;
            if steps >= self.covered_after {
                data.insert(
                    ENERGY_VARIABLE.to_string(),
                    ArchiveSeries::Scalar(TimeSeries::new(vec![start], vec![450.0])),
                );
            }
            Ok(data)
        }
    }

    #[test]
    fn test_succeeds_after_five_backward_steps() {
        let stub = BackstepStub {
            t1: 1.0e9,
            covered_after: 5.0,
            calls: Cell::new(0),
        };
        let series = resolve_energy(&stub, 1.0e9, 1.0e9 + 60.0).unwrap();
        assert_eq!(series.values, vec![450.0]);
        assert_eq!(series.first_time(), Some(1.0e9 - 5.0 * SECONDS_PER_DAY));
        // one initial query plus exactly five backward extensions
        assert_eq!(stub.calls.get(), 6);
    }

    #[test]
    fn test_no_backstep_when_window_is_covered() {
        let stub = BackstepStub {
            t1: 1.0e9,
            covered_after: 0.0,
            calls: Cell::new(0),
        };
        resolve_energy(&stub, 1.0e9, 1.0e9 + 60.0).unwrap();
        assert_eq!(stub.calls.get(), 1);
    }

    #[test]
    fn test_stale_data_past_one_month() {
        let stub = BackstepStub {
            t1: 1.0e9,
            covered_after: f64::INFINITY,
            calls: Cell::new(0),
        };
        let err = resolve_energy(&stub, 1.0e9, 1.0e9 + 60.0).unwrap_err();
        assert!(matches!(err, BwsError::StaleData { .. }));
    }

    /// A series that starts after `t1` must also trigger the backward search.
    struct LateSeriesStub;

    impl ArchiveReader for LateSeriesStub {
        fn get(&self, _: &[String], start: Seconds, _: Seconds) -> Result<ArchiveData, BwsError> {
            let mut data = ArchiveData::default();
            // sample always one half-day after the query start
            let ts = start + 0.5 * SECONDS_PER_DAY;
            data.insert(
                ENERGY_VARIABLE.to_string(),
                ArchiveSeries::Scalar(TimeSeries::new(vec![ts], vec![6800.0])),
            );
            Ok(data)
        }
    }

    #[test]
    fn test_first_sample_after_window_start_extends_backward() {
        let series = resolve_energy(&LateSeriesStub, 1.0e9, 1.0e9 + 60.0).unwrap();
        assert_eq!(
            series.first_time(),
            Some(1.0e9 - 0.5 * SECONDS_PER_DAY)
        );
    }
}
