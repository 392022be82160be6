//! # Time-stamped signal series
//!
//! The logging service hands back, for every variable, a pair of parallel ordered
//! sequences: sample timestamps and sample values. Depending on the variable, one
//! sample is either a single float (gate counts, beta functions, beam energy) or a
//! float array (bunch-selection chunks, profile positions and amplitudes, per-gate
//! emittance references). [`TimeSeries`] models the pair, [`ArchiveSeries`] the two
//! payload shapes.
//!
//! Timestamps are unix seconds and monotonic non-decreasing; series are treated as
//! immutable input once received from the collaborator.

use crate::bws_errors::BwsError;
use crate::constants::Seconds;

/// A pair of parallel ordered sequences: sample timestamps and sample values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries<T> {
    pub times: Vec<Seconds>,
    pub values: Vec<T>,
}

impl<T> TimeSeries<T> {
    /// Build a series from parallel `times`/`values` sequences.
    ///
    /// The sequences must have the same length (a contract of the logging
    /// collaborator, checked in debug builds). Storage order is not assumed:
    /// nearest-preceding joins require sorted times, exact-match joins do not.
    pub fn new(times: Vec<Seconds>, values: Vec<T>) -> Self {
        debug_assert_eq!(times.len(), values.len());
        TimeSeries { times, values }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Timestamp of the first sample, if any.
    pub fn first_time(&self) -> Option<Seconds> {
        self.times.first().copied()
    }

    /// Index of the first sample whose timestamp equals `t` exactly.
    ///
    /// Timestamps compared here originate from the same logging backend, so exact
    /// floating-point equality is the intended join semantics (never interpolation).
    pub fn index_at(&self, t: Seconds) -> Option<usize> {
        self.times.iter().position(|&ts| ts == t)
    }

    /// Value of the first sample whose timestamp equals `t` exactly.
    pub fn value_at(&self, t: Seconds) -> Option<&T> {
        self.index_at(t).map(|i| &self.values[i])
    }

    /// Value of the last sample whose timestamp is `≤ t` (nearest-preceding join).
    ///
    /// Return
    /// ----------
    /// * `Some((timestamp, value))` of the rightmost sample with `t - timestamp ≥ 0`,
    /// * `None` if every sample is later than `t`.
    pub fn last_at_or_before(&self, t: Seconds) -> Option<(Seconds, &T)> {
        let n = self.times.partition_point(|&ts| ts <= t);
        if n == 0 {
            None
        } else {
            Some((self.times[n - 1], &self.values[n - 1]))
        }
    }
}

/// One logged variable as returned by the archive: scalar or vector samples.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveSeries {
    /// One float per timestamp.
    Scalar(TimeSeries<f64>),
    /// One float array per timestamp.
    Vector(TimeSeries<Vec<f64>>),
}

impl ArchiveSeries {
    /// Borrow the series as scalar-per-sample, failing with the variable name
    /// in the diagnostics if the payload shape does not match.
    pub fn scalar(&self, variable: &str) -> Result<&TimeSeries<f64>, BwsError> {
        match self {
            ArchiveSeries::Scalar(s) => Ok(s),
            ArchiveSeries::Vector(_) => Err(BwsError::SeriesShape(variable.to_string())),
        }
    }

    /// Borrow the series as vector-per-sample, failing with the variable name
    /// in the diagnostics if the payload shape does not match.
    pub fn vector(&self, variable: &str) -> Result<&TimeSeries<Vec<f64>>, BwsError> {
        match self {
            ArchiveSeries::Vector(s) => Ok(s),
            ArchiveSeries::Scalar(_) => Err(BwsError::SeriesShape(variable.to_string())),
        }
    }

    /// Consume the series as scalar-per-sample.
    pub fn into_scalar(self, variable: &str) -> Result<TimeSeries<f64>, BwsError> {
        match self {
            ArchiveSeries::Scalar(s) => Ok(s),
            ArchiveSeries::Vector(_) => Err(BwsError::SeriesShape(variable.to_string())),
        }
    }
}
