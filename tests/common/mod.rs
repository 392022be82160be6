use std::f64::consts::PI;

use bwscan::{ArchiveData, ArchiveReader, BwsError, Seconds, TimeSeries, VariableSearch};

/// Minimal in-memory stand-in for the logging service: a fixed variable catalog
/// with `%`-wildcard search and a canned archive payload.
pub struct StubDb {
    pub catalog: Vec<String>,
    pub data: ArchiveData,
}

impl StubDb {
    pub fn new(catalog: &[&str], data: ArchiveData) -> Self {
        StubDb {
            catalog: catalog.iter().map(|s| s.to_string()).collect(),
            data,
        }
    }
}

impl VariableSearch for StubDb {
    fn search(&self, pattern: &str) -> Result<Vec<String>, BwsError> {
        Ok(self
            .catalog
            .iter()
            .filter(|name| wildcard_match(pattern, name))
            .cloned()
            .collect())
    }
}

impl ArchiveReader for StubDb {
    fn get(&self, names: &[String], _t1: Seconds, _t2: Seconds) -> Result<ArchiveData, BwsError> {
        Ok(names
            .iter()
            .filter_map(|name| self.data.get(name).map(|s| (name.clone(), s.clone())))
            .collect())
    }
}

/// `%`-wildcard match: the literal fragments of `pattern` must occur in `name`
/// in order (Timber-style search semantics, enough for the test catalog).
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let mut rest = name;
    let anchored = !pattern.starts_with('%');
    for (i, fragment) in pattern.split('%').filter(|f| !f.is_empty()).enumerate() {
        match rest.find(fragment) {
            Some(at) if !(anchored && i == 0 && at != 0) => {
                rest = &rest[at + fragment.len()..];
            }
            _ => return false,
        }
    }
    true
}

/// Gaussian density samples `scale·N(x; 0, sigma) + offset` over `position`.
pub fn gaussian_row(position: &[f64], sigma: f64, scale: f64, offset: f64) -> Vec<f64> {
    position
        .iter()
        .map(|&x| {
            scale * (-0.5 * (x / sigma) * (x / sigma)).exp() / (sigma * (2.0 * PI).sqrt()) + offset
        })
        .collect()
}

/// Shorthand for a scalar-per-sample series.
pub fn scalar(times: &[Seconds], values: &[f64]) -> bwscan::ArchiveSeries {
    bwscan::ArchiveSeries::Scalar(TimeSeries::new(times.to_vec(), values.to_vec()))
}

/// Shorthand for a vector-per-sample series.
pub fn vector(times: &[Seconds], values: &[Vec<f64>]) -> bwscan::ArchiveSeries {
    bwscan::ArchiveSeries::Vector(TimeSeries::new(times.to_vec(), values.to_vec()))
}
