//! # BWS dataset façade
//!
//! [`BwsDataset`] wires the whole reconstruction pipeline together: variable-name
//! discovery and validation, bulk archive fetch, energy staleness resolution,
//! stream alignment and per-slot Gaussian fitting, for the two planes and two wire
//! directions of one beam over one bounded time window.
//!
//! [`BwsDataset::reconstruct`] is the sole public entry point; callers read
//! [`BwsDataset::profiles`] to obtain the per-slot [`FitResult`] sequences for
//! plotting or export. The logging collaborator is an explicit required parameter:
//! given the same collaborator responses, reconstruction is fully deterministic.
//!
//! ## Example
//!
//! ```rust, no_run
//! use bwscan::{ArchiveReader, BwsDataset, Direction, Plane, VariableSearch};
//!
//! fn inspect(db: &(impl VariableSearch + ArchiveReader)) {
//!     let dataset = BwsDataset::reconstruct("B1", 1.47199e9, 1.47200e9, db).unwrap();
//!     for (slot, fits) in &dataset.profiles[&(Plane::Horizontal, Direction::In)] {
//!         for fit in fits.iter().filter(|f| f.is_valid()) {
//!             println!("slot {slot}: t = {}, emit = {:.3} um", fit.time, fit.emit_gauss);
//!         }
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::warn;

use crate::align::{align, ChannelStreams};
use crate::bws_errors::BwsError;
use crate::constants::{ArchiveData, Seconds, SlotProfiles};
use crate::energy::resolve_energy;
use crate::profile_fit::fit_profile;
use crate::timber::{
    check_variable_names, gather_patterns, resolve_variable, ArchiveReader, ChannelPatterns,
    VariableSearch,
};
use crate::timeseries::TimeSeries;

/// LHC beam identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Beam {
    B1,
    B2,
}

impl fmt::Display for Beam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Beam::B1 => write!(f, "B1"),
            Beam::B2 => write!(f, "B2"),
        }
    }
}

impl FromStr for Beam {
    type Err = BwsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "B1" => Ok(Beam::B1),
            "B2" => Ok(Beam::B2),
            _ => Err(BwsError::InvalidBeam(s.to_string())),
        }
    }
}

/// Transverse measurement plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    Horizontal,
    Vertical,
}

impl Plane {
    pub const ALL: [Plane; 2] = [Plane::Horizontal, Plane::Vertical];
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Horizontal => write!(f, "H"),
            Plane::Vertical => write!(f, "V"),
        }
    }
}

/// Wire travel direction of one scan: moving into or out of the beam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::In, Direction::Out];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "IN"),
            Direction::Out => write!(f, "OUT"),
        }
    }
}

/// Reconstructed wire-scanner dataset of one beam over one time window.
#[derive(Debug, Clone)]
pub struct BwsDataset {
    pub beam: Beam,
    pub time_start: Seconds,
    pub time_end: Seconds,
    /// Search-resolved variable names absent from the hardcoded table; empty when
    /// the instrument's naming scheme is unchanged.
    pub variable_discrepancies: Vec<String>,
    /// Per plane/direction, the fit results grouped by bunch slot, each sequence
    /// ascending in acquisition time.
    pub profiles: HashMap<(Plane, Direction), SlotProfiles>,
}

impl BwsDataset {
    /// Run the full reconstruction pipeline over `[t1, t2]`.
    ///
    /// For each plane/direction the six channel variables are resolved by wildcard
    /// search (exactly-one-match rule), the raw streams aligned into acquisitions,
    /// and every `(acquisition, slot)` amplitude row fitted. Localized failures
    /// (alignment gaps, diverging fits) are skipped or recorded as invalid and the
    /// run continues: a partially successful dataset is preferable to none.
    ///
    /// Arguments
    /// -----------------
    /// * `beam`: `"B1"` or `"B2"`.
    /// * `t1`, `t2`: start and end of the window, unix-time seconds.
    /// * `db`: the logging collaborator, providing name search and bulk fetch.
    ///
    /// Return
    /// ----------
    /// * The reconstructed [`BwsDataset`], or the first fatal error
    ///   ([`BwsError::InvalidTimeRange`], [`BwsError::InvalidBeam`],
    ///   [`BwsError::AmbiguousVariable`], [`BwsError::StaleData`], or a
    ///   collaborator failure).
    pub fn reconstruct<D>(beam: &str, t1: Seconds, t2: Seconds, db: &D) -> Result<Self, BwsError>
    where
        D: VariableSearch + ArchiveReader,
    {
        if t2 < t1 {
            return Err(BwsError::InvalidTimeRange { start: t1, end: t2 });
        }
        let beam = Beam::from_str(beam)?;

        let mut names = Vec::new();
        for pattern in gather_patterns(beam) {
            names.extend(db.search(&pattern)?);
        }
        let variable_discrepancies = check_variable_names(beam, &names);
        for name in &variable_discrepancies {
            warn!("variable name {name} changed, not in the hardcoded {beam} table");
        }

        let data = db.get(&names, t1, t2)?;
        let energy = resolve_energy(db, t1, t2)?;

        let mut profiles = HashMap::new();
        for plane in Plane::ALL {
            for direction in Direction::ALL {
                let streams =
                    extract_channel_streams(beam, plane, direction, &data, energy.clone(), db)?;
                profiles.insert((plane, direction), fit_channel(&streams));
            }
        }

        Ok(BwsDataset {
            beam,
            time_start: t1,
            time_end: t2,
            variable_discrepancies,
            profiles,
        })
    }
}

/// Align one channel set and fit every `(acquisition, slot)` pair, grouped by slot.
fn fit_channel(streams: &ChannelStreams) -> SlotProfiles {
    let mut by_slot = SlotProfiles::default();
    for acquisition in align(streams) {
        for (slot, row_index) in acquisition.slot_rows() {
            by_slot
                .entry(slot)
                .or_default()
                .push(fit_profile(&acquisition, slot, row_index));
        }
    }
    by_slot
}

/// Resolve the six channel variables of `(beam, plane, direction)` and pull their
/// streams out of the bulk-fetched archive data.
fn extract_channel_streams(
    beam: Beam,
    plane: Plane,
    direction: Direction,
    data: &ArchiveData,
    energy: TimeSeries<f64>,
    search: &impl VariableSearch,
) -> Result<ChannelStreams, BwsError> {
    fn lookup<'a>(
        search: &impl VariableSearch,
        data: &'a ArchiveData,
        pattern: &str,
    ) -> Result<(String, &'a crate::timeseries::ArchiveSeries), BwsError> {
        let name = resolve_variable(search, pattern)?;
        let series = data
            .get(&name)
            .ok_or_else(|| BwsError::MissingVariable(name.clone()))?;
        Ok((name, series))
    }

    let patterns = ChannelPatterns::new(beam, plane, direction);
    let (name, gate) = lookup(search, data, &patterns.gate)?;
    let gate = gate.scalar(&name)?.clone();
    let (name, bunch) = lookup(search, data, &patterns.bunch)?;
    let bunch = bunch.vector(&name)?.clone();
    let (name, beta) = lookup(search, data, &patterns.beta)?;
    let beta = beta.scalar(&name)?.clone();
    let (name, emit) = lookup(search, data, &patterns.emit)?;
    let emit = emit.vector(&name)?.clone();
    let (name, position) = lookup(search, data, &patterns.position)?;
    let position = position.vector(&name)?.clone();
    let (name, amplitude) = lookup(search, data, &patterns.amplitude)?;
    let amplitude = amplitude.vector(&name)?.clone();

    Ok(ChannelStreams {
        gate,
        bunch,
        beta,
        emit,
        position,
        amplitude,
        energy,
    })
}
