//! # Logging-service collaborator interface
//!
//! The reconstruction core never talks to the logging backend directly: it consumes
//! two abstract capabilities, wildcard **name search** ([`VariableSearch`]) and bulk
//! **time-range fetch** ([`ArchiveReader`]). Any Timber/CALS-style client can
//! implement both; the core owns all retry and validation logic on top of them.
//!
//! This module also carries the instrument's variable-name conventions: the wildcard
//! pattern families used to discover the logged variables of one wire scanner, and
//! the hardcoded per-beam name table retained purely as a consistency check against
//! naming drift.

use crate::bws_errors::BwsError;
use crate::constants::{ArchiveData, Seconds};
use crate::dataset::{Beam, Direction, Plane};

/// Wildcard variable-name lookup, `%`-style patterns.
pub trait VariableSearch {
    fn search(&self, pattern: &str) -> Result<Vec<String>, BwsError>;
}

/// Bulk time-range fetch of logged variables, unix-time seconds.
pub trait ArchiveReader {
    fn get(&self, names: &[String], t1: Seconds, t2: Seconds) -> Result<ArchiveData, BwsError>;
}

/// Variable logging the reference beam energy, shared by both beams.
pub const ENERGY_VARIABLE: &str = "LHC.BOFSU:OFC_ENERGY";

/// Resolve the single variable name matching `pattern`.
///
/// Exactly one match is required. Silently picking the first of several matches
/// would corrupt the physics pipeline the day the instrument's naming convention
/// changes, so zero or multiple matches fail with
/// [`BwsError::AmbiguousVariable`] carrying the full match set for diagnostics.
///
/// Arguments
/// -----------------
/// * `search`: the name-search capability.
/// * `pattern`: a wildcard pattern, e.g. `%LHC%BWS%B1H%NB_GATES%`.
///
/// Return
/// ----------
/// * The unique matching variable name.
pub fn resolve_variable(
    search: &impl VariableSearch,
    pattern: &str,
) -> Result<String, BwsError> {
    let mut matches = search.search(pattern)?;
    if matches.len() != 1 {
        return Err(BwsError::AmbiguousVariable {
            pattern: pattern.to_string(),
            matches,
        });
    }
    Ok(matches.remove(0))
}

/// Wildcard pattern families gathering every wire-scanner variable of one beam.
pub(crate) fn gather_patterns(beam: Beam) -> [String; 6] {
    [
        "NB_GATES",
        "BUNCH_SELECTION",
        "PROF_POSITION_",
        "PROF_DATA_",
        "BETA",
        "EMITTANCE_NORM",
    ]
    .map(|family| format!("%LHC%BWS%{beam}%{family}%"))
}

/// The six exact-match patterns selecting one plane/direction channel set.
#[derive(Debug, Clone)]
pub(crate) struct ChannelPatterns {
    pub gate: String,
    pub bunch: String,
    pub beta: String,
    pub emit: String,
    pub position: String,
    pub amplitude: String,
}

impl ChannelPatterns {
    /// Build the patterns for one `(beam, plane, direction)` channel set.
    ///
    /// The search capability reports which physical wire is in use, so the core
    /// never hardcodes the wire number: the patterns below must each resolve to
    /// exactly one logged variable.
    pub fn new(beam: Beam, plane: Plane, direction: Direction) -> Self {
        let name = format!("%LHC%BWS%{beam}{plane}");
        ChannelPatterns {
            gate: format!("{name}%NB_GATES%"),
            bunch: format!("{name}%BUNCH_SELECTION%"),
            beta: format!("{name}%{direction}%BETA%"),
            emit: format!("{name}%{direction}%EMITTANCE_NORM%"),
            position: format!("{name}%PROF_POSITION%{direction}%"),
            amplitude: format!("{name}%PROF_DATA%{direction}%"),
        }
    }
}

/// Hardcoded wire-scanner variable names for one beam.
///
/// The search-based resolver is the source of truth; this table only backs the
/// naming-drift consistency check in [`check_variable_names`].
pub fn known_variables(beam: Beam) -> &'static [&'static str] {
    match beam {
        Beam::B1 => &[
            "LHC.BWS.5R4.B1H2:NB_GATES",
            "LHC.BWS.5R4.B1V2:NB_GATES",
            "LHC.BWS.5R4.B1H2:BUNCH_SELECTION",
            "LHC.BWS.5R4.B1V2:BUNCH_SELECTION",
            "LHC.BWS.5R4.B1H.APP.IN:BETA",
            "LHC.BWS.5R4.B1H.APP.OUT:BETA",
            "LHC.BWS.5R4.B1V.APP.IN:BETA",
            "LHC.BWS.5R4.B1V.APP.OUT:BETA",
            "LHC.BWS.5R4.B1H.APP.IN:EMITTANCE_NORM",
            "LHC.BWS.5R4.B1H.APP.OUT:EMITTANCE_NORM",
            "LHC.BWS.5R4.B1V.APP.IN:EMITTANCE_NORM",
            "LHC.BWS.5R4.B1V.APP.OUT:EMITTANCE_NORM",
            "LHC.BWS.5R4.B1H2:PROF_POSITION_IN",
            "LHC.BWS.5R4.B1H2:PROF_POSITION_OUT",
            "LHC.BWS.5R4.B1V2:PROF_POSITION_IN",
            "LHC.BWS.5R4.B1V2:PROF_POSITION_OUT",
            "LHC.BWS.5R4.B1H2:PROF_DATA_IN",
            "LHC.BWS.5R4.B1H2:PROF_DATA_OUT",
            "LHC.BWS.5R4.B1V2:PROF_DATA_IN",
            "LHC.BWS.5R4.B1V2:PROF_DATA_OUT",
            "LHC.BWS.5R4.B1H2:GAIN",
            "LHC.BWS.5R4.B1V2:GAIN",
            ENERGY_VARIABLE,
        ],
        Beam::B2 => &[
            "LHC.BWS.5L4.B2H1:NB_GATES",
            "LHC.BWS.5L4.B2V2:NB_GATES",
            "LHC.BWS.5L4.B2H1:BUNCH_SELECTION",
            "LHC.BWS.5L4.B2V2:BUNCH_SELECTION",
            "LHC.BWS.5L4.B2H.APP.IN:BETA",
            "LHC.BWS.5L4.B2H.APP.OUT:BETA",
            "LHC.BWS.5L4.B2V.APP.IN:BETA",
            "LHC.BWS.5L4.B2V.APP.OUT:BETA",
            "LHC.BWS.5L4.B2H.APP.IN:EMITTANCE_NORM",
            "LHC.BWS.5L4.B2H.APP.OUT:EMITTANCE_NORM",
            "LHC.BWS.5L4.B2V.APP.IN:EMITTANCE_NORM",
            "LHC.BWS.5L4.B2V.APP.OUT:EMITTANCE_NORM",
            "LHC.BWS.5L4.B2H1:PROF_POSITION_IN",
            "LHC.BWS.5L4.B2H1:PROF_POSITION_OUT",
            "LHC.BWS.5L4.B2V2:PROF_POSITION_IN",
            "LHC.BWS.5L4.B2V2:PROF_POSITION_OUT",
            "LHC.BWS.5L4.B2H1:PROF_DATA_IN",
            "LHC.BWS.5L4.B2H1:PROF_DATA_OUT",
            "LHC.BWS.5L4.B2V2:PROF_DATA_IN",
            "LHC.BWS.5L4.B2V2:PROF_DATA_OUT",
            "LHC.BWS.5L4.B2H1:GAIN",
            "LHC.BWS.5L4.B2V2:GAIN",
            ENERGY_VARIABLE,
        ],
    }
}

/// Check a set of search-resolved names against the hardcoded table of `beam`.
///
/// Return
/// ----------
/// * The names absent from the table, one entry per discrepancy. An empty list
///   means the instrument's naming scheme is unchanged. Discrepancies are surfaced
///   on the dataset rather than aborting the run: the search result stays
///   authoritative, the table is advisory.
pub fn check_variable_names(beam: Beam, names: &[String]) -> Vec<String> {
    let known = known_variables(beam);
    names
        .iter()
        .filter(|name| !known.contains(&name.as_str()))
        .cloned()
        .collect()
}
