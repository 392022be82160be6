//! # Constants and type definitions for bwscan
//!
//! This module centralizes the **physical constants**, **instrument parameters**, and **common
//! type definitions** used throughout the `bwscan` library.
//!
//! ## Overview
//!
//! - Relativistic constants needed for normalized-emittance conversion
//! - Timing parameters of the energy staleness search
//! - Core type aliases used across the crate
//! - Container types for grouping fit results per bunch slot

use ahash::RandomState;
use std::collections::HashMap;

use crate::profile_fit::FitResult;
use crate::timeseries::ArchiveSeries;

// -------------------------------------------------------------------------------------------------
// Physical constants
// -------------------------------------------------------------------------------------------------

/// Number of seconds in a day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Proton rest mass in GeV/c²
pub const PROTON_MASS_GEV: f64 = 0.938272046;

/// Scaling factor from the raw `σ²/β` ratio to the canonical emittance unit (µm)
pub const EMIT_UNIT_SCALE: f64 = 1e-6;

// -------------------------------------------------------------------------------------------------
// Instrument parameters
// -------------------------------------------------------------------------------------------------

/// Number of bunch slots encoded per packed bunch-selection chunk
pub const SLOTS_PER_CHUNK: u32 = 32;

/// Backward extension step of the energy query window when the beam energy
/// has not been logged at the start of the requested interval
pub const ENERGY_BACKSTEP: Seconds = SECONDS_PER_DAY;

/// Maximum cumulative backward extension of the energy query window.
/// An energy sample older than this is considered stale and aborts the run.
pub const ENERGY_MAX_LOOKBACK: Seconds = 30.0 * SECONDS_PER_DAY;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Unix time in seconds
pub type Seconds = f64;
/// Beam energy in GeV
pub type Gev = f64;
/// Transverse position in millimeters
pub type Millimeter = f64;
/// Bunch slot index within a machine revolution
pub type Slot = u32;

/// Raw archive payload: logged variable name → time-stamped sample series
pub type ArchiveData = HashMap<String, ArchiveSeries, RandomState>;

/// Per-slot collections of fit results, ascending in acquisition time
pub type SlotProfiles = HashMap<Slot, Vec<FitResult>, RandomState>;
