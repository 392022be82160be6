//! # bwscan
//!
//! Offline reconstruction of LHC wire-scanner (BWS) beam profiles and normalized
//! emittance fitting. Raw time-stamped signal streams are pulled from an abstract
//! logging collaborator, aligned into per-acquisition records, and each per-slot
//! amplitude curve is fitted with a Gaussian density model to derive a normalized
//! emittance with its uncertainty.
//!
//! Entry point: [`BwsDataset::reconstruct`].

pub mod align;
pub mod bunch_mask;
pub mod bws_errors;
pub mod constants;
pub mod dataset;
pub mod energy;
pub mod profile_fit;
pub mod timber;
pub mod timeseries;

pub use align::{Acquisition, ChannelStreams};
pub use bunch_mask::decode_bunch_selection;
pub use bws_errors::BwsError;
pub use constants::{ArchiveData, Seconds, Slot, SlotProfiles};
pub use dataset::{Beam, BwsDataset, Direction, Plane};
pub use energy::resolve_energy;
pub use profile_fit::{emitnorm, fit_profile, gauss_pdf, FitResult};
pub use timber::{resolve_variable, ArchiveReader, VariableSearch, ENERGY_VARIABLE};
pub use timeseries::{ArchiveSeries, TimeSeries};
