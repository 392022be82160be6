//! # Stream alignment
//!
//! A wire-scanner pass is logged as several independently time-stamped variables:
//! gate counts, bunch-selection bitmasks, raw profile positions and amplitudes,
//! optics beta functions, reference emittances and the beam energy. This module
//! joins them into one ordered sequence of per-pass [`Acquisition`] records.
//!
//! Position, amplitude, gate count and bunch selection share the acquisition
//! timestamp. Beta and reference emittance are stamped by the application layer at
//! a different instant but, by instrument design, in the **same order** as the
//! position stream: the reference timestamp of the i-th acquisition is the i-th
//! beta timestamp. Energy is joined by nearest-preceding sample, never
//! interpolated.
//!
//! An acquisition that cannot be fully joined (missing sample, amplitude block of
//! the wrong size) is skipped with a warning and the run continues; alignment gaps
//! are local defects, not fatal ones.

use itertools::Itertools;
use log::warn;
use ordered_float::OrderedFloat;

use crate::bunch_mask::decode_bunch_selection;
use crate::bws_errors::BwsError;
use crate::constants::{Gev, Millimeter, Seconds, Slot};
use crate::timeseries::TimeSeries;

/// The seven raw streams feeding one plane/direction reconstruction.
#[derive(Debug, Clone, Default)]
pub struct ChannelStreams {
    /// Number of populated slots per acquisition.
    pub gate: TimeSeries<f64>,
    /// Packed bunch-selection chunks per acquisition.
    pub bunch: TimeSeries<Vec<f64>>,
    /// Beta function at the scanner, stamped on the reference timeline.
    pub beta: TimeSeries<f64>,
    /// Externally computed per-gate emittances, stamped on the reference timeline.
    pub emit: TimeSeries<Vec<f64>>,
    /// Wire positions of each pass, shared by all gates of the pass.
    pub position: TimeSeries<Vec<f64>>,
    /// Flattened amplitude samples of each pass, `gate · len(position)` values.
    pub amplitude: TimeSeries<Vec<f64>>,
    /// Beam energy, sparsely logged.
    pub energy: TimeSeries<f64>,
}

/// One wire-scanner pass with all streams joined.
///
/// Immutable after construction; row `i` of `amplitudes` belongs to `slots[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Acquisition {
    /// Acquisition timestamp (position-stream timeline).
    pub time: Seconds,
    /// Timestamp of the matched beta/emittance sample.
    pub time_reference: Seconds,
    /// Wire sampling positions \[mm\], shared across all slots of this pass.
    pub position: Vec<Millimeter>,
    /// Number of populated slots captured in this pass.
    pub gate_count: usize,
    /// Decoded bunch slots, ascending; pairs 1:1 with amplitude rows.
    pub slots: Vec<Slot>,
    /// Amplitude samples, `gate_count` rows of `position.len()` columns.
    pub amplitudes: Vec<Vec<f64>>,
    /// Beta function \[m\] at the scanner.
    pub beta: f64,
    /// Externally computed reference emittance per gate row.
    pub emit_reference: Vec<f64>,
    /// Beam energy \[GeV\] resolved at or before `time`.
    pub energy: Gev,
}

impl Acquisition {
    /// Iterate over `(slot, amplitude_row_index)` pairs.
    ///
    /// The i-th decoded slot pairs with the i-th amplitude row; if the decoded
    /// slot set and the gate count disagree, the shorter of the two wins (zip
    /// truncation, preserved from the instrument's historical behavior).
    pub fn slot_rows(&self) -> impl Iterator<Item = (Slot, usize)> + '_ {
        self.slots
            .iter()
            .copied()
            .zip(0..self.amplitudes.len())
    }
}

/// Join the raw streams into per-pass records, ascending in acquisition time.
///
/// Acquisitions that cannot be joined are skipped with a warning; the returned
/// sequence only contains fully aligned records.
///
/// Arguments
/// -----------------
/// * `streams`: the decoded raw streams of one plane/direction channel set.
///
/// Return
/// ----------
/// * The aligned acquisitions, strictly sorted by ascending timestamp regardless
///   of the raw streams' internal storage order.
pub fn align(streams: &ChannelStreams) -> Vec<Acquisition> {
    let timestamps = streams
        .position
        .times
        .iter()
        .map(|&t| OrderedFloat(t))
        .sorted()
        .dedup();

    let mut acquisitions = Vec::with_capacity(streams.position.len());
    for t in timestamps {
        match align_one(streams, t.into_inner()) {
            Ok(acq) => acquisitions.push(acq),
            Err(err) => warn!("skipping acquisition: {err}"),
        }
    }
    acquisitions
}

/// Join all streams at one position-stream timestamp.
fn align_one(streams: &ChannelStreams, t: Seconds) -> Result<Acquisition, BwsError> {
    let gap = |channel: &'static str| BwsError::AlignmentGap { time: t, channel };

    let pos_idx = streams
        .position
        .index_at(t)
        .ok_or_else(|| gap("position"))?;
    let position = &streams.position.values[pos_idx];

    let gate_count = *streams.gate.value_at(t).ok_or_else(|| gap("gate count"))? as usize;
    let chunks = streams.bunch.value_at(t).ok_or_else(|| gap("bunch selection"))?;
    let slots = decode_bunch_selection(chunks);

    let flat = streams
        .amplitude
        .value_at(t)
        .ok_or_else(|| gap("amplitude"))?;
    if position.is_empty() || flat.len() != gate_count * position.len() {
        return Err(gap("amplitude block size"));
    }
    let amplitudes: Vec<Vec<f64>> = flat
        .chunks_exact(position.len())
        .map(|row| row.to_vec())
        .collect();

    // Reference timeline: same ordinal index as the position stream.
    let time_reference = *streams.beta.times.get(pos_idx).ok_or_else(|| gap("beta"))?;
    let beta = *streams.beta.values.get(pos_idx).ok_or_else(|| gap("beta"))?;
    let emit_reference = streams
        .emit
        .value_at(time_reference)
        .ok_or_else(|| gap("reference emittance"))?
        .clone();
    if emit_reference.len() < gate_count {
        return Err(gap("reference emittance count"));
    }

    let (_, &energy) = streams
        .energy
        .last_at_or_before(t)
        .ok_or_else(|| gap("energy"))?;

    Ok(Acquisition {
        time: t,
        time_reference,
        position: position.clone(),
        gate_count,
        slots,
        amplitudes,
        beta,
        emit_reference,
        energy,
    })
}

#[cfg(test)]
mod align_test {
    use super::*;

    /// Two acquisitions stored in descending time order, one gate each.
    fn shuffled_streams() -> ChannelStreams {
        ChannelStreams {
            gate: TimeSeries {
                times: vec![200.0, 100.0],
                values: vec![1.0, 1.0],
            },
            bunch: TimeSeries {
                times: vec![200.0, 100.0],
                values: vec![vec![2.0], vec![1.0]],
            },
            beta: TimeSeries {
                times: vec![201.5, 101.5],
                values: vec![80.0, 90.0],
            },
            emit: TimeSeries {
                times: vec![201.5, 101.5],
                values: vec![vec![2.0], vec![3.0]],
            },
            position: TimeSeries {
                times: vec![200.0, 100.0],
                values: vec![vec![-1.0, 0.0, 1.0], vec![-1.0, 0.0, 1.0]],
            },
            amplitude: TimeSeries {
                times: vec![200.0, 100.0],
                values: vec![vec![0.1, 0.8, 0.1], vec![0.2, 0.6, 0.2]],
            },
            energy: TimeSeries {
                times: vec![50.0],
                values: vec![450.0],
            },
        }
    }

    #[test]
    fn test_ascending_time_regardless_of_storage_order() {
        let acqs = align(&shuffled_streams());
        assert_eq!(acqs.len(), 2);
        assert_eq!(acqs[0].time, 100.0);
        assert_eq!(acqs[1].time, 200.0);
        assert_eq!(acqs[0].time_reference, 101.5);
        assert_eq!(acqs[0].beta, 90.0);
        assert_eq!(acqs[0].slots, vec![0]);
        assert_eq!(acqs[1].slots, vec![1]);
    }

    #[test]
    fn test_nearest_preceding_energy_join() {
        let mut streams = shuffled_streams();
        streams.energy = TimeSeries {
            times: vec![50.0, 150.0],
            values: vec![450.0, 6500.0],
        };
        let acqs = align(&streams);
        assert_eq!(acqs[0].energy, 450.0);
        assert_eq!(acqs[1].energy, 6500.0);
    }

    #[test]
    fn test_missing_gate_sample_skips_only_that_acquisition() {
        let mut streams = shuffled_streams();
        streams.gate = TimeSeries {
            times: vec![200.0],
            values: vec![1.0],
        };
        let acqs = align(&streams);
        assert_eq!(acqs.len(), 1);
        assert_eq!(acqs[0].time, 200.0);
    }

    /// A beta stream with fewer values than timestamps must skip the orphaned
    /// ordinal, not the whole channel.
    #[test]
    fn test_truncated_beta_values_skip_that_acquisition() {
        let mut streams = shuffled_streams();
        streams.beta.values.truncate(1);
        let acqs = align(&streams);
        assert_eq!(acqs.len(), 1);
        assert_eq!(acqs[0].time, 200.0);
        assert_eq!(acqs[0].beta, 80.0);
    }

    #[test]
    fn test_amplitude_size_mismatch_skips() {
        let mut streams = shuffled_streams();
        streams.amplitude.values[1] = vec![0.2, 0.6];
        let acqs = align(&streams);
        assert_eq!(acqs.len(), 1);
        assert_eq!(acqs[0].time, 200.0);
    }

    #[test]
    fn test_multi_gate_reshape() {
        let mut streams = shuffled_streams();
        streams.gate.values = vec![2.0, 1.0];
        streams.bunch.values = vec![vec![3.0], vec![1.0]];
        streams.amplitude.values[0] = vec![0.1, 0.8, 0.1, 0.2, 0.6, 0.2];
        streams.emit.values[0] = vec![2.0, 2.1];
        let acqs = align(&streams);
        let multi = &acqs[1];
        assert_eq!(multi.gate_count, 2);
        assert_eq!(multi.slots, vec![0, 1]);
        assert_eq!(multi.amplitudes[1], vec![0.2, 0.6, 0.2]);
        let rows: Vec<_> = multi.slot_rows().collect();
        assert_eq!(rows, vec![(0, 0), (1, 1)]);
    }
}
