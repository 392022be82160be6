//! # Bunch-selection bitmask decoding
//!
//! The wire scanner logs which bunch slots were selected for a scan as a packed
//! bitmask: a sequence of raw numeric chunks, each carrying 32 slot flags. Chunk `i`
//! covers slots `[32·i, 32·i + 32)`, with the least-significant bit mapping to the
//! lowest slot.

use crate::constants::{Slot, SLOTS_PER_CHUNK};

/// Decode a packed bunch-selection value into the ordered set of populated slots.
///
/// Each chunk is truncated toward zero and masked to its low 32 bits before the
/// bits are inspected. This coercion of non-integral or negative raw values is the
/// instrument's wire behavior and is preserved intentionally. A zero chunk emits no
/// slots but still advances the slot counter by 32.
///
/// Arguments
/// -----------------
/// * `chunks`: the raw bunch-selection chunks, in logging order.
///
/// Return
/// ----------
/// * The populated slot indices in ascending order, e.g. `[0, 20, 80]`.
pub fn decode_bunch_selection(chunks: &[f64]) -> Vec<Slot> {
    let mut slots = Vec::new();
    for (i, &chunk) in chunks.iter().enumerate() {
        if chunk == 0.0 {
            continue;
        }
        let bits = (chunk.trunc() as i64 & 0xffff_ffff) as u32;
        for p in 0..SLOTS_PER_CHUNK {
            if bits & (1 << p) != 0 {
                slots.push(SLOTS_PER_CHUNK * i as Slot + p);
            }
        }
    }
    slots
}

#[cfg(test)]
mod bunch_mask_test {
    use super::*;

    /// Pack a set of ascending slot indices into `n_chunks` 32-bit chunks.
    fn encode(slots: &[Slot], n_chunks: usize) -> Vec<f64> {
        let mut chunks = vec![0u32; n_chunks];
        for &s in slots {
            chunks[(s / 32) as usize] |= 1 << (s % 32);
        }
        chunks.iter().map(|&c| c as f64).collect()
    }

    #[test]
    fn test_round_trip() {
        let slots = vec![0, 1, 20, 31, 32, 63, 80, 127];
        assert_eq!(decode_bunch_selection(&encode(&slots, 4)), slots);
    }

    #[test]
    fn test_all_zero_chunks() {
        assert_eq!(decode_bunch_selection(&[0.0, 0.0, 0.0]), Vec::<Slot>::new());
        assert_eq!(decode_bunch_selection(&[]), Vec::<Slot>::new());
    }

    #[test]
    fn test_zero_chunk_still_advances_offset() {
        // slot 64 sits in the third chunk even though the second is empty
        assert_eq!(decode_bunch_selection(&[1.0, 0.0, 1.0]), vec![0, 64]);
    }

    #[test]
    fn test_lossy_truncation() {
        // non-integral chunks are truncated toward zero
        assert_eq!(decode_bunch_selection(&[5.9]), vec![0, 2]);
        // negative chunks keep their low 32 two's-complement bits
        let all = decode_bunch_selection(&[-1.0]);
        assert_eq!(all, (0..32).collect::<Vec<_>>());
    }
}
