//! 32-bit window arithmetic over a 256-bit storage word.
//!
//! The exchange packs markPNS, oraclePNS, and the price timestamps into one
//! 256-bit word. Fields are observed to sit in 32-bit windows at 32-bit
//! strides; widening the window is a single constant change if a future
//! upgrade alters the packing.

use alloy::primitives::U256;

/// Observed width of a packed field.
pub const FIELD_WINDOW_BITS: usize = 32;

/// Candidate bit offsets at the 32-bit stride.
pub fn candidate_offsets() -> impl Iterator<Item = usize> {
    (0..256).step_by(FIELD_WINDOW_BITS)
}

/// Read the 32-bit window at `bit_offset`.
pub fn read_window(word: U256, bit_offset: usize) -> u32 {
    ((word >> bit_offset) & U256::from(u32::MAX)).to::<u32>()
}

/// Write `value` into the 32-bit window at `bit_offset`, preserving every
/// other bit exactly.
pub fn write_window(word: U256, bit_offset: usize, value: u32) -> U256 {
    let mask = U256::from(u32::MAX) << bit_offset;
    (word & !mask) | (U256::from(value) << bit_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_words() -> Vec<U256> {
        vec![
            U256::ZERO,
            U256::MAX,
            U256::from_limbs([0x0123456789abcdef, 0xfedcba9876543210, 0xdeadbeefcafef00d, 0x0011223344556677]),
            U256::from(1u64) << 255,
        ]
    }

    #[test]
    fn test_read_write_round_trip() {
        for word in sample_words() {
            for offset in candidate_offsets() {
                let value = read_window(word, offset);
                assert_eq!(write_window(word, offset, value), word);
            }
        }
    }

    #[test]
    fn test_write_preserves_all_other_bits() {
        for word in sample_words() {
            for offset in candidate_offsets() {
                let written = write_window(word, offset, 0x5AFE_C0DE);
                assert_eq!(read_window(written, offset), 0x5AFE_C0DE);

                // Every other window is untouched, bit-exactly.
                for other in candidate_offsets().filter(|&o| o != offset) {
                    assert_eq!(
                        read_window(written, other),
                        read_window(word, other),
                        "offset {offset} clobbered window {other}"
                    );
                }

                // Restoring the original value restores the whole word.
                let restored = write_window(written, offset, read_window(word, offset));
                assert_eq!(restored, word);
            }
        }
    }

    #[test]
    fn test_candidate_offsets_cover_word() {
        let offsets: Vec<usize> = candidate_offsets().collect();
        assert_eq!(offsets, vec![0, 32, 64, 96, 128, 160, 192, 224]);
    }
}
