//! Fixed-width palette index packing for 16×16×16 sections.
//!
//! Two schemes exist in stored data:
//!
//! - [`Packing::Spanning`] (data versions before 2529): indices form one
//!   contiguous little-endian bit stream, so a value may straddle two words.
//! - [`Packing::Aligned`] (2529 and later): each word holds
//!   `floor(64 / bits)` indices starting at bit 0; leftover high bits are
//!   padding and a value never crosses a word boundary.
//!
//! Cell order is `index = y * 256 + z * 16 + x`. In both schemes the bit width
//! of a stored array is recovered from its length as `words.len() >> 6`.
//! This is exact for spanning arrays (64 words per bit). For aligned arrays it
//! matches every width up to 10 bits; 11 and 12 bits share a length of 820
//! words, so [`PackedArrayCodec::validate`] settles that case from the
//! palette size.

use crate::palette::PaletteTable;

/// Cells in one section.
pub const SECTION_VOLUME: usize = 4096;

/// Narrowest width the stored format ever uses.
pub const MIN_BITS: u32 = 4;

/// Widest width accepted when recovering it from an array length.
const MAX_BITS: u32 = 32;

/// Errors from packed index arrays.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A packed array is present but has no words. Sections with a single
    /// palette entry omit the array entirely instead.
    #[error("packed array is present but empty")]
    EmptyArray,

    /// The array length does not correspond to any usable bit width.
    #[error("packed array length {0} does not map to a bit width")]
    InvalidLength(usize),

    /// The recovered width cannot address every palette entry.
    #[error("{bits}-bit indices cannot address a palette of {palette_len}")]
    Undersized { bits: u32, palette_len: usize },

    /// Fewer words than the bit width requires.
    #[error("packed array truncated: expected {expected} words, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// A value does not fit in the array's bit width.
    #[error("value {value} does not fit in {bits} bits")]
    ValueTooWide { value: u32, bits: u32 },

    /// A stored index points past the end of its palette.
    #[error("palette index {index} out of range for palette of {palette_len}")]
    IndexOutOfRange { index: u32, palette_len: usize },

    /// A remap table has no entry for a stored index.
    #[error("remap table has no entry for index {0}")]
    RemapMissing(u32),
}

/// Returns `max(4, ceil(log2(len)))`, the width used for a palette of `len`.
pub fn bits_for_palette(len: usize) -> u32 {
    min_bits_for(len).max(MIN_BITS)
}

/// `ceil(log2(len))` with no floor.
fn min_bits_for(len: usize) -> u32 {
    usize::BITS - len.saturating_sub(1).leading_zeros()
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// How indices are laid out across words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Packing {
    /// Contiguous bit stream; values may cross word boundaries.
    Spanning,
    /// Whole values per word; padding bits at the top of each word.
    Aligned,
}

/// Reads, writes and re-widths packed palette index arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackedArrayCodec {
    packing: Packing,
}

impl PackedArrayCodec {
    pub const SPANNING: Self = Self::new(Packing::Spanning);
    pub const ALIGNED: Self = Self::new(Packing::Aligned);

    pub const fn new(packing: Packing) -> Self {
        Self { packing }
    }

    pub fn packing(&self) -> Packing {
        self.packing
    }

    /// Number of words a section array of `bits` width occupies.
    pub fn word_count(&self, bits: u32) -> usize {
        match self.packing {
            Packing::Spanning => SECTION_VOLUME * bits as usize / 64,
            Packing::Aligned => SECTION_VOLUME.div_ceil((64 / bits) as usize),
        }
    }

    /// Recovers the bit width of a stored array from its length.
    pub fn bits_of(&self, words: &[i64]) -> Result<u32, CodecError> {
        if words.is_empty() {
            return Err(CodecError::EmptyArray);
        }
        let bits = (words.len() >> 6) as u32;
        if bits == 0 || bits > MAX_BITS {
            return Err(CodecError::InvalidLength(words.len()));
        }
        Ok(bits)
    }

    /// Checks that `words` can hold every index of a palette of `palette_len`
    /// and returns the array's bit width.
    pub fn validate(&self, words: &[i64], palette_len: usize) -> Result<u32, CodecError> {
        let mut bits = self.bits_of(words)?;
        let needed = bits_for_palette(palette_len);
        if needed < bits && words.len() == self.word_count(needed) {
            bits = needed;
        }
        if bits < min_bits_for(palette_len) {
            return Err(CodecError::Undersized { bits, palette_len });
        }
        let expected = self.word_count(bits);
        if words.len() < expected {
            return Err(CodecError::Truncated {
                expected,
                actual: words.len(),
            });
        }
        Ok(bits)
    }

    /// Palette index stored for `cell`.
    pub fn read(&self, cell: usize, words: &[i64]) -> Result<u32, CodecError> {
        let bits = self.bits_of(words)?;
        self.read_bits(cell, words, bits)
    }

    /// Stores `value` for `cell`, leaving every other cell untouched.
    pub fn write(&self, cell: usize, value: u32, words: &mut [i64]) -> Result<(), CodecError> {
        let bits = self.bits_of(words)?;
        self.write_bits(cell, value, words, bits)
    }

    /// Re-encodes `words` for `new_palette`, optionally translating each
    /// stored index through `remap` (old index → new index).
    ///
    /// The new width is `bits_for_palette(new_palette.len())`. When it equals
    /// the current width the array is rewritten in place and returned, so an
    /// identity repack yields the input bit for bit, padding included.
    pub fn repack(
        &self,
        old_palette: &PaletteTable,
        new_palette: &PaletteTable,
        mut words: Vec<i64>,
        remap: Option<&[u32]>,
    ) -> Result<Vec<i64>, CodecError> {
        let old_bits = self.validate(&words, old_palette.len())?;
        let new_bits = bits_for_palette(new_palette.len());

        let mut fresh = (new_bits != old_bits).then(|| vec![0i64; self.word_count(new_bits)]);
        for cell in 0..SECTION_VOLUME {
            let index = self.read_bits(cell, &words, old_bits)?;
            if index as usize >= old_palette.len() {
                return Err(CodecError::IndexOutOfRange {
                    index,
                    palette_len: old_palette.len(),
                });
            }
            let mapped = match remap {
                Some(table) => *table
                    .get(index as usize)
                    .ok_or(CodecError::RemapMissing(index))?,
                None => index,
            };
            if mapped as usize >= new_palette.len() {
                return Err(CodecError::IndexOutOfRange {
                    index: mapped,
                    palette_len: new_palette.len(),
                });
            }
            match fresh.as_mut() {
                Some(out) => self.write_bits(cell, mapped, out, new_bits)?,
                None => self.write_bits(cell, mapped, &mut words, new_bits)?,
            }
        }
        Ok(fresh.unwrap_or(words))
    }

    /// Builds an array of `bits` width with every cell set to `value`.
    pub fn filled(&self, bits: u32, value: u32) -> Result<Vec<i64>, CodecError> {
        let mut words = vec![0i64; self.word_count(bits)];
        for cell in 0..SECTION_VOLUME {
            self.write_bits(cell, value, &mut words, bits)?;
        }
        Ok(words)
    }

    /// Reads `cell` assuming `bits` width, skipping the length derivation.
    pub fn read_bits(&self, cell: usize, words: &[i64], bits: u32) -> Result<u32, CodecError> {
        let (word, shift) = self.locate(cell, bits);
        let truncated = || CodecError::Truncated {
            expected: self.word_count(bits),
            actual: words.len(),
        };
        let low = *words.get(word).ok_or_else(truncated)? as u64;
        let mut value = low >> shift;
        if self.packing == Packing::Spanning && shift + bits > 64 {
            let high = *words.get(word + 1).ok_or_else(truncated)? as u64;
            value |= high << (64 - shift);
        }
        Ok((value & mask(bits)) as u32)
    }

    fn write_bits(&self, cell: usize, value: u32, words: &mut [i64], bits: u32) -> Result<(), CodecError> {
        if u64::from(value) > mask(bits) {
            return Err(CodecError::ValueTooWide { value, bits });
        }
        let expected = self.word_count(bits);
        let actual = words.len();
        let (word, shift) = self.locate(cell, bits);
        let spills = self.packing == Packing::Spanning && shift + bits > 64;
        if word >= actual || (spills && word + 1 >= actual) {
            return Err(CodecError::Truncated { expected, actual });
        }

        let value = u64::from(value);
        let low = words[word] as u64;
        words[word] = ((low & !(mask(bits) << shift)) | (value << shift)) as i64;
        if spills {
            let high_bits = shift + bits - 64;
            let high = words[word + 1] as u64;
            words[word + 1] = ((high & !mask(high_bits)) | (value >> (64 - shift))) as i64;
        }
        Ok(())
    }

    /// Word index and bit offset of `cell`.
    fn locate(&self, cell: usize, bits: u32) -> (usize, u32) {
        match self.packing {
            Packing::Spanning => {
                let bit = cell * bits as usize;
                (bit / 64, (bit % 64) as u32)
            }
            Packing::Aligned => {
                let per_word = (64 / bits) as usize;
                (cell / per_word, (cell % per_word) as u32 * bits)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::BlockState;

    fn palette_of(len: usize) -> PaletteTable {
        PaletteTable::new((0..len).map(|i| BlockState::new(format!("test:block_{i}"))))
    }

    fn sample_value(cell: usize, palette_len: usize) -> u32 {
        ((cell * 7 + cell / 13) % palette_len) as u32
    }

    #[test]
    fn test_bits_for_palette() {
        assert_eq!(bits_for_palette(1), 4);
        assert_eq!(bits_for_palette(2), 4);
        assert_eq!(bits_for_palette(16), 4);
        assert_eq!(bits_for_palette(17), 5);
        assert_eq!(bits_for_palette(256), 8);
        assert_eq!(bits_for_palette(257), 9);
    }

    #[test]
    fn test_aligned_word_counts() {
        let codec = PackedArrayCodec::ALIGNED;
        assert_eq!(codec.word_count(4), 256);
        assert_eq!(codec.word_count(5), 342);
        assert_eq!(codec.word_count(6), 410);
        assert_eq!(codec.word_count(8), 512);
        assert_eq!(codec.word_count(9), 586);
    }

    #[test]
    fn test_spanning_word_counts() {
        let codec = PackedArrayCodec::SPANNING;
        assert_eq!(codec.word_count(4), 256);
        assert_eq!(codec.word_count(5), 320);
        assert_eq!(codec.word_count(13), 832);
    }

    #[test]
    fn test_width_recovered_from_length() {
        let codec = PackedArrayCodec::ALIGNED;
        for bits in 4..=10 {
            let words = vec![0i64; codec.word_count(bits)];
            assert_eq!(codec.bits_of(&words).unwrap(), bits, "aligned {bits}");
        }
        let codec = PackedArrayCodec::SPANNING;
        for bits in 4..=16 {
            let words = vec![0i64; codec.word_count(bits)];
            assert_eq!(codec.bits_of(&words).unwrap(), bits, "spanning {bits}");
        }
    }

    #[test]
    fn test_round_trip_every_cell_for_palette_sizes() {
        for codec in [PackedArrayCodec::ALIGNED, PackedArrayCodec::SPANNING] {
            for palette_len in [1usize, 2, 16, 17, 256] {
                let bits = bits_for_palette(palette_len);
                let mut words = vec![0i64; codec.word_count(bits)];
                for cell in 0..SECTION_VOLUME {
                    codec.write(cell, sample_value(cell, palette_len), &mut words).unwrap();
                }
                for cell in 0..SECTION_VOLUME {
                    assert_eq!(
                        codec.read(cell, &words).unwrap(),
                        sample_value(cell, palette_len),
                        "{codec:?} palette {palette_len} cell {cell}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_aligned_values_never_cross_words() {
        // 5 bits: 12 values per word, top 4 bits are padding.
        let codec = PackedArrayCodec::ALIGNED;
        let mut words = vec![0i64; codec.word_count(5)];
        codec.write(11, 0b11111, &mut words).unwrap();
        codec.write(12, 0b10101, &mut words).unwrap();
        assert_eq!(words[0] as u64, 0b11111u64 << 55);
        assert_eq!(words[1] as u64, 0b10101);
    }

    #[test]
    fn test_spanning_values_cross_words() {
        // 5 bits: cell 12 occupies bits 60..65.
        let codec = PackedArrayCodec::SPANNING;
        let mut words = vec![0i64; codec.word_count(5)];
        codec.write(12, 0b10111, &mut words).unwrap();
        assert_eq!(words[0] as u64, 0b0111u64 << 60);
        assert_eq!(words[1] as u64, 0b1);
        assert_eq!(codec.read(12, &words).unwrap(), 0b10111);
    }

    #[test]
    fn test_least_significant_bits_first() {
        let codec = PackedArrayCodec::ALIGNED;
        let mut words = vec![0i64; 256];
        words[0] = 0x0000_0000_0000_0021;
        assert_eq!(codec.read(0, &words).unwrap(), 1);
        assert_eq!(codec.read(1, &words).unwrap(), 2);
        assert_eq!(codec.read(2, &words).unwrap(), 0);
    }

    #[test]
    fn test_empty_array_is_an_error() {
        let codec = PackedArrayCodec::ALIGNED;
        assert_eq!(codec.read(0, &[]), Err(CodecError::EmptyArray));
        assert_eq!(codec.validate(&[], 1), Err(CodecError::EmptyArray));
    }

    #[test]
    fn test_short_array_has_invalid_length() {
        let codec = PackedArrayCodec::ALIGNED;
        assert_eq!(codec.read(0, &[0; 10]), Err(CodecError::InvalidLength(10)));
    }

    #[test]
    fn test_validate_rejects_undersized_and_truncated() {
        let codec = PackedArrayCodec::ALIGNED;
        let four_bit = vec![0i64; 256];
        assert!(matches!(
            codec.validate(&four_bit, 17),
            Err(CodecError::Undersized { bits: 4, palette_len: 17 })
        ));
        // 330 words: width 5, but 5-bit aligned needs 342.
        assert!(matches!(
            codec.validate(&[0; 330], 17),
            Err(CodecError::Truncated { expected: 342, actual: 330 })
        ));
        assert_eq!(codec.validate(&four_bit, 16), Ok(4));
    }

    #[test]
    fn test_eleven_bit_aligned_array_uses_palette_width() {
        let codec = PackedArrayCodec::ALIGNED;
        assert_eq!(codec.word_count(11), codec.word_count(12));
        let mut words = vec![0i64; codec.word_count(11)];
        codec.write_bits(4095, 1500, &mut words, 11).unwrap();
        assert_eq!(codec.validate(&words, 1600), Ok(11));
        assert_eq!(codec.read_bits(4095, &words, 11), Ok(1500));
        assert_eq!(codec.validate(&words, 3000), Ok(12));
    }

    #[test]
    fn test_write_rejects_wide_values() {
        let codec = PackedArrayCodec::ALIGNED;
        let mut words = vec![0i64; 256];
        assert_eq!(
            codec.write(0, 16, &mut words),
            Err(CodecError::ValueTooWide { value: 16, bits: 4 })
        );
    }

    #[test]
    fn test_identity_repack_is_bit_exact() {
        let codec = PackedArrayCodec::ALIGNED;
        let palette = palette_of(17);
        let mut words = vec![0i64; codec.word_count(5)];
        for cell in 0..SECTION_VOLUME {
            codec.write(cell, sample_value(cell, 17), &mut words).unwrap();
        }
        // Junk in the 4 padding bits must survive an in-place repack.
        words[3] |= 0xF << 60;
        let repacked = codec.repack(&palette, &palette, words.clone(), None).unwrap();
        assert_eq!(repacked, words);
    }

    #[test]
    fn test_repack_widens_and_preserves_order() {
        let codec = PackedArrayCodec::ALIGNED;
        let old = palette_of(16);
        let new = palette_of(40);
        let mut words = vec![0i64; codec.word_count(4)];
        for cell in 0..SECTION_VOLUME {
            codec.write(cell, sample_value(cell, 16), &mut words).unwrap();
        }
        let repacked = codec.repack(&old, &new, words, None).unwrap();
        assert_eq!(repacked.len(), codec.word_count(6));
        for cell in 0..SECTION_VOLUME {
            assert_eq!(codec.read(cell, &repacked).unwrap(), sample_value(cell, 16));
        }
    }

    #[test]
    fn test_repack_with_remap_keeps_block_types() {
        let codec = PackedArrayCodec::SPANNING;
        let old = palette_of(3);
        // New palette holds the same states in reverse order behind filler.
        let mut states: Vec<BlockState> = (0..20).map(|i| BlockState::new(format!("test:filler_{i}"))).collect();
        states.extend((0..3).rev().map(|i| BlockState::new(format!("test:block_{i}"))));
        let new = PaletteTable::new(states);
        let remap = [22u32, 21, 20];

        let mut words = vec![0i64; codec.word_count(4)];
        for cell in 0..SECTION_VOLUME {
            codec.write(cell, sample_value(cell, 3), &mut words).unwrap();
        }
        let before: Vec<_> = (0..SECTION_VOLUME)
            .map(|cell| old.get(codec.read(cell, &words).unwrap()).cloned())
            .collect();

        let repacked = codec.repack(&old, &new, words, Some(&remap)).unwrap();
        assert_eq!(codec.bits_of(&repacked).unwrap(), 5);
        let after: Vec<_> = (0..SECTION_VOLUME)
            .map(|cell| new.get(codec.read(cell, &repacked).unwrap()).cloned())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_repack_reports_missing_remap_entry() {
        let codec = PackedArrayCodec::ALIGNED;
        let palette = palette_of(2);
        let mut words = vec![0i64; 256];
        codec.write(5, 1, &mut words).unwrap();
        let result = codec.repack(&palette, &palette, words, Some(&[0]));
        assert_eq!(result, Err(CodecError::RemapMissing(1)));
    }

    #[test]
    fn test_filled() {
        let codec = PackedArrayCodec::ALIGNED;
        let words = codec.filled(5, 17).unwrap();
        assert!((0..SECTION_VOLUME).all(|cell| codec.read(cell, &words).unwrap() == 17));
    }
}
