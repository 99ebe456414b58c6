//! Column heightmaps: one 9-bit height per column, 256 columns per chunk.
//!
//! Heightmaps use their own raw packing, independent of the palette codec:
//!
//! - [`SpanningHeightmap`] (before data version 2529): a contiguous 9-bit
//!   stream, 2304 bits in exactly 36 words.
//! - [`AlignedHeightmap`] (2529 and later): 7 heights per word at bits
//!   0, 9, .. 54, the top bit of each word unused, 37 words.
//!
//! Both store the lowest column (`z * 16 + x`) in the least significant bits.

use tracing::debug;

use crate::codec::{CodecError, PackedArrayCodec};
use crate::palette::BlockState;
use crate::section::ChunkData;

/// Columns per chunk.
pub const COLUMNS: usize = 256;

const HEIGHT_BITS: u32 = 9;
const HEIGHT_MASK: u64 = (1 << HEIGHT_BITS) - 1;

/// Packs and unpacks the 256 column heights of one heightmap.
pub trait HeightmapEncoder: Send + Sync + std::fmt::Debug {
    /// Length of a packed heightmap.
    fn word_count(&self) -> usize;

    /// Packs `heights`; each value is truncated to 9 bits.
    fn pack(&self, heights: &[u16; COLUMNS]) -> Vec<i64>;

    /// Reverses [`pack`](Self::pack).
    fn unpack(&self, words: &[i64]) -> Result<[u16; COLUMNS], CodecError>;
}

/// Contiguous 9-bit stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpanningHeightmap;

impl HeightmapEncoder for SpanningHeightmap {
    fn word_count(&self) -> usize {
        COLUMNS * HEIGHT_BITS as usize / 64
    }

    fn pack(&self, heights: &[u16; COLUMNS]) -> Vec<i64> {
        let mut words = vec![0u64; self.word_count()];
        for (column, &height) in heights.iter().enumerate() {
            let value = u64::from(height) & HEIGHT_MASK;
            let bit = column * HEIGHT_BITS as usize;
            let (word, shift) = (bit / 64, (bit % 64) as u32);
            words[word] |= value << shift;
            if shift + HEIGHT_BITS > 64 {
                words[word + 1] |= value >> (64 - shift);
            }
        }
        words.into_iter().map(|w| w as i64).collect()
    }

    fn unpack(&self, words: &[i64]) -> Result<[u16; COLUMNS], CodecError> {
        check_len(words, self.word_count())?;
        let mut heights = [0u16; COLUMNS];
        for (column, height) in heights.iter_mut().enumerate() {
            let bit = column * HEIGHT_BITS as usize;
            let (word, shift) = (bit / 64, (bit % 64) as u32);
            let mut value = words[word] as u64 >> shift;
            if shift + HEIGHT_BITS > 64 {
                value |= (words[word + 1] as u64) << (64 - shift);
            }
            *height = (value & HEIGHT_MASK) as u16;
        }
        Ok(heights)
    }
}

/// Seven 9-bit heights per word.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlignedHeightmap;

impl AlignedHeightmap {
    const PER_WORD: usize = 64 / HEIGHT_BITS as usize;
}

impl HeightmapEncoder for AlignedHeightmap {
    fn word_count(&self) -> usize {
        COLUMNS.div_ceil(Self::PER_WORD)
    }

    fn pack(&self, heights: &[u16; COLUMNS]) -> Vec<i64> {
        heights
            .chunks(Self::PER_WORD)
            .map(|group| {
                group.iter().enumerate().fold(0u64, |word, (i, &h)| {
                    word | (u64::from(h) & HEIGHT_MASK) << (i as u32 * HEIGHT_BITS)
                }) as i64
            })
            .collect()
    }

    fn unpack(&self, words: &[i64]) -> Result<[u16; COLUMNS], CodecError> {
        check_len(words, self.word_count())?;
        let mut heights = [0u16; COLUMNS];
        for (column, height) in heights.iter_mut().enumerate() {
            let word = words[column / Self::PER_WORD] as u64;
            let shift = (column % Self::PER_WORD) as u32 * HEIGHT_BITS;
            *height = ((word >> shift) & HEIGHT_MASK) as u16;
        }
        Ok(heights)
    }
}

fn check_len(words: &[i64], expected: usize) -> Result<(), CodecError> {
    if words.len() < expected {
        return Err(CodecError::Truncated {
            expected,
            actual: words.len(),
        });
    }
    Ok(())
}

/// Finds, per column, the highest block matching `predicate`.
///
/// Sections inside the chunk's vertical range are scanned top down. A hit at
/// section `s`, layer `cy` records `(s - bottom) * 16 + cy + 1`, where
/// `bottom` is the chunk's lowest section slot; columns without a hit stay 0.
/// Sections that fail validation are skipped; cells with an out-of-range
/// index or a malformed palette entry never match.
pub fn scan_heights<P>(chunk: &ChunkData, codec: PackedArrayCodec, predicate: P) -> [u16; COLUMNS]
where
    P: Fn(&BlockState) -> bool,
{
    let mut heights = [0u16; COLUMNS];
    let mut remaining = COLUMNS;
    let bottom = chunk.bottom_section();

    for section in chunk.sections().iter().rev() {
        if remaining == 0 {
            break;
        }
        if !chunk.vertical.contains(&section.y) {
            continue;
        }
        let cells = match section.cells(codec) {
            Ok(cells) => cells,
            Err(e) => {
                debug!(chunk_x = chunk.x, chunk_z = chunk.z, section_y = section.y, error = %e, "skipping section in heightmap");
                continue;
            }
        };
        let offset = (section.y - bottom) * 16;
        for (column, height) in heights.iter_mut().enumerate() {
            if *height != 0 {
                continue;
            }
            for cy in (0..16).rev() {
                let cell = cy * COLUMNS + column;
                if let Ok(Some(state)) = cells.state(cell)
                    && predicate(state)
                {
                    *height = (offset + cy as i32 + 1) as u16;
                    remaining -= 1;
                    break;
                }
            }
        }
    }
    heights
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
