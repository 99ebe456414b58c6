//! Decoded sections and chunk columns.

use std::ops::Range;
use std::sync::Arc;

use tracing::warn;

use crate::codec::{CodecError, PackedArrayCodec, bits_for_palette};
use crate::palette::{BlockState, PaletteTable};

/// One 16×16×16 vertical slice of a chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    /// Vertical slot; the section covers blocks `y * 16 ..= y * 16 + 15`.
    pub y: i32,
    pub palette: PaletteTable,
    /// Packed palette indices. Absent when the palette has a single entry.
    pub data: Option<Vec<i64>>,
}

impl Section {
    pub fn new(y: i32, palette: PaletteTable, data: Option<Vec<i64>>) -> Self {
        Self { y, palette, data }
    }

    /// World Y of the section's lowest layer.
    pub fn base_y(&self) -> i64 {
        i64::from(self.y) * 16
    }

    /// True if every cell is palette entry 0 and no packed array is stored.
    pub fn is_uniform(&self) -> bool {
        self.data.is_none() && self.palette.len() == 1
    }

    /// Checks the packed array against the palette and returns a cell reader.
    pub fn cells(&self, codec: PackedArrayCodec) -> Result<SectionCells<'_>, CodecError> {
        let packed = match self.data.as_deref() {
            Some(words) => Some((words, codec.validate(words, self.palette.len())?)),
            None if self.palette.len() == 1 => None,
            None => {
                return Err(CodecError::Undersized {
                    bits: 0,
                    palette_len: self.palette.len(),
                });
            }
        };
        Ok(SectionCells {
            codec,
            palette: &self.palette,
            packed,
        })
    }

    /// Moves this section onto `merged`, a palette produced by
    /// [`PaletteTable::merge`], translating stored indices through `remap`.
    pub fn adopt_palette(
        &mut self,
        codec: PackedArrayCodec,
        merged: &PaletteTable,
        remap: &[u32],
    ) -> Result<(), CodecError> {
        self.data = match self.data.take() {
            Some(words) => Some(codec.repack(&self.palette, merged, words, Some(remap))?),
            None if self.palette.len() == 1 => {
                let target = *remap.first().ok_or(CodecError::RemapMissing(0))?;
                if merged.len() == 1 && target == 0 {
                    None
                } else {
                    Some(codec.filled(bits_for_palette(merged.len()), target)?)
                }
            }
            None => {
                return Err(CodecError::Undersized {
                    bits: 0,
                    palette_len: self.palette.len(),
                });
            }
        };
        self.palette = merged.clone();
        Ok(())
    }
}

/// Per-cell view over a validated section.
#[derive(Clone, Copy, Debug)]
pub struct SectionCells<'a> {
    codec: PackedArrayCodec,
    palette: &'a PaletteTable,
    packed: Option<(&'a [i64], u32)>,
}

impl<'a> SectionCells<'a> {
    /// Palette index stored for `cell`.
    pub fn index(&self, cell: usize) -> Result<u32, CodecError> {
        match self.packed {
            Some((words, bits)) => self.codec.read_bits(cell, words, bits),
            None => Ok(0),
        }
    }

    /// Block state of `cell`. `Ok(None)` means the palette entry itself was
    /// malformed; an index past the palette end is an error.
    pub fn state(&self, cell: usize) -> Result<Option<&'a Arc<BlockState>>, CodecError> {
        let index = self.index(cell)?;
        if index as usize >= self.palette.len() {
            return Err(CodecError::IndexOutOfRange {
                index,
                palette_len: self.palette.len(),
            });
        }
        Ok(self.palette.get(index))
    }
}

/// One decoded chunk column.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkData {
    /// Chunk grid position.
    pub x: i32,
    pub z: i32,
    pub data_version: i32,
    /// Section slots the format allows for this chunk, bottom first.
    pub vertical: Range<i32>,
    /// Sections sorted by `y`, one per slot at most.
    sections: Vec<Section>,
}

impl ChunkData {
    /// Sorts `sections` by height. When two share a `y`, the later one in
    /// stored order is dropped with a warning.
    pub fn new(x: i32, z: i32, data_version: i32, vertical: Range<i32>, sections: Vec<Section>) -> Self {
        let mut kept: Vec<Section> = Vec::with_capacity(sections.len());
        for section in sections {
            if kept.iter().any(|s| s.y == section.y) {
                warn!(chunk_x = x, chunk_z = z, section_y = section.y, "duplicate section, skipping");
                continue;
            }
            kept.push(section);
        }
        kept.sort_by_key(|s| s.y);
        Self {
            x,
            z,
            data_version,
            vertical,
            sections: kept,
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn sections_mut(&mut self) -> &mut [Section] {
        &mut self.sections
    }

    pub fn section(&self, y: i32) -> Option<&Section> {
        self.sections.iter().find(|s| s.y == y)
    }

    /// Lowest section slot of the column.
    pub fn bottom_section(&self) -> i32 {
        self.vertical.start
    }

    /// World X of the chunk's west edge.
    pub fn block_x(&self) -> i64 {
        i64::from(self.x) * 16
    }

    /// World Z of the chunk's north edge.
    pub fn block_z(&self) -> i64 {
        i64::from(self.z) * 16
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SECTION_VOLUME;

    fn stone_and_dirt() -> PaletteTable {
        PaletteTable::new([BlockState::new("minecraft:stone"), BlockState::new("minecraft:dirt")])
    }

    #[test]
    fn test_uniform_section_reads_index_zero() {
        let section = Section::new(0, PaletteTable::new([BlockState::new("minecraft:stone")]), None);
        assert!(section.is_uniform());
        let cells = section.cells(PackedArrayCodec::ALIGNED).unwrap();
        assert_eq!(cells.index(4095).unwrap(), 0);
        assert_eq!(cells.state(17).unwrap().unwrap().name(), "minecraft:stone");
    }

    #[test]
    fn test_missing_data_with_large_palette_is_rejected() {
        let section = Section::new(0, stone_and_dirt(), None);
        assert!(section.cells(PackedArrayCodec::ALIGNED).is_err());
    }

    #[test]
    fn test_present_empty_data_is_rejected() {
        let section = Section::new(0, PaletteTable::new([BlockState::new("minecraft:stone")]), Some(vec![]));
        assert_eq!(section.cells(PackedArrayCodec::ALIGNED).unwrap_err(), CodecError::EmptyArray);
    }

    #[test]
    fn test_out_of_range_index_is_per_cell_error() {
        let codec = PackedArrayCodec::ALIGNED;
        let mut words = vec![0i64; 256];
        codec.write(3, 9, &mut words).unwrap();
        let section = Section::new(0, stone_and_dirt(), Some(words));
        let cells = section.cells(codec).unwrap();
        assert!(matches!(cells.state(3), Err(CodecError::IndexOutOfRange { index: 9, .. })));
        assert!(cells.state(4).unwrap().is_some());
    }

    #[test]
    fn test_adopt_palette_from_uniform() {
        let codec = PackedArrayCodec::ALIGNED;
        let mut section = Section::new(2, PaletteTable::new([BlockState::new("minecraft:dirt")]), None);
        let (merged, remap) = stone_and_dirt().merge(&section.palette);
        section.adopt_palette(codec, &merged, &remap).unwrap();

        let cells = section.cells(codec).unwrap();
        for cell in [0, 1000, SECTION_VOLUME - 1] {
            assert_eq!(cells.state(cell).unwrap().unwrap().name(), "minecraft:dirt");
        }
    }

    #[test]
    fn test_adopt_palette_repacks_data() {
        let codec = PackedArrayCodec::SPANNING;
        let mut words = vec![0i64; 256];
        codec.write(10, 1, &mut words).unwrap();
        let mut section = Section::new(0, stone_and_dirt(), Some(words));

        let base = PaletteTable::new((0..20).map(|i| BlockState::new(format!("test:b{i}"))));
        let (merged, remap) = base.merge(&section.palette);
        section.adopt_palette(codec, &merged, &remap).unwrap();

        assert_eq!(section.data.as_ref().unwrap().len(), codec.word_count(5));
        let cells = section.cells(codec).unwrap();
        assert_eq!(cells.state(10).unwrap().unwrap().name(), "minecraft:dirt");
        assert_eq!(cells.state(11).unwrap().unwrap().name(), "minecraft:stone");
    }

    #[test]
    fn test_chunk_sorts_and_drops_duplicate_sections() {
        let palette = PaletteTable::new([BlockState::new("minecraft:stone")]);
        let dirt = PaletteTable::new([BlockState::new("minecraft:dirt")]);
        let chunk = ChunkData::new(
            1,
            -1,
            2586,
            0..16,
            vec![
                Section::new(3, palette.clone(), None),
                Section::new(1, palette.clone(), None),
                Section::new(3, dirt, None),
            ],
        );
        let ys: Vec<i32> = chunk.sections().iter().map(|s| s.y).collect();
        assert_eq!(ys, vec![1, 3]);
        assert_eq!(chunk.section(3).unwrap().palette, palette);
        assert_eq!(chunk.block_x(), 16);
        assert_eq!(chunk.block_z(), -16);
    }
}
