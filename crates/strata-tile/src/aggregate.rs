//! Builds tiles from the four chunks under them.

use std::sync::Arc;

use strata_chunk::{BlockRecord, ChunkBlockDecoder, YRange};
use strata_nbt::Tag;
use strata_region::{RegionFile, chunk_index};
use tracing::warn;

use crate::selection::ChunkSet;
use crate::tile::{TILE_SIZE, Tile, TilePos};

/// True if `mask` is absent (whole region) or holds at least one of the
/// four chunks under `pos`.
pub fn tile_is_selected(mask: Option<&ChunkSet>, pos: TilePos) -> bool {
    match mask {
        None => true,
        Some(set) => pos.chunks().iter().any(|&(cx, cz)| set.contains(chunk_index(cx, cz))),
    }
}

/// Decodes 2×2 chunk groups into tiles.
#[derive(Clone, Debug, Default)]
pub struct TileAggregator {
    decoder: ChunkBlockDecoder,
}

impl TileAggregator {
    pub fn new(decoder: ChunkBlockDecoder) -> Self {
        Self { decoder }
    }

    pub fn decoder(&self) -> &ChunkBlockDecoder {
        &self.decoder
    }

    /// Aggregates the chunks under `pos`.
    ///
    /// `chunks` follows [`TilePos::chunks`] order; a `None` slot contributes
    /// nothing. When `mask` is given and none of the four chunks is in it,
    /// the tile is skipped; otherwise all four chunks are included. Returns
    /// `None` if no block survives.
    pub fn aggregate(
        &self,
        chunks: [Option<&Tag>; 4],
        pos: TilePos,
        range: YRange,
        include_air: bool,
        mask: Option<&ChunkSet>,
    ) -> Option<Tile> {
        if !tile_is_selected(mask, pos) {
            return None;
        }

        let (origin_x, origin_z) = (pos.origin_x(), pos.origin_z());
        let mut blocks = Vec::new();
        let mut misplaced = 0usize;
        for root in chunks.into_iter().flatten() {
            for record in self.decoder.extract(root, range, include_air) {
                let local_x = i64::from(record.x) - origin_x;
                let local_z = i64::from(record.z) - origin_z;
                if !(0..i64::from(TILE_SIZE)).contains(&local_x) || !(0..i64::from(TILE_SIZE)).contains(&local_z) {
                    misplaced += 1;
                    continue;
                }
                if !range.contains(record.y) {
                    continue;
                }
                blocks.push(BlockRecord {
                    x: local_x as i32,
                    y: record.y,
                    z: local_z as i32,
                    state: Arc::clone(&record.state),
                });
            }
        }
        if misplaced > 0 {
            warn!(tile_x = pos.x, tile_z = pos.z, blocks = misplaced, "dropped blocks outside tile bounds");
        }
        Tile::new(pos, range, blocks)
    }

    /// Aggregates tile `pos` from the matching slots of `region`.
    pub fn aggregate_region(
        &self,
        region: &RegionFile,
        pos: TilePos,
        range: YRange,
        include_air: bool,
        mask: Option<&ChunkSet>,
    ) -> Option<Tile> {
        let chunks = pos.chunks().map(|(cx, cz)| region.chunk_at(chunk_index(cx, cz)));
        self.aggregate(chunks, pos, range, include_air, mask)
    }
}

#[cfg(test)]
mod tests {
    use strata_region::RegionPos;

    use super::*;

    /// A 1.16 chunk whose only non-air block is `name` at section-local
    /// `(x, y, z)` in section 0.
    fn chunk_with_block(chunk_x: i32, chunk_z: i32, name: &str, x: usize, y: usize, z: usize) -> Tag {
        let mut words = vec![0i64; 256];
        let cell = y * 256 + z * 16 + x;
        words[cell / 16] = 1 << ((cell % 16) * 4);
        section_chunk(chunk_x, chunk_z, &["minecraft:air", name], Some(words))
    }

    fn section_chunk(chunk_x: i32, chunk_z: i32, names: &[&str], data: Option<Vec<i64>>) -> Tag {
        let palette = Tag::List(
            names
                .iter()
                .map(|n| Tag::compound([("Name", Tag::string(*n))]))
                .collect(),
        );
        let mut section = vec![("Y", Tag::Byte(0)), ("Palette", palette)];
        if let Some(data) = data {
            section.push(("BlockStates", Tag::LongArray(data)));
        }
        Tag::compound([
            ("DataVersion", Tag::Int(2586)),
            (
                "Level",
                Tag::compound([
                    ("xPos", Tag::Int(chunk_x)),
                    ("zPos", Tag::Int(chunk_z)),
                    ("Sections", Tag::List(vec![Tag::compound(section)])),
                ]),
            ),
        ])
    }

    #[test]
    fn test_four_chunks_translate_to_tile_local() {
        let pos = TilePos::new(-1, 3);
        let [(ax, az), (bx, bz), (cx, cz), (dx, dz)] = pos.chunks();
        let chunks = [
            chunk_with_block(ax, az, "minecraft:stone", 1, 2, 3),
            chunk_with_block(bx, bz, "minecraft:dirt", 4, 5, 6),
            chunk_with_block(cx, cz, "minecraft:sand", 7, 8, 9),
            chunk_with_block(dx, dz, "minecraft:clay", 15, 0, 15),
        ];
        let tile = TileAggregator::default()
            .aggregate(chunks.each_ref().map(Some), pos, YRange::FULL, false, None)
            .unwrap();

        let got: Vec<(i32, i32, i32, &str)> = tile.blocks().iter().map(|b| (b.x, b.y, b.z, b.id())).collect();
        assert_eq!(
            got,
            vec![
                (1, 2, 3, "minecraft:stone"),
                (20, 5, 6, "minecraft:dirt"),
                (7, 8, 25, "minecraft:sand"),
                (31, 0, 31, "minecraft:clay"),
            ]
        );
    }

    #[test]
    fn test_all_air_tile_is_absent() {
        let pos = TilePos::new(0, 0);
        let chunks: Vec<Tag> = pos
            .chunks()
            .iter()
            .map(|&(cx, cz)| section_chunk(cx, cz, &["minecraft:air"], None))
            .collect();
        let refs = [Some(&chunks[0]), Some(&chunks[1]), Some(&chunks[2]), Some(&chunks[3])];
        assert!(TileAggregator::default().aggregate(refs, pos, YRange::FULL, false, None).is_none());

        let with_air = TileAggregator::default().aggregate(refs, pos, YRange::FULL, true, None).unwrap();
        assert_eq!(with_air.block_count(), 4 * 4096);
    }

    #[test]
    fn test_missing_slots_contribute_nothing() {
        let pos = TilePos::new(0, 0);
        let chunk = chunk_with_block(1, 1, "minecraft:stone", 0, 0, 0);
        let tile = TileAggregator::default()
            .aggregate([None, None, None, Some(&chunk)], pos, YRange::FULL, false, None)
            .unwrap();
        assert_eq!(tile.block_count(), 1);
        assert_eq!((tile.blocks()[0].x, tile.blocks()[0].z), (16, 16));
        assert!(TileAggregator::default().aggregate([None; 4], pos, YRange::FULL, false, None).is_none());
    }

    #[test]
    fn test_chunk_in_wrong_slot_is_dropped() {
        let pos = TilePos::new(0, 0);
        // Belongs to tile (1, 0).
        let stray = chunk_with_block(2, 0, "minecraft:stone", 0, 0, 0);
        let good = chunk_with_block(0, 0, "minecraft:dirt", 0, 0, 0);
        let tile = TileAggregator::default()
            .aggregate([Some(&good), Some(&stray), None, None], pos, YRange::FULL, false, None)
            .unwrap();
        assert_eq!(tile.block_count(), 1);
        assert_eq!(tile.blocks()[0].id(), "minecraft:dirt");
    }

    #[test]
    fn test_selection_gates_tile_but_keeps_all_chunks() {
        let pos = TilePos::new(0, 0);
        let a = chunk_with_block(0, 0, "minecraft:stone", 0, 0, 0);
        let b = chunk_with_block(1, 0, "minecraft:dirt", 0, 0, 0);
        let chunks = [Some(&a), Some(&b), None, None];

        let unrelated: ChunkSet = [chunk_index(5, 5)].into_iter().collect();
        assert!(TileAggregator::default().aggregate(chunks, pos, YRange::FULL, false, Some(&unrelated)).is_none());

        let one: ChunkSet = [chunk_index(1, 1)].into_iter().collect();
        let tile = TileAggregator::default()
            .aggregate(chunks, pos, YRange::FULL, false, Some(&one))
            .unwrap();
        assert_eq!(tile.block_count(), 2);
    }

    #[test]
    fn test_aggregate_region_reads_matching_slots() {
        let region = RegionFile::from_chunks(
            RegionPos::new(0, 0),
            (0..1024)
                .map(|i| (i == chunk_index(3, 2)).then(|| chunk_with_block(3, 2, "minecraft:stone", 0, 0, 0)))
                .collect(),
        );
        let tile = TileAggregator::default()
            .aggregate_region(&region, TilePos::new(1, 1), YRange::FULL, false, None)
            .unwrap();
        assert_eq!((tile.blocks()[0].x, tile.blocks()[0].z), (16, 0));
        assert!(
            TileAggregator::default()
                .aggregate_region(&region, TilePos::new(0, 0), YRange::FULL, false, None)
                .is_none()
        );
    }
}
