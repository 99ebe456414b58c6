//! Tile grid positions and aggregated tiles.

use strata_chunk::{BlockRecord, YRange};
use strata_region::{CHUNKS_PER_AXIS, REGION_COORD_MAX, REGION_COORD_MIN, RegionPos};

/// Blocks along one horizontal edge of a tile.
pub const TILE_SIZE: i32 = 32;

/// Tiles along one horizontal edge of a region (512 / 32).
pub const TILES_PER_REGION_AXIS: i32 = CHUNKS_PER_AXIS / 2;

/// Position on the tile grid. The block origin is always `pos * 32`.
///
/// Tiles of in-bounds regions (see [`RegionPos::checked`]) span the whole
/// `i32` chunk range, so [`chunks`](Self::chunks) never overflows for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilePos {
    pub x: i32,
    pub z: i32,
}

impl TilePos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Tile containing the block column at `(block_x, block_z)`.
    pub const fn containing(block_x: i32, block_z: i32) -> Self {
        Self::new(block_x.div_euclid(TILE_SIZE), block_z.div_euclid(TILE_SIZE))
    }

    pub fn origin_x(&self) -> i64 {
        i64::from(self.x) * i64::from(TILE_SIZE)
    }

    pub fn origin_z(&self) -> i64 {
        i64::from(self.z) * i64::from(TILE_SIZE)
    }

    /// Absolute chunk coordinates of the four backing chunks, ordered
    /// `(0,0), (1,0), (0,1), (1,1)` relative to the north-west chunk.
    pub fn chunks(&self) -> [(i32, i32); 4] {
        let (cx, cz) = (self.x * 2, self.z * 2);
        [(cx, cz), (cx + 1, cz), (cx, cz + 1), (cx + 1, cz + 1)]
    }

    /// Region holding all four backing chunks.
    pub fn region(&self) -> RegionPos {
        RegionPos::from_chunk(self.x * 2, self.z * 2)
    }

    /// The 16×16 tiles of `region`, row by row.
    pub fn in_region(region: RegionPos) -> impl Iterator<Item = TilePos> {
        let (x0, z0) = (region.x * TILES_PER_REGION_AXIS, region.z * TILES_PER_REGION_AXIS);
        (0..TILES_PER_REGION_AXIS)
            .flat_map(move |tz| (0..TILES_PER_REGION_AXIS).map(move |tx| TilePos::new(x0 + tx, z0 + tz)))
    }

    /// `tile_<x>_<z>.json`, with `.gz` appended when compressed.
    pub fn file_name(&self, compressed: bool) -> String {
        let suffix = if compressed { ".gz" } else { "" };
        format!("tile_{}_{}.json{suffix}", self.x, self.z)
    }
}

/// A non-empty tile. Block `x`/`z` are tile-local (0..32), `y` stays in
/// world space.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    pub pos: TilePos,
    pub y_range: YRange,
    blocks: Vec<BlockRecord>,
}

impl Tile {
    /// Returns `None` for an empty block list; empty tiles are never built.
    pub fn new(pos: TilePos, y_range: YRange, blocks: Vec<BlockRecord>) -> Option<Self> {
        if blocks.is_empty() {
            return None;
        }
        Some(Self { pos, y_range, blocks })
    }

    pub fn blocks(&self) -> &[BlockRecord] {
        &self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}
