//! Region grid coordinates and chunk slot indexing.

use std::fmt;

use crate::error::RegionError;

/// Chunks along one horizontal axis of a region.
pub const CHUNKS_PER_AXIS: i32 = 32;

/// Blocks along one horizontal axis of a region (32 chunks × 16 blocks).
pub const BLOCKS_PER_REGION: i32 = CHUNKS_PER_AXIS * 16;

/// Smallest region coordinate reachable from an `i32` chunk coordinate.
pub const REGION_COORD_MIN: i32 = i32::MIN >> 5;

/// Largest region coordinate reachable from an `i32` chunk coordinate.
pub const REGION_COORD_MAX: i32 = i32::MAX >> 5;

/// Position of a region on the region grid.
///
/// Coordinates are expected within [`REGION_COORD_MIN`]..=[`REGION_COORD_MAX`];
/// [`checked`](Self::checked) and [`from_file_name`](Self::from_file_name)
/// enforce it, so chunk and tile arithmetic on such positions cannot overflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// `None` when either coordinate is outside the reachable range.
    pub const fn checked(x: i32, z: i32) -> Option<Self> {
        let pos = Self::new(x, z);
        if pos.is_in_bounds() { Some(pos) } else { None }
    }

    pub const fn is_in_bounds(&self) -> bool {
        REGION_COORD_MIN <= self.x
            && self.x <= REGION_COORD_MAX
            && REGION_COORD_MIN <= self.z
            && self.z <= REGION_COORD_MAX
    }

    /// Region containing the given absolute chunk coordinate.
    pub const fn from_chunk(chunk_x: i32, chunk_z: i32) -> Self {
        Self::new(chunk_x >> 5, chunk_z >> 5)
    }

    /// Parses `r.<x>.<z>.mca`. Only the spelling [`file_name`](Self::file_name)
    /// produces is accepted (no `+` signs or leading zeros), and coordinates
    /// must be in bounds.
    pub fn from_file_name(name: &str) -> Result<Self, RegionError> {
        let invalid = || RegionError::InvalidName(name.to_string());
        let stem = name
            .strip_prefix("r.")
            .and_then(|rest| rest.strip_suffix(".mca"))
            .ok_or_else(invalid)?;
        let (x, z) = stem.split_once('.').ok_or_else(invalid)?;
        let x = x.parse().map_err(|_| invalid())?;
        let z = z.parse().map_err(|_| invalid())?;
        let pos = Self::checked(x, z).ok_or_else(invalid)?;
        if pos.file_name() != name {
            return Err(invalid());
        }
        Ok(pos)
    }

    /// File name of this region, `r.<x>.<z>.mca`.
    pub fn file_name(&self) -> String {
        format!("r.{}.{}.mca", self.x, self.z)
    }

    /// Absolute chunk coordinate of the region's north-west chunk.
    pub const fn chunk_origin(&self) -> (i32, i32) {
        (self.x * CHUNKS_PER_AXIS, self.z * CHUNKS_PER_AXIS)
    }

    /// Absolute block coordinate of the region's north-west corner.
    pub const fn block_origin(&self) -> (i64, i64) {
        (
            self.x as i64 * BLOCKS_PER_REGION as i64,
            self.z as i64 * BLOCKS_PER_REGION as i64,
        )
    }
}

impl fmt::Display for RegionPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r.{}.{}", self.x, self.z)
    }
}

/// Slot index of a chunk inside its region. Accepts absolute or local
/// coordinates; only the low five bits of each axis are used.
pub const fn chunk_index(chunk_x: i32, chunk_z: i32) -> usize {
    ((chunk_z & 31) * CHUNKS_PER_AXIS + (chunk_x & 31)) as usize
}
