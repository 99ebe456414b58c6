//! Region storage files: 32×32 chunk grids stored as `r.<x>.<z>.mca`.
//!
//! A region file starts with a 4 KiB location table (one entry per chunk slot)
//! and a 4 KiB timestamp table, followed by 4 KiB sectors holding compressed
//! chunk payloads. Loading is all-or-nothing per file; individual chunks that
//! fail to decompress or parse are skipped.

mod error;
mod file;
mod pos;

pub use error::RegionError;
pub use file::{CHUNKS_PER_REGION, RegionFile};
pub use pos::{BLOCKS_PER_REGION, CHUNKS_PER_AXIS, REGION_COORD_MAX, REGION_COORD_MIN, RegionPos, chunk_index};
