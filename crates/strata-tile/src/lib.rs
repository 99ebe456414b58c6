//! 32×32 export tiles built from 2×2 chunk groups, chunk selections, and
//! the tile document writer.

mod aggregate;
mod selection;
mod tile;
mod writer;

pub use aggregate::{TileAggregator, tile_is_selected};
pub use selection::{ChunkSet, Selection, SelectionError};
pub use tile::{TILE_SIZE, TILES_PER_REGION_AXIS, Tile, TilePos};
pub use writer::{BlockEntry, FORMAT_VERSION, TileDocument, TileMetadata, TileWriteError, TileWriter};
