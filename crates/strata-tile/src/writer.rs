//! Tile document serialization.
//!
//! ```json
//! {
//!   "metadata": { "format_version": 1, "tile_size": 32, "origin_x": 0, "origin_z": 0,
//!                 "min_y": -64, "max_y": 319, "block_count": 1 },
//!   "blocks": [ { "x": 0, "y": 64, "z": 0, "id": "minecraft:stone" } ]
//! }
//! ```
//!
//! `min_y`/`max_y` are present only for bounded ranges, `properties` only for
//! blocks that have any.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use thiserror::Error;

use crate::tile::{TILE_SIZE, Tile};

/// Version of the tile document layout.
pub const FORMAT_VERSION: u32 = 1;

/// Errors from writing a tile.
#[derive(Debug, Error)]
pub enum TileWriteError {
    #[error("failed to write tile {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tile stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize tile: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
pub struct TileMetadata {
    pub format_version: u32,
    pub tile_size: i32,
    pub origin_x: i64,
    pub origin_z: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_y: Option<i32>,
    pub block_count: usize,
}

/// One block as written; coordinates are tile-local.
#[derive(Debug, Serialize)]
pub struct BlockEntry<'a> {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub id: &'a str,
    #[serde(skip_serializing_if = "no_properties")]
    pub properties: &'a BTreeMap<String, String>,
}

fn no_properties(properties: &&BTreeMap<String, String>) -> bool {
    properties.is_empty()
}

impl BlockEntry<'_> {
    /// `id[key=value,...]`.
    pub fn state_string(&self) -> String {
        if self.properties.is_empty() {
            return self.id.to_string();
        }
        let props: Vec<String> = self.properties.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{}[{}]", self.id, props.join(","))
    }
}

/// Serializable view of a [`Tile`].
#[derive(Debug, Serialize)]
pub struct TileDocument<'a> {
    pub metadata: TileMetadata,
    pub blocks: Vec<BlockEntry<'a>>,
}

impl<'a> TileDocument<'a> {
    pub fn from_tile(tile: &'a Tile) -> Self {
        let metadata = TileMetadata {
            format_version: FORMAT_VERSION,
            tile_size: TILE_SIZE,
            origin_x: tile.pos.origin_x(),
            origin_z: tile.pos.origin_z(),
            min_y: tile.y_range.lower(),
            max_y: tile.y_range.upper(),
            block_count: tile.block_count(),
        };
        let blocks = tile
            .blocks()
            .iter()
            .map(|b| BlockEntry {
                x: b.x,
                y: b.y,
                z: b.z,
                id: b.id(),
                properties: b.properties(),
            })
            .collect();
        Self { metadata, blocks }
    }
}

/// Writes tile documents, optionally gzip-compressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileWriter {
    compress: bool,
    pretty: bool,
}

impl TileWriter {
    pub fn new(compress: bool, pretty: bool) -> Self {
        Self { compress, pretty }
    }

    /// Compact output when compressing, pretty output otherwise.
    pub fn with_compression(compress: bool) -> Self {
        Self::new(compress, !compress)
    }

    pub fn compress(&self) -> bool {
        self.compress
    }

    pub fn pretty(&self) -> bool {
        self.pretty
    }

    /// Writes `tile` into `dir` as `tile_<x>_<z>.json[.gz]` and returns the
    /// file's path. An existing file is replaced.
    pub fn write(&self, tile: &Tile, dir: &Path) -> Result<PathBuf, TileWriteError> {
        let path = dir.join(tile.pos.file_name(self.compress));
        let file_error = |source| TileWriteError::File {
            path: path.clone(),
            source,
        };
        let file = File::create(&path).map_err(file_error)?;
        self.write_to(tile, BufWriter::new(file)).map_err(|e| match e {
            TileWriteError::Io(source) => file_error(source),
            other => other,
        })?;
        Ok(path)
    }

    /// Serializes `tile` into `out`, flushing it on success.
    pub fn write_to<W: Write>(&self, tile: &Tile, out: W) -> Result<(), TileWriteError> {
        let document = TileDocument::from_tile(tile);
        if self.compress {
            let mut encoder = GzEncoder::new(out, Compression::default());
            self.serialize(&document, &mut encoder)?;
            encoder.finish()?.flush()?;
        } else {
            let mut out = out;
            self.serialize(&document, &mut out)?;
            out.flush()?;
        }
        Ok(())
    }

    fn serialize<W: Write>(&self, document: &TileDocument<'_>, out: &mut W) -> Result<(), TileWriteError> {
        if self.pretty {
            serde_json::to_writer_pretty(out, document)?;
        } else {
            serde_json::to_writer(out, document)?;
        }
        Ok(())
    }
}

impl Default for TileWriter {
    fn default() -> Self {
        Self::with_compression(false)
    }
}
