//! Region file parsing: location table, sector lookup, chunk decompression.

use std::io::Read;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use flate2::read::{GzDecoder, ZlibDecoder};
use strata_nbt::Tag;
use tracing::{debug, warn};

use crate::error::RegionError;
use crate::pos::RegionPos;

/// Chunk slots in one region (32 × 32).
pub const CHUNKS_PER_REGION: usize = 1024;

const SECTOR_BYTES: usize = 4096;

/// Location table + timestamp table.
const HEADER_BYTES: usize = 2 * SECTOR_BYTES;

/// Flag on the compression byte marking a payload stored in a sidecar file.
const EXTERNAL_FLAG: u8 = 0x80;

/// A fully loaded region: one optional tag tree per chunk slot.
#[derive(Debug, Clone)]
pub struct RegionFile {
    location: RegionPos,
    chunks: Vec<Option<Tag>>,
}

impl RegionFile {
    /// Loads the region file at `path`.
    ///
    /// A missing or zero-length file has no data and yields `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, RegionError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RegionError::InvalidName(path.display().to_string()))?;
        let location = RegionPos::from_file_name(name)?;

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(RegionError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        Self::from_bytes(location, &bytes).map(Some)
    }

    /// Parses an in-memory region file.
    pub fn from_bytes(location: RegionPos, bytes: &[u8]) -> Result<Self, RegionError> {
        if bytes.len() < HEADER_BYTES {
            return Err(RegionError::Truncated {
                expected: HEADER_BYTES,
                actual: bytes.len(),
            });
        }

        let mut chunks = vec![None; CHUNKS_PER_REGION];
        for (index, slot) in chunks.iter_mut().enumerate() {
            let entry = &bytes[index * 4..index * 4 + 4];
            let sector = BigEndian::read_u24(&entry[..3]) as usize;
            let sector_count = entry[3] as usize;
            if sector < 2 || sector_count == 0 {
                continue;
            }
            let sector_data = bytes.get(sector * SECTOR_BYTES..).unwrap_or_default();
            *slot = read_chunk(location, index, sector_data)
                .and_then(|payload| parse_chunk(location, index, &payload));
        }

        Ok(Self { location, chunks })
    }

    /// Builds a region from already decoded chunk trees.
    ///
    /// Slots beyond [`CHUNKS_PER_REGION`] are dropped, missing ones are empty.
    pub fn from_chunks(location: RegionPos, mut chunks: Vec<Option<Tag>>) -> Self {
        chunks.resize(CHUNKS_PER_REGION, None);
        Self { location, chunks }
    }

    /// Region grid position of this file.
    pub fn location(&self) -> RegionPos {
        self.location
    }

    /// Tag tree stored in slot `index`, or `None` for an empty slot.
    pub fn chunk_at(&self, index: usize) -> Option<&Tag> {
        self.chunks.get(index)?.as_ref()
    }

    /// Number of slots holding a chunk.
    pub fn chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }
}

/// Returns the decompressed payload of one chunk, or `None` when the slot
/// cannot be read. `sector_data` starts at the chunk's first sector.
fn read_chunk(location: RegionPos, index: usize, sector_data: &[u8]) -> Option<Vec<u8>> {
    if sector_data.len() < 5 {
        warn!(region = %location, index, "chunk header lies past end of file");
        return None;
    }
    let length = BigEndian::read_u32(&sector_data[..4]) as usize;
    if length <= 1 {
        return None;
    }
    let compression = sector_data[4];
    let Some(compressed) = sector_data.get(5..4 + length) else {
        warn!(region = %location, index, length, "chunk payload truncated");
        return None;
    };

    if compression & EXTERNAL_FLAG != 0 {
        warn!(region = %location, index, "chunk stored in external file, skipping");
        return None;
    }

    let mut payload = Vec::new();
    let result = match compression {
        1 => GzDecoder::new(compressed).read_to_end(&mut payload),
        2 => ZlibDecoder::new(compressed).read_to_end(&mut payload),
        3 => {
            payload.extend_from_slice(compressed);
            Ok(payload.len())
        }
        other => {
            warn!(region = %location, index, compression = other, "unsupported chunk compression");
            return None;
        }
    };
    match result {
        Ok(_) => Some(payload),
        Err(e) => {
            warn!(region = %location, index, error = %e, "failed to decompress chunk");
            None
        }
    }
}

fn parse_chunk(location: RegionPos, index: usize, payload: &[u8]) -> Option<Tag> {
    match strata_nbt::from_bytes(payload) {
        Ok(tag @ Tag::Compound(_)) => Some(tag),
        Ok(_) => {
            debug!(region = %location, index, "chunk root is not a compound");
            None
        }
        Err(e) => {
            warn!(region = %location, index, error = %e, "failed to parse chunk");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
