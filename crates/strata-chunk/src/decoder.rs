//! Turns a chunk tag tree into world-positioned block records.

use std::sync::Arc;

use strata_nbt::Tag;
use tracing::{debug, warn};

use crate::codec::PackedArrayCodec;
use crate::heightmap::scan_heights;
use crate::palette::BlockState;
use crate::registry::{RegistryError, VersionCapabilityRegistry};
use crate::section::ChunkData;

/// Inclusive world-Y bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct YRange {
    pub min: i32,
    pub max: i32,
}

impl YRange {
    /// Every representable height.
    pub const FULL: Self = Self {
        min: i32::MIN,
        max: i32::MAX,
    };

    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Builds a range from optional bounds, open ends becoming unbounded.
    pub fn from_bounds(min: Option<i32>, max: Option<i32>) -> Self {
        Self::new(min.unwrap_or(i32::MIN), max.unwrap_or(i32::MAX))
    }

    pub fn contains(&self, y: i32) -> bool {
        self.min <= y && y <= self.max
    }

    /// Lower bound, or `None` when unbounded.
    pub fn lower(&self) -> Option<i32> {
        (self.min != i32::MIN).then_some(self.min)
    }

    /// Upper bound, or `None` when unbounded.
    pub fn upper(&self) -> Option<i32> {
        (self.max != i32::MAX).then_some(self.max)
    }

    /// Section-local layers `lo..=hi` of a section starting at `base_y`
    /// that fall inside the range, or `None` if none do.
    fn layers(&self, base_y: i64) -> Option<(i64, i64)> {
        let lo = (i64::from(self.min) - base_y).max(0);
        let hi = (i64::from(self.max) - base_y).min(15);
        (lo <= hi).then_some((lo, hi))
    }
}

impl Default for YRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// A block state at a world position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockRecord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub state: Arc<BlockState>,
}

impl BlockRecord {
    pub fn id(&self) -> &str {
        self.state.name()
    }

    pub fn properties(&self) -> &std::collections::BTreeMap<String, String> {
        self.state.properties()
    }
}

/// A parsed chunk together with the codec its sections were written with.
#[derive(Clone, Debug)]
pub struct DecodedChunk {
    pub chunk: ChunkData,
    pub codec: PackedArrayCodec,
}

/// `DataVersion` of a chunk root.
pub fn data_version(root: &Tag) -> Option<i32> {
    root.get("DataVersion").and_then(Tag::as_i32)
}

/// Decodes chunks of any registered data version.
#[derive(Clone, Debug)]
pub struct ChunkBlockDecoder {
    registry: Arc<VersionCapabilityRegistry>,
}

impl ChunkBlockDecoder {
    pub fn new(registry: Arc<VersionCapabilityRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &VersionCapabilityRegistry {
        &self.registry
    }

    /// Parses `root` with the layout and codec registered for its version.
    ///
    /// Chunks without a `DataVersion` predate every family and are
    /// unsupported. `Ok(None)` means the version is known but the tree lacks
    /// the fields its layout needs.
    pub fn decode(&self, root: &Tag) -> Result<Option<DecodedChunk>, RegistryError> {
        let version = data_version(root).unwrap_or(0);
        let layout = self.registry.layout(version)?;
        let codec = self.registry.codec(version)?;
        Ok(layout
            .parse(root, version)
            .map(|chunk| DecodedChunk { chunk, codec }))
    }

    /// Every block of `root` inside `range`, air included only on request.
    ///
    /// Never fails: an unsupported version logs a warning and yields nothing,
    /// corrupt sections and cells are skipped.
    pub fn extract(&self, root: &Tag, range: YRange, include_air: bool) -> Vec<BlockRecord> {
        match self.decode(root) {
            Ok(Some(decoded)) => extract_chunk(&decoded.chunk, decoded.codec, range, include_air),
            Ok(None) => {
                debug!(data_version = ?data_version(root), "chunk is missing position or sections");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "skipping chunk");
                Vec::new()
            }
        }
    }

    /// Packed heightmap of `root` marking the top block matching `predicate`
    /// in each column, in the word layout of the chunk's family.
    pub fn heightmap<P>(&self, root: &Tag, predicate: P) -> Result<Option<Vec<i64>>, RegistryError>
    where
        P: Fn(&BlockState) -> bool,
    {
        let version = data_version(root).unwrap_or(0);
        let encoder = self.registry.heightmap(version)?;
        let Some(decoded) = self.decode(root)? else {
            return Ok(None);
        };
        let heights = scan_heights(&decoded.chunk, decoded.codec, predicate);
        Ok(Some(encoder.pack(&heights)))
    }
}

impl Default for ChunkBlockDecoder {
    fn default() -> Self {
        Self::new(Arc::new(VersionCapabilityRegistry::java_edition()))
    }
}

/// Extracts records from an already parsed chunk.
///
/// Sections outside `range` are skipped without decoding. Records come out
/// ordered by section, then `y`, `z`, `x`.
pub fn extract_chunk(chunk: &ChunkData, codec: PackedArrayCodec, range: YRange, include_air: bool) -> Vec<BlockRecord> {
    let (Ok(base_x), Ok(base_z)) = (i32::try_from(chunk.block_x()), i32::try_from(chunk.block_z())) else {
        warn!(chunk_x = chunk.x, chunk_z = chunk.z, "chunk position out of range");
        return Vec::new();
    };

    let mut records = Vec::new();
    for section in chunk.sections() {
        let base_y = section.base_y();
        let Some((lo, hi)) = range.layers(base_y) else {
            continue;
        };

        if section.is_uniform() {
            let Some(state) = section.palette.get(0) else {
                continue;
            };
            if state.is_air() && !include_air {
                continue;
            }
            for cy in lo..=hi {
                let y = (base_y + cy) as i32;
                for cz in 0..16 {
                    for cx in 0..16 {
                        records.push(BlockRecord {
                            x: base_x + cx,
                            y,
                            z: base_z + cz,
                            state: Arc::clone(state),
                        });
                    }
                }
            }
            continue;
        }

        let cells = match section.cells(codec) {
            Ok(cells) => cells,
            Err(e) => {
                debug!(chunk_x = chunk.x, chunk_z = chunk.z, section_y = section.y, error = %e, "skipping corrupt section");
                continue;
            }
        };
        let mut corrupt = 0usize;
        for cy in lo..=hi {
            let y = (base_y + cy) as i32;
            for cz in 0..16 {
                for cx in 0..16 {
                    let cell = (cy as usize) * 256 + (cz as usize) * 16 + cx as usize;
                    match cells.state(cell) {
                        Ok(Some(state)) => {
                            if include_air || !state.is_air() {
                                records.push(BlockRecord {
                                    x: base_x + cx,
                                    y,
                                    z: base_z + cz,
                                    state: Arc::clone(state),
                                });
                            }
                        }
                        Ok(None) => {}
                        Err(_) => corrupt += 1,
                    }
                }
            }
        }
        if corrupt > 0 {
            debug!(chunk_x = chunk.x, chunk_z = chunk.z, section_y = section.y, cells = corrupt, "skipped cells with invalid palette index");
        }
    }
    records
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
