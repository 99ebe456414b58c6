//! Where a chunk's sections live inside its tag tree.

use strata_nbt::Tag;
use tracing::debug;

use crate::palette::PaletteTable;
use crate::section::{ChunkData, Section};

/// Reads the section list and column position out of a chunk root.
pub trait SectionLayout: Send + Sync + std::fmt::Debug {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Returns `None` when the root lacks the fields this layout needs.
    fn parse(&self, root: &Tag, data_version: i32) -> Option<ChunkData>;
}

/// `Level.Sections[]` with `Palette` and `BlockStates` per section
/// (1.13 through 1.17).
#[derive(Clone, Copy, Debug, Default)]
pub struct LevelSections;

impl LevelSections {
    /// Section slots 0..16 (world Y 0..256).
    const VERTICAL: std::ops::Range<i32> = 0..16;
}

impl SectionLayout for LevelSections {
    fn name(&self) -> &'static str {
        "Level.Sections"
    }

    fn parse(&self, root: &Tag, data_version: i32) -> Option<ChunkData> {
        let level = root.get("Level")?;
        let (x, z) = column_position(level)?;

        let mut sections = Vec::new();
        for tag in level.get("Sections").map(Tag::compounds).into_iter().flatten() {
            let Some(y) = tag.get("Y").and_then(Tag::as_i32) else {
                debug!(chunk_x = x, chunk_z = z, "section without Y, skipping");
                continue;
            };
            // Light-only sections carry no palette.
            let Some(palette) = tag.get("Palette") else {
                continue;
            };
            let data = tag.get("BlockStates").and_then(Tag::as_long_array).map(<[i64]>::to_vec);
            sections.push(Section::new(y, PaletteTable::from_tag(palette), data));
        }
        Some(ChunkData::new(x, z, data_version, Self::VERTICAL, sections))
    }
}

/// Root-level `sections[]` with a nested `block_states` compound (1.18+).
#[derive(Clone, Copy, Debug, Default)]
pub struct RootSections;

impl RootSections {
    /// Section slots in a default-height world.
    const SECTION_COUNT: i32 = 24;
    /// `yPos` assumed when a chunk does not store one.
    const DEFAULT_BOTTOM: i32 = -4;
}

impl SectionLayout for RootSections {
    fn name(&self) -> &'static str {
        "sections"
    }

    fn parse(&self, root: &Tag, data_version: i32) -> Option<ChunkData> {
        let (x, z) = column_position(root)?;
        let bottom = root
            .get("yPos")
            .and_then(Tag::as_i32)
            .unwrap_or(Self::DEFAULT_BOTTOM);

        let mut sections = Vec::new();
        for tag in root.get("sections").map(Tag::compounds).into_iter().flatten() {
            let Some(y) = tag.get("Y").and_then(Tag::as_i32) else {
                debug!(chunk_x = x, chunk_z = z, "section without Y, skipping");
                continue;
            };
            let Some(states) = tag.get("block_states") else {
                continue;
            };
            let Some(palette) = states.get("palette") else {
                continue;
            };
            let data = states.get("data").and_then(Tag::as_long_array).map(<[i64]>::to_vec);
            sections.push(Section::new(y, PaletteTable::from_tag(palette), data));
        }
        let vertical = bottom..bottom.saturating_add(Self::SECTION_COUNT);
        Some(ChunkData::new(x, z, data_version, vertical, sections))
    }
}

fn column_position(tag: &Tag) -> Option<(i32, i32)> {
    let x = tag.get("xPos").and_then(Tag::as_i32)?;
    let z = tag.get("zPos").and_then(Tag::as_i32)?;
    Some((x, z))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
