//! Chunk selections: which regions, and which chunks inside them, to export.
//!
//! The text format has one entry per line:
//!
//! ```text
//! # whole region
//! 0;0
//! # one chunk, absolute chunk coordinates
//! -1;0;-3;12
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use strata_region::{CHUNKS_PER_REGION, RegionPos, chunk_index};
use thiserror::Error;

/// Errors from reading a selection file.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("failed to read selection {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid selection entry on line {line}: {content:?}")]
    Parse { line: usize, content: String },
}

const WORDS: usize = CHUNKS_PER_REGION / 64;

/// One bit per chunk slot of a region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkSet {
    bits: [u64; WORDS],
}

impl ChunkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every slot set.
    pub fn full() -> Self {
        Self { bits: [u64::MAX; WORDS] }
    }

    /// Sets slot `index`; indices past the grid are ignored.
    pub fn insert(&mut self, index: usize) {
        if index < CHUNKS_PER_REGION {
            self.bits[index / 64] |= 1u64 << (index % 64);
        }
    }

    pub fn remove(&mut self, index: usize) {
        if index < CHUNKS_PER_REGION {
            self.bits[index / 64] &= !(1u64 << (index % 64));
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index < CHUNKS_PER_REGION && self.bits[index / 64] & (1u64 << (index % 64)) != 0
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..CHUNKS_PER_REGION).filter(|&i| self.contains(i))
    }
}

impl FromIterator<usize> for ChunkSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

/// Selected regions, each either whole (`None`) or limited to a chunk set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    regions: BTreeMap<RegionPos, Option<ChunkSet>>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selection covering every chunk of each listed region.
    pub fn whole_regions(regions: impl IntoIterator<Item = RegionPos>) -> Self {
        Self {
            regions: regions.into_iter().map(|pos| (pos, None)).collect(),
        }
    }

    pub fn select_region(&mut self, pos: RegionPos) {
        self.regions.insert(pos, None);
    }

    /// Selects one chunk by absolute chunk coordinates. No-op when its
    /// region is already selected whole.
    pub fn select_chunk(&mut self, chunk_x: i32, chunk_z: i32) {
        let slot = self
            .regions
            .entry(RegionPos::from_chunk(chunk_x, chunk_z))
            .or_insert_with(|| Some(ChunkSet::new()));
        if let Some(set) = slot {
            set.insert(chunk_index(chunk_x, chunk_z));
        }
    }

    /// `None` if the region is unselected, `Some(None)` if selected whole,
    /// `Some(Some(set))` for a partial selection.
    pub fn region(&self, pos: RegionPos) -> Option<Option<&ChunkSet>> {
        self.regions.get(&pos).map(Option::as_ref)
    }

    pub fn is_chunk_selected(&self, chunk_x: i32, chunk_z: i32) -> bool {
        match self.region(RegionPos::from_chunk(chunk_x, chunk_z)) {
            Some(None) => true,
            Some(Some(set)) => set.contains(chunk_index(chunk_x, chunk_z)),
            None => false,
        }
    }

    /// Selected regions with their chunk masks, ordered by position.
    pub fn iter(&self) -> impl Iterator<Item = (RegionPos, Option<&ChunkSet>)> {
        self.regions.iter().map(|(&pos, set)| (pos, set.as_ref()))
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Parses the line format described in the module docs.
    pub fn parse(text: &str) -> Result<Self, SelectionError> {
        let mut selection = Self::new();
        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let invalid = || SelectionError::Parse {
                line: number + 1,
                content: raw.to_string(),
            };
            let fields: Vec<i32> = line
                .split(';')
                .map(|f| f.trim().parse::<i32>())
                .collect::<Result<_, _>>()
                .map_err(|_| invalid())?;
            match fields[..] {
                [rx, rz] => selection.select_region(RegionPos::checked(rx, rz).ok_or_else(invalid)?),
                [rx, rz, cx, cz] => {
                    if RegionPos::from_chunk(cx, cz) != RegionPos::new(rx, rz) {
                        return Err(invalid());
                    }
                    selection.select_chunk(cx, cz);
                }
                _ => return Err(invalid()),
            }
        }
        Ok(selection)
    }

    pub fn load(path: &Path) -> Result<Self, SelectionError> {
        let text = std::fs::read_to_string(path).map_err(|source| SelectionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }
}
