//! Block-state descriptors and per-section palettes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use strata_nbt::Tag;

/// Block ids treated as empty space. Matched exactly, never by pattern.
pub const AIR_BLOCKS: [&str; 3] = ["minecraft:air", "minecraft:cave_air", "minecraft:void_air"];

/// Returns true if `id` is one of [`AIR_BLOCKS`].
pub fn is_air(id: &str) -> bool {
    AIR_BLOCKS.contains(&id)
}

/// A namespaced block id plus its property map.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockState {
    name: String,
    properties: BTreeMap<String, String>,
}

impl BlockState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn is_air(&self) -> bool {
        is_air(&self.name)
    }

    /// `id[key=value,...]`, or just `id` without properties.
    pub fn state_string(&self) -> String {
        self.to_string()
    }

    /// Reads a palette entry compound (`Name` + optional `Properties`).
    ///
    /// Returns `None` if `Name` is missing or not a string. Non-string
    /// property values are dropped.
    pub fn from_tag(tag: &Tag) -> Option<Self> {
        let name = tag.get("Name")?.as_str()?;
        let properties = tag
            .get("Properties")
            .and_then(Tag::as_compound)
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            name: name.to_string(),
            properties,
        })
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.properties.is_empty() {
            return Ok(());
        }
        f.write_str("[")?;
        for (i, (key, value)) in self.properties.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("]")
    }
}

/// Ordered palette of one section.
///
/// Entries that failed to parse are kept as `None` so later indices keep
/// their positions; cells pointing at them resolve to nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaletteTable {
    entries: Vec<Option<Arc<BlockState>>>,
}

impl PaletteTable {
    pub fn new(states: impl IntoIterator<Item = BlockState>) -> Self {
        Self {
            entries: states.into_iter().map(|s| Some(Arc::new(s))).collect(),
        }
    }

    /// Builds a palette from a list of entry compounds.
    pub fn from_tag(list: &Tag) -> Self {
        let entries = list
            .as_list()
            .unwrap_or_default()
            .iter()
            .map(|entry| BlockState::from_tag(entry).map(Arc::new))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`, or `None` if out of range or malformed.
    pub fn get(&self, index: u32) -> Option<&Arc<BlockState>> {
        self.entries.get(index as usize)?.as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Arc<BlockState>>> {
        self.entries.iter().map(Option::as_ref)
    }

    /// Index of the first entry equal to `state`.
    pub fn position(&self, state: &BlockState) -> Option<u32> {
        self.entries
            .iter()
            .position(|e| e.as_deref() == Some(state))
            .map(|i| i as u32)
    }

    /// Appends the entries of `other` that this palette lacks.
    ///
    /// Returns the merged palette and a remap table translating each index
    /// of `other` into the merged palette. Indices of `self` are unchanged.
    pub fn merge(&self, other: &PaletteTable) -> (PaletteTable, Vec<u32>) {
        let mut entries = self.entries.clone();
        let mut lookup: FxHashMap<Arc<BlockState>, u32> = FxHashMap::default();
        for (i, entry) in self.entries.iter().enumerate() {
            if let Some(state) = entry {
                lookup.entry(Arc::clone(state)).or_insert(i as u32);
            }
        }

        let mut remap = Vec::with_capacity(other.entries.len());
        for entry in &other.entries {
            let index = match entry {
                Some(state) => *lookup.entry(Arc::clone(state)).or_insert_with(|| {
                    entries.push(Some(Arc::clone(state)));
                    (entries.len() - 1) as u32
                }),
                None => {
                    entries.push(None);
                    (entries.len() - 1) as u32
                }
            };
            remap.push(index);
        }
        (PaletteTable { entries }, remap)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> Tag {
        Tag::compound([("Name", Tag::string(name))])
    }

    #[test]
    fn test_air_set_is_exact() {
        assert!(is_air("minecraft:air"));
        assert!(is_air("minecraft:cave_air"));
        assert!(is_air("minecraft:void_air"));
        assert!(!is_air("minecraft:airy"));
        assert!(!is_air("air"));
        assert!(!is_air("minecraft:stone"));
    }

    #[test]
    fn test_state_from_tag_with_properties() {
        let tag = Tag::compound([
            ("Name", Tag::string("minecraft:oak_log")),
            ("Properties", Tag::compound([("axis", Tag::string("y"))])),
        ]);
        let state = BlockState::from_tag(&tag).unwrap();
        assert_eq!(state.name(), "minecraft:oak_log");
        assert_eq!(state.properties().get("axis").map(String::as_str), Some("y"));
        assert_eq!(state.state_string(), "minecraft:oak_log[axis=y]");
    }

    #[test]
    fn test_state_string_sorts_properties() {
        let state = BlockState::new("minecraft:chest")
            .with_property("waterlogged", "false")
            .with_property("facing", "north");
        assert_eq!(state.state_string(), "minecraft:chest[facing=north,waterlogged=false]");
        assert_eq!(BlockState::new("minecraft:stone").state_string(), "minecraft:stone");
    }

    #[test]
    fn test_malformed_entry_keeps_its_slot() {
        let list = Tag::List(vec![entry("minecraft:air"), Tag::compound([("Name", Tag::Int(3))]), entry("minecraft:dirt")]);
        let palette = PaletteTable::from_tag(&list);
        assert_eq!(palette.len(), 3);
        assert!(palette.get(1).is_none());
        assert_eq!(palette.get(2).unwrap().name(), "minecraft:dirt");
        assert!(palette.get(3).is_none());
    }

    #[test]
    fn test_non_list_is_empty_palette() {
        assert!(PaletteTable::from_tag(&Tag::Int(0)).is_empty());
    }

    #[test]
    fn test_merge_reuses_shared_entries() {
        let a = PaletteTable::new([BlockState::new("minecraft:air"), BlockState::new("minecraft:stone")]);
        let b = PaletteTable::new([
            BlockState::new("minecraft:dirt"),
            BlockState::new("minecraft:stone"),
            BlockState::new("minecraft:air"),
        ]);
        let (merged, remap) = a.merge(&b);
        assert_eq!(merged.len(), 3);
        assert_eq!(remap, vec![2, 1, 0]);
        for (old, new) in remap.iter().enumerate() {
            assert_eq!(b.get(old as u32), merged.get(*new));
        }
        assert_eq!(merged.position(&BlockState::new("minecraft:dirt")), Some(2));
    }

    #[test]
    fn test_merge_distinguishes_properties() {
        let a = PaletteTable::new([BlockState::new("minecraft:oak_log").with_property("axis", "y")]);
        let b = PaletteTable::new([BlockState::new("minecraft:oak_log").with_property("axis", "x")]);
        let (merged, remap) = a.merge(&b);
        assert_eq!(merged.len(), 2);
        assert_eq!(remap, vec![1]);
    }
}
