//! Data-version → decoder capability dispatch.
//!
//! Chunk formats are grouped into families, each keyed by the first data
//! version its layout applies to. A family registers only the capabilities
//! that changed in it and names the family it otherwise inherits from.
//! Resolution picks the newest family whose minimum version is not above the
//! chunk's version, then walks the parent chain until the capability is found.
//!
//! The registry is built once and is read-only afterwards, so it can be
//! shared across worker threads behind an `Arc` without locking.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::codec::PackedArrayCodec;
use crate::heightmap::{AlignedHeightmap, HeightmapEncoder, SpanningHeightmap};
use crate::layout::{LevelSections, RootSections, SectionLayout};

/// Newest data version the built-in families are known to read.
pub const NEWEST_KNOWN_VERSION: i32 = 4440;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The extension points a family can override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityKind {
    /// Palette index packing inside a section.
    PackedIndices,
    /// Location of sections and column position in the tag tree.
    SectionLayout,
    /// Heightmap word packing.
    Heightmap,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 3] = [Self::PackedIndices, Self::SectionLayout, Self::Heightmap];
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PackedIndices => "packed indices",
            Self::SectionLayout => "section layout",
            Self::Heightmap => "heightmap",
        };
        f.write_str(name)
    }
}

/// A registered implementation of one [`CapabilityKind`].
#[derive(Clone, Debug)]
pub enum Capability {
    PackedIndices(PackedArrayCodec),
    SectionLayout(Arc<dyn SectionLayout>),
    Heightmap(Arc<dyn HeightmapEncoder>),
}

impl Capability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::PackedIndices(_) => CapabilityKind::PackedIndices,
            Self::SectionLayout(_) => CapabilityKind::SectionLayout,
            Self::Heightmap(_) => CapabilityKind::Heightmap,
        }
    }
}

/// Errors from declaring families or resolving capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No family covering `version` provides `kind`.
    #[error("data version {version} has no {kind} implementation")]
    Unsupported { version: i32, kind: CapabilityKind },

    /// A family with this minimum version already exists.
    #[error("family for data version {0} already declared")]
    DuplicateFamily(i32),

    /// Registration targeted a family that was never declared.
    #[error("no family declared for data version {0}")]
    UnknownFamily(i32),

    /// Parents must be declared first and start at an older version.
    #[error("family {family} cannot inherit from {parent}")]
    InvalidParent { family: i32, parent: i32 },
}

struct Family {
    name: String,
    parent: Option<i32>,
    capabilities: FxHashMap<CapabilityKind, Capability>,
}

/// Summary of one declared family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FamilyInfo {
    pub min_version: i32,
    pub name: String,
    pub parent: Option<i32>,
    /// Capabilities registered directly on this family, sorted.
    pub own: Vec<CapabilityKind>,
}

// ---------------------------------------------------------------------------
// Built-in families
// ---------------------------------------------------------------------------

/// `(min data version, name, parent)`. Parents precede their children.
const JAVA_FAMILIES: &[(i32, &str, Option<i32>)] = &[
    // 17w47a: flattening, palettes per section.
    (1451, "level-sections", None),
    // 20w17a: indices no longer cross word boundaries.
    (2529, "aligned-packing", Some(1451)),
    // 21w43a: sections move to the root, world height grows below zero.
    (2844, "root-sections", Some(2529)),
];

/// `(family, factory)` pairs registered by [`VersionCapabilityRegistry::java_edition`].
const JAVA_CAPABILITIES: &[(i32, fn() -> Capability)] = &[
    (1451, spanning_codec),
    (1451, level_sections),
    (1451, spanning_heightmap),
    (2529, aligned_codec),
    (2529, aligned_heightmap),
    (2844, root_sections),
];

fn spanning_codec() -> Capability {
    Capability::PackedIndices(PackedArrayCodec::SPANNING)
}

fn aligned_codec() -> Capability {
    Capability::PackedIndices(PackedArrayCodec::ALIGNED)
}

fn level_sections() -> Capability {
    Capability::SectionLayout(Arc::new(LevelSections))
}

fn root_sections() -> Capability {
    Capability::SectionLayout(Arc::new(RootSections))
}

fn spanning_heightmap() -> Capability {
    Capability::Heightmap(Arc::new(SpanningHeightmap))
}

fn aligned_heightmap() -> Capability {
    Capability::Heightmap(Arc::new(AlignedHeightmap))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps data versions to the capability implementations that read them.
pub struct VersionCapabilityRegistry {
    families: BTreeMap<i32, Family>,
    newest_known: i32,
}

impl VersionCapabilityRegistry {
    /// Creates an empty registry that rejects versions above `newest_known`.
    pub fn new(newest_known: i32) -> Self {
        Self {
            families: BTreeMap::new(),
            newest_known,
        }
    }

    /// Registry with every built-in family, capped at [`NEWEST_KNOWN_VERSION`].
    pub fn java_edition() -> Self {
        let mut registry = Self::new(NEWEST_KNOWN_VERSION);
        for &(min_version, name, parent) in JAVA_FAMILIES {
            registry.families.insert(
                min_version,
                Family {
                    name: name.to_string(),
                    parent,
                    capabilities: FxHashMap::default(),
                },
            );
        }
        for &(min_version, factory) in JAVA_CAPABILITIES {
            if let Some(family) = registry.families.get_mut(&min_version) {
                let capability = factory();
                family.capabilities.insert(capability.kind(), capability);
            }
        }
        registry
    }

    /// Declares a family starting at `min_version`, optionally inheriting
    /// from an older, already declared family.
    pub fn declare_family(
        &mut self,
        min_version: i32,
        name: impl Into<String>,
        parent: Option<i32>,
    ) -> Result<(), RegistryError> {
        if self.families.contains_key(&min_version) {
            return Err(RegistryError::DuplicateFamily(min_version));
        }
        if let Some(parent) = parent
            && (parent >= min_version || !self.families.contains_key(&parent))
        {
            return Err(RegistryError::InvalidParent {
                family: min_version,
                parent,
            });
        }
        self.families.insert(
            min_version,
            Family {
                name: name.into(),
                parent,
                capabilities: FxHashMap::default(),
            },
        );
        Ok(())
    }

    /// Registers `capability` on the family starting at `min_version`,
    /// replacing any earlier registration of the same kind.
    pub fn register(&mut self, min_version: i32, capability: Capability) -> Result<(), RegistryError> {
        let family = self
            .families
            .get_mut(&min_version)
            .ok_or(RegistryError::UnknownFamily(min_version))?;
        family.capabilities.insert(capability.kind(), capability);
        Ok(())
    }

    /// Minimum version of the family covering `version`, if any.
    pub fn family_for(&self, version: i32) -> Option<i32> {
        if version > self.newest_known {
            return None;
        }
        self.families.range(..=version).next_back().map(|(&min, _)| min)
    }

    /// Finds the implementation of `kind` for chunks of `version`.
    pub fn resolve(&self, version: i32, kind: CapabilityKind) -> Result<&Capability, RegistryError> {
        let unsupported = RegistryError::Unsupported { version, kind };
        let mut current = self.family_for(version);
        while let Some(min_version) = current {
            let family = self.families.get(&min_version).ok_or_else(|| unsupported.clone())?;
            if let Some(capability) = family.capabilities.get(&kind) {
                return Ok(capability);
            }
            current = family.parent;
        }
        Err(unsupported)
    }

    pub fn codec(&self, version: i32) -> Result<PackedArrayCodec, RegistryError> {
        match self.resolve(version, CapabilityKind::PackedIndices)? {
            Capability::PackedIndices(codec) => Ok(*codec),
            _ => Err(RegistryError::Unsupported {
                version,
                kind: CapabilityKind::PackedIndices,
            }),
        }
    }

    pub fn layout(&self, version: i32) -> Result<&Arc<dyn SectionLayout>, RegistryError> {
        match self.resolve(version, CapabilityKind::SectionLayout)? {
            Capability::SectionLayout(layout) => Ok(layout),
            _ => Err(RegistryError::Unsupported {
                version,
                kind: CapabilityKind::SectionLayout,
            }),
        }
    }

    pub fn heightmap(&self, version: i32) -> Result<&Arc<dyn HeightmapEncoder>, RegistryError> {
        match self.resolve(version, CapabilityKind::Heightmap)? {
            Capability::Heightmap(encoder) => Ok(encoder),
            _ => Err(RegistryError::Unsupported {
                version,
                kind: CapabilityKind::Heightmap,
            }),
        }
    }

    /// Every declared family, oldest first.
    pub fn families(&self) -> Vec<FamilyInfo> {
        self.families
            .iter()
            .map(|(&min_version, family)| {
                let mut own: Vec<CapabilityKind> = family.capabilities.keys().copied().collect();
                own.sort();
                FamilyInfo {
                    min_version,
                    name: family.name.clone(),
                    parent: family.parent,
                    own,
                }
            })
            .collect()
    }

    pub fn newest_known(&self) -> i32 {
        self.newest_known
    }
}

impl Default for VersionCapabilityRegistry {
    fn default() -> Self {
        Self::java_edition()
    }
}

impl fmt::Debug for VersionCapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionCapabilityRegistry")
            .field("families", &self.families.keys().collect::<Vec<_>>())
            .field("newest_known", &self.newest_known)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Packing;

    #[test]
    fn test_builtin_tables_are_consistent() {
        // Replaying the tables through the checked API must succeed.
        let mut checked = VersionCapabilityRegistry::new(NEWEST_KNOWN_VERSION);
        for &(min_version, name, parent) in JAVA_FAMILIES {
            checked.declare_family(min_version, name, parent).unwrap();
        }
        for &(min_version, factory) in JAVA_CAPABILITIES {
            checked.register(min_version, factory()).unwrap();
        }
        assert_eq!(checked.families(), VersionCapabilityRegistry::java_edition().families());
    }

    #[test]
    fn test_every_family_resolves_every_capability() {
        let registry = VersionCapabilityRegistry::java_edition();
        for family in registry.families() {
            for kind in CapabilityKind::ALL {
                assert!(
                    registry.resolve(family.min_version, kind).is_ok(),
                    "{} lacks {kind}",
                    family.name
                );
            }
        }
    }

    #[test]
    fn test_floor_match() {
        let registry = VersionCapabilityRegistry::java_edition();
        assert_eq!(registry.family_for(1451), Some(1451));
        assert_eq!(registry.family_for(2528), Some(1451));
        assert_eq!(registry.family_for(2529), Some(2529));
        assert_eq!(registry.family_for(3465), Some(2844));
        assert_eq!(registry.family_for(NEWEST_KNOWN_VERSION), Some(2844));
        assert_eq!(registry.family_for(1450), None);
    }

    #[test]
    fn test_codec_switches_at_aligned_packing() {
        let registry = VersionCapabilityRegistry::java_edition();
        assert_eq!(registry.codec(2230).unwrap().packing(), Packing::Spanning);
        assert_eq!(registry.codec(2586).unwrap().packing(), Packing::Aligned);
        // Inherited through root-sections.
        assert_eq!(registry.codec(3465).unwrap().packing(), Packing::Aligned);
    }

    #[test]
    fn test_layout_inherited_until_root_sections() {
        let registry = VersionCapabilityRegistry::java_edition();
        assert_eq!(registry.layout(2586).unwrap().name(), "Level.Sections");
        assert_eq!(registry.layout(2844).unwrap().name(), "sections");
        assert_eq!(registry.heightmap(2230).unwrap().word_count(), 36);
        assert_eq!(registry.heightmap(3000).unwrap().word_count(), 37);
    }

    #[test]
    fn test_unknown_versions_are_unsupported() {
        let registry = VersionCapabilityRegistry::java_edition();
        for version in [99999, 1343, -1] {
            assert_eq!(
                registry.resolve(version, CapabilityKind::SectionLayout).unwrap_err(),
                RegistryError::Unsupported {
                    version,
                    kind: CapabilityKind::SectionLayout
                }
            );
        }
    }

    #[test]
    fn test_missing_capability_without_parent() {
        let mut registry = VersionCapabilityRegistry::new(5000);
        registry.declare_family(100, "bare", None).unwrap();
        registry.register(100, aligned_codec()).unwrap();
        assert!(registry.codec(150).is_ok());
        assert!(matches!(
            registry.heightmap(150),
            Err(RegistryError::Unsupported { version: 150, .. })
        ));
    }

    #[test]
    fn test_declaration_errors() {
        let mut registry = VersionCapabilityRegistry::new(5000);
        registry.declare_family(100, "a", None).unwrap();
        assert_eq!(registry.declare_family(100, "b", None), Err(RegistryError::DuplicateFamily(100)));
        assert_eq!(
            registry.declare_family(50, "c", Some(100)),
            Err(RegistryError::InvalidParent { family: 50, parent: 100 })
        );
        assert_eq!(
            registry.declare_family(200, "d", Some(150)),
            Err(RegistryError::InvalidParent { family: 200, parent: 150 })
        );
        assert_eq!(registry.register(300, spanning_codec()), Err(RegistryError::UnknownFamily(300)));
    }

    #[test]
    fn test_child_override_shadows_parent() {
        let mut registry = VersionCapabilityRegistry::new(5000);
        registry.declare_family(100, "old", None).unwrap();
        registry.declare_family(200, "new", Some(100)).unwrap();
        registry.register(100, spanning_codec()).unwrap();
        registry.register(200, aligned_codec()).unwrap();
        assert_eq!(registry.codec(199).unwrap().packing(), Packing::Spanning);
        assert_eq!(registry.codec(200).unwrap().packing(), Packing::Aligned);
    }
}
