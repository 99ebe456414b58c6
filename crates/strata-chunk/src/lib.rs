//! Block decoding for chunk columns across storage schema revisions.
//!
//! Sections store block states as fixed-width indices into a per-section
//! palette. The packing scheme and the tag layout changed several times over
//! the format's history, so every decode first resolves the chunk's data
//! version against a [`VersionCapabilityRegistry`] and then runs the matching
//! [`SectionLayout`], [`PackedArrayCodec`] and [`HeightmapEncoder`].

pub mod codec;
pub mod decoder;
pub mod heightmap;
pub mod layout;
pub mod palette;
pub mod registry;
pub mod section;

pub use codec::{CodecError, MIN_BITS, PackedArrayCodec, Packing, SECTION_VOLUME, bits_for_palette};
pub use decoder::{BlockRecord, ChunkBlockDecoder, DecodedChunk, YRange, data_version, extract_chunk};
pub use heightmap::{AlignedHeightmap, COLUMNS, HeightmapEncoder, SpanningHeightmap, scan_heights};
pub use layout::{LevelSections, RootSections, SectionLayout};
pub use palette::{AIR_BLOCKS, BlockState, PaletteTable, is_air};
pub use registry::{
    Capability, CapabilityKind, FamilyInfo, NEWEST_KNOWN_VERSION, RegistryError,
    VersionCapabilityRegistry,
};
pub use section::{ChunkData, Section, SectionCells};
