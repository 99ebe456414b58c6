//! Typed tag tree for the chunk storage format.
//!
//! Chunk payloads are big-endian, name-prefixed tag trees. This crate turns raw
//! bytes into a [`Tag`] tree and offers lookups that report "missing" and
//! "wrong type" as `None` so decoders can skip bad data instead of failing.

mod error;
mod io;
mod tag;

pub use error::NbtError;
pub use io::{from_bytes, read_root, to_bytes, write_root};
pub use tag::Tag;
