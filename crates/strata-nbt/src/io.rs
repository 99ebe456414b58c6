//! Big-endian binary reader and writer for [`Tag`] trees.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::NbtError;
use crate::tag::Tag;

/// Maximum nesting of lists and compounds accepted by the reader.
const MAX_DEPTH: usize = 512;

/// Upper bound on up-front allocation for a length-prefixed payload. Longer
/// payloads still load, they just grow as bytes actually arrive.
const PREALLOC_LIMIT: usize = 1 << 16;

/// Reads a named root tag, returning its name and payload.
pub fn read_root<R: Read>(reader: &mut R) -> Result<(String, Tag), NbtError> {
    let type_id = reader.read_u8()?;
    if type_id == 0 {
        return Ok((String::new(), Tag::End));
    }
    let name = read_string(reader)?;
    let tag = read_payload(reader, type_id, 0)?;
    Ok((name, tag))
}

/// Parses an uncompressed tag tree and discards the root name.
pub fn from_bytes(bytes: &[u8]) -> Result<Tag, NbtError> {
    let (_, tag) = read_root(&mut Cursor::new(bytes))?;
    Ok(tag)
}

/// Writes `tag` as a named root.
pub fn write_root<W: Write>(writer: &mut W, name: &str, tag: &Tag) -> Result<(), NbtError> {
    writer.write_u8(tag.type_id())?;
    if matches!(tag, Tag::End) {
        return Ok(());
    }
    write_string(writer, name)?;
    write_payload(writer, tag)
}

/// Serializes `tag` as an unnamed root.
pub fn to_bytes(tag: &Tag) -> Result<Vec<u8>, NbtError> {
    let mut out = Vec::new();
    write_root(&mut out, "", tag)?;
    Ok(out)
}

fn read_len<R: Read>(reader: &mut R) -> Result<usize, NbtError> {
    let len = reader.read_i32::<BigEndian>()?;
    usize::try_from(len).map_err(|_| NbtError::NegativeLength(len))
}

fn read_string<R: Read>(reader: &mut R) -> Result<String, NbtError> {
    let len = reader.read_u16::<BigEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| NbtError::InvalidUtf8)
}

fn read_vec<R, T, F>(reader: &mut R, read_one: F) -> Result<Vec<T>, NbtError>
where
    R: Read,
    F: FnMut(&mut R) -> Result<T, NbtError>,
{
    let len = read_len(reader)?;
    read_elements(reader, len, read_one)
}

fn read_elements<R, T, F>(reader: &mut R, len: usize, mut read_one: F) -> Result<Vec<T>, NbtError>
where
    R: Read,
    F: FnMut(&mut R) -> Result<T, NbtError>,
{
    let mut out = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    for _ in 0..len {
        out.push(read_one(reader)?);
    }
    Ok(out)
}

fn read_payload<R: Read>(reader: &mut R, type_id: u8, depth: usize) -> Result<Tag, NbtError> {
    if depth > MAX_DEPTH {
        return Err(NbtError::DepthLimit(MAX_DEPTH));
    }
    let tag = match type_id {
        0 => Tag::End,
        1 => Tag::Byte(reader.read_i8()?),
        2 => Tag::Short(reader.read_i16::<BigEndian>()?),
        3 => Tag::Int(reader.read_i32::<BigEndian>()?),
        4 => Tag::Long(reader.read_i64::<BigEndian>()?),
        5 => Tag::Float(reader.read_f32::<BigEndian>()?),
        6 => Tag::Double(reader.read_f64::<BigEndian>()?),
        7 => Tag::ByteArray(read_vec(reader, |r| Ok(r.read_i8()?))?),
        8 => Tag::String(read_string(reader)?),
        9 => {
            let element_type = reader.read_u8()?;
            if element_type > 12 {
                return Err(NbtError::InvalidTagType(element_type));
            }
            let len = read_len(reader)?;
            // End elements consume no input, so only an empty End list is bounded by the data.
            if element_type == 0 && len > 0 {
                return Err(NbtError::EndList(len));
            }
            Tag::List(read_elements(reader, len, |r| read_payload(r, element_type, depth + 1))?)
        }
        10 => {
            let mut compound = HashMap::new();
            loop {
                let child_type = reader.read_u8()?;
                if child_type == 0 {
                    break;
                }
                let name = read_string(reader)?;
                let child = read_payload(reader, child_type, depth + 1)?;
                compound.insert(name, child);
            }
            Tag::Compound(compound)
        }
        11 => Tag::IntArray(read_vec(reader, |r| Ok(r.read_i32::<BigEndian>()?))?),
        12 => Tag::LongArray(read_vec(reader, |r| Ok(r.read_i64::<BigEndian>()?))?),
        other => return Err(NbtError::InvalidTagType(other)),
    };
    Ok(tag)
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<(), NbtError> {
    let len = u16::try_from(value.len()).map_err(|_| NbtError::StringTooLong(value.len()))?;
    writer.write_u16::<BigEndian>(len)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn write_payload<W: Write>(writer: &mut W, tag: &Tag) -> Result<(), NbtError> {
    match tag {
        Tag::End => {}
        Tag::Byte(v) => writer.write_i8(*v)?,
        Tag::Short(v) => writer.write_i16::<BigEndian>(*v)?,
        Tag::Int(v) => writer.write_i32::<BigEndian>(*v)?,
        Tag::Long(v) => writer.write_i64::<BigEndian>(*v)?,
        Tag::Float(v) => writer.write_f32::<BigEndian>(*v)?,
        Tag::Double(v) => writer.write_f64::<BigEndian>(*v)?,
        Tag::ByteArray(values) => {
            writer.write_i32::<BigEndian>(values.len() as i32)?;
            for &b in values {
                writer.write_i8(b)?;
            }
        }
        Tag::String(s) => write_string(writer, s)?,
        Tag::List(values) => {
            // Empty lists are written with an End element type.
            let element_type = values.first().map_or(0, Tag::type_id);
            if element_type == 0 && !values.is_empty() {
                return Err(NbtError::EndList(values.len()));
            }
            writer.write_u8(element_type)?;
            writer.write_i32::<BigEndian>(values.len() as i32)?;
            for value in values {
                write_payload(writer, value)?;
            }
        }
        Tag::Compound(entries) => {
            for (name, child) in entries {
                write_root(writer, name, child)?;
            }
            writer.write_u8(0)?;
        }
        Tag::IntArray(values) => {
            writer.write_i32::<BigEndian>(values.len() as i32)?;
            for &v in values {
                writer.write_i32::<BigEndian>(v)?;
            }
        }
        Tag::LongArray(values) => {
            writer.write_i32::<BigEndian>(values.len() as i32)?;
            for &v in values {
                writer.write_i64::<BigEndian>(v)?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
