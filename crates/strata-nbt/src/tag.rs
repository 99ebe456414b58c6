//! The [`Tag`] tree and its typed accessors.

use std::collections::HashMap;

/// One node of a tag tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(Vec<Tag>),
    Compound(HashMap<String, Tag>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    /// Builds a compound from `(key, tag)` pairs.
    pub fn compound<K, I>(entries: I) -> Tag
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Tag)>,
    {
        Tag::Compound(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds a string tag.
    pub fn string(value: impl Into<String>) -> Tag {
        Tag::String(value.into())
    }

    /// Wire type id of this tag.
    pub fn type_id(&self) -> u8 {
        match self {
            Tag::End => 0,
            Tag::Byte(_) => 1,
            Tag::Short(_) => 2,
            Tag::Int(_) => 3,
            Tag::Long(_) => 4,
            Tag::Float(_) => 5,
            Tag::Double(_) => 6,
            Tag::ByteArray(_) => 7,
            Tag::String(_) => 8,
            Tag::List(_) => 9,
            Tag::Compound(_) => 10,
            Tag::IntArray(_) => 11,
            Tag::LongArray(_) => 12,
        }
    }

    /// Looks up `key` if this is a compound.
    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.as_compound()?.get(key)
    }

    pub fn as_compound(&self) -> Option<&HashMap<String, Tag>> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Tag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long_array(&self) -> Option<&[i64]> {
        match self {
            Tag::LongArray(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_byte_array(&self) -> Option<&[i8]> {
        match self {
            Tag::ByteArray(values) => Some(values),
            _ => None,
        }
    }

    /// Any integral tag widened to `i64`.
    ///
    /// Section heights are stored as bytes by some writers and ints by others,
    /// so numeric lookups accept every integral width.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Tag::Byte(n) => Some(i64::from(*n)),
            Tag::Short(n) => Some(i64::from(*n)),
            Tag::Int(n) => Some(i64::from(*n)),
            Tag::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Integral tag narrowed to `i32`; `None` if it does not fit.
    pub fn as_i32(&self) -> Option<i32> {
        self.as_number().and_then(|n| i32::try_from(n).ok())
    }

    /// Iterates the compound elements of a list, skipping anything else.
    ///
    /// Yields nothing when this tag is not a list.
    pub fn compounds(&self) -> impl Iterator<Item = &Tag> {
        self.as_list()
            .unwrap_or_default()
            .iter()
            .filter(|tag| matches!(tag, Tag::Compound(_)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
