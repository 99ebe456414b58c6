//! Tag tree error types.

/// Errors raised while reading or writing a tag tree.
#[derive(Debug, thiserror::Error)]
pub enum NbtError {
    /// The underlying reader or writer failed (includes unexpected EOF).
    #[error("tag i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// A tag type byte outside `0..=12`.
    #[error("invalid tag type: {0}")]
    InvalidTagType(u8),

    /// An array or list announced a negative element count.
    #[error("negative length: {0}")]
    NegativeLength(i32),

    /// A string payload was not valid UTF-8.
    #[error("string is not valid utf-8")]
    InvalidUtf8,

    /// A list of End tags with elements. Only empty lists use End as their
    /// element type.
    #[error("list of {0} End tags")]
    EndList(usize),

    /// Compounds and lists nested deeper than the reader allows.
    #[error("nesting exceeds {0} levels")]
    DepthLimit(usize),

    /// A string is too long for its 16-bit length prefix.
    #[error("string of {0} bytes does not fit a u16 length prefix")]
    StringTooLong(usize),
}
