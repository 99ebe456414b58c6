//! Region file error types.

use std::path::PathBuf;

/// Errors raised while loading a region file.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    /// The file could not be read.
    #[error("failed to read region {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is shorter than its two header tables.
    #[error("region data truncated: {actual} bytes, header needs {expected}")]
    Truncated {
        /// Minimum byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },

    /// The file name does not follow `r.<x>.<z>.mca`.
    #[error("not a region file name: {0}")]
    InvalidName(String),
}
