use std::path::PathBuf;

use strata_config::ConfigError;
use strata_region::RegionError;
use strata_tile::{SelectionError, TileWriteError};

/// Errors from setting up or running an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Write(#[from] TileWriteError),

    #[error("cannot create output directory {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("job scheduler stopped before all regions finished")]
    SchedulerStopped,
}
