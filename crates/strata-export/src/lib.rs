//! Region-to-tile export pipeline.
//!
//! One job per selected region: load the region file, aggregate each of its
//! 256 tiles that touches the selection, and write the non-empty ones. Jobs
//! run on a [`strata_jobs::JobScheduler`]; a failing region is logged and
//! counted but never stops the others.

mod error;
mod export;
mod provider;
mod setup;

pub use error::ExportError;
pub use export::{ExportSettings, ExportSummary, TileExport, export_region};
pub use provider::{RegionDirectory, RegionProvider};
pub use setup::load_config;
