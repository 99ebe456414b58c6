//! Exporter configuration.
//!
//! Settings persist as `config.ron` in the user's config directory and can be
//! overridden per run from the command line.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, ExportConfig, JobsConfig, default_config_dir};
pub use error::ConfigError;
