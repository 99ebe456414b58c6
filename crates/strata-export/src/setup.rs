//! Start-up steps shared by the binary and its tests.

use std::path::PathBuf;

use strata_config::{CliArgs, Config, default_config_dir};

use crate::error::ExportError;

/// Loads `config.ron` from `--config` or the default config directory,
/// creating it when missing, and applies the CLI overrides.
///
/// Returns the config and the directory it came from. A config file that
/// cannot be read or parsed is an error, not silently replaced by defaults.
pub fn load_config(args: &CliArgs) -> Result<(Config, PathBuf), ExportError> {
    let config_dir = match &args.config {
        Some(dir) => dir.clone(),
        None => default_config_dir()?,
    };
    let mut config = Config::load_or_create(&config_dir)?;
    config.apply_cli_overrides(args);
    Ok((config, config_dir))
}
