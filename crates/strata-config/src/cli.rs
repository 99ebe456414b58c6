//! Command-line arguments for the exporter.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Export selected chunks of a world as 32×32 JSON block tiles.
///
/// Flags override settings loaded from `config.ron`.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "strata-export", version)]
pub struct CliArgs {
    /// Directory holding the world's `r.<x>.<z>.mca` region files.
    #[arg(long)]
    pub world: PathBuf,

    /// Directory tiles are written to.
    #[arg(long)]
    pub output: PathBuf,

    /// Selection file (`rx;rz` or `rx;rz;cx;cz` per line). Exports every
    /// region of the world when omitted.
    #[arg(long)]
    pub selection: Option<PathBuf>,

    /// Lowest world Y to export.
    #[arg(long, allow_negative_numbers = true)]
    pub min_y: Option<i32>,

    /// Highest world Y to export.
    #[arg(long, allow_negative_numbers = true)]
    pub max_y: Option<i32>,

    /// Include air blocks.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub include_air: Option<bool>,

    /// Gzip tile files.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub compress: Option<bool>,

    /// Pretty-print tile JSON.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub pretty: Option<bool>,

    /// Worker threads (0 = automatic).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(min_y) = args.min_y {
            self.export.min_y = Some(min_y);
        }
        if let Some(max_y) = args.max_y {
            self.export.max_y = Some(max_y);
        }
        if let Some(include_air) = args.include_air {
            self.export.include_air = include_air;
        }
        if let Some(compress) = args.compress {
            self.export.compress = compress;
        }
        if let Some(pretty) = args.pretty {
            self.export.pretty = Some(pretty);
        }
        if let Some(threads) = args.threads {
            self.jobs.worker_threads = threads;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
