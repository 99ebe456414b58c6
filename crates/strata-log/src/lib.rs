//! Logging setup for the exporter binaries.
//!
//! Library crates only emit `tracing` events; this crate installs the
//! subscriber. Console output is human readable with thread names (workers
//! are named `strata-worker-N`), and debug builds additionally write JSON
//! lines to `strata.log` for post-mortem analysis. `log` records, such as the
//! ones from the config crate, are bridged into the same subscriber.

use std::fs::File;
use std::path::{Path, PathBuf};

use strata_config::Config;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names one.
pub const DEFAULT_FILTER: &str = "info";

/// Name of the JSON log file inside the log directory.
pub const LOG_FILE_NAME: &str = "strata.log";

/// Filter directives from the config, falling back to [`DEFAULT_FILTER`].
pub fn filter_directives(config: Option<&Config>) -> String {
    config
        .map(|c| c.debug.log_level.trim())
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over the config's `debug.log_level`. When `debug_build`
/// is set and a log directory is available (`log_dir`, else the config's
/// `debug.log_dir`), a JSON file layer is added; its path is returned.
/// Fails only if a global subscriber is already installed.
pub fn init_logging(
    log_dir: Option<&Path>,
    debug_build: bool,
    config: Option<&Config>,
) -> Result<Option<PathBuf>, TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let log_dir = log_dir.or_else(|| config.and_then(|c| c.debug.log_dir.as_deref()));
    if debug_build
        && let Some(log_dir) = log_dir
        && let Some((path, file)) = create_log_file(log_dir)
    {
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true)
            .with_timer(fmt::time::uptime())
            .json();
        subscriber.with(file_layer).try_init()?;
        return Ok(Some(path));
    }

    subscriber.try_init()?;
    Ok(None)
}

fn create_log_file(log_dir: &Path) -> Option<(PathBuf, File)> {
    std::fs::create_dir_all(log_dir).ok()?;
    let path = log_dir.join(LOG_FILE_NAME);
    let file = File::create(&path).ok()?;
    Some((path, file))
}
