//! `strata-export`: writes the selected part of a world as JSON block tiles.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p strata-export -- --world <region dir> --output <dir>`.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use strata_config::{CliArgs, Config};
use strata_export::{ExportError, ExportSettings, RegionDirectory, RegionProvider, TileExport, load_config};
use strata_jobs::{JobScheduler, ProgressEvent};
use strata_tile::Selection;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Load config and apply CLI overrides
    let (config, config_dir) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let log_dir = config
        .debug
        .log_dir
        .clone()
        .unwrap_or_else(|| config_dir.join("logs"));
    match strata_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config)) {
        Ok(Some(path)) => info!(path = %path.display(), "writing JSON log"),
        Ok(None) => {}
        Err(e) => eprintln!("Logging unavailable: {e}"),
    }

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "export aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs, config: &Config) -> Result<(), ExportError> {
    let provider = RegionDirectory::new(&args.world);
    let selection = match &args.selection {
        Some(path) => Selection::load(path)?,
        None => Selection::whole_regions(provider.regions()?),
    };
    if selection.is_empty() {
        warn!(world = %args.world.display(), "nothing selected");
    }

    let scheduler = match config.jobs.worker_threads {
        0 => JobScheduler::with_defaults(),
        n => JobScheduler::new(n),
    };
    info!(
        workers = scheduler.thread_count(),
        regions = selection.region_count(),
        output = %args.output.display(),
        "starting export"
    );

    let settings = ExportSettings::from_config(&config.export, &args.output);
    let provider: Arc<dyn RegionProvider> = Arc::new(provider);
    let export = TileExport::new(provider, settings);

    let events = export.progress().events();
    let reporter = std::thread::Builder::new()
        .name("strata-progress".into())
        .spawn(move || {
            for event in events {
                match event {
                    ProgressEvent::Advanced { done, max, label } => {
                        info!(done, max, region = %label, "region finished");
                    }
                    ProgressEvent::Done { message } => {
                        info!(%message, "progress complete");
                        break;
                    }
                }
            }
        })
        .expect("Failed to spawn progress thread");

    let result = export.run(&selection, &scheduler);
    // Unblocks the reporter if the run ended early.
    export.progress().done("finished");
    let _ = reporter.join();

    let summary = result?;
    println!("{summary}");
    Ok(())
}
