//! Export orchestration: one scheduled job per selected region.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use strata_chunk::YRange;
use strata_config::ExportConfig;
use strata_jobs::{Job, JobError, JobScheduler, Priority, Progress};
use strata_region::{RegionFile, RegionPos};
use strata_tile::{ChunkSet, Selection, TileAggregator, TilePos, TileWriteError, TileWriter};
use tracing::{debug, error, info};

use crate::error::ExportError;
use crate::provider::RegionProvider;

/// Where and how tiles are written.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportSettings {
    pub destination: PathBuf,
    pub y_range: YRange,
    pub include_air: bool,
    pub compress: bool,
    pub pretty: bool,
}

impl ExportSettings {
    /// Uncompressed, pretty-printed export of every block but air.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            y_range: YRange::FULL,
            include_air: false,
            compress: false,
            pretty: true,
        }
    }

    pub fn from_config(config: &ExportConfig, destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            y_range: YRange::from_bounds(config.min_y, config.max_y),
            include_air: config.include_air,
            compress: config.compress,
            pretty: config.pretty(),
        }
    }

    pub fn writer(&self) -> TileWriter {
        TileWriter::new(self.compress, self.pretty)
    }
}

/// Writes every non-empty, selected tile of `region` and returns how many
/// were written. `selected` of `None` means the whole region.
pub fn export_region(
    region: &RegionFile,
    selected: Option<&ChunkSet>,
    aggregator: &TileAggregator,
    settings: &ExportSettings,
) -> Result<usize, TileWriteError> {
    let writer = settings.writer();
    let mut written = 0;
    for pos in TilePos::in_region(region.location()) {
        let Some(tile) = aggregator.aggregate_region(region, pos, settings.y_range, settings.include_air, selected)
        else {
            continue;
        };
        writer.write(&tile, &settings.destination)?;
        written += 1;
    }
    debug!(region = %region.location(), tiles = written, "region exported");
    Ok(written)
}

/// Totals of one export run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub regions: usize,
    pub failed_regions: usize,
    /// Regions discarded by [`TileExport::cancel`] before they started.
    pub cancelled_regions: usize,
    pub tiles_written: usize,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wrote {} tiles from {} regions ({} failed, {} cancelled)",
            self.tiles_written, self.regions, self.failed_regions, self.cancelled_regions
        )
    }
}

type ErrorCallback = Box<dyn Fn(RegionPos, &JobError) + Send + Sync>;

/// Runs exports over a selection.
pub struct TileExport {
    provider: Arc<dyn RegionProvider>,
    aggregator: TileAggregator,
    settings: Arc<ExportSettings>,
    progress: Arc<Progress>,
    on_error: Option<ErrorCallback>,
}

impl TileExport {
    pub fn new(provider: Arc<dyn RegionProvider>, settings: ExportSettings) -> Self {
        Self {
            provider,
            aggregator: TileAggregator::default(),
            settings: Arc::new(settings),
            progress: Arc::new(Progress::new()),
            on_error: None,
        }
    }

    pub fn with_aggregator(mut self, aggregator: TileAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Called on the run thread for every region whose job failed.
    pub fn with_error_callback(mut self, callback: impl Fn(RegionPos, &JobError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Progress of the current run, one unit per region.
    pub fn progress(&self) -> &Arc<Progress> {
        &self.progress
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Discards every region job on `scheduler` that has not started yet.
    ///
    /// Regions already running finish and are written. A concurrent
    /// [`run`](Self::run) counts the discarded regions as cancelled, advances
    /// progress for them and returns normally.
    pub fn cancel(&self, scheduler: &JobScheduler) -> usize {
        let cancelled = scheduler.clear_pending();
        if cancelled > 0 {
            info!(regions = cancelled, "export cancelled");
        }
        cancelled
    }

    /// Exports every selected region and blocks until all have finished.
    ///
    /// Pending jobs already on `scheduler` are discarded first. Each region
    /// runs as a low-priority job; failed regions are logged, passed to the
    /// error callback and counted, and still advance progress. Errors are
    /// returned only for setup problems.
    pub fn run(&self, selection: &Selection, scheduler: &JobScheduler) -> Result<ExportSummary, ExportError> {
        if selection.is_empty() {
            self.progress.done("no selection");
            return Ok(ExportSummary::default());
        }

        let destination = &self.settings.destination;
        std::fs::create_dir_all(destination).map_err(|source| ExportError::Destination {
            path: destination.clone(),
            source,
        })?;

        let cleared = scheduler.clear_pending();
        if cleared > 0 {
            debug!(jobs = cleared, "discarded pending jobs");
        }
        self.progress.set_max(selection.region_count());

        let tiles = Arc::new(AtomicUsize::new(0));
        let mut jobs = HashMap::new();
        for (pos, mask) in selection.iter() {
            let id = scheduler.submit(self.region_job(pos, mask.copied(), Arc::clone(&tiles)));
            jobs.insert(id, pos);
        }
        info!(regions = jobs.len(), "export started");

        let outcomes = scheduler.outcomes();
        let (mut failed, mut cancelled) = (0, 0);
        while !jobs.is_empty() {
            let outcome = outcomes.recv().map_err(|_| ExportError::SchedulerStopped)?;
            let Some(pos) = jobs.remove(&outcome.id) else {
                continue;
            };
            match &outcome.result {
                Ok(()) => {}
                Err(JobError::Cancelled) => {
                    cancelled += 1;
                    debug!(region = %pos, "region cancelled");
                }
                Err(e) => {
                    failed += 1;
                    error!(region = %outcome.label, error = %e, "region export failed");
                    if let Some(callback) = &self.on_error {
                        callback(pos, e);
                    }
                }
            }
        }

        let summary = ExportSummary {
            regions: selection.region_count(),
            failed_regions: failed,
            cancelled_regions: cancelled,
            tiles_written: tiles.load(Ordering::SeqCst),
        };
        info!(%summary, "export finished");
        Ok(summary)
    }

    fn region_job(&self, pos: RegionPos, mask: Option<ChunkSet>, tiles: Arc<AtomicUsize>) -> Job {
        let provider = Arc::clone(&self.provider);
        let aggregator = self.aggregator.clone();
        let settings = Arc::clone(&self.settings);
        Job::new(pos.to_string(), move || -> Result<(), ExportError> {
            let Some(region) = provider.load(pos)? else {
                debug!(region = %pos, "region has no data");
                return Ok(());
            };
            let written = export_region(&region, mask.as_ref(), &aggregator, &settings)?;
            tiles.fetch_add(written, Ordering::SeqCst);
            Ok(())
        })
        .with_priority(Priority::Low)
        .with_progress(Arc::clone(&self.progress))
    }
}
