//! Priority job scheduling on a fixed worker pool, with progress tracking.
//!
//! Jobs are independent units of work. Each runs exactly once on some worker,
//! its outcome (success, error or panic) is sent over a channel, and a
//! failing job never affects the others.

mod progress;
mod scheduler;

pub use progress::{Progress, ProgressEvent};
pub use scheduler::{Job, JobError, JobId, JobOutcome, JobScheduler, JobState, Priority};
