//! Priority queue drained by a fixed pool of worker threads.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use thiserror::Error;
use tracing::{debug, warn};

use crate::progress::Progress;

/// Identifier assigned at submission.
pub type JobId = u64;

type Work = Box<dyn FnOnce() -> Result<(), JobError> + Send + 'static>;

/// Scheduling priority. Higher priorities run first; equal priorities run
/// in submission order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Lifecycle of a job: `Pending → Running → Succeeded | Failed`, or
/// `Pending → Cancelled` when discarded before it started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Why a job failed.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("job panicked: {0}")]
    Panicked(String),

    /// Discarded by [`JobScheduler::clear_pending`] before it ran.
    #[error("job cancelled before it started")]
    Cancelled,
}

impl JobError {
    pub fn failed(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Failed(error.into())
    }
}

/// A unit of work waiting to be scheduled.
pub struct Job {
    label: String,
    priority: Priority,
    progress: Option<Arc<Progress>>,
    work: Work,
}

impl Job {
    /// Wraps `work`. Any error it returns becomes [`JobError::Failed`].
    pub fn new<F, E>(label: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            label: label.into(),
            priority: Priority::default(),
            progress: None,
            work: Box::new(move || work().map_err(JobError::failed)),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Advances `progress` by one when the job ends, whatever the outcome.
    pub fn with_progress(mut self, progress: Arc<Progress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("label", &self.label)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Terminal result of one job.
#[derive(Debug)]
pub struct JobOutcome {
    pub id: JobId,
    pub label: String,
    pub result: Result<(), JobError>,
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self.result {
            Ok(()) => JobState::Succeeded,
            Err(JobError::Cancelled) => JobState::Cancelled,
            Err(_) => JobState::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

struct QueuedJob {
    id: JobId,
    seq: u64,
    job: Job,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // Max-heap: higher priority first, then lower sequence number.
    fn cmp(&self, other: &Self) -> Ordering {
        self.job
            .priority
            .cmp(&other.job.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueuedJob>,
    running: HashSet<JobId>,
    next_id: JobId,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Jobs run outside the lock, so a poisoned guard still holds
        // consistent queue state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Runs submitted jobs on a fixed pool of worker threads.
///
/// Every submitted job produces exactly one [`JobOutcome`], including jobs
/// discarded before they ran. Dropping the scheduler cancels pending jobs and
/// waits for running ones to finish.
pub struct JobScheduler {
    shared: Arc<Shared>,
    sender: Sender<JobOutcome>,
    outcomes: Receiver<JobOutcome>,
    workers: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    /// Starts `thread_count` workers (at least one).
    pub fn new(thread_count: usize) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
        });
        let (sender, outcomes) = unbounded();

        let workers = (0..thread_count.max(1))
            .map(|i| {
                let shared = Arc::clone(&shared);
                let sender = sender.clone();
                std::thread::Builder::new()
                    .name(format!("strata-worker-{i}"))
                    .spawn(move || worker_loop(&shared, &sender))
                    .expect("Failed to spawn job worker thread")
            })
            .collect();

        Self {
            shared,
            sender,
            outcomes,
            workers,
        }
    }

    /// One worker per core, leaving one core for the submitting thread.
    pub fn with_defaults() -> Self {
        Self::new(num_cpus::get().saturating_sub(1).max(1))
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues `job` and returns its id.
    pub fn submit(&self, job: Job) -> JobId {
        let mut state = self.shared.lock();
        let id = state.next_id;
        state.next_id += 1;
        debug!(job = %job.label, id, priority = ?job.priority, "job queued");
        state.heap.push(QueuedJob { id, seq: id, job });
        drop(state);
        self.shared.available.notify_one();
        id
    }

    /// Discards every job that has not started yet and returns how many were
    /// dropped. Running jobs are unaffected.
    ///
    /// Each discarded job still advances its progress and reports a
    /// [`JobError::Cancelled`] outcome, so anyone waiting on it finishes.
    pub fn clear_pending(&self) -> usize {
        let cleared = std::mem::take(&mut self.shared.lock().heap);
        self.cancel(cleared)
    }

    fn cancel(&self, cleared: BinaryHeap<QueuedJob>) -> usize {
        let count = cleared.len();
        for QueuedJob { id, job, .. } in cleared.into_sorted_vec().into_iter().rev() {
            debug!(job = %job.label, id, "job cancelled");
            if let Some(progress) = &job.progress {
                progress.increment(&job.label);
            }
            let _ = self.sender.send(JobOutcome {
                id,
                label: job.label,
                result: Err(JobError::Cancelled),
            });
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().heap.len()
    }

    pub fn running(&self) -> usize {
        self.shared.lock().running.len()
    }

    /// `Pending` or `Running` for live jobs. Finished and cleared jobs are
    /// no longer tracked; their state is on the [`JobOutcome`].
    pub fn state(&self, id: JobId) -> Option<JobState> {
        let state = self.shared.lock();
        if state.running.contains(&id) {
            Some(JobState::Running)
        } else if state.heap.iter().any(|q| q.id == id) {
            Some(JobState::Pending)
        } else {
            None
        }
    }

    /// Channel carrying one [`JobOutcome`] per finished job.
    pub fn outcomes(&self) -> Receiver<JobOutcome> {
        self.outcomes.clone()
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        let cleared = {
            let mut state = self.shared.lock();
            state.shutdown = true;
            std::mem::take(&mut state.heap)
        };
        self.cancel(cleared);
        self.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &Shared, outcomes: &Sender<JobOutcome>) {
    loop {
        let QueuedJob { id, job, .. } = {
            let mut state = shared.lock();
            loop {
                if let Some(next) = state.heap.pop() {
                    state.running.insert(next.id);
                    break next;
                }
                if state.shutdown {
                    return;
                }
                state = shared
                    .available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let Job {
            label, progress, work, ..
        } = job;
        let result = catch_unwind(AssertUnwindSafe(work))
            .unwrap_or_else(|panic| Err(JobError::Panicked(panic_message(panic.as_ref()))));
        match &result {
            Ok(()) => debug!(job = %label, id, "job finished"),
            Err(e) => warn!(job = %label, id, error = %e, "job failed"),
        }
        if let Some(progress) = progress {
            progress.increment(&label);
        }

        shared.lock().running.remove(&id);
        let _ = outcomes.send(JobOutcome { id, label, result });
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    const WAIT: Duration = Duration::from_secs(10);

    fn collect(scheduler: &JobScheduler, count: usize) -> Vec<JobOutcome> {
        let outcomes = scheduler.outcomes();
        (0..count).map(|_| outcomes.recv_timeout(WAIT).unwrap()).collect()
    }

    /// Occupies the single worker until the returned sender is used.
    fn block_worker(scheduler: &JobScheduler) -> (JobId, mpsc::Sender<()>, mpsc::Receiver<()>) {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let id = scheduler.submit(Job::new("blocker", move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            Ok::<(), JobError>(())
        }));
        (id, release_tx, started_rx)
    }

    #[test]
    fn test_all_jobs_complete() {
        let scheduler = JobScheduler::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for i in 0..32 {
            let counter = Arc::clone(&counter);
            scheduler.submit(Job::new(format!("job-{i}"), move || {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
                Ok::<(), JobError>(())
            }));
        }
        let outcomes = collect(&scheduler, 32);
        assert!(outcomes.iter().all(|o| o.state() == JobState::Succeeded));
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 32);
    }

    #[test]
    fn test_priority_then_fifo_order() {
        let scheduler = JobScheduler::new(1);
        let (_, release, started) = block_worker(&scheduler);
        started.recv_timeout(WAIT).unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        for (label, priority) in [
            ("low-1", Priority::Low),
            ("normal", Priority::Normal),
            ("low-2", Priority::Low),
            ("high", Priority::High),
        ] {
            let order = Arc::clone(&order);
            scheduler.submit(
                Job::new(label, move || {
                    order.lock().unwrap().push(label);
                    Ok::<(), JobError>(())
                })
                .with_priority(priority),
            );
        }
        assert_eq!(scheduler.pending(), 4);
        release.send(()).unwrap();
        collect(&scheduler, 5);
        assert_eq!(*order.lock().unwrap(), vec!["high", "normal", "low-1", "low-2"]);
    }

    #[test]
    fn test_failing_job_advances_progress_once_and_spares_siblings() {
        let scheduler = JobScheduler::new(2);
        let progress = Arc::new(Progress::new());
        progress.set_max(3);

        scheduler.submit(Job::new("ok-1", || Ok::<(), JobError>(())).with_progress(Arc::clone(&progress)));
        scheduler.submit(
            Job::new("broken", || Err(std::io::Error::other("region read failed")))
                .with_progress(Arc::clone(&progress)),
        );
        scheduler.submit(Job::new("ok-2", || Ok::<(), JobError>(())).with_progress(Arc::clone(&progress)));

        let outcomes = collect(&scheduler, 3);
        assert_eq!(progress.completed(), 3);
        assert!(progress.is_done());
        let failed: Vec<&JobOutcome> = outcomes.iter().filter(|o| o.result.is_err()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].label, "broken");
        assert!(failed[0].result.as_ref().unwrap_err().to_string().contains("region read failed"));
    }

    #[test]
    fn test_panic_is_caught() {
        let scheduler = JobScheduler::new(1);
        let progress = Arc::new(Progress::new());
        scheduler.submit(
            Job::new("explodes", || -> Result<(), JobError> { panic!("bad chunk") })
                .with_progress(Arc::clone(&progress)),
        );
        scheduler.submit(Job::new("after", || Ok::<(), JobError>(())));

        let outcomes = collect(&scheduler, 2);
        assert!(matches!(&outcomes[0].result, Err(JobError::Panicked(msg)) if msg == "bad chunk"));
        assert!(outcomes[1].result.is_ok());
        assert_eq!(progress.completed(), 1);
    }

    #[test]
    fn test_clear_pending_keeps_running_job() {
        let scheduler = JobScheduler::new(1);
        let (blocker, release, started) = block_worker(&scheduler);
        started.recv_timeout(WAIT).unwrap();
        assert_eq!(scheduler.state(blocker), Some(JobState::Running));
        assert_eq!(scheduler.running(), 1);

        let queued: Vec<JobId> = (0..3)
            .map(|i| scheduler.submit(Job::new(format!("q{i}"), || Ok::<(), JobError>(()))))
            .collect();
        assert_eq!(scheduler.state(queued[0]), Some(JobState::Pending));
        assert_eq!(scheduler.clear_pending(), 3);
        assert_eq!(scheduler.state(queued[0]), None);

        let cancelled = collect(&scheduler, 3);
        assert_eq!(cancelled.iter().map(|o| o.id).collect::<Vec<_>>(), queued);
        assert!(cancelled.iter().all(|o| o.state() == JobState::Cancelled));

        release.send(()).unwrap();
        let outcome = scheduler.outcomes().recv_timeout(WAIT).unwrap();
        assert_eq!(outcome.id, blocker);
        assert!(outcome.result.is_ok());
        assert!(scheduler.outcomes().recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_cancelled_jobs_complete_progress() {
        let scheduler = JobScheduler::new(1);
        let (_, release, started) = block_worker(&scheduler);
        started.recv_timeout(WAIT).unwrap();

        let progress = Arc::new(Progress::new());
        progress.set_max(2);
        let ran = Arc::new(AtomicUsize::new(0));
        for i in 0..2 {
            let ran = Arc::clone(&ran);
            scheduler.submit(
                Job::new(format!("region-{i}"), move || {
                    ran.fetch_add(1, AtomicOrdering::SeqCst);
                    Ok::<(), JobError>(())
                })
                .with_progress(Arc::clone(&progress)),
            );
        }
        assert_eq!(scheduler.clear_pending(), 2);
        assert_eq!(progress.completed(), 2);
        assert!(progress.is_done());

        release.send(()).unwrap();
        collect(&scheduler, 3);
        assert_eq!(ran.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_drop_waits_for_running_job() {
        let finished = Arc::new(AtomicUsize::new(0));
        {
            let scheduler = JobScheduler::new(1);
            let (started_tx, started_rx) = mpsc::channel();
            let flag = Arc::clone(&finished);
            scheduler.submit(Job::new("slow", move || {
                let _ = started_tx.send(());
                std::thread::sleep(Duration::from_millis(50));
                flag.fetch_add(1, AtomicOrdering::SeqCst);
                Ok::<(), JobError>(())
            }));
            started_rx.recv_timeout(WAIT).unwrap();
        }
        assert_eq!(finished.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_with_defaults_has_a_worker() {
        assert!(JobScheduler::with_defaults().thread_count() >= 1);
    }
}
