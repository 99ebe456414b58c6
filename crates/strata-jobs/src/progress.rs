//! Shared completion counter.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Emitted by [`Progress`] as work completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    Advanced { done: usize, max: usize, label: String },
    Done { message: String },
}

/// Counts finished units of work across threads.
///
/// Any thread may call [`increment`](Self::increment). Events go to every
/// receiver handed out by [`events`](Self::events) from the moment it was
/// created; with no live receiver nothing is buffered, and a dropped receiver
/// is forgotten on the next event. The done transition happens once: either
/// when the count reaches the maximum or on an explicit
/// [`done`](Self::done), whichever comes first.
#[derive(Debug)]
pub struct Progress {
    done: AtomicUsize,
    max: AtomicUsize,
    finished: AtomicBool,
    subscribers: Mutex<Vec<Sender<ProgressEvent>>>,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            done: AtomicUsize::new(0),
            max: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Sets the number of units expected.
    pub fn set_max(&self, max: usize) {
        self.max.store(max, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }

    /// Records one finished unit and returns the new count.
    pub fn increment(&self, label: &str) -> usize {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        let max = self.max();
        self.emit(ProgressEvent::Advanced {
            done,
            max,
            label: label.to_string(),
        });
        if max > 0 && done >= max {
            self.done("done");
        }
        done
    }

    /// Marks the whole operation finished. Later calls are ignored.
    pub fn done(&self, message: &str) {
        if self
            .finished
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.emit(ProgressEvent::Done {
                message: message.to_string(),
            });
        }
    }

    pub fn is_done(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// New receiver for the events emitted from now on.
    pub fn events(&self) -> Receiver<ProgressEvent> {
        let (sender, receiver) = unbounded();
        self.lock_subscribers().push(sender);
        receiver
    }

    fn emit(&self, event: ProgressEvent) {
        self.lock_subscribers()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Sender<ProgressEvent>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}
