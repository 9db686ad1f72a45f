use crate::filename::VideoPath;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// A video waiting to be processed
pub type QueueEntry = VideoPath;

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<QueueEntry>,
    /// Full paths of queued entries, for duplicate suppression
    pending: HashSet<PathBuf>,
    closed: bool,
}

/// Thread-safe FIFO of videos ready for processing.
///
/// Any number of producers may enqueue; a single consumer pops. A path is
/// held at most once while it is waiting, so repeated close notifications
/// or a backlog scan racing the watcher do not duplicate work.
#[derive(Debug, Default)]
pub struct IngestionQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl IngestionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; returns `false` if the same path is already waiting
    pub fn enqueue(&self, entry: QueueEntry) -> bool {
        let path = entry.full_path();
        let mut state = self.state.lock();
        if !state.pending.insert(path) {
            trace!("Ignoring duplicate queue entry {}", entry);
            return false;
        }
        debug!("Queued {} ({} waiting)", entry, state.entries.len() + 1);
        state.entries.push_back(entry);
        drop(state);
        self.available.notify_one();
        true
    }

    /// Pop the oldest entry without waiting
    pub fn try_pop(&self) -> Option<QueueEntry> {
        let mut state = self.state.lock();
        Self::pop_locked(&mut state)
    }

    /// Pop the oldest entry, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout or once the queue is closed and drained.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<QueueEntry> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(entry) = Self::pop_locked(&mut state) {
                return Some(entry);
            }
            if state.closed {
                return None;
            }
            if self
                .available
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Self::pop_locked(&mut state);
            }
        }
    }

    /// Wake any waiting consumer and make further waits return immediately.
    ///
    /// Entries already queued can still be popped.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    fn pop_locked(state: &mut QueueState) -> Option<QueueEntry> {
        let entry = state.entries.pop_front()?;
        state.pending.remove(&entry.full_path());
        Some(entry)
    }
}
