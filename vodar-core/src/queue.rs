use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Semaphore;

use crate::store::WatchedVideo;

/// FIFO hand-off of discovered-but-not-yet-downloaded videos between the
/// discovery and dispatch loops. `enqueue` never blocks; `dequeue` suspends
/// on a semaphore until an entry is available instead of spinning.
#[derive(Debug)]
pub struct DownloadQueue {
    entries: Mutex<VecDeque<WatchedVideo>>,
    available: Semaphore,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            available: Semaphore::new(0),
        }
    }

    pub fn enqueue(&self, entry: WatchedVideo) {
        self.entries.lock().unwrap().push_back(entry);
        self.available.add_permits(1);
    }

    /// Waits until an entry is available and removes the oldest one. Each
    /// semaphore permit corresponds to exactly one queued entry.
    pub async fn dequeue(&self) -> WatchedVideo {
        let permit = self
            .available
            .acquire()
            .await
            .expect("download queue semaphore is never closed");
        permit.forget();
        self.entries
            .lock()
            .unwrap()
            .pop_front()
            .expect("semaphore permit without queued entry")
    }

    /// Advisory only; the count may be stale the instant it is returned.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DownloadQueue {
    fn default() -> Self {
        Self::new()
    }
}
