//! WAL batches
//!
//! A batch groups records flushed with one segment write. Every writer that
//! appended to the batch waits on the same [`FlushSignal`] and sees the same
//! outcome.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::WalRecord;

/// One-shot outcome shared by every waiter of a batch
#[derive(Debug, Default)]
pub struct FlushSignal {
    outcome: Mutex<Option<bool>>,
    cond: Condvar,
}

impl FlushSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the outcome; only the first call has an effect
    pub fn notify(&self, persisted: bool) {
        let mut outcome = self.outcome.lock();
        if outcome.is_none() {
            *outcome = Some(persisted);
            self.cond.notify_all();
        }
    }

    /// Block until the outcome is published
    pub fn wait(&self) -> bool {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(persisted) = *outcome {
                return persisted;
            }
            self.cond.wait(&mut outcome);
        }
    }

    /// Outcome, if already published
    pub fn outcome(&self) -> Option<bool> {
        *self.outcome.lock()
    }
}

/// Records awaiting a flush
///
/// Dropping a batch that was never completed reports failure to its
/// waiters, so no writer can be left blocked on a lost batch.
#[derive(Debug)]
pub struct Batch {
    records: Vec<WalRecord>,
    capacity: usize,
    signal: Arc<FlushSignal>,
}

impl Batch {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
            signal: Arc::new(FlushSignal::new()),
        }
    }

    pub fn push(&mut self, record: WalRecord) {
        self.records.push(record);
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[WalRecord] {
        &self.records
    }

    /// Handle to wait on this batch's outcome
    pub fn signal(&self) -> Arc<FlushSignal> {
        Arc::clone(&self.signal)
    }

    /// Fan the flush outcome out to every waiter
    pub fn complete(self, persisted: bool) {
        self.signal.notify(persisted);
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        self.signal.notify(false);
    }
}
