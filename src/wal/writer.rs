//! Batched WAL writer
//!
//! Writers append under one mutex and then block until the batch holding
//! their record has been flushed. A single flusher thread ([`Wal::run`])
//! writes batches out when they fill up or when the flush timer fires.
//!
//! ```text
//!   save() ──► [ current batch ] ──full──► handoff channel ──┐
//!                     │                                      ▼
//!                     └────────── timer tick ──────────► flusher ──► LogStore
//!                                                            │
//!   save() ◄──────────────── FlushSignal (ok / failed) ◄─────┘
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::Result;
use crate::shutdown::Shutdown;

use super::batch::Batch;
use super::log::{LogStore, Recovered};
use super::{CommandKind, WalRecord};

/// Full batches that may wait for the flusher before writers block
const HANDOFF_CAPACITY: usize = 16;

/// Batching parameters
#[derive(Debug, Clone)]
pub struct WalOptions {
    /// Records per batch before an immediate flush
    pub batch_size: usize,

    /// Upper bound on how long a partial batch waits
    pub flush_timeout: Duration,
}

impl WalOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.wal_batch_size,
            flush_timeout: config.wal_flush_timeout,
        }
    }
}

impl Default for WalOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_timeout: Duration::from_millis(10),
        }
    }
}

struct WalState {
    batch: Batch,
    next_lsn: u64,
    closed: bool,
}

enum FlusherEvent {
    Tick,
    Full(Batch),
    Shutdown,
}

/// Write-ahead log with group commit
pub struct Wal {
    options: WalOptions,
    store: Arc<dyn LogStore>,
    state: Mutex<WalState>,
    handoff_tx: Sender<Batch>,
    handoff_rx: Receiver<Batch>,
    /// Full batches swapped out but not yet taken by the flusher
    pending_handoffs: AtomicUsize,
}

impl Wal {
    pub fn new(options: WalOptions, store: Arc<dyn LogStore>) -> Self {
        let options = WalOptions {
            batch_size: options.batch_size.max(1),
            ..options
        };
        let (handoff_tx, handoff_rx) = channel::bounded(HANDOFF_CAPACITY);

        Self {
            state: Mutex::new(WalState {
                batch: Batch::new(options.batch_size),
                next_lsn: 1,
                closed: false,
            }),
            options,
            store,
            handoff_tx,
            handoff_rx,
            pending_handoffs: AtomicUsize::new(0),
        }
    }

    /// Log one command and wait until it is durable
    ///
    /// Returns false if the flush failed or the WAL is shut down. Requires a
    /// running flusher ([`Wal::run`]).
    pub fn save(&self, tx_id: u64, kind: CommandKind, args: Vec<String>) -> bool {
        let (signal, full) = {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }

            let lsn = state.next_lsn;
            state.next_lsn += 1;
            state.batch.push(WalRecord::new(lsn, tx_id, kind, args));

            let signal = state.batch.signal();
            let full = if state.batch.is_full() {
                self.pending_handoffs.fetch_add(1, Ordering::SeqCst);
                let fresh = Batch::new(self.options.batch_size);
                Some(std::mem::replace(&mut state.batch, fresh))
            } else {
                None
            };
            (signal, full)
        };

        if let Some(batch) = full {
            if self.handoff_tx.send(batch).is_err() {
                // The returned batch is dropped, failing its waiters
                self.pending_handoffs.fetch_sub(1, Ordering::SeqCst);
            }
        }

        signal.wait()
    }

    /// Flusher loop; returns after draining on shutdown
    pub fn run(&self, shutdown: &Shutdown) {
        info!(
            batch_size = self.options.batch_size,
            flush_timeout_ms = self.options.flush_timeout.as_millis() as u64,
            "WAL flusher started"
        );

        let shutdown_rx = shutdown.receiver();
        let mut ticker = channel::tick(self.options.flush_timeout);

        loop {
            let event = select! {
                recv(shutdown_rx) -> _ => FlusherEvent::Shutdown,
                recv(self.handoff_rx) -> msg => match msg {
                    Ok(batch) => FlusherEvent::Full(batch),
                    Err(_) => FlusherEvent::Shutdown,
                },
                recv(ticker) -> _ => FlusherEvent::Tick,
            };

            match event {
                FlusherEvent::Full(batch) => {
                    self.pending_handoffs.fetch_sub(1, Ordering::SeqCst);
                    ticker = channel::tick(self.options.flush_timeout);
                    self.flush(batch);
                }
                FlusherEvent::Tick => {
                    self.flush_handoffs();
                    if let Some(batch) = self.take_partial() {
                        self.flush(batch);
                    }
                }
                FlusherEvent::Shutdown => {
                    self.drain();
                    break;
                }
            }
        }

        info!("WAL flusher stopped");
    }

    /// Read every logged record, ordered by LSN, and prime the LSN counter
    pub fn recover(&self) -> Result<Vec<WalRecord>> {
        let Recovered {
            mut records,
            report,
        } = self.store.read()?;

        info!(
            segments = report.segments_scanned,
            frames = report.frames_recovered,
            records = report.records_recovered,
            damaged = report.damaged_segments.len(),
            "WAL recovery scan complete"
        );

        records.sort_by_key(|record| record.lsn);

        if let Some(last) = records.last() {
            let mut state = self.state.lock();
            state.next_lsn = state.next_lsn.max(last.lsn + 1);
        }

        Ok(records)
    }

    /// LSN the next saved record will get
    pub fn next_lsn(&self) -> u64 {
        self.state.lock().next_lsn
    }

    pub fn options(&self) -> &WalOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn take_partial(&self) -> Option<Batch> {
        let mut state = self.state.lock();
        if state.batch.is_empty() {
            return None;
        }
        let fresh = Batch::new(self.options.batch_size);
        Some(std::mem::replace(&mut state.batch, fresh))
    }

    /// Flush full batches already queued, oldest first
    fn flush_handoffs(&self) {
        while let Ok(batch) = self.handoff_rx.try_recv() {
            self.pending_handoffs.fetch_sub(1, Ordering::SeqCst);
            self.flush(batch);
        }
    }

    fn drain(&self) {
        let partial = {
            let mut state = self.state.lock();
            state.closed = true;
            let fresh = Batch::new(self.options.batch_size);
            std::mem::replace(&mut state.batch, fresh)
        };

        // Writers that swapped a batch out before close still have to send it
        while self.pending_handoffs.load(Ordering::SeqCst) > 0 {
            match self.handoff_rx.recv() {
                Ok(batch) => {
                    self.pending_handoffs.fetch_sub(1, Ordering::SeqCst);
                    self.flush(batch);
                }
                Err(_) => break,
            }
        }

        if !partial.is_empty() {
            self.flush(partial);
        }

        debug!("WAL drained");
    }

    fn flush(&self, batch: Batch) {
        let count = batch.len();
        match self.store.write(batch.records()) {
            Ok(()) => {
                debug!(records = count, "flushed WAL batch");
                batch.complete(true);
            }
            Err(e) => {
                error!(records = count, error = %e, "WAL flush failed");
                batch.complete(false);
            }
        }
    }
}
