//! Cooperative shutdown token
//!
//! Every long-running loop (WAL flusher, replication slave, accept loop,
//! connection handlers) holds a clone of the same [`Shutdown`]. Cancelling
//! drops the only sender of an internal channel; the disconnect wakes every
//! `select!` waiting on [`Shutdown::receiver`].

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

/// Cloneable cancellation handle
#[derive(Clone)]
pub struct Shutdown {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Cancel every holder of this token; idempotent
    pub fn cancel(&self) {
        if self.trigger.lock().take().is_some() {
            tracing::debug!("shutdown signalled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Channel that becomes ready (disconnected) once cancelled
    pub fn receiver(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Sleep for up to `timeout`; returns true if cancelled meanwhile
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.signal.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shutdown")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
