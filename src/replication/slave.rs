//! Replication slave
//!
//! Polls the master for the next segment every sync interval, stores it
//! locally and publishes its records on the replication stream.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::disk::SegmentDisk;
use crate::error::{Result, TideError};
use crate::shutdown::Shutdown;
use crate::wal::{decode_segment, WalRecord};

use super::client::ReplicationClient;
use super::protocol::{decode, encode, Request, Response};

/// Decoded segments buffered ahead of the apply thread
const STREAM_CAPACITY: usize = 64;

/// Outcome of one sync round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Master has nothing after our last segment
    UpToDate,
    /// Master answered with an error
    Rejected,
    /// Stored and published a segment
    Received { filename: String, records: usize },
}

pub struct Slave {
    sync_interval: Duration,
    disk: Arc<SegmentDisk>,
    client: Mutex<Box<dyn ReplicationClient>>,
    last_segment: Mutex<String>,
    stream_tx: Mutex<Option<Sender<Vec<WalRecord>>>>,
    stream_rx: Receiver<Vec<WalRecord>>,
}

impl Slave {
    /// Resumes after the newest segment already on the local disk
    pub fn new(
        sync_interval: Duration,
        client: Box<dyn ReplicationClient>,
        disk: Arc<SegmentDisk>,
    ) -> Result<Self> {
        let last_segment = disk.last_segment()?.unwrap_or_default();
        let (stream_tx, stream_rx) = channel::bounded(STREAM_CAPACITY);

        Ok(Self {
            sync_interval,
            disk,
            client: Mutex::new(client),
            last_segment: Mutex::new(last_segment),
            stream_tx: Mutex::new(Some(stream_tx)),
            stream_rx,
        })
    }

    /// Records of each received segment; disconnects when the slave stops
    pub fn replication_stream(&self) -> Receiver<Vec<WalRecord>> {
        self.stream_rx.clone()
    }

    pub fn last_segment(&self) -> String {
        self.last_segment.lock().clone()
    }

    /// Sync loop; returns on shutdown
    pub fn run(&self, shutdown: &Shutdown) {
        info!(interval_ms = self.sync_interval.as_millis() as u64, "replication slave started");

        let ticker = channel::tick(self.sync_interval);
        loop {
            select! {
                recv(shutdown.receiver()) -> _ => break,
                recv(ticker) -> _ => {
                    let round = panic::catch_unwind(AssertUnwindSafe(|| self.sync_round(Some(shutdown))));
                    match round {
                        Ok(Ok(outcome)) => debug!(?outcome, "sync round complete"),
                        Ok(Err(e)) => warn!(error = %e, "sync round failed"),
                        Err(_) => error!("panic recovered in sync round"),
                    }
                }
            }
        }

        self.stream_tx.lock().take();
        if let Err(e) = self.client.lock().close() {
            warn!(error = %e, "failed to close replication client");
        }
        info!("replication slave stopped");
    }

    /// One request/response round with the master
    pub fn sync_once(&self) -> Result<SyncOutcome> {
        self.sync_round(None)
    }

    fn sync_round(&self, shutdown: Option<&Shutdown>) -> Result<SyncOutcome> {
        let request = encode(&Request::new(self.last_segment()))?;
        let reply = self.client.lock().send(&request)?;
        let response: Response = decode(&reply)?;

        debug!(ok = response.ok, filename = %response.filename, "received response from master");

        if !response.ok {
            warn!("error response from master");
            return Ok(SyncOutcome::Rejected);
        }
        if !response.has_segment() {
            return Ok(SyncOutcome::UpToDate);
        }

        self.disk.write_file(&response.filename, &response.segment)?;

        let decoded = decode_segment(&response.segment);
        if decoded.damaged_tail {
            warn!(filename = %response.filename, "received segment with a damaged tail");
        }
        let records = decoded.records.len();

        *self.last_segment.lock() = response.filename.clone();
        self.publish(decoded.records, shutdown)?;

        Ok(SyncOutcome::Received {
            filename: response.filename,
            records,
        })
    }

    fn publish(&self, records: Vec<WalRecord>, shutdown: Option<&Shutdown>) -> Result<()> {
        let tx = self
            .stream_tx
            .lock()
            .clone()
            .ok_or_else(|| TideError::Replication("replication stream closed".to_string()))?;

        let closed = || TideError::Replication("replication stream closed".to_string());
        match shutdown {
            Some(shutdown) => select! {
                send(tx, records) -> sent => sent.map_err(|_| closed()),
                recv(shutdown.receiver()) -> _ => Ok(()),
            },
            None => tx.send(records).map_err(|_| closed()),
        }
    }
}
