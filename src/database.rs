//! Database
//!
//! Text command dispatch on top of the MVCC coordinator.
//!
//! ## Responsibilities
//! - Parse commands and route them to the client's session transaction,
//!   or to an auto-commit statement when the client has none
//! - Reject writes on a replica
//! - Replay the WAL on startup
//! - On a replica, apply records received from the master

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::engine::ShardedEngine;
use crate::error::{Result, TideError};
use crate::mvcc::{Coordinator, ReplayBuffer, Transaction};
use crate::network::RequestHandler;
use crate::protocol::{Command, Response};
use crate::replication::Replication;
use crate::wal::Wal;

type Session = Arc<Mutex<Transaction>>;

pub struct Database {
    coordinator: Arc<Coordinator>,
    /// Log replayed by [`Database::recover`]
    wal: Option<Arc<Wal>>,
    replication: Option<Replication>,
    /// Open transactions, by client id
    sessions: Mutex<HashMap<String, Session>>,
    replica_apply: Mutex<Option<JoinHandle<()>>>,
}

impl Database {
    /// On a slave this also starts the replica-apply thread, which runs
    /// until the replication stream closes.
    pub fn new(
        coordinator: Arc<Coordinator>,
        wal: Option<Arc<Wal>>,
        replication: Option<Replication>,
    ) -> Result<Self> {
        let replica_apply = match replication.as_ref().and_then(Replication::replication_stream) {
            Some(stream) => {
                let engine = Arc::clone(coordinator.engine());
                let handle = thread::Builder::new()
                    .name("tidekv-replica-apply".to_string())
                    .spawn(move || {
                        let mut replay = ReplayBuffer::new();
                        for records in stream {
                            let committed = replay.apply_all(&engine, &records);
                            debug!(records = records.len(), committed, "applied replicated records");
                        }
                        debug!("replication stream closed");
                    })?;
                Some(handle)
            }
            None => None,
        };

        Ok(Self {
            coordinator,
            wal,
            replication,
            sessions: Mutex::new(HashMap::new()),
            replica_apply: Mutex::new(replica_apply),
        })
    }

    /// Execute one text command for `client`
    pub fn execute(&self, client: &str, source: &str) -> String {
        let response = match Command::parse(source) {
            Ok(command) => {
                debug!(client, %command, "executing command");
                self.dispatch(client, command)
            }
            Err(e) => Response::error(&e),
        };
        response.to_string()
    }

    /// Replay the WAL into the engine
    ///
    /// Committed transactions are applied at the replay version; the
    /// version counter is moved past every logged transaction id.
    pub fn recover(&self) -> Result<()> {
        let Some(wal) = &self.wal else {
            return Ok(());
        };

        let records = wal.recover()?;
        let mut replay = ReplayBuffer::new();
        let committed = replay.apply_all(self.coordinator.engine(), &records);
        self.coordinator.advance_past(replay.max_tx_id());

        info!(
            records = records.len(),
            committed,
            incomplete = replay.pending_transactions(),
            next_lsn = wal.next_lsn(),
            "recovered from WAL"
        );
        Ok(())
    }

    /// Roll back the session transaction of a closed connection
    pub fn disconnect(&self, client: &str) {
        let session = self.sessions.lock().remove(client);
        if let Some(session) = session {
            debug!(client, "rolling back transaction of disconnected client");
            if let Err(e) = session.lock().rollback() {
                warn!(client, error = %e, "rollback on disconnect failed");
            }
        }
    }

    pub fn is_replica(&self) -> bool {
        self.replication.as_ref().is_some_and(Replication::is_slave)
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn engine(&self) -> &Arc<ShardedEngine> {
        self.coordinator.engine()
    }

    /// Number of clients with an open transaction
    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Wait for the replica-apply thread; returns once the stream closed
    pub fn join_replica_apply(&self) {
        if let Some(handle) = self.replica_apply.lock().take() {
            if handle.join().is_err() {
                warn!("replica-apply thread panicked");
            }
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn dispatch(&self, client: &str, command: Command) -> Response {
        let result = match command {
            Command::Get { key } => self.get(client, &key),
            Command::Set { key, value } => self
                .write_guard()
                .and_then(|()| self.set(client, &key, &value)),
            Command::Del { key } => self.write_guard().and_then(|()| self.del(client, &key)),
            Command::Begin => self.begin(client),
            Command::Commit => self.finish(client, Transaction::commit),
            Command::Rollback => self.finish(client, Transaction::rollback),
        };

        result.unwrap_or_else(|e| Response::error(&e))
    }

    fn write_guard(&self) -> Result<()> {
        if self.is_replica() {
            Err(TideError::ReplicaReadOnly)
        } else {
            Ok(())
        }
    }

    fn session(&self, client: &str) -> Option<Session> {
        self.sessions.lock().get(client).cloned()
    }

    fn get(&self, client: &str, key: &str) -> Result<Response> {
        let value = match self.session(client) {
            Some(session) => session.lock().get(key)?,
            None => self.coordinator.get(key),
        };
        Ok(Response::from(value))
    }

    fn set(&self, client: &str, key: &str, value: &str) -> Result<Response> {
        match self.session(client) {
            Some(session) => session.lock().set(key, value)?,
            None => self.coordinator.set(key, value)?,
        }
        Ok(Response::Ok)
    }

    fn del(&self, client: &str, key: &str) -> Result<Response> {
        match self.session(client) {
            Some(session) => session.lock().del(key)?,
            None => self.coordinator.del(key)?,
        }
        Ok(Response::Ok)
    }

    fn begin(&self, client: &str) -> Result<Response> {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(client) {
            return Err(TideError::TransactionInProgress);
        }
        let tx = self.coordinator.begin_transaction();
        sessions.insert(client.to_string(), Arc::new(Mutex::new(tx)));
        Ok(Response::Ok)
    }

    /// The session ends whatever the outcome
    fn finish(
        &self,
        client: &str,
        end: fn(&mut Transaction) -> Result<()>,
    ) -> Result<Response> {
        let session = self
            .sessions
            .lock()
            .remove(client)
            .ok_or(TideError::InvalidTransaction)?;
        let mut tx = session.lock();
        end(&mut *tx)?;
        Ok(Response::Ok)
    }
}

impl RequestHandler for Database {
    fn handle(&self, client: &str, request: &[u8]) -> Vec<u8> {
        let response = match std::str::from_utf8(request) {
            Ok(source) => self.execute(client, source),
            Err(_) => Response::error(&TideError::InvalidCommand(
                "request is not UTF-8".to_string(),
            ))
            .to_string(),
        };
        response.into_bytes()
    }

    fn on_disconnect(&self, client: &str) {
        self.disconnect(client);
    }
}
