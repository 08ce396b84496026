//! Replay of logged transactions into an engine
//!
//! Used by crash recovery and by the replica-apply path. Records must be
//! fed in LSN order. Writes are buffered per transaction and applied in one
//! step on its COMMIT; ROLLBACK or a missing terminal record discards them.

use std::collections::HashMap;

use crate::engine::ShardedEngine;
use crate::wal::{CommandKind, WalRecord};

/// Version every replayed write is applied at
pub const REPLAY_VERSION: u64 = 0;

#[derive(Debug, Default)]
pub struct ReplayBuffer {
    pending: HashMap<u64, HashMap<String, Option<String>>>,
    committed: usize,
    max_tx_id: u64,
}

impl ReplayBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one record; returns true if it committed a transaction
    pub fn apply(&mut self, engine: &ShardedEngine, record: &WalRecord) -> bool {
        self.max_tx_id = self.max_tx_id.max(record.tx_id);

        match record.kind {
            CommandKind::Set => match (record.key(), record.value()) {
                (Some(key), Some(value)) => {
                    self.writes(record.tx_id)
                        .insert(key.to_string(), Some(value.to_string()));
                }
                _ => tracing::warn!(lsn = record.lsn, "skipping malformed SET record"),
            },
            CommandKind::Del => match record.key() {
                Some(key) => {
                    self.writes(record.tx_id).insert(key.to_string(), None);
                }
                None => tracing::warn!(lsn = record.lsn, "skipping malformed DEL record"),
            },
            CommandKind::Commit => {
                if let Some(writes) = self.pending.remove(&record.tx_id) {
                    engine.set_many(REPLAY_VERSION, &writes);
                }
                self.committed += 1;
                return true;
            }
            CommandKind::Rollback => {
                self.pending.remove(&record.tx_id);
            }
        }
        false
    }

    /// Feed a run of records; returns how many transactions committed
    pub fn apply_all<'a>(
        &mut self,
        engine: &ShardedEngine,
        records: impl IntoIterator<Item = &'a WalRecord>,
    ) -> usize {
        records
            .into_iter()
            .filter(|record| self.apply(engine, record))
            .count()
    }

    /// Transactions with buffered writes but no terminal record yet
    pub fn pending_transactions(&self) -> usize {
        self.pending.len()
    }

    /// Total committed transactions replayed
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Highest transaction id seen
    pub fn max_tx_id(&self) -> u64 {
        self.max_tx_id
    }

    fn writes(&mut self, tx_id: u64) -> &mut HashMap<String, Option<String>> {
        self.pending.entry(tx_id).or_default()
    }
}
