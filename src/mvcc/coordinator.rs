//! Transaction coordinator
//!
//! Owns the version counter, the per-key commit locks and the commit
//! protocol (lock, validate, log, apply).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::engine::ShardedEngine;
use crate::error::{Result, TideError};
use crate::wal::{CommandKind, Wal};

use super::lock::{HeldLocks, LockTable, UNLOCKED};
use super::Transaction;

/// Default number of lock entries before free ones are swept
pub const DEFAULT_SWEEP_THRESHOLD: usize = 65_536;

/// Optimistic concurrency control over a [`ShardedEngine`]
///
/// ## Versions
/// One counter hands out both transaction ids (begin versions) and commit
/// (end) versions, so every minted value is unique and increasing. Version
/// 0 is reserved for replayed and replicated data.
pub struct Coordinator {
    engine: Arc<ShardedEngine>,
    wal: Option<Arc<Wal>>,
    locks: LockTable,
    last_version: AtomicU64,
}

impl Coordinator {
    pub fn new(engine: Arc<ShardedEngine>, wal: Option<Arc<Wal>>) -> Arc<Self> {
        Self::with_sweep_threshold(engine, wal, DEFAULT_SWEEP_THRESHOLD)
    }

    pub fn with_sweep_threshold(
        engine: Arc<ShardedEngine>,
        wal: Option<Arc<Wal>>,
        sweep_threshold: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            wal,
            locks: LockTable::new(sweep_threshold),
            last_version: AtomicU64::new(0),
        })
    }

    /// Start a transaction with a freshly minted begin version
    pub fn begin_transaction(self: &Arc<Self>) -> Transaction {
        let begin_version = self.mint_version();
        tracing::trace!(tx_id = begin_version, "begin transaction");
        Transaction::new(Arc::clone(self), begin_version)
    }

    // =========================================================================
    // Auto-commit Statements
    // =========================================================================

    pub fn set(self: &Arc<Self>, key: &str, value: &str) -> Result<()> {
        let mut tx = self.begin_transaction();
        tx.set(key, value)?;
        tx.commit()
    }

    pub fn del(self: &Arc<Self>, key: &str) -> Result<()> {
        let mut tx = self.begin_transaction();
        tx.del(key)?;
        tx.commit()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let version = self.mint_version();
        self.read(version, key)
    }

    /// Make sure the next minted version is greater than `tx_id`
    pub fn advance_past(&self, tx_id: u64) {
        self.last_version.fetch_max(tx_id, Ordering::SeqCst);
    }

    /// Most recently minted version
    pub fn current_version(&self) -> u64 {
        self.last_version.load(Ordering::SeqCst)
    }

    pub fn engine(&self) -> &Arc<ShardedEngine> {
        &self.engine
    }

    pub fn wal(&self) -> Option<&Arc<Wal>> {
        self.wal.as_ref()
    }

    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    // =========================================================================
    // Transaction Support
    // =========================================================================

    pub(crate) fn mint_version(&self) -> u64 {
        self.last_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Read `key` as of `version`
    ///
    /// Waits while the key is locked by an older transaction, since that
    /// commit may still land at a version this read must see.
    pub(crate) fn read(&self, version: u64, key: &str) -> Option<String> {
        if let Some(lock) = self.locks.peek(key) {
            loop {
                let owner = lock.owner();
                if owner == UNLOCKED || owner >= version {
                    break;
                }
                std::thread::yield_now();
            }
        }
        self.engine.get(version, key)
    }

    pub(crate) fn log(&self, tx_id: u64, kind: CommandKind, args: Vec<String>) -> Result<()> {
        match &self.wal {
            Some(wal) if !wal.save(tx_id, kind, args) => Err(TideError::WalFailure),
            _ => Ok(()),
        }
    }

    /// Validate and apply a transaction's staged writes
    pub(crate) fn commit(
        &self,
        begin_version: u64,
        modified: &HashMap<String, Option<String>>,
    ) -> Result<()> {
        if modified.is_empty() {
            return Ok(());
        }

        let _held = HeldLocks::acquire(&self.locks, begin_version, modified.keys())
            .ok_or(TideError::TransactionInterfered)?;

        let end_version = self.mint_version();

        if modified
            .keys()
            .any(|key| self.engine.exists_between(begin_version, end_version, key))
        {
            tracing::debug!(tx_id = begin_version, "commit rejected: interfering write");
            return Err(TideError::TransactionInterfered);
        }

        self.log(begin_version, CommandKind::Commit, Vec::new())?;
        self.engine.set_many(end_version, modified);

        tracing::trace!(
            tx_id = begin_version,
            end_version,
            keys = modified.len(),
            "transaction committed"
        );
        Ok(())
    }
}
