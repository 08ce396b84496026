//! Client transactions

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, TideError};
use crate::wal::CommandKind;

use super::Coordinator;

/// A snapshot-reading, optimistically committed transaction
///
/// Writes are logged immediately but staged in memory; they reach the
/// engine only on a successful [`Transaction::commit`].
pub struct Transaction {
    coordinator: Arc<Coordinator>,
    begin_version: u64,
    /// Staged writes; `None` is a staged delete
    modified: HashMap<String, Option<String>>,
    /// Values already read, for repeatable reads
    cache: HashMap<String, String>,
    finished: bool,
}

impl Transaction {
    pub(crate) fn new(coordinator: Arc<Coordinator>, begin_version: u64) -> Self {
        Self {
            coordinator,
            begin_version,
            modified: HashMap::new(),
            cache: HashMap::new(),
            finished: false,
        }
    }

    pub fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.ensure_active()?;

        if let Some(staged) = self.modified.get(key) {
            return Ok(staged.clone());
        }
        if let Some(cached) = self.cache.get(key) {
            return Ok(Some(cached.clone()));
        }

        let value = self.coordinator.read(self.begin_version, key);
        if let Some(value) = &value {
            self.cache.insert(key.to_string(), value.clone());
        }
        Ok(value)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_active()?;
        self.coordinator.log(
            self.begin_version,
            CommandKind::Set,
            vec![key.to_string(), value.to_string()],
        )?;
        self.modified
            .insert(key.to_string(), Some(value.to_string()));
        Ok(())
    }

    pub fn del(&mut self, key: &str) -> Result<()> {
        self.ensure_active()?;
        self.coordinator
            .log(self.begin_version, CommandKind::Del, vec![key.to_string()])?;
        self.modified.insert(key.to_string(), None);
        Ok(())
    }

    /// Finishes the transaction whatever the outcome
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.finished = true;
        self.coordinator.commit(self.begin_version, &self.modified)
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.finished = true;
        let had_writes = !self.modified.is_empty();
        self.modified.clear();
        self.cache.clear();

        if had_writes {
            self.coordinator
                .log(self.begin_version, CommandKind::Rollback, Vec::new())?;
        }
        Ok(())
    }

    /// Transaction id (= begin version)
    pub fn begin_version(&self) -> u64 {
        self.begin_version
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_read_only(&self) -> bool {
        self.modified.is_empty()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.finished {
            Err(TideError::TransactionFinished)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("begin_version", &self.begin_version)
            .field("modified", &self.modified.len())
            .field("finished", &self.finished)
            .finish()
    }
}
