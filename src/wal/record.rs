//! WAL record definitions
//!
//! Defines the structure of individual logged commands.

use serde::{Deserialize, Serialize};

/// Kind of a logged command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Args: `[key, value]`
    Set,

    /// Args: `[key]`
    Del,

    /// Terminal record: apply the transaction's writes
    Commit,

    /// Terminal record: discard the transaction's writes
    Rollback,
}

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalRecord {
    /// Log Sequence Number - strictly increasing across the whole log
    pub lsn: u64,

    /// Transaction that issued the command (its begin version)
    pub tx_id: u64,

    /// What was logged
    pub kind: CommandKind,

    /// Command arguments
    pub args: Vec<String>,
}

impl WalRecord {
    pub fn new(lsn: u64, tx_id: u64, kind: CommandKind, args: Vec<String>) -> Self {
        Self {
            lsn,
            tx_id,
            kind,
            args,
        }
    }

    pub fn set(lsn: u64, tx_id: u64, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(lsn, tx_id, CommandKind::Set, vec![key.into(), value.into()])
    }

    pub fn del(lsn: u64, tx_id: u64, key: impl Into<String>) -> Self {
        Self::new(lsn, tx_id, CommandKind::Del, vec![key.into()])
    }

    pub fn commit(lsn: u64, tx_id: u64) -> Self {
        Self::new(lsn, tx_id, CommandKind::Commit, Vec::new())
    }

    pub fn rollback(lsn: u64, tx_id: u64) -> Self {
        Self::new(lsn, tx_id, CommandKind::Rollback, Vec::new())
    }

    /// Key touched by a SET/DEL record
    pub fn key(&self) -> Option<&str> {
        match self.kind {
            CommandKind::Set | CommandKind::Del => self.args.first().map(String::as_str),
            CommandKind::Commit | CommandKind::Rollback => None,
        }
    }

    /// Value written by a SET record
    pub fn value(&self) -> Option<&str> {
        match self.kind {
            CommandKind::Set => self.args.get(1).map(String::as_str),
            _ => None,
        }
    }
}
