//! # TideKV
//!
//! An in-memory, multi-version key-value store with:
//! - Snapshot-isolated transactions with optimistic commits
//! - Batched Write-Ahead Logging (WAL) for durability
//! - Crash recovery tolerant of torn trailing writes
//! - Pull-based master/slave replication of WAL segments
//! - TCP-based text protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │               (thread per connection)                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Database                                │
//! │          (parser, sessions, replica read-only)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                MVCC Coordinator                              │
//! │        (versions, commit locks, conflict check)              │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │       WAL       │                │  Sharded Engine │
//!   │ (group commit)  │                │ (skip list/shard)│
//!   └────────┬────────┘                └────────▲────────┘
//!            ▼                                  │ version 0
//!   ┌─────────────────┐   segments     ┌────────┴────────┐
//!   │  Segment Disk   │ ─────────────► │   Replication   │
//!   └─────────────────┘                └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod shutdown;

pub mod disk;
pub mod engine;
pub mod mvcc;
pub mod wal;

pub mod database;
pub mod network;
pub mod node;
pub mod protocol;
pub mod replication;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, ReplicaRole, ReplicationConfig};
pub use database::Database;
pub use error::{Result, TideError};
pub use node::Node;
pub use shutdown::Shutdown;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TideKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
