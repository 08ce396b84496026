//! MVCC Module
//!
//! Snapshot reads and optimistic commits over the sharded engine.
//!
//! ## Responsibilities
//! - Mint begin/end versions from one monotonic counter
//! - Stage transaction writes and log them ahead of commit
//! - Detect write-write conflicts at commit (locks + version check)
//! - Replay logged transactions (recovery, replicas)
//!
//! ## Commit Protocol
//! ```text
//! lock keys (sorted, CAS 0 → tx_id) ──fail──► TransactionInterfered
//!        │
//! mint end_version
//!        │
//! any key written in (begin, end]? ──yes──► TransactionInterfered
//!        │
//! log COMMIT ──fail──► WalFailure
//!        │
//! apply writes at end_version, release locks
//! ```

mod coordinator;
mod lock;
pub mod replay;
mod transaction;

pub use coordinator::{Coordinator, DEFAULT_SWEEP_THRESHOLD};
pub use lock::{KeyLock, LockTable};
pub use replay::{ReplayBuffer, REPLAY_VERSION};
pub use transaction::Transaction;
