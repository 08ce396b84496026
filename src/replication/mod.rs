//! Replication Module
//!
//! Pull-based master/slave replication of WAL segments.
//!
//! ## Flow
//! ```text
//!   Slave                                 Master
//!     │ ── Request{last_segment} ───────────► │ next_segment(last)
//!     │ ◄── Response{ok, filename, bytes} ─── │ read_file(next)
//!     │ write_file, decode
//!     ▼
//!  replication stream ──► replica apply (version 0)
//! ```
//!
//! The unit of transfer is a whole segment. A segment still receiving
//! appends on the master is shipped as it stands at request time.

mod client;
mod master;
pub mod protocol;
mod slave;

use std::sync::Arc;

use crossbeam::channel::Receiver;

use crate::wal::WalRecord;

pub use client::{ReplicationClient, TcpReplicationClient, DEFAULT_MAX_SEGMENT_MESSAGE};
pub use master::Master;
pub use slave::{Slave, SyncOutcome};

/// Replication role, fixed at startup
#[derive(Clone)]
pub enum Replication {
    Master(Arc<Master>),
    Slave(Arc<Slave>),
}

impl Replication {
    pub fn is_slave(&self) -> bool {
        matches!(self, Replication::Slave(_))
    }

    /// Records received from the master (slaves only)
    pub fn replication_stream(&self) -> Option<Receiver<Vec<WalRecord>>> {
        match self {
            Replication::Master(_) => None,
            Replication::Slave(slave) => Some(slave.replication_stream()),
        }
    }
}
