//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through batched, append-only logging.
//!
//! ## Responsibilities
//! - Log every transactional command before it touches the engine
//! - Group concurrent writers into batches (size- or time-bounded)
//! - Fan a batch's flush outcome out to every writer in it
//! - CRC32-checked framing of batches into segments
//! - Recovery: read every record back in LSN order
//!
//! ## Segment Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Frame (one flushed batch)                    │
//! │ ┌─────────┬─────────┬──────────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ bincode(Vec<Record>) │ │
//! │ └─────────┴─────────┴──────────────────────┘ │
//! ├──────────────────────────────────────────────┤
//! │ Frame ...                                    │
//! └──────────────────────────────────────────────┘
//! ```

mod batch;
pub mod codec;
mod log;
mod record;
mod writer;

pub use batch::{Batch, FlushSignal};
pub use codec::{decode_segment, encode_batch, DecodedSegment, FRAME_HEADER_SIZE};
pub use log::{LogStore, Recovered, RecoveryReport, SegmentLog};
pub use record::{CommandKind, WalRecord};
pub use writer::{Wal, WalOptions};
