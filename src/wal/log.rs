//! WAL storage backends
//!
//! [`LogStore`] is the seam between the batching writer and durable
//! storage. [`SegmentLog`] is the production store over a [`SegmentDisk`].

use std::sync::Arc;

use crate::disk::SegmentDisk;
use crate::error::Result;

use super::codec::{decode_segment, encode_batch};
use super::WalRecord;

/// Durable home of flushed batches
pub trait LogStore: Send + Sync {
    /// Persist one batch atomically (all records or none)
    fn write(&self, records: &[WalRecord]) -> Result<()>;

    /// Read back every persisted record, in write order
    fn read(&self) -> Result<Recovered>;
}

/// Records read back from a store, with what the scan found
#[derive(Debug, Default)]
pub struct Recovered {
    pub records: Vec<WalRecord>,
    pub report: RecoveryReport,
}

/// Summary of a recovery scan
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Number of segments scanned
    pub segments_scanned: usize,

    /// Number of intact frames decoded
    pub frames_recovered: usize,

    /// Number of records recovered
    pub records_recovered: usize,

    /// Segments whose tail was truncated or failed its checksum
    pub damaged_segments: Vec<String>,

    /// Highest LSN seen, if any
    pub last_lsn: Option<u64>,
}

/// Framed batches appended to a segment directory
pub struct SegmentLog {
    disk: Arc<SegmentDisk>,
}

impl SegmentLog {
    pub fn new(disk: Arc<SegmentDisk>) -> Self {
        Self { disk }
    }

    pub fn disk(&self) -> &Arc<SegmentDisk> {
        &self.disk
    }
}

impl LogStore for SegmentLog {
    fn write(&self, records: &[WalRecord]) -> Result<()> {
        let frame = encode_batch(records)?;
        self.disk.write_segment(&frame)
    }

    fn read(&self) -> Result<Recovered> {
        let mut recovered = Recovered::default();

        for segment in self.disk.read_segments()? {
            let decoded = decode_segment(&segment.data);
            let report = &mut recovered.report;

            report.segments_scanned += 1;
            report.frames_recovered += decoded.frames;
            report.records_recovered += decoded.records.len();
            if decoded.damaged_tail {
                tracing::warn!(segment = %segment.name, frames = decoded.frames, "segment has a damaged tail");
                report.damaged_segments.push(segment.name);
            }

            recovered.records.extend(decoded.records);
        }

        recovered.report.last_lsn = recovered.records.iter().map(|r| r.lsn).max();
        Ok(recovered)
    }
}
