//! WAL batch framing
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────────┐
//! │ Len (4)  │ CRC (4)  │ bincode(Vec<WalRecord>) (Len)   │
//! └──────────┴──────────┴─────────────────────────────────┘
//! ```
//! Integers are little-endian. A segment is a concatenation of frames, one
//! per flushed batch.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, TideError};

use super::WalRecord;

/// Frame header: payload length (4) + payload CRC32 (4)
pub const FRAME_HEADER_SIZE: usize = 8;

/// Result of scanning one segment
#[derive(Debug, Default)]
pub struct DecodedSegment {
    /// Records of every intact frame, in write order
    pub records: Vec<WalRecord>,

    /// Number of intact frames
    pub frames: usize,

    /// Whether scanning stopped at a truncated or damaged frame
    pub damaged_tail: bool,
}

/// Encode one batch into a frame
pub fn encode_batch(records: &[WalRecord]) -> Result<Vec<u8>> {
    let payload = bincode::serialize(records)?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        TideError::Serialization(format!("batch of {} bytes exceeds frame limit", payload.len()))
    })?;

    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.put_u32_le(len);
    frame.put_u32_le(crc32fast::hash(&payload));
    frame.put_slice(&payload);

    Ok(frame.to_vec())
}

/// Decode every intact frame of a segment
///
/// A short header, a short payload, a checksum mismatch or an undecodable
/// payload ends the scan: whatever follows is treated as end-of-data.
pub fn decode_segment(data: &[u8]) -> DecodedSegment {
    let mut decoded = DecodedSegment::default();
    let mut buf = data;

    while buf.has_remaining() {
        if buf.remaining() < FRAME_HEADER_SIZE {
            decoded.damaged_tail = true;
            break;
        }

        let len = buf.get_u32_le() as usize;
        let crc = buf.get_u32_le();

        if buf.remaining() < len {
            decoded.damaged_tail = true;
            break;
        }

        let payload = &buf[..len];
        if crc32fast::hash(payload) != crc {
            decoded.damaged_tail = true;
            break;
        }

        match bincode::deserialize::<Vec<WalRecord>>(payload) {
            Ok(records) => decoded.records.extend(records),
            Err(_) => {
                decoded.damaged_tail = true;
                break;
            }
        }

        decoded.frames += 1;
        buf.advance(len);
    }

    decoded
}
