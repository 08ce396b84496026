//! Frame codec
//!
//! Length-prefixed framing shared by client traffic and replication.
//!
//! ## Wire Format
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │       Payload (Len)         │
//! └──────────┴─────────────────────────────┘
//! ```
//! Length is little-endian.

use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{Result, TideError};

/// Header size: 4 bytes length
pub const HEADER_SIZE: usize = 4;

/// Encode one payload as a frame
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        TideError::Protocol(format!("Payload too large: {} bytes", payload.len()))
    })?;

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_u32_le(len);
    frame.put_slice(payload);
    Ok(frame.to_vec())
}

/// Read one frame's payload from a stream
///
/// Blocks until a complete frame is received or an error occurs. Frames
/// whose declared length exceeds `max_size` are rejected before reading
/// the payload.
pub fn read_frame<R: Read>(reader: &mut R, max_size: usize) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_le_bytes(header) as usize;
    if payload_len > max_size {
        return Err(TideError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, max_size
        )));
    }

    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }
    Ok(payload)
}

/// Write one frame to a stream
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let frame = encode_frame(payload)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}
