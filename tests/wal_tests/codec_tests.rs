//! Tests for WAL batch framing
//!
//! These tests verify:
//! - Frame layout (length, CRC32, payload)
//! - Multi-frame segments
//! - Truncated and corrupted tails treated as end-of-data

use tidekv::wal::{decode_segment, encode_batch, CommandKind, WalRecord, FRAME_HEADER_SIZE};

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_batch(first_lsn: u64) -> Vec<WalRecord> {
    vec![
        WalRecord::set(first_lsn, 1, "a", "1"),
        WalRecord::del(first_lsn + 1, 1, "b"),
        WalRecord::commit(first_lsn + 2, 1),
    ]
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_frame_header() {
    let records = sample_batch(1);
    let frame = encode_batch(&records).unwrap();

    let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    let crc = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);

    assert_eq!(frame.len(), FRAME_HEADER_SIZE + len);
    assert_eq!(crc, crc32fast::hash(&frame[FRAME_HEADER_SIZE..]));
}

#[test]
fn test_decode_single_frame() {
    let records = sample_batch(1);
    let decoded = decode_segment(&encode_batch(&records).unwrap());

    assert_eq!(decoded.records, records);
    assert_eq!(decoded.frames, 1);
    assert!(!decoded.damaged_tail);
}

#[test]
fn test_decode_concatenated_frames() {
    let mut segment = encode_batch(&sample_batch(1)).unwrap();
    segment.extend(encode_batch(&sample_batch(4)).unwrap());
    segment.extend(encode_batch(&[WalRecord::rollback(7, 2)]).unwrap());

    let decoded = decode_segment(&segment);
    assert_eq!(decoded.frames, 3);
    assert_eq!(decoded.records.len(), 7);
    assert_eq!(decoded.records[6].kind, CommandKind::Rollback);
    let lsns: Vec<u64> = decoded.records.iter().map(|r| r.lsn).collect();
    assert_eq!(lsns, (1..=7).collect::<Vec<_>>());
}

#[test]
fn test_decode_empty_segment() {
    let decoded = decode_segment(&[]);
    assert!(decoded.records.is_empty());
    assert_eq!(decoded.frames, 0);
    assert!(!decoded.damaged_tail);
}

#[test]
fn test_record_accessors() {
    let set = WalRecord::set(1, 9, "k", "v");
    assert_eq!(set.key(), Some("k"));
    assert_eq!(set.value(), Some("v"));

    let del = WalRecord::del(2, 9, "k");
    assert_eq!(del.key(), Some("k"));
    assert_eq!(del.value(), None);

    assert_eq!(WalRecord::commit(3, 9).key(), None);
}

// =============================================================================
// Damage Tests
// =============================================================================

#[test]
fn test_truncated_payload() {
    let mut segment = encode_batch(&sample_batch(1)).unwrap();
    let second = encode_batch(&sample_batch(4)).unwrap();
    segment.extend_from_slice(&second[..second.len() - 3]);

    let decoded = decode_segment(&segment);
    assert_eq!(decoded.frames, 1);
    assert_eq!(decoded.records, sample_batch(1));
    assert!(decoded.damaged_tail);
}

#[test]
fn test_truncated_header() {
    let mut segment = encode_batch(&sample_batch(1)).unwrap();
    segment.extend_from_slice(&[0x10, 0x00, 0x00]);

    let decoded = decode_segment(&segment);
    assert_eq!(decoded.records.len(), 3);
    assert!(decoded.damaged_tail);
}

#[test]
fn test_checksum_mismatch_stops_scan() {
    let first = encode_batch(&sample_batch(1)).unwrap();
    let mut second = encode_batch(&sample_batch(4)).unwrap();
    let last = second.len() - 1;
    second[last] ^= 0xFF;

    let mut segment = first;
    segment.extend(second);
    segment.extend(encode_batch(&sample_batch(7)).unwrap());

    let decoded = decode_segment(&segment);
    assert_eq!(decoded.frames, 1);
    assert_eq!(decoded.records, sample_batch(1));
    assert!(decoded.damaged_tail);
}
