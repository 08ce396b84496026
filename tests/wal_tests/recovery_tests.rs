//! Tests for WAL recovery over segment files
//!
//! These tests verify:
//! - Records written through the WAL are read back after a restart
//! - LSN continuity across restarts
//! - Torn trailing writes are ignored, not fatal
//! - A failed append does not hide the batches written after it
//! - The recovery report

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tidekv::disk::{segment_name, SegmentDisk};
use tidekv::wal::{encode_batch, CommandKind, LogStore, SegmentLog, Wal, WalOptions, WalRecord};
use tidekv::Shutdown;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open_wal(dir: &TempDir, max_segment_size: u64) -> (Arc<SegmentDisk>, Arc<Wal>) {
    let disk = Arc::new(SegmentDisk::open(dir.path(), max_segment_size).unwrap());
    let store = Arc::new(SegmentLog::new(Arc::clone(&disk)));
    let options = WalOptions {
        batch_size: 2,
        flush_timeout: Duration::from_millis(5),
    };
    (disk, Arc::new(Wal::new(options, store)))
}

/// Run `body` against a WAL with a live flusher, then shut it down
fn with_flusher(wal: &Arc<Wal>, body: impl FnOnce(&Wal)) {
    let shutdown = Shutdown::new();
    let token = shutdown.clone();
    let flusher = {
        let wal = Arc::clone(wal);
        thread::spawn(move || wal.run(&token))
    };

    body(wal.as_ref());

    shutdown.cancel();
    flusher.join().unwrap();
}

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_recover_after_restart() {
    let temp_dir = TempDir::new().unwrap();

    {
        let (_disk, wal) = open_wal(&temp_dir, 1024 * 1024);
        with_flusher(&wal, |wal| {
            assert!(wal.save(1, CommandKind::Set, args(&["a", "1"])));
            assert!(wal.save(1, CommandKind::Commit, Vec::new()));
            assert!(wal.save(2, CommandKind::Del, args(&["a"])));
        });
    }

    let (_disk, wal) = open_wal(&temp_dir, 1024 * 1024);
    let records = wal.recover().unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0], WalRecord::set(1, 1, "a", "1"));
    assert_eq!(records[1], WalRecord::commit(2, 1));
    assert_eq!(records[2], WalRecord::del(3, 2, "a"));
    assert_eq!(wal.next_lsn(), 4);
}

#[test]
fn test_lsns_continue_after_recovery() {
    let temp_dir = TempDir::new().unwrap();

    {
        let (_disk, wal) = open_wal(&temp_dir, 1024 * 1024);
        with_flusher(&wal, |wal| {
            assert!(wal.save(1, CommandKind::Set, args(&["a", "1"])));
        });
    }

    {
        let (_disk, wal) = open_wal(&temp_dir, 1024 * 1024);
        wal.recover().unwrap();
        with_flusher(&wal, |wal| {
            assert!(wal.save(5, CommandKind::Set, args(&["b", "2"])));
        });
    }

    let (disk, wal) = open_wal(&temp_dir, 1024 * 1024);
    let lsns: Vec<u64> = wal.recover().unwrap().iter().map(|r| r.lsn).collect();
    assert_eq!(lsns, vec![1, 2]);
    // Each process run started a new segment
    assert_eq!(disk.list_segments().unwrap().len(), 2);
}

#[test]
fn test_recover_across_rotated_segments() {
    let temp_dir = TempDir::new().unwrap();

    {
        let (disk, wal) = open_wal(&temp_dir, 64);
        with_flusher(&wal, |wal| {
            for i in 0..20 {
                assert!(wal.save(1, CommandKind::Set, args(&[&format!("key{}", i), "value"])));
            }
        });
        assert!(disk.list_segments().unwrap().len() > 1);
    }

    let (_disk, wal) = open_wal(&temp_dir, 64);
    let records = wal.recover().unwrap();
    let lsns: Vec<u64> = records.iter().map(|r| r.lsn).collect();
    assert_eq!(lsns, (1..=20).collect::<Vec<_>>());
}

// =============================================================================
// Damage Tests
// =============================================================================

#[test]
fn test_torn_tail_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let disk = SegmentDisk::open(temp_dir.path(), 1024 * 1024).unwrap();
    disk.write_segment(&encode_batch(&[WalRecord::set(1, 1, "a", "1"), WalRecord::commit(2, 1)]).unwrap())
        .unwrap();

    // Simulate a crash midway through the next frame
    let torn = encode_batch(&[WalRecord::set(3, 4, "b", "2")]).unwrap();
    let mut file = OpenOptions::new()
        .append(true)
        .open(temp_dir.path().join(segment_name(1)))
        .unwrap();
    file.write_all(&torn[..torn.len() / 2]).unwrap();
    drop(file);

    let log = SegmentLog::new(Arc::new(disk));
    let recovered = log.read().unwrap();

    assert_eq!(recovered.records.len(), 2);
    assert_eq!(recovered.report.segments_scanned, 1);
    assert_eq!(recovered.report.frames_recovered, 1);
    assert_eq!(recovered.report.records_recovered, 2);
    assert_eq!(recovered.report.damaged_segments, vec![segment_name(1)]);
    assert_eq!(recovered.report.last_lsn, Some(2));
}

#[test]
fn test_batch_after_failed_append_is_recovered() {
    let temp_dir = TempDir::new().unwrap();
    let disk = Arc::new(SegmentDisk::open(temp_dir.path(), 1024 * 1024).unwrap());
    let log = SegmentLog::new(Arc::clone(&disk));
    log.write(&[WalRecord::set(1, 1, "a", "1"), WalRecord::commit(2, 1)])
        .unwrap();

    // A write that failed after three bytes reached the file
    let mut file = OpenOptions::new()
        .append(true)
        .open(temp_dir.path().join(segment_name(1)))
        .unwrap();
    file.write_all(&[0xde, 0xad, 0xbe]).unwrap();
    drop(file);

    log.write(&[WalRecord::set(3, 4, "b", "2"), WalRecord::commit(4, 4)])
        .unwrap();

    let recovered = log.read().unwrap();
    let lsns: Vec<u64> = recovered.records.iter().map(|r| r.lsn).collect();
    assert_eq!(lsns, vec![1, 2, 3, 4]);
    assert!(recovered.report.damaged_segments.is_empty());
}

#[test]
fn test_damage_in_one_segment_keeps_others() {
    let temp_dir = TempDir::new().unwrap();
    let disk = SegmentDisk::open(temp_dir.path(), 1024).unwrap();

    let mut damaged = encode_batch(&[WalRecord::set(1, 1, "a", "1")]).unwrap();
    let last = damaged.len() - 1;
    damaged[last] ^= 0x55;
    disk.write_file(&segment_name(1), &damaged).unwrap();
    disk.write_file(&segment_name(2), &encode_batch(&[WalRecord::set(2, 1, "b", "2")]).unwrap())
        .unwrap();

    let recovered = SegmentLog::new(Arc::new(disk)).read().unwrap();
    let lsns: Vec<u64> = recovered.records.iter().map(|r| r.lsn).collect();
    assert_eq!(lsns, vec![2]);
    assert_eq!(recovered.report.damaged_segments, vec![segment_name(1)]);
}

#[test]
fn test_recover_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let (_disk, wal) = open_wal(&temp_dir, 1024);

    assert!(wal.recover().unwrap().is_empty());
    assert_eq!(wal.next_lsn(), 1);
}
