//! Tests for the batched WAL writer
//!
//! These tests verify:
//! - Size-triggered and timer-triggered flushes
//! - LSN assignment
//! - Flush outcome fanned out to every writer of a batch
//! - Draining on shutdown, and refusing writes afterwards

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tidekv::error::{Result, TideError};
use tidekv::wal::{CommandKind, LogStore, Recovered, Wal, WalOptions, WalRecord};
use tidekv::Shutdown;

// =============================================================================
// Helper Functions
// =============================================================================

#[derive(Default)]
struct MemoryLog {
    batches: Mutex<Vec<Vec<WalRecord>>>,
}

impl MemoryLog {
    fn batches(&self) -> Vec<Vec<WalRecord>> {
        self.batches.lock().unwrap().clone()
    }

    fn records(&self) -> Vec<WalRecord> {
        self.batches().into_iter().flatten().collect()
    }
}

impl LogStore for MemoryLog {
    fn write(&self, records: &[WalRecord]) -> Result<()> {
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(())
    }

    fn read(&self) -> Result<Recovered> {
        Ok(Recovered {
            records: self.records(),
            report: Default::default(),
        })
    }
}

struct FailingLog;

impl LogStore for FailingLog {
    fn write(&self, _records: &[WalRecord]) -> Result<()> {
        Err(TideError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    fn read(&self) -> Result<Recovered> {
        Ok(Recovered::default())
    }
}

fn options(batch_size: usize, flush_timeout: Duration) -> WalOptions {
    WalOptions {
        batch_size,
        flush_timeout,
    }
}

fn start_flusher(wal: &Arc<Wal>) -> (Shutdown, JoinHandle<()>) {
    let shutdown = Shutdown::new();
    let token = shutdown.clone();
    let wal = Arc::clone(wal);
    let handle = thread::spawn(move || wal.run(&token));
    (shutdown, handle)
}

fn set_args(key: &str, value: &str) -> Vec<String> {
    vec![key.to_string(), value.to_string()]
}

const NEVER: Duration = Duration::from_secs(3600);

// =============================================================================
// Flush Trigger Tests
// =============================================================================

#[test]
fn test_full_batch_flushes_without_timer() {
    let log = Arc::new(MemoryLog::default());
    let wal = Arc::new(Wal::new(options(1, NEVER), log.clone()));
    let (shutdown, handle) = start_flusher(&wal);

    assert!(wal.save(1, CommandKind::Set, set_args("a", "1")));
    assert!(wal.save(1, CommandKind::Commit, Vec::new()));

    assert_eq!(log.batches().len(), 2);

    shutdown.cancel();
    handle.join().unwrap();
}

#[test]
fn test_timer_flushes_partial_batch() {
    let log = Arc::new(MemoryLog::default());
    let wal = Arc::new(Wal::new(options(100, Duration::from_millis(10)), log.clone()));
    let (shutdown, handle) = start_flusher(&wal);

    let start = Instant::now();
    assert!(wal.save(7, CommandKind::Del, vec!["k".to_string()]));
    assert!(start.elapsed() < Duration::from_secs(5));

    let records = log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tx_id, 7);
    assert_eq!(records[0].kind, CommandKind::Del);

    shutdown.cancel();
    handle.join().unwrap();
}

#[test]
fn test_concurrent_writers_share_batches() {
    let log = Arc::new(MemoryLog::default());
    let wal = Arc::new(Wal::new(options(4, Duration::from_millis(5)), log.clone()));
    let (shutdown, handle) = start_flusher(&wal);

    let writers: Vec<_> = (0..8u64)
        .map(|t| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || {
                (0..25).all(|i| wal.save(t + 1, CommandKind::Set, set_args(&format!("k{}", i), "v")))
            })
        })
        .collect();

    for writer in writers {
        assert!(writer.join().unwrap());
    }

    let batches = log.batches();
    assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= 4));

    let mut lsns: Vec<u64> = batches.iter().flatten().map(|r| r.lsn).collect();
    lsns.sort_unstable();
    assert_eq!(lsns, (1..=200).collect::<Vec<_>>());
    assert_eq!(wal.next_lsn(), 201);

    shutdown.cancel();
    handle.join().unwrap();
}

#[test]
fn test_lsns_increase_within_batch() {
    let log = Arc::new(MemoryLog::default());
    let wal = Arc::new(Wal::new(options(1, NEVER), log.clone()));
    let (shutdown, handle) = start_flusher(&wal);

    for i in 0..10 {
        assert!(wal.save(1, CommandKind::Set, set_args(&format!("k{}", i), "v")));
    }

    let lsns: Vec<u64> = log.records().iter().map(|r| r.lsn).collect();
    assert_eq!(lsns, (1..=10).collect::<Vec<_>>());

    shutdown.cancel();
    handle.join().unwrap();
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_failure_reaches_every_writer_of_batch() {
    let wal = Arc::new(Wal::new(options(4, NEVER), Arc::new(FailingLog)));
    let (shutdown, handle) = start_flusher(&wal);

    let writers: Vec<_> = (0..4u64)
        .map(|t| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || wal.save(t + 1, CommandKind::Set, set_args("k", "v")))
        })
        .collect();

    for writer in writers {
        assert!(!writer.join().unwrap());
    }

    shutdown.cancel();
    handle.join().unwrap();
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_shutdown_drains_partial_batch() {
    let log = Arc::new(MemoryLog::default());
    let wal = Arc::new(Wal::new(options(100, NEVER), log.clone()));
    let (shutdown, handle) = start_flusher(&wal);

    let writers: Vec<_> = (0..3u64)
        .map(|t| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || wal.save(t + 1, CommandKind::Commit, Vec::new()))
        })
        .collect();

    // Wait until all three records sit in the pending batch
    let deadline = Instant::now() + Duration::from_secs(5);
    while wal.next_lsn() < 4 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(wal.next_lsn(), 4);
    assert!(log.batches().is_empty());

    shutdown.cancel();
    handle.join().unwrap();

    for writer in writers {
        assert!(writer.join().unwrap());
    }
    assert_eq!(log.records().len(), 3);
}

#[test]
fn test_save_after_shutdown_fails() {
    let log = Arc::new(MemoryLog::default());
    let wal = Arc::new(Wal::new(options(10, NEVER), log.clone()));
    let (shutdown, handle) = start_flusher(&wal);

    shutdown.cancel();
    handle.join().unwrap();

    assert!(wal.is_closed());
    assert!(!wal.save(1, CommandKind::Set, set_args("a", "1")));
    assert!(log.records().is_empty());
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_sorts_and_primes_lsn() {
    let log = Arc::new(MemoryLog::default());
    log.write(&[WalRecord::commit(9, 2), WalRecord::set(3, 2, "a", "1")]).unwrap();
    log.write(&[WalRecord::set(5, 2, "b", "2")]).unwrap();

    let wal = Wal::new(WalOptions::default(), log);
    let records = wal.recover().unwrap();

    let lsns: Vec<u64> = records.iter().map(|r| r.lsn).collect();
    assert_eq!(lsns, vec![3, 5, 9]);
    assert_eq!(wal.next_lsn(), 10);
}

#[test]
fn test_recover_empty_log() {
    let wal = Wal::new(WalOptions::default(), Arc::new(MemoryLog::default()));
    assert!(wal.recover().unwrap().is_empty());
    assert_eq!(wal.next_lsn(), 1);
}
