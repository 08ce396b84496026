//! Tests for replaying logged transactions
//!
//! These tests verify:
//! - Only committed transactions reach the engine
//! - Writes land at the replay version
//! - Interleaved transactions and segment-spanning transactions
//! - Replay is idempotent

use tidekv::engine::ShardedEngine;
use tidekv::mvcc::{ReplayBuffer, REPLAY_VERSION};
use tidekv::wal::{CommandKind, WalRecord};

// =============================================================================
// Helper Functions
// =============================================================================

fn engine() -> ShardedEngine {
    ShardedEngine::new(4).unwrap()
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_committed_transaction_applied() {
    let engine = engine();
    let records = vec![
        WalRecord::set(1, 7, "a", "1"),
        WalRecord::del(2, 7, "b"),
        WalRecord::commit(3, 7),
    ];
    engine.set(REPLAY_VERSION, "b", Some("stale".to_string()));

    let mut replay = ReplayBuffer::new();
    assert_eq!(replay.apply_all(&engine, &records), 1);

    assert_eq!(engine.get(REPLAY_VERSION, "a"), Some("1".to_string()));
    assert_eq!(engine.get(REPLAY_VERSION, "b"), None);
    assert_eq!(replay.max_tx_id(), 7);
}

#[test]
fn test_rolled_back_and_unterminated_dropped() {
    let engine = engine();
    let records = vec![
        WalRecord::set(1, 1, "rolled", "x"),
        WalRecord::set(2, 2, "open", "y"),
        WalRecord::rollback(3, 1),
    ];

    let mut replay = ReplayBuffer::new();
    assert_eq!(replay.apply_all(&engine, &records), 0);

    assert_eq!(engine.get(u64::MAX, "rolled"), None);
    assert_eq!(engine.get(u64::MAX, "open"), None);
    assert_eq!(replay.pending_transactions(), 1);
    assert_eq!(engine.version_count(), 0);
}

#[test]
fn test_interleaved_transactions_apply_in_commit_order() {
    let engine = engine();
    let records = vec![
        WalRecord::set(1, 1, "k", "from1"),
        WalRecord::set(2, 2, "k", "from2"),
        WalRecord::commit(3, 2),
        WalRecord::commit(4, 1),
    ];

    ReplayBuffer::new().apply_all(&engine, &records);
    assert_eq!(engine.get(REPLAY_VERSION, "k"), Some("from1".to_string()));
}

#[test]
fn test_transaction_spanning_batches() {
    let engine = engine();
    let mut replay = ReplayBuffer::new();

    replay.apply_all(&engine, &[WalRecord::set(1, 3, "a", "1")]);
    assert_eq!(engine.get(REPLAY_VERSION, "a"), None);

    replay.apply_all(&engine, &[WalRecord::commit(2, 3)]);
    assert_eq!(engine.get(REPLAY_VERSION, "a"), Some("1".to_string()));
    assert_eq!(replay.committed(), 1);
}

#[test]
fn test_replay_is_idempotent() {
    let records = vec![
        WalRecord::set(1, 1, "a", "1"),
        WalRecord::commit(2, 1),
        WalRecord::set(3, 4, "a", "2"),
        WalRecord::set(4, 4, "b", "3"),
        WalRecord::commit(5, 4),
    ];

    let engine = engine();
    ReplayBuffer::new().apply_all(&engine, &records);
    let versions = engine.version_count();
    ReplayBuffer::new().apply_all(&engine, &records);

    assert_eq!(engine.version_count(), versions);
    assert_eq!(engine.get(REPLAY_VERSION, "a"), Some("2".to_string()));
    assert_eq!(engine.get(REPLAY_VERSION, "b"), Some("3".to_string()));
}

#[test]
fn test_malformed_records_skipped() {
    let engine = engine();
    let records = vec![
        WalRecord::new(1, 1, CommandKind::Set, vec!["only-key".to_string()]),
        WalRecord::new(2, 1, CommandKind::Del, Vec::new()),
        WalRecord::set(3, 1, "ok", "v"),
        WalRecord::commit(4, 1),
    ];

    ReplayBuffer::new().apply_all(&engine, &records);
    assert_eq!(engine.get(REPLAY_VERSION, "ok"), Some("v".to_string()));
    assert_eq!(engine.get(REPLAY_VERSION, "only-key"), None);
}
