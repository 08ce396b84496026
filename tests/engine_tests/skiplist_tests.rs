//! Tests for the multi-version skip list
//!
//! These tests verify:
//! - Floor lookups (highest version ≤ requested)
//! - Tombstones
//! - Idempotent re-insertion of an equal (key, version)
//! - Interference checks over version ranges
//! - Ordered iteration

use tidekv::engine::{SkipList, VersionedKey};

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_find_empty() {
    let list = SkipList::new();
    assert!(list.is_empty());
    assert_eq!(list.find("a", 10), None);
}

#[test]
fn test_find_floor_version() {
    let mut list = SkipList::new();
    list.insert("a", 5, Some("five".to_string()));
    list.insert("a", 10, Some("ten".to_string()));

    assert_eq!(list.find("a", 4), None);
    assert_eq!(list.find("a", 5), Some(Some("five")));
    assert_eq!(list.find("a", 9), Some(Some("five")));
    assert_eq!(list.find("a", 10), Some(Some("ten")));
    assert_eq!(list.find("a", u64::MAX), Some(Some("ten")));
}

#[test]
fn test_find_does_not_leak_other_keys() {
    let mut list = SkipList::new();
    list.insert("a", 1, Some("a1".to_string()));
    list.insert("c", 1, Some("c1".to_string()));

    assert_eq!(list.find("b", 100), None);
    assert_eq!(list.find("ab", 100), None);
    assert_eq!(list.find("c", 0), None);
}

#[test]
fn test_tombstone() {
    let mut list = SkipList::new();
    list.insert("a", 1, Some("v".to_string()));
    list.insert("a", 2, None);

    assert_eq!(list.find("a", 1), Some(Some("v")));
    assert_eq!(list.find("a", 2), Some(None));
    assert_eq!(list.len(), 2);
}

#[test]
fn test_insert_equal_key_overwrites() {
    let mut list = SkipList::new();
    list.insert("a", 0, Some("old".to_string()));
    list.insert("a", 0, Some("new".to_string()));

    assert_eq!(list.len(), 1);
    assert_eq!(list.find("a", 0), Some(Some("new")));
}

#[test]
fn test_many_keys_and_versions() {
    let mut list = SkipList::new();
    for version in 1..=20u64 {
        for k in 0..50 {
            list.insert(&format!("key{:02}", k), version, Some(format!("{}-{}", k, version)));
        }
    }

    assert_eq!(list.len(), 1000);
    for k in 0..50 {
        let key = format!("key{:02}", k);
        let expected = format!("{}-{}", k, 13);
        assert_eq!(list.find(&key, 13), Some(Some(expected.as_str())));
    }
}

#[test]
fn test_version_monotonicity() {
    let mut list = SkipList::new();
    list.insert("k", 3, Some("3".to_string()));
    list.insert("k", 7, Some("7".to_string()));

    // Later writes never change what an earlier version sees
    let before = list.find("k", 5).map(|v| v.map(str::to_owned));
    list.insert("k", 6, Some("6".to_string()));
    list.insert("k", 8, None);
    let after = list.find("k", 5).map(|v| v.map(str::to_owned));

    assert_eq!(before, after);
}

// =============================================================================
// Interference Tests
// =============================================================================

#[test]
fn test_exists_between() {
    let mut list = SkipList::new();
    list.insert("a", 5, Some("v".to_string()));

    assert!(list.exists_between(4, 5, "a"));
    assert!(list.exists_between(0, 10, "a"));
    assert!(!list.exists_between(5, 10, "a"));
    assert!(!list.exists_between(1, 4, "a"));
    assert!(!list.exists_between(0, 10, "b"));
}

#[test]
fn test_exists_between_empty_range() {
    let mut list = SkipList::new();
    list.insert("a", 5, Some("v".to_string()));

    assert!(!list.exists_between(5, 5, "a"));
    assert!(!list.exists_between(9, 3, "a"));
}

#[test]
fn test_exists_between_counts_tombstones() {
    let mut list = SkipList::new();
    list.insert("a", 1, Some("v".to_string()));
    list.insert("a", 6, None);

    assert!(list.exists_between(2, 6, "a"));
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iter_ordered_by_key_then_version() {
    let mut list = SkipList::new();
    list.insert("b", 2, Some("b2".to_string()));
    list.insert("a", 9, Some("a9".to_string()));
    list.insert("b", 1, None);
    list.insert("a", 3, Some("a3".to_string()));

    let keys: Vec<VersionedKey> = list.iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(
        keys,
        vec![
            VersionedKey::new("a", 3),
            VersionedKey::new("a", 9),
            VersionedKey::new("b", 1),
            VersionedKey::new("b", 2),
        ]
    );

    let values: Vec<Option<&str>> = list.iter().map(|(_, v)| v).collect();
    assert_eq!(values, vec![Some("a3"), Some("a9"), None, Some("b2")]);
}

#[test]
fn test_versioned_key_ordering() {
    assert!(VersionedKey::new("a", 100) < VersionedKey::new("b", 0));
    assert!(VersionedKey::new("a", 1) < VersionedKey::new("a", 2));
    assert_eq!(VersionedKey::new("a", 1), VersionedKey::new("a", 1));
}
