//! Engine Module
//!
//! Sharded, multi-version in-memory store.
//!
//! ## Responsibilities
//! - Route every key to exactly one shard (stable FNV-1a hash)
//! - Keep all versions of a key, tombstones included
//! - Answer "value as of version" and "written between versions" queries
//!
//! ## Concurrency
//! Each shard is a [`SkipList`] behind its own `RwLock`: readers of a shard
//! run concurrently, writers are exclusive per shard, and different shards
//! never contend. Operations that lock several shards take them in
//! ascending index order.

pub mod skiplist;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;

use crate::error::{Result, TideError};

pub use skiplist::{SkipList, VersionedKey};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Fixed-size array of independent versioned shards
pub struct ShardedEngine {
    shards: Vec<RwLock<SkipList>>,
}

impl ShardedEngine {
    /// Create an engine with `shard_count` shards (never resized)
    pub fn new(shard_count: usize) -> Result<Self> {
        if shard_count == 0 {
            return Err(TideError::Config("shard count must be positive".to_string()));
        }

        let shards = (0..shard_count)
            .map(|_| RwLock::new(SkipList::new()))
            .collect();

        Ok(Self { shards })
    }

    /// Value of `key` as of `version`; tombstones read as `None`
    pub fn get(&self, version: u64, key: &str) -> Option<String> {
        let shard = self.shards[self.shard_for(key)].read();
        shard.find(key, version).flatten().map(str::to_owned)
    }

    /// Record a version of `key` (`None` records a delete)
    pub fn set(&self, version: u64, key: &str, value: Option<String>) {
        let mut shard = self.shards[self.shard_for(key)].write();
        shard.insert(key, version, value);
    }

    /// Record every staged write of a transaction under one version
    ///
    /// All affected shards are write-locked together, so [`get_many`] never
    /// observes part of the set.
    ///
    /// [`get_many`]: ShardedEngine::get_many
    pub fn set_many(&self, version: u64, modified: &HashMap<String, Option<String>>) {
        let mut by_shard: BTreeMap<usize, Vec<(&str, &Option<String>)>> = BTreeMap::new();
        for (key, value) in modified {
            by_shard
                .entry(self.shard_for(key))
                .or_default()
                .push((key.as_str(), value));
        }

        // Ascending shard order
        let mut guards: Vec<_> = by_shard
            .into_iter()
            .map(|(index, writes)| (self.shards[index].write(), writes))
            .collect();

        for (shard, writes) in guards.iter_mut() {
            for (key, value) in writes.drain(..) {
                shard.insert(key, version, value.clone());
            }
        }
    }

    /// Values of several keys as of `version`, read as one snapshot
    pub fn get_many(&self, version: u64, keys: &[&str]) -> Vec<Option<String>> {
        let indexes: BTreeSet<usize> = keys.iter().map(|key| self.shard_for(key)).collect();
        let guards: BTreeMap<usize, _> = indexes
            .into_iter()
            .map(|index| (index, self.shards[index].read()))
            .collect();

        keys.iter()
            .map(|key| {
                guards
                    .get(&self.shard_for(key))
                    .and_then(|shard| shard.find(key, version).flatten().map(str::to_owned))
            })
            .collect()
    }

    /// Whether `key` received a write with version in `(low, high]`
    pub fn exists_between(&self, low: u64, high: u64, key: &str) -> bool {
        let shard = self.shards[self.shard_for(key)].read();
        shard.exists_between(low, high, key)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard owning `key`
    pub fn shard_for(&self, key: &str) -> usize {
        (fnv1a(key.as_bytes()) as usize) % self.shards.len()
    }

    /// Total stored versions across all shards
    pub fn version_count(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}
