//! Multi-version skip list
//!
//! Ordered map of `(key, version) → Option<value>` used as the store behind
//! each engine shard. Nodes live in an arena (`Vec<Node>`) and link to each
//! other by index, so the structure needs no `unsafe` and no reference
//! counting. Entries are never removed: a delete is a `None` value recorded at
//! the deleting version.

use std::cmp::Ordering;

use rand::Rng;

/// Maximum tower height
const MAX_LEVEL: usize = 32;

/// Composite key: ordered by `key`, then by `version` ascending
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionedKey {
    pub key: String,
    pub version: u64,
}

impl VersionedKey {
    pub fn new(key: impl Into<String>, version: u64) -> Self {
        Self {
            key: key.into(),
            version,
        }
    }

    /// Compare against a borrowed `(key, version)` pair without allocating
    fn cmp_parts(&self, key: &str, version: u64) -> Ordering {
        (self.key.as_str(), self.version).cmp(&(key, version))
    }
}

#[derive(Debug)]
struct Node {
    key: VersionedKey,
    /// `None` is a tombstone
    value: Option<String>,
    /// Forward links, one per level this node participates in
    next: Vec<Option<usize>>,
}

/// Layered skip list keyed by [`VersionedKey`]
///
/// Not synchronized: the owning shard wraps it in a `RwLock`.
#[derive(Debug)]
pub struct SkipList {
    /// Forward links of the head sentinel
    head: [Option<usize>; MAX_LEVEL],
    /// Node arena; a node's index never changes
    nodes: Vec<Node>,
    /// Number of levels currently in use (at least 1)
    level: usize,
}

impl SkipList {
    pub fn new() -> Self {
        Self {
            head: [None; MAX_LEVEL],
            nodes: Vec::new(),
            level: 1,
        }
    }

    /// Look up `key` as of `version`
    ///
    /// Returns the value of the entry with the highest version ≤ `version`:
    /// - `None`: no entry for `key` at or below `version`
    /// - `Some(None)`: the applicable entry is a tombstone
    /// - `Some(Some(v))`: the applicable entry holds `v`
    pub fn find(&self, key: &str, version: u64) -> Option<Option<&str>> {
        let idx = self.floor(key, version)?;
        let node = &self.nodes[idx];
        if node.key.key == key {
            Some(node.value.as_deref())
        } else {
            None
        }
    }

    /// Insert a version of `key`
    ///
    /// Re-inserting an existing `(key, version)` overwrites its value, which
    /// makes log replay idempotent.
    pub fn insert(&mut self, key: &str, version: u64, value: Option<String>) {
        let update = self.predecessors(key, version);

        if let Some(idx) = self.successor(update[0], 0) {
            if self.nodes[idx].key.cmp_parts(key, version) == Ordering::Equal {
                self.nodes[idx].value = value;
                return;
            }
        }

        let height = random_height();
        let idx = self.nodes.len();
        let next = (0..height)
            .map(|level| self.successor(update[level], level))
            .collect();

        self.nodes.push(Node {
            key: VersionedKey::new(key, version),
            value,
            next,
        });

        for (level, pred) in update.iter().enumerate().take(height) {
            self.set_successor(*pred, level, Some(idx));
        }
        self.level = self.level.max(height);
    }

    /// Whether any entry for `key` has a version in `(low, high]`
    pub fn exists_between(&self, low: u64, high: u64, key: &str) -> bool {
        if high <= low {
            return false;
        }
        match self.floor(key, high) {
            Some(idx) => {
                let node = &self.nodes[idx];
                node.key.key == key && node.key.version > low
            }
            None => false,
        }
    }

    /// Number of stored versions (tombstones included)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate all entries in `(key, version)` order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head[0],
        }
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Forward link of `at` on `level`; `None` stands for the head sentinel
    fn successor(&self, at: Option<usize>, level: usize) -> Option<usize> {
        match at {
            None => self.head[level],
            Some(idx) => self.nodes[idx].next[level],
        }
    }

    fn set_successor(&mut self, at: Option<usize>, level: usize, to: Option<usize>) {
        match at {
            None => self.head[level] = to,
            Some(idx) => self.nodes[idx].next[level] = to,
        }
    }

    /// Rightmost node ≤ `(key, version)`, descending from the top level
    fn floor(&self, key: &str, version: u64) -> Option<usize> {
        let mut at = None;
        for level in (0..self.level).rev() {
            while let Some(next) = self.successor(at, level) {
                if self.nodes[next].key.cmp_parts(key, version) == Ordering::Greater {
                    break;
                }
                at = Some(next);
            }
        }
        at
    }

    /// Per level, the rightmost node strictly less than `(key, version)`
    fn predecessors(&self, key: &str, version: u64) -> [Option<usize>; MAX_LEVEL] {
        let mut update = [None; MAX_LEVEL];
        let mut at = None;
        for level in (0..self.level).rev() {
            while let Some(next) = self.successor(at, level) {
                if self.nodes[next].key.cmp_parts(key, version) != Ordering::Less {
                    break;
                }
                at = Some(next);
            }
            update[level] = at;
        }
        update
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

/// Coin-flip tower height: each extra level with probability 1/2
fn random_height() -> usize {
    let mut rng = rand::thread_rng();
    let mut height = 1;
    while height < MAX_LEVEL && rng.gen_bool(0.5) {
        height += 1;
    }
    height
}

/// Iterator over skip list entries in key order
pub struct Iter<'a> {
    list: &'a SkipList,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a VersionedKey, Option<&'a str>);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = &self.list.nodes[idx];
        self.cursor = node.next[0];
        Some((&node.key, node.value.as_deref()))
    }
}
