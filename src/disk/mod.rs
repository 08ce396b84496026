//! Disk Module
//!
//! Append-only segment files holding the write-ahead log.
//!
//! ## Responsibilities
//! - Append framed WAL batches to the active segment (fsync per write)
//! - Rotate to a new segment once the active one reaches the size bound
//! - List segments in write order for recovery and replication
//! - Seal the active segment when it is shipped to a replica
//! - Store segments received from a master under their original names
//!
//! ## Layout
//! ```text
//! {data_dir}/
//!   ├── wal_00000000000000000001.log   (sealed)
//!   ├── wal_00000000000000000002.log   (sealed)
//!   └── wal_00000000000000000003.log   (active)
//! ```
//! Ids are zero-padded, so lexicographic order of names is write order.

mod segment;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{Result, TideError};

pub use segment::Segment;

const SEGMENT_PREFIX: &str = "wal_";
const SEGMENT_SUFFIX: &str = ".log";
const TEMP_SUFFIX: &str = ".tmp";

/// Contents of one segment file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentData {
    pub name: String,
    pub data: Vec<u8>,
}

/// Segment directory manager
///
/// ## Concurrency:
/// - `active`: Mutex, only the WAL flusher appends
/// - `next_segment_id`: Atomic counter (lock-free)
/// - Listing and plain reads take no lock; a reader may observe the active
///   segment mid-append, which frame decoding treats as a truncated tail
/// - [`SegmentDisk::read_for_shipping`] takes `active`, so it sees whole
///   appends only
pub struct SegmentDisk {
    /// Directory holding the segments
    dir: PathBuf,

    /// Size after which the active segment is sealed
    max_segment_size: u64,

    /// Segment currently receiving appends (opened lazily)
    active: Mutex<Option<Segment>>,

    /// Id for the next segment created
    next_segment_id: AtomicU64,
}

impl SegmentDisk {
    /// Open or create a segment directory
    ///
    /// Existing segments are left untouched; the first write after opening
    /// starts a fresh segment after the highest existing id.
    pub fn open(dir: &Path, max_segment_size: u64) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let next_id = Self::scan_ids(dir)?
            .into_iter()
            .max()
            .map(|id| id + 1)
            .unwrap_or(1);

        tracing::debug!(dir = %dir.display(), next_id, "opened segment directory");

        Ok(Self {
            dir: dir.to_path_buf(),
            max_segment_size,
            active: Mutex::new(None),
            next_segment_id: AtomicU64::new(next_id),
        })
    }

    /// Append one framed batch to the active segment
    ///
    /// Rotates first if the active segment already reached the bound, so a
    /// single write never spans two files.
    pub fn write_segment(&self, data: &[u8]) -> Result<()> {
        let mut active = self.active.lock();

        let needs_rotation = match active.as_ref() {
            Some(segment) => segment.size() >= self.max_segment_size,
            None => true,
        };

        if needs_rotation {
            let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
            let segment = Segment::create(&self.dir, segment_name(id))?;
            tracing::debug!(segment = segment.name(), "rotated to new segment");
            *active = Some(segment);
        }

        let appended = match active.as_mut() {
            Some(segment) => segment.append(data),
            None => Err(TideError::Corruption("no active segment".to_string())),
        };
        if appended.is_err() {
            // Seal it; the next write starts a fresh segment
            *active = None;
        }
        appended
    }

    /// Read every segment, in write order
    pub fn read_segments(&self) -> Result<Vec<SegmentData>> {
        self.list_segments()?
            .into_iter()
            .map(|name| {
                let data = self.read_file(&name)?;
                Ok(SegmentData { name, data })
            })
            .collect()
    }

    /// Names of all segments, sorted (= write order)
    pub fn list_segments(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if parse_segment_id(&name).is_some() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Most recent segment, if any
    pub fn last_segment(&self) -> Result<Option<String>> {
        Ok(self.list_segments()?.pop())
    }

    /// First segment strictly after `after` (empty `after` = first segment)
    pub fn next_segment(&self, after: &str) -> Result<Option<String>> {
        let names = self.list_segments()?;
        let pos = names.partition_point(|name| name.as_str() <= after);
        Ok(names.get(pos).cloned())
    }

    /// Raw contents of segment `name`
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        Self::validate_name(name)?;
        Ok(fs::read(self.dir.join(name))?)
    }

    /// Contents of segment `name` for shipping to a replica
    ///
    /// If `name` is the active segment it is sealed, so later appends go to
    /// a new segment and a shipped segment never grows afterwards.
    pub fn read_for_shipping(&self, name: &str) -> Result<Vec<u8>> {
        Self::validate_name(name)?;

        let mut active = self.active.lock();
        let data = fs::read(self.dir.join(name))?;
        if active.as_ref().is_some_and(|segment| segment.name() == name) {
            tracing::debug!(segment = name, "sealed active segment for shipping");
            *active = None;
        }
        Ok(data)
    }

    /// Durably store a segment under `name`, replacing any previous copy
    ///
    /// Written to a temporary file, synced, then renamed into place, so a
    /// crash never leaves a half-written segment under a valid name.
    pub fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let id = Self::validate_name(name)?;

        let tmp_path = self.dir.join(format!("{}{}", name, TEMP_SUFFIX));
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, self.dir.join(name))?;

        self.next_segment_id.fetch_max(id + 1, Ordering::SeqCst);
        Ok(())
    }

    /// Get the segment directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Name of the segment currently open for appends
    pub fn active_segment(&self) -> Option<String> {
        self.active.lock().as_ref().map(|s| s.name().to_string())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Ids of all segment files in `dir`
    fn scan_ids(dir: &Path) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(id) = parse_segment_id(&entry.file_name().to_string_lossy()) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Only well-formed segment names are accepted; they come off the network
    fn validate_name(name: &str) -> Result<u64> {
        parse_segment_id(name)
            .ok_or_else(|| TideError::Replication(format!("invalid segment name: {:?}", name)))
    }
}

/// Segment file name for `id`
/// 42 → "wal_00000000000000000042.log"
pub fn segment_name(id: u64) -> String {
    format!("{}{:020}{}", SEGMENT_PREFIX, id, SEGMENT_SUFFIX)
}

/// Parse a segment id from a file name
/// "wal_00000000000000000042.log" → Some(42)
pub fn parse_segment_id(name: &str) -> Option<u64> {
    let digits = name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?;
    if digits.len() != 20 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
