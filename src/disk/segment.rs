//! Active segment
//!
//! The one segment file currently receiving appends.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Append handle for the active segment file
pub struct Segment {
    /// File name (not path), e.g. `wal_00000000000000000003.log`
    name: String,
    /// Open write handle
    file: File,
    /// Length up to the end of the last complete append
    size: u64,
}

impl Segment {
    /// Create a new, empty segment file
    pub fn create(dir: &Path, name: String) -> Result<Self> {
        let path: PathBuf = dir.join(&name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)?;
        let size = file.metadata()?.len();

        Ok(Self { name, file, size })
    }

    /// Append `data` and force it to stable storage
    ///
    /// Bytes past the last complete append (left by a failed write) are
    /// cut off first, so a torn append never hides the ones after it.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if self.file.metadata()?.len() != self.size {
            tracing::warn!(segment = %self.name, size = self.size, "truncating torn segment tail");
            self.file.set_len(self.size)?;
        }
        self.file.seek(SeekFrom::Start(self.size))?;

        let written = self
            .file
            .write_all(data)
            .and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            let _ = self.file.set_len(self.size);
            return Err(e.into());
        }

        self.size += data.len() as u64;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}
