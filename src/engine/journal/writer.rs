//! JournalWriter - append with fsync

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{StoreError, StoreResult};

use super::record::{JournalOp, JournalRecord};

/// Appends records to one journal file.
///
/// A write is not acknowledged until `sync_all` returns.
#[derive(Debug)]
pub struct JournalWriter {
    path: PathBuf,
    file: File,
    current_offset: u64,
}

impl JournalWriter {
    /// Opens or creates the journal, creating parent directories.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::Connection(format!("cannot open journal {}: {}", path.display(), e)))?;

        let current_offset = file
            .metadata()
            .map_err(|e| StoreError::Connection(format!("cannot stat journal {}: {}", path.display(), e)))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            current_offset,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Appends one operation; returns the offset it was written at.
    pub fn append(&mut self, op: &JournalOp) -> StoreResult<u64> {
        let serialized = JournalRecord::new(op.clone()).serialize()?;
        let offset = self.current_offset;

        self.file
            .write_all(&serialized)
            .map_err(|e| StoreError::Io(format!("write to {} failed: {}", self.path.display(), e)))?;
        self.file
            .sync_all()
            .map_err(|e| StoreError::Io(format!("fsync of {} failed: {}", self.path.display(), e)))?;

        self.current_offset += serialized.len() as u64;
        Ok(offset)
    }

    /// Drops every record.
    pub fn truncate(&mut self) -> StoreResult<()> {
        self.file
            .set_len(0)
            .and_then(|_| self.file.sync_all())
            .map_err(|e| StoreError::Io(format!("truncate of {} failed: {}", self.path.display(), e)))?;
        self.current_offset = 0;
        Ok(())
    }
}
