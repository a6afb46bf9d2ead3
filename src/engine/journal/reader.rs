//! JournalReader - sequential, checksum-verifying journal scans

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::errors::{StoreError, StoreResult};

use super::record::{JournalRecord, FRAME_OVERHEAD};

/// Reads a journal front to back. Any damage is fatal.
pub struct JournalReader {
    path: PathBuf,
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
}

impl JournalReader {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = File::open(path).map_err(|e| {
            StoreError::Connection(format!("cannot open journal {}: {}", path.display(), e))
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| StoreError::Connection(format!("cannot stat journal {}: {}", path.display(), e)))?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        })
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    fn corruption(&self, message: impl std::fmt::Display) -> StoreError {
        StoreError::Corruption(format!(
            "{} at offset {}: {}",
            self.path.display(),
            self.current_offset,
            message
        ))
    }

    /// Next record, or `None` at end of file.
    pub fn read_next(&mut self) -> StoreResult<Option<JournalRecord>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < FRAME_OVERHEAD as u64 {
            return Err(self.corruption(format!("truncated journal, {} trailing bytes", remaining)));
        }

        let mut len_buf = [0u8; 4];
        self.reader
            .read_exact(&mut len_buf)
            .map_err(|e| self.corruption(format!("failed to read record length: {}", e)))?;
        let record_length = u32::from_le_bytes(len_buf) as u64;

        if record_length < FRAME_OVERHEAD as u64 || record_length > remaining {
            return Err(self.corruption(format!(
                "record length {} outside 8..={}",
                record_length, remaining
            )));
        }

        let mut record_buf = vec![0u8; record_length as usize];
        record_buf[0..4].copy_from_slice(&len_buf);
        self.reader
            .read_exact(&mut record_buf[4..])
            .map_err(|e| self.corruption(format!("failed to read record body: {}", e)))?;

        let record = JournalRecord::deserialize(&record_buf).map_err(|e| self.corruption(e))?;
        self.current_offset += record_length;
        Ok(Some(record))
    }

    pub fn read_all(&mut self) -> StoreResult<Vec<JournalRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_next()? {
            records.push(record);
        }
        Ok(records)
    }
}
