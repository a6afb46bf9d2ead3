//! Journal operations and their on-disk record form

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};
use crate::model::{ApiRootInfo, Collection, Discovery, ManifestEntry, StoredObject};
use crate::version::VersionKey;

use super::checksum::{compute_checksum, verify_checksum};

/// Length prefix plus checksum.
pub(super) const FRAME_OVERHEAD: usize = 8;

/// One state change, replayed in journal order on open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalOp {
    Discovery {
        discovery: Discovery,
    },
    ApiRoot {
        info: ApiRootInfo,
    },
    Collection {
        api_root: String,
        collection: Collection,
    },
    Insert {
        api_root: String,
        object: StoredObject,
        entry: ManifestEntry,
    },
    Remove {
        api_root: String,
        collection_id: String,
        object_id: String,
        version: VersionKey,
    },
}

/// A framed, checksummed journal record.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalRecord {
    pub op: JournalOp,
}

impl JournalRecord {
    pub fn new(op: JournalOp) -> Self {
        Self { op }
    }

    pub fn serialize(&self) -> StoreResult<Vec<u8>> {
        let body = serde_json::to_vec(&self.op)
            .map_err(|e| StoreError::Io(format!("failed to encode journal record: {}", e)))?;

        let record_length = u32::try_from(FRAME_OVERHEAD + body.len())
            .map_err(|_| StoreError::Io("journal record exceeds 4 GiB".to_string()))?;

        let mut record = Vec::with_capacity(record_length as usize);
        record.extend_from_slice(&record_length.to_le_bytes());
        record.extend_from_slice(&body);
        let checksum = compute_checksum(&record);
        record.extend_from_slice(&checksum.to_le_bytes());

        Ok(record)
    }

    /// Decodes one whole record, verifying its checksum.
    ///
    /// Errors are plain messages; the reader attaches file and offset.
    pub fn deserialize(data: &[u8]) -> Result<Self, String> {
        if data.len() < FRAME_OVERHEAD {
            return Err("record too short".to_string());
        }

        let record_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if record_length < FRAME_OVERHEAD || record_length != data.len() {
            return Err(format!(
                "invalid record length {} for {} bytes",
                record_length,
                data.len()
            ));
        }

        let checksum_offset = record_length - 4;
        let stored = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        if !verify_checksum(&data[..checksum_offset], stored) {
            return Err(format!(
                "checksum mismatch: computed {:08x}, stored {:08x}",
                compute_checksum(&data[..checksum_offset]),
                stored
            ));
        }

        let op = serde_json::from_slice(&data[4..checksum_offset])
            .map_err(|e| format!("undecodable operation: {}", e))?;
        Ok(Self { op })
    }
}
