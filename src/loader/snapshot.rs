//! Snapshot documents
//!
//! A snapshot is one JSON object: the `/discovery` document plus one entry
//! per API root, keyed by root name.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::{StoreError, StoreResult};
use crate::model::{Collection, Discovery};

const DISCOVERY_KEY: &str = "/discovery";

/// Parsed snapshot, roots in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub discovery: Discovery,
    pub roots: Vec<SnapshotRoot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRoot {
    pub name: String,
    pub information: RootInformation,
    pub collections: Vec<SnapshotCollection>,
    /// Status resources, counted but not kept
    pub status: Vec<Value>,
}

/// The `information` block of an API root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RootInformation {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub max_content_length: u64,
}

/// A collection record with its objects and manifest still attached.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SnapshotCollection {
    #[serde(flatten)]
    pub collection: Collection,
    #[serde(default)]
    pub objects: Vec<Value>,
    #[serde(default)]
    pub manifest: Vec<SnapshotManifestEntry>,
}

/// Manifest row as written in a snapshot; timestamps not yet normalized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapshotManifestEntry {
    pub id: String,
    pub date_added: String,
    pub version: String,
    #[serde(default)]
    pub media_type: String,
}

#[derive(Deserialize)]
struct RawRoot {
    information: RootInformation,
    #[serde(default)]
    status: Vec<Value>,
    #[serde(default)]
    collections: Vec<SnapshotCollection>,
}

impl Snapshot {
    /// Reads a snapshot file.
    pub fn read(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::load(format!("cannot read snapshot {}: {}", path.display(), e)))?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| StoreError::load(format!("snapshot {} is not JSON: {}", path.display(), e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> StoreResult<Self> {
        let Value::Object(mut document) = value else {
            return Err(StoreError::load("snapshot is not a JSON object"));
        };

        let discovery = document
            .remove(DISCOVERY_KEY)
            .ok_or_else(|| StoreError::load("snapshot has no /discovery document"))?;
        let discovery: Discovery = serde_json::from_value(discovery)
            .map_err(|e| StoreError::load(format!("/discovery: {}", e)))?;

        let roots = parse_roots(document)?;
        Ok(Self { discovery, roots })
    }

    pub fn object_count(&self) -> usize {
        self.roots
            .iter()
            .flat_map(|r| &r.collections)
            .map(|c| c.objects.len())
            .sum()
    }
}

fn parse_roots(document: Map<String, Value>) -> StoreResult<Vec<SnapshotRoot>> {
    document
        .into_iter()
        .map(|(name, value)| {
            let raw: RawRoot = serde_json::from_value(value)
                .map_err(|e| StoreError::load(format!("api root '{}': {}", name, e)))?;
            Ok(SnapshotRoot {
                name,
                information: raw.information,
                collections: raw.collections,
                status: raw.status,
            })
        })
        .collect()
}
