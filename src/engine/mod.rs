//! Storage engines
//!
//! [`StorageEngine`] is the contract every physical engine satisfies. The
//! backend facade only ever talks to a `dyn StorageEngine`.
//!
//! # Engines
//!
//! - [`MemoryEngine`]: everything in process memory
//! - [`FileEngine`]: memory engine plus checksummed append-only journals,
//!   replayed on open
//!
//! # Locking
//!
//! Each collection's manifest index and object store sit behind one
//! `RwLock`. An object and its manifest entry are written under a single
//! write lock, so no reader sees one without the other. Lookup maps are
//! only locked long enough to clone an `Arc`, so distinct collections never
//! serialize against each other.

mod file;
mod journal;
mod memory;
mod partition;

pub use file::FileEngine;
pub use memory::MemoryEngine;
pub use partition::{CollectionPartition, CollectionState};

use std::sync::Arc;

use serde_json::Value;

use crate::config::EngineConfig;
use crate::errors::StoreResult;
use crate::filter::{Filters, Page, PageRequest};
use crate::model::{
    ApiRootInfo, Collection, CollectionStats, Discovery, ManifestEntry, ObjectHeader, StoredObject,
};
use crate::registry::CollectionOrdering;
use crate::version::VersionKey;

/// How an incoming object gets its version key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPolicy {
    /// Version supplied by a bulk import
    Fixed(VersionKey),
    /// Version derived at add time: the object's own timestamp when it is
    /// newer than everything stored for its id, otherwise a fresh key no
    /// earlier than `request_time`
    Assign { request_time: VersionKey },
}

/// An object about to be written, before its version is settled.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDraft {
    pub header: ObjectHeader,
    pub body: Value,
    pub media_type: String,
    pub date_added: VersionKey,
    pub policy: VersionPolicy,
}

/// Result of a successful insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub version: VersionKey,
    /// `false` when an identical version was already stored
    pub stored: bool,
}

/// Manifest linkage of one stored object, as seen by the consistency check.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLinkage {
    pub collection_id: String,
    pub object_id: String,
    pub version: VersionKey,
    pub manifest: Option<ManifestEntry>,
}

/// Everything the consistency check needs to know about one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkageScan {
    pub objects: Vec<ObjectLinkage>,
    /// Manifest rows with no stored object
    pub orphans: Vec<ManifestEntry>,
}

/// Storage contract consumed by the backend facade and the bulk loader.
///
/// Collection arguments are real collection ids; alias resolution happens
/// above the engine.
pub trait StorageEngine: Send + Sync + std::fmt::Debug {
    /// Short engine name for logs
    fn kind(&self) -> &'static str;

    // Provisioning

    fn put_discovery(&self, discovery: Discovery) -> StoreResult<()>;

    fn put_api_root(&self, info: ApiRootInfo) -> StoreResult<()>;

    /// Creates the collection's partition if it does not exist yet.
    fn put_collection(&self, api_root: &str, collection: Collection) -> StoreResult<()>;

    /// Drops every partition and registry record.
    fn clear(&self) -> StoreResult<()>;

    /// No discovery, roots, collections or objects.
    fn is_empty(&self) -> StoreResult<bool>;

    // Registries

    fn discovery(&self) -> StoreResult<Option<Discovery>>;

    fn api_root(&self, name: &str) -> StoreResult<Option<ApiRootInfo>>;

    fn api_root_names(&self) -> StoreResult<Vec<String>>;

    fn collections(&self, api_root: &str, ordering: CollectionOrdering) -> StoreResult<Vec<Collection>>;

    /// Collection by id or alias.
    fn collection(&self, api_root: &str, key: &str) -> StoreResult<Option<Collection>>;

    // Objects

    /// Manifest page; empty for an unknown collection.
    fn manifest(
        &self,
        api_root: &str,
        collection_id: &str,
        filters: &Filters,
        page: &PageRequest,
    ) -> StoreResult<Page<ManifestEntry>>;

    /// Object page selected through the manifest; empty for an unknown
    /// collection.
    fn objects(
        &self,
        api_root: &str,
        collection_id: &str,
        filters: &Filters,
        page: &PageRequest,
    ) -> StoreResult<Page<StoredObject>>;

    fn latest_version(
        &self,
        api_root: &str,
        collection_id: &str,
        object_id: &str,
    ) -> StoreResult<Option<VersionKey>>;

    fn collection_stats(&self, api_root: &str, collection_id: &str) -> StoreResult<CollectionStats>;

    /// Settles the draft's version and writes object and manifest entry as
    /// one unit. `NotFound` for an unknown collection.
    fn insert(&self, api_root: &str, collection_id: &str, draft: ObjectDraft) -> StoreResult<InsertOutcome>;

    /// Removes one version from both indexes. Returns whether it existed.
    fn remove(
        &self,
        api_root: &str,
        collection_id: &str,
        object_id: &str,
        version: VersionKey,
    ) -> StoreResult<bool>;

    /// Linkage of every stored object of one collection.
    fn linkage_scan(&self, api_root: &str, collection_id: &str) -> StoreResult<LinkageScan>;
}

/// Opens the engine named by `config`.
pub fn open_engine(config: &EngineConfig) -> StoreResult<Arc<dyn StorageEngine>> {
    match config {
        EngineConfig::Memory => Ok(Arc::new(MemoryEngine::new())),
        EngineConfig::File { data_dir } => Ok(Arc::new(FileEngine::open(data_dir)?)),
    }
}
