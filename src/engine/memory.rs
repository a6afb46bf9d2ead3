//! MemoryEngine - in-process storage engine

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::errors::{StoreError, StoreResult};
use crate::filter::{Filters, Page, PageRequest};
use crate::model::{ApiRootInfo, Collection, CollectionStats, Discovery, ManifestEntry, StoredObject};
use crate::registry::{CollectionOrdering, CollectionRegistry, DiscoveryRegistry};
use crate::version::VersionKey;

use super::{CollectionPartition, InsertOutcome, LinkageScan, ObjectDraft, StorageEngine};

type PartitionKey = (String, String);

/// Registries plus one partition per collection.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    discovery: DiscoveryRegistry,
    collections: CollectionRegistry,
    partitions: RwLock<HashMap<PartitionKey, Arc<CollectionPartition>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition of a known collection.
    pub(super) fn partition(
        &self,
        api_root: &str,
        collection_id: &str,
    ) -> StoreResult<Option<Arc<CollectionPartition>>> {
        let partitions = self
            .partitions
            .read()
            .map_err(|_| StoreError::poisoned("partition map"))?;
        Ok(partitions
            .get(&(api_root.to_string(), collection_id.to_string()))
            .cloned())
    }

    fn require_partition(&self, api_root: &str, collection_id: &str) -> StoreResult<Arc<CollectionPartition>> {
        self.partition(api_root, collection_id)?.ok_or_else(|| {
            StoreError::NotFound(format!("collection '{}' in api root '{}'", collection_id, api_root))
        })
    }

    /// Inserts through `persist`, which runs under the partition's write
    /// lock before the write becomes visible.
    pub(super) fn insert_with(
        &self,
        api_root: &str,
        collection_id: &str,
        draft: ObjectDraft,
        persist: &dyn Fn(&StoredObject, &ManifestEntry) -> StoreResult<()>,
    ) -> StoreResult<InsertOutcome> {
        self.require_partition(api_root, collection_id)?
            .insert(draft, persist)
    }

    pub(super) fn remove_with(
        &self,
        api_root: &str,
        collection_id: &str,
        object_id: &str,
        version: VersionKey,
        persist: &dyn Fn() -> StoreResult<()>,
    ) -> StoreResult<bool> {
        match self.partition(api_root, collection_id)? {
            Some(partition) => partition.remove(object_id, version, persist),
            None => Err(StoreError::NotFound(format!(
                "collection '{}' in api root '{}'",
                collection_id, api_root
            ))),
        }
    }

    /// Replays a persisted write, bypassing version settlement.
    pub(super) fn restore(
        &self,
        api_root: &str,
        object: StoredObject,
        entry: ManifestEntry,
    ) -> StoreResult<()> {
        let partition = self.require_partition(api_root, &object.collection_id)?;
        partition.apply(object, entry)
    }
}

impl StorageEngine for MemoryEngine {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn put_discovery(&self, discovery: Discovery) -> StoreResult<()> {
        self.discovery.put_discovery(discovery)
    }

    fn put_api_root(&self, info: ApiRootInfo) -> StoreResult<()> {
        self.discovery.put_api_root(info)
    }

    fn put_collection(&self, api_root: &str, collection: Collection) -> StoreResult<()> {
        let key = (api_root.to_string(), collection.id.clone());
        {
            let mut partitions = self
                .partitions
                .write()
                .map_err(|_| StoreError::poisoned("partition map"))?;
            partitions
                .entry(key)
                .or_insert_with(|| Arc::new(CollectionPartition::new(collection.id.clone())));
        }
        self.collections.put(api_root, collection)
    }

    fn clear(&self) -> StoreResult<()> {
        self.partitions
            .write()
            .map_err(|_| StoreError::poisoned("partition map"))?
            .clear();
        self.collections.clear()?;
        self.discovery.clear()
    }

    fn is_empty(&self) -> StoreResult<bool> {
        if !self.discovery.is_empty()? || !self.collections.is_empty()? {
            return Ok(false);
        }
        let partitions = self
            .partitions
            .read()
            .map_err(|_| StoreError::poisoned("partition map"))?;
        for partition in partitions.values() {
            if !partition.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn discovery(&self) -> StoreResult<Option<Discovery>> {
        self.discovery.discovery()
    }

    fn api_root(&self, name: &str) -> StoreResult<Option<ApiRootInfo>> {
        self.discovery.api_root(name)
    }

    fn api_root_names(&self) -> StoreResult<Vec<String>> {
        self.discovery.root_names()
    }

    fn collections(&self, api_root: &str, ordering: CollectionOrdering) -> StoreResult<Vec<Collection>> {
        self.collections.list(api_root, ordering)
    }

    fn collection(&self, api_root: &str, key: &str) -> StoreResult<Option<Collection>> {
        self.collections.get(api_root, key)
    }

    fn manifest(
        &self,
        api_root: &str,
        collection_id: &str,
        filters: &Filters,
        page: &PageRequest,
    ) -> StoreResult<Page<ManifestEntry>> {
        match self.partition(api_root, collection_id)? {
            Some(partition) => partition.manifest(filters, page),
            None => Ok(Page::empty()),
        }
    }

    fn objects(
        &self,
        api_root: &str,
        collection_id: &str,
        filters: &Filters,
        page: &PageRequest,
    ) -> StoreResult<Page<StoredObject>> {
        match self.partition(api_root, collection_id)? {
            Some(partition) => partition.objects(filters, page),
            None => Ok(Page::empty()),
        }
    }

    fn latest_version(
        &self,
        api_root: &str,
        collection_id: &str,
        object_id: &str,
    ) -> StoreResult<Option<VersionKey>> {
        match self.partition(api_root, collection_id)? {
            Some(partition) => partition.latest_version(object_id),
            None => Ok(None),
        }
    }

    fn collection_stats(&self, api_root: &str, collection_id: &str) -> StoreResult<CollectionStats> {
        match self.partition(api_root, collection_id)? {
            Some(partition) => partition.stats(),
            None => Ok(CollectionStats::default()),
        }
    }

    fn insert(&self, api_root: &str, collection_id: &str, draft: ObjectDraft) -> StoreResult<InsertOutcome> {
        self.insert_with(api_root, collection_id, draft, &|_, _| Ok(()))
    }

    fn remove(
        &self,
        api_root: &str,
        collection_id: &str,
        object_id: &str,
        version: VersionKey,
    ) -> StoreResult<bool> {
        self.remove_with(api_root, collection_id, object_id, version, &|| Ok(()))
    }

    fn linkage_scan(&self, api_root: &str, collection_id: &str) -> StoreResult<LinkageScan> {
        match self.partition(api_root, collection_id)? {
            Some(partition) => partition.linkage_scan(),
            None => Ok(LinkageScan::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::VersionPolicy;
    use crate::filter::VersionSelector;
    use crate::model::{media_type_for, ObjectHeader};
    use crate::version::parse_version;
    use serde_json::json;

    fn collection(id: &str) -> Collection {
        Collection {
            id: id.to_string(),
            title: format!("Collection {}", id),
            description: None,
            alias: None,
            can_read: true,
            can_write: true,
            media_types: vec![media_type_for("2.1")],
        }
    }

    fn draft() -> ObjectDraft {
        let body = json!({
            "type": "malware",
            "id": "malware--fdd60b30-b67c-41e3-b0b9-f01faf20d111",
            "spec_version": "2.1",
            "created": "2017-01-27T13:49:53.997Z",
            "modified": "2017-01-27T13:49:53.997Z",
            "name": "Poison Ivy",
        });
        let request_time = parse_version("2020-01-01T00:00:00Z").unwrap();
        ObjectDraft {
            header: ObjectHeader::from_body(&body).unwrap(),
            body,
            media_type: media_type_for("2.1"),
            date_added: request_time,
            policy: VersionPolicy::Assign { request_time },
        }
    }

    #[test]
    fn test_unknown_collection_reads_empty_writes_fail() {
        let engine = MemoryEngine::new();
        let filters = Filters::new(VersionSelector::all());

        assert!(engine.manifest("root", "nope", &filters, &PageRequest::default()).unwrap().is_empty());
        assert_eq!(engine.collection_stats("root", "nope").unwrap(), CollectionStats::default());

        let err = engine.insert("root", "nope", draft()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_collections_are_partitioned_by_root() {
        let engine = MemoryEngine::new();
        engine.put_collection("root1", collection("c1")).unwrap();
        engine.put_collection("root2", collection("c1")).unwrap();

        engine.insert("root1", "c1", draft()).unwrap();

        assert_eq!(engine.collection_stats("root1", "c1").unwrap().object_count, 1);
        assert_eq!(engine.collection_stats("root2", "c1").unwrap().object_count, 0);
    }

    #[test]
    fn test_clear_empties_everything() {
        let engine = MemoryEngine::new();
        assert!(engine.is_empty().unwrap());

        engine.put_collection("root1", collection("c1")).unwrap();
        engine.insert("root1", "c1", draft()).unwrap();
        assert!(!engine.is_empty().unwrap());

        engine.clear().unwrap();
        assert!(engine.is_empty().unwrap());
        assert!(engine.collection("root1", "c1").unwrap().is_none());
    }
}
