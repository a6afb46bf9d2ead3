//! CollectionPartition - one collection's manifest index and object store

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::errors::{StoreError, StoreResult};
use crate::filter::{Filters, Page, PageRequest};
use crate::manifest::{ManifestIndex, PutOutcome};
use crate::model::{CollectionStats, ManifestEntry, StoredObject};
use crate::objects::ObjectStore;
use crate::version::VersionKey;

use super::{InsertOutcome, LinkageScan, ObjectDraft, ObjectLinkage, VersionPolicy};

/// Manifest index and object store of one collection.
#[derive(Debug, Default, Clone)]
pub struct CollectionState {
    pub manifest: ManifestIndex,
    pub objects: ObjectStore,
}

/// Outcome of checking a draft against the current state.
enum Admission {
    New(StoredObject, ManifestEntry),
    Existing(VersionKey),
}

impl CollectionState {
    /// Picks the draft's version under the policy.
    fn settle_version(&self, draft: &ObjectDraft) -> VersionKey {
        let request_time = match draft.policy {
            VersionPolicy::Fixed(version) => return version,
            VersionPolicy::Assign { request_time } => request_time,
        };

        let object_id = &draft.header.object_id;
        let Some(latest) = self.manifest.latest_version(object_id) else {
            return draft.header.declared_version().unwrap_or(request_time);
        };

        match draft.header.declared_version() {
            Some(declared) if declared > latest => declared,
            // Resubmission of a stored version; admit() decides identical vs conflict.
            Some(declared) if self.objects.get(object_id, declared).is_some() => declared,
            // Timestamp-less objects resubmitted unchanged keep their latest version.
            None if self
                .objects
                .get(object_id, latest)
                .is_some_and(|o| o.body == draft.body) =>
            {
                latest
            }
            _ => request_time.max(latest.successor()),
        }
    }

    fn admit(&self, collection_id: &str, draft: &ObjectDraft) -> StoreResult<Admission> {
        let version = self.settle_version(draft);
        let object = StoredObject::new(
            collection_id,
            draft.header.clone(),
            version,
            draft.media_type.clone(),
            draft.body.clone(),
        );

        if self.objects.check(&object)? {
            return Ok(Admission::Existing(version));
        }

        let entry = ManifestEntry::for_object(&object, draft.date_added);
        self.manifest.check(&entry)?;
        Ok(Admission::New(object, entry))
    }

    /// Writes an already settled object and its manifest entry.
    ///
    /// Both are checked before either is written.
    pub fn apply(&mut self, object: StoredObject, entry: ManifestEntry) -> StoreResult<()> {
        if object.object_id != entry.object_id || object.version != entry.version {
            return Err(StoreError::Corruption(format!(
                "manifest entry {}@{} does not describe object {}@{}",
                entry.object_id, entry.version, object.object_id, object.version
            )));
        }
        let unchanged = self.objects.check(&object)?;
        if self.manifest.check(&entry)? == PutOutcome::Unchanged && unchanged {
            return Ok(());
        }
        self.objects.put(object)?;
        self.manifest.put(entry)?;
        Ok(())
    }

    /// Removes one version from both indexes.
    pub fn remove(&mut self, object_id: &str, version: VersionKey) -> bool {
        let manifest = self.manifest.delete(object_id, version).is_some();
        let object = self.objects.delete(object_id, version).is_some();
        manifest || object
    }

    pub fn contains(&self, object_id: &str, version: VersionKey) -> bool {
        self.manifest.get(object_id, version).is_some() || self.objects.get(object_id, version).is_some()
    }
}

/// A collection's state behind its own lock.
#[derive(Debug, Default)]
pub struct CollectionPartition {
    collection_id: String,
    state: RwLock<CollectionState>,
}

impl CollectionPartition {
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            state: RwLock::new(CollectionState::default()),
        }
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, CollectionState>> {
        self.state
            .read()
            .map_err(|_| StoreError::poisoned(&self.collection_id))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, CollectionState>> {
        self.state
            .write()
            .map_err(|_| StoreError::poisoned(&self.collection_id))
    }

    /// Settles and writes a draft.
    ///
    /// `persist` runs after the draft is admitted and before it becomes
    /// visible; an error from it leaves the partition untouched.
    pub fn insert(
        &self,
        draft: ObjectDraft,
        persist: &dyn Fn(&StoredObject, &ManifestEntry) -> StoreResult<()>,
    ) -> StoreResult<InsertOutcome> {
        let mut state = self.write()?;
        match state.admit(&self.collection_id, &draft)? {
            Admission::Existing(version) => Ok(InsertOutcome {
                version,
                stored: false,
            }),
            Admission::New(object, entry) => {
                persist(&object, &entry)?;
                let version = object.version;
                state.apply(object, entry)?;
                Ok(InsertOutcome {
                    version,
                    stored: true,
                })
            }
        }
    }

    /// Replays a persisted write.
    pub fn apply(&self, object: StoredObject, entry: ManifestEntry) -> StoreResult<()> {
        self.write()?.apply(object, entry)
    }

    /// Removes one version; `persist` runs only if the version exists.
    pub fn remove(
        &self,
        object_id: &str,
        version: VersionKey,
        persist: &dyn Fn() -> StoreResult<()>,
    ) -> StoreResult<bool> {
        let mut state = self.write()?;
        if !state.contains(object_id, version) {
            return Ok(false);
        }
        persist()?;
        Ok(state.remove(object_id, version))
    }

    pub fn manifest(&self, filters: &Filters, page: &PageRequest) -> StoreResult<Page<ManifestEntry>> {
        Ok(self.read()?.manifest.list(filters, page))
    }

    /// Object page: rows come from the manifest, bodies from the store,
    /// both under one read lock.
    pub fn objects(&self, filters: &Filters, page: &PageRequest) -> StoreResult<Page<StoredObject>> {
        let state = self.read()?;
        let rows = state.manifest.list(filters, page);
        let bodies = state.objects.get_many(&rows.items);
        Ok(rows.with_items(bodies))
    }

    pub fn latest_version(&self, object_id: &str) -> StoreResult<Option<VersionKey>> {
        Ok(self.read()?.manifest.latest_version(object_id))
    }

    pub fn stats(&self) -> StoreResult<CollectionStats> {
        Ok(self.read()?.manifest.stats())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        let state = self.read()?;
        Ok(state.objects.is_empty() && state.manifest.is_empty())
    }

    pub fn linkage_scan(&self) -> StoreResult<LinkageScan> {
        let state = self.read()?;
        let objects = state
            .objects
            .iter()
            .map(|o| ObjectLinkage {
                collection_id: self.collection_id.clone(),
                object_id: o.object_id.clone(),
                version: o.version,
                manifest: state.manifest.get(&o.object_id, o.version).cloned(),
            })
            .collect();
        let orphans = state
            .manifest
            .iter()
            .filter(|e| state.objects.get(&e.object_id, e.version).is_none())
            .cloned()
            .collect();
        Ok(LinkageScan { objects, orphans })
    }
}
