//! FileEngine - journaled storage engine
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/catalog.journal                        discovery, roots, collections
//! <data_dir>/collections/<root>/<collection>.journal inserts and removals
//! ```
//!
//! State lives in a [`MemoryEngine`]; journals are replayed into it on open.
//! Every write is appended and fsynced before it becomes visible.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use crate::errors::{StoreError, StoreResult};
use crate::filter::{Filters, Page, PageRequest};
use crate::model::{ApiRootInfo, Collection, CollectionStats, Discovery, ManifestEntry, StoredObject};
use crate::registry::CollectionOrdering;
use crate::version::VersionKey;

use super::journal::{JournalOp, JournalReader, JournalWriter};
use super::{InsertOutcome, LinkageScan, MemoryEngine, ObjectDraft, StorageEngine};

const CATALOG_FILE: &str = "catalog.journal";
const COLLECTIONS_DIR: &str = "collections";

type PartitionKey = (String, String);

/// Storage engine persisting to append-only journals.
#[derive(Debug)]
pub struct FileEngine {
    data_dir: PathBuf,
    memory: MemoryEngine,
    catalog: Mutex<JournalWriter>,
    journals: RwLock<HashMap<PartitionKey, Arc<Mutex<JournalWriter>>>>,
}

impl FileEngine {
    /// Opens the data directory, creating it if needed, and replays it.
    ///
    /// # Errors
    ///
    /// - `Connection` if the directory or a journal cannot be opened
    /// - `Corruption` if any journal record fails verification
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        if data_dir.exists() && !data_dir.is_dir() {
            return Err(StoreError::Connection(format!(
                "data directory {} is not a directory",
                data_dir.display()
            )));
        }
        fs::create_dir_all(data_dir).map_err(|e| {
            StoreError::Connection(format!("cannot create data directory {}: {}", data_dir.display(), e))
        })?;

        let catalog_path = data_dir.join(CATALOG_FILE);
        let catalog = JournalWriter::open(&catalog_path)?;

        let engine = Self {
            data_dir: data_dir.to_path_buf(),
            memory: MemoryEngine::new(),
            catalog: Mutex::new(catalog),
            journals: RwLock::new(HashMap::new()),
        };
        engine.replay(&catalog_path)?;
        Ok(engine)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn replay(&self, catalog_path: &Path) -> StoreResult<()> {
        for record in JournalReader::open(catalog_path)?.read_all()? {
            match record.op {
                JournalOp::Discovery { discovery } => self.memory.put_discovery(discovery)?,
                JournalOp::ApiRoot { info } => self.memory.put_api_root(info)?,
                JournalOp::Collection { api_root, collection } => {
                    self.open_journal(&api_root, &collection.id)?;
                    self.memory.put_collection(&api_root, collection)?;
                }
                op => {
                    return Err(StoreError::Corruption(format!(
                        "{}: object operation in catalog journal: {:?}",
                        catalog_path.display(),
                        op
                    )))
                }
            }
        }

        let journals: Vec<(PartitionKey, PathBuf)> = self
            .journals
            .read()
            .map_err(|_| StoreError::poisoned("journal map"))?
            .keys()
            .map(|(root, coll)| ((root.clone(), coll.clone()), self.journal_path(root, coll)))
            .collect();

        for ((api_root, collection_id), path) in journals {
            for record in JournalReader::open(&path)?.read_all()? {
                match record.op {
                    JournalOp::Insert { api_root: root, object, entry }
                        if root == api_root && object.collection_id == collection_id =>
                    {
                        self.memory.restore(&api_root, object, entry)?
                    }
                    JournalOp::Remove {
                        api_root: root,
                        collection_id: coll,
                        object_id,
                        version,
                    } if root == api_root && coll == collection_id => {
                        self.memory
                            .remove_with(&api_root, &collection_id, &object_id, version, &|| Ok(()))?;
                    }
                    op => {
                        return Err(StoreError::Corruption(format!(
                            "{}: foreign operation in collection journal: {:?}",
                            path.display(),
                            op
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    fn journal_path(&self, api_root: &str, collection_id: &str) -> PathBuf {
        self.data_dir
            .join(COLLECTIONS_DIR)
            .join(encode_segment(api_root))
            .join(format!("{}.journal", encode_segment(collection_id)))
    }

    fn open_journal(&self, api_root: &str, collection_id: &str) -> StoreResult<Arc<Mutex<JournalWriter>>> {
        let mut journals = self
            .journals
            .write()
            .map_err(|_| StoreError::poisoned("journal map"))?;
        let key = (api_root.to_string(), collection_id.to_string());
        if let Some(existing) = journals.get(&key) {
            return Ok(existing.clone());
        }
        let writer = Arc::new(Mutex::new(JournalWriter::open(
            &self.journal_path(api_root, collection_id),
        )?));
        journals.insert(key, writer.clone());
        Ok(writer)
    }

    fn journal(&self, api_root: &str, collection_id: &str) -> StoreResult<Arc<Mutex<JournalWriter>>> {
        self.journals
            .read()
            .map_err(|_| StoreError::poisoned("journal map"))?
            .get(&(api_root.to_string(), collection_id.to_string()))
            .cloned()
            .ok_or_else(|| {
                StoreError::NotFound(format!("collection '{}' in api root '{}'", collection_id, api_root))
            })
    }

    fn append_catalog(&self, op: &JournalOp) -> StoreResult<()> {
        self.catalog
            .lock()
            .map_err(|_| StoreError::poisoned("catalog journal"))?
            .append(op)?;
        Ok(())
    }
}

fn append_to(journal: &Mutex<JournalWriter>, op: &JournalOp) -> StoreResult<()> {
    journal
        .lock()
        .map_err(|_| StoreError::poisoned("collection journal"))?
        .append(op)?;
    Ok(())
}

/// File-name-safe form of a root name or collection id.
///
/// Bytes outside `[A-Za-z0-9_-]` become `%xx`.
fn encode_segment(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02x}", byte)),
        }
    }
    encoded
}

impl StorageEngine for FileEngine {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn put_discovery(&self, discovery: Discovery) -> StoreResult<()> {
        self.append_catalog(&JournalOp::Discovery {
            discovery: discovery.clone(),
        })?;
        self.memory.put_discovery(discovery)
    }

    fn put_api_root(&self, info: ApiRootInfo) -> StoreResult<()> {
        self.append_catalog(&JournalOp::ApiRoot { info: info.clone() })?;
        self.memory.put_api_root(info)
    }

    fn put_collection(&self, api_root: &str, collection: Collection) -> StoreResult<()> {
        self.open_journal(api_root, &collection.id)?;
        self.append_catalog(&JournalOp::Collection {
            api_root: api_root.to_string(),
            collection: collection.clone(),
        })?;
        self.memory.put_collection(api_root, collection)
    }

    /// Removes collection journals, then empties the catalog.
    fn clear(&self) -> StoreResult<()> {
        let mut journals = self
            .journals
            .write()
            .map_err(|_| StoreError::poisoned("journal map"))?;
        let mut catalog = self
            .catalog
            .lock()
            .map_err(|_| StoreError::poisoned("catalog journal"))?;

        journals.clear();
        let collections_dir = self.data_dir.join(COLLECTIONS_DIR);
        match fs::remove_dir_all(&collections_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StoreError::Io(format!(
                    "cannot remove {}: {}",
                    collections_dir.display(),
                    e
                )))
            }
        }
        catalog.truncate()?;
        self.memory.clear()
    }

    fn is_empty(&self) -> StoreResult<bool> {
        self.memory.is_empty()
    }

    fn discovery(&self) -> StoreResult<Option<Discovery>> {
        self.memory.discovery()
    }

    fn api_root(&self, name: &str) -> StoreResult<Option<ApiRootInfo>> {
        self.memory.api_root(name)
    }

    fn api_root_names(&self) -> StoreResult<Vec<String>> {
        self.memory.api_root_names()
    }

    fn collections(&self, api_root: &str, ordering: CollectionOrdering) -> StoreResult<Vec<Collection>> {
        self.memory.collections(api_root, ordering)
    }

    fn collection(&self, api_root: &str, key: &str) -> StoreResult<Option<Collection>> {
        self.memory.collection(api_root, key)
    }

    fn manifest(
        &self,
        api_root: &str,
        collection_id: &str,
        filters: &Filters,
        page: &PageRequest,
    ) -> StoreResult<Page<ManifestEntry>> {
        self.memory.manifest(api_root, collection_id, filters, page)
    }

    fn objects(
        &self,
        api_root: &str,
        collection_id: &str,
        filters: &Filters,
        page: &PageRequest,
    ) -> StoreResult<Page<StoredObject>> {
        self.memory.objects(api_root, collection_id, filters, page)
    }

    fn latest_version(
        &self,
        api_root: &str,
        collection_id: &str,
        object_id: &str,
    ) -> StoreResult<Option<VersionKey>> {
        self.memory.latest_version(api_root, collection_id, object_id)
    }

    fn collection_stats(&self, api_root: &str, collection_id: &str) -> StoreResult<CollectionStats> {
        self.memory.collection_stats(api_root, collection_id)
    }

    fn insert(&self, api_root: &str, collection_id: &str, draft: ObjectDraft) -> StoreResult<InsertOutcome> {
        let journal = self.journal(api_root, collection_id)?;
        self.memory.insert_with(api_root, collection_id, draft, &|object, entry| {
            append_to(
                &journal,
                &JournalOp::Insert {
                    api_root: api_root.to_string(),
                    object: object.clone(),
                    entry: entry.clone(),
                },
            )
        })
    }

    fn remove(
        &self,
        api_root: &str,
        collection_id: &str,
        object_id: &str,
        version: VersionKey,
    ) -> StoreResult<bool> {
        let journal = self.journal(api_root, collection_id)?;
        self.memory.remove_with(api_root, collection_id, object_id, version, &|| {
            append_to(
                &journal,
                &JournalOp::Remove {
                    api_root: api_root.to_string(),
                    collection_id: collection_id.to_string(),
                    object_id: object_id.to_string(),
                    version,
                },
            )
        })
    }

    fn linkage_scan(&self, api_root: &str, collection_id: &str) -> StoreResult<LinkageScan> {
        self.memory.linkage_scan(api_root, collection_id)
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
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::TempDir;

    const ID: &str = "indicator--6770298f-0fd8-471a-ab8c-1c658a46574e";

    fn collection() -> Collection {
        serde_json::from_value(json!({
            "id": "91a7b528-80eb-42ed-a74d-c6fbd5a26116",
            "title": "High Value Indicator Collection",
            "can_read": true,
            "can_write": true,
            "media_types": ["application/stix+json;version=2.1"],
        }))
        .unwrap()
    }

    fn draft(modified: &str) -> ObjectDraft {
        let body = json!({
            "type": "indicator",
            "id": ID,
            "spec_version": "2.1",
            "created": "2016-11-03T12:30:59.000Z",
            "modified": modified,
            "pattern": "[file:hashes.MD5 = 'd41d8cd98f00b204e9800998ecf8427e']",
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

    fn all() -> Filters {
        Filters::new(VersionSelector::all())
    }

    #[test]
    fn test_reopen_replays_writes() {
        let dir = TempDir::new().unwrap();
        let coll = collection().id;
        {
            let engine = FileEngine::open(dir.path()).unwrap();
            engine.put_collection("api1", collection()).unwrap();
            engine.insert("api1", &coll, draft("2016-11-03T12:30:59.000Z")).unwrap();
            let second = engine.insert("api1", &coll, draft("2017-01-27T13:49:53.935Z")).unwrap();
            assert!(engine.remove("api1", &coll, ID, second.version).unwrap());
            engine.insert("api1", &coll, draft("2018-01-27T13:49:53.935Z")).unwrap();
        }

        let engine = FileEngine::open(dir.path()).unwrap();
        assert_eq!(engine.collections("api1", CollectionOrdering::Natural).unwrap(), vec![collection()]);

        let page = engine.manifest("api1", &coll, &all(), &PageRequest::default()).unwrap();
        let versions: Vec<String> = page.items.iter().map(|e| e.version.to_string()).collect();
        assert_eq!(
            versions,
            vec!["2016-11-03T12:30:59.000000Z", "2018-01-27T13:49:53.935000Z"]
        );
        assert_eq!(
            engine.latest_version("api1", &coll, ID).unwrap(),
            Some(parse_version("2018-01-27T13:49:53.935Z").unwrap())
        );
    }

    #[test]
    fn test_damaged_journal_is_corruption() {
        let dir = TempDir::new().unwrap();
        {
            let engine = FileEngine::open(dir.path()).unwrap();
            engine.put_collection("api1", collection()).unwrap();
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .open(dir.path().join(CATALOG_FILE))
            .unwrap();
        file.seek(SeekFrom::Start(10)).unwrap();
        file.write_all(b"XX").unwrap();
        drop(file);

        let err = FileEngine::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Corruption(_)), "{:?}", err);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_file_in_place_of_directory_is_connection_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not-a-dir");
        fs::write(&path, b"").unwrap();

        let err = FileEngine::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[test]
    fn test_clear_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let engine = FileEngine::open(dir.path()).unwrap();
            engine.put_collection("api1", collection()).unwrap();
            engine.insert("api1", &collection().id, draft("2016-11-03T12:30:59.000Z")).unwrap();
            engine.clear().unwrap();
        }
        let engine = FileEngine::open(dir.path()).unwrap();
        assert!(engine.is_empty().unwrap());
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("api1"), "api1");
        assert_eq!(encode_segment("trust group/1"), "trust%20group%2f1");
    }
}
