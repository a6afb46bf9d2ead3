//! BulkLoader - populates an engine from a snapshot

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::engine::{ObjectDraft, StorageEngine, VersionPolicy};
use crate::errors::{StoreError, StoreResult};
use crate::model::{ApiRootInfo, Collection, ObjectHeader};
use crate::observability::{Event, Logger};
use crate::version::{parse_version, VersionKey};

use super::snapshot::{Snapshot, SnapshotCollection, SnapshotManifestEntry, SnapshotRoot};

/// Counters for one completed load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub api_roots: usize,
    pub collections: usize,
    pub objects: usize,
    /// Manifest rows with no object, dropped
    pub orphaned_manifest_entries: usize,
    pub statuses: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(LoadStats),
    /// Store already held data and no clear was requested
    Skipped,
}

/// A snapshot that passed every check, ready to write.
#[derive(Debug)]
struct LoadPlan {
    api_roots: Vec<ApiRootInfo>,
    collections: Vec<PlannedCollection>,
    stats: LoadStats,
}

#[derive(Debug)]
struct PlannedCollection {
    api_root: String,
    collection: Collection,
    drafts: Vec<ObjectDraft>,
}

/// Loads snapshots into a storage engine.
///
/// Every object and manifest row is validated before the first write, so
/// a rejected snapshot leaves the store as it was.
pub struct BulkLoader {
    engine: Arc<dyn StorageEngine>,
    logger: Logger,
}

impl BulkLoader {
    pub fn new(engine: Arc<dyn StorageEngine>, logger: Logger) -> Self {
        Self { engine, logger }
    }

    pub fn load_file(&self, path: &Path, clear: bool) -> StoreResult<LoadOutcome> {
        let snapshot = Snapshot::read(path)?;
        self.load(&snapshot, clear)
    }

    /// Loads `snapshot`.
    ///
    /// A non-empty store is left alone unless `clear` is set, in which case
    /// it is wiped after the snapshot has been planned, just before the
    /// first write.
    pub fn load(&self, snapshot: &Snapshot, clear: bool) -> StoreResult<LoadOutcome> {
        let populated = !self.engine.is_empty()?;
        if populated && !clear {
            self.logger.event(Event::SnapshotLoadSkipped, &[("reason", "store not empty")]);
            return Ok(LoadOutcome::Skipped);
        }

        self.logger.event(
            Event::SnapshotLoadStart,
            &[("api_roots", &snapshot.roots.len().to_string())],
        );

        let plan = self.plan(snapshot)?;
        if populated {
            self.engine.clear()?;
            self.logger.event(Event::StoreCleared, &[("engine", self.engine.kind())]);
        }
        self.engine.put_discovery(snapshot.discovery.clone())?;
        for info in plan.api_roots {
            self.engine.put_api_root(info)?;
        }
        for planned in plan.collections {
            self.engine
                .put_collection(&planned.api_root, planned.collection.clone())?;
            for draft in planned.drafts {
                let object_id = draft.header.object_id.clone();
                self.engine
                    .insert(&planned.api_root, &planned.collection.id, draft)
                    .map_err(|e| match e {
                        StoreError::Conflict(message) => StoreError::load(format!(
                            "collection '{}': {}: {}",
                            planned.collection.id, object_id, message
                        )),
                        other => other,
                    })?;
            }
        }

        let stats = plan.stats;
        self.logger.event(
            Event::SnapshotLoadComplete,
            &[
                ("api_roots", &stats.api_roots.to_string()),
                ("collections", &stats.collections.to_string()),
                ("objects", &stats.objects.to_string()),
                ("orphaned_manifest_entries", &stats.orphaned_manifest_entries.to_string()),
            ],
        );
        Ok(LoadOutcome::Loaded(stats))
    }

    fn plan(&self, snapshot: &Snapshot) -> StoreResult<LoadPlan> {
        let mut plan = LoadPlan {
            api_roots: Vec::new(),
            collections: Vec::new(),
            stats: LoadStats::default(),
        };

        for root in &snapshot.roots {
            let url = snapshot.discovery.url_for_root(&root.name).ok_or_else(|| {
                StoreError::load(format!(
                    "api root '{}' is not advertised in /discovery",
                    root.name
                ))
            })?;
            plan.api_roots.push(root_info(root, url));
            plan.stats.api_roots += 1;
            plan.stats.statuses += root.status.len();
            check_collection_keys(root)?;

            for snapshot_collection in &root.collections {
                let (drafts, orphans) = self.plan_collection(&root.name, snapshot_collection)?;
                plan.stats.collections += 1;
                plan.stats.objects += drafts.len();
                plan.stats.orphaned_manifest_entries += orphans;
                plan.collections.push(PlannedCollection {
                    api_root: root.name.clone(),
                    collection: snapshot_collection.collection.clone(),
                    drafts,
                });
            }
        }
        Ok(plan)
    }

    /// Pairs every object with its manifest row.
    fn plan_collection(
        &self,
        api_root: &str,
        source: &SnapshotCollection,
    ) -> StoreResult<(Vec<ObjectDraft>, usize)> {
        let collection_id = &source.collection.id;
        let context = |message: String| {
            StoreError::load(format!("{}/{}: {}", api_root, collection_id, message))
        };

        let mut rows: HashMap<&str, BTreeMap<VersionKey, NormalizedRow>> = HashMap::new();
        for row in &source.manifest {
            let normalized = NormalizedRow::from_snapshot(row).map_err(context)?;
            let versions = rows.entry(row.id.as_str()).or_default();
            if versions.insert(normalized.version, normalized).is_some() {
                return Err(context(format!(
                    "manifest lists {} version {} more than once",
                    row.id, row.version
                )));
            }
        }

        let mut drafts = Vec::with_capacity(source.objects.len());
        for body in &source.objects {
            let header = ObjectHeader::from_body(body).map_err(context)?;
            let version = header.declared_version().ok_or_else(|| {
                context(format!(
                    "object {} has neither modified nor created",
                    header.object_id
                ))
            })?;

            let row = rows
                .get_mut(header.object_id.as_str())
                .and_then(|versions| versions.get_mut(&version))
                .ok_or_else(|| {
                    context(format!(
                        "object {} version {} has no manifest entry",
                        header.object_id, version
                    ))
                })?;
            if row.claimed {
                return Err(context(format!(
                    "object {} version {} appears more than once",
                    header.object_id, version
                )));
            }
            row.claimed = true;

            drafts.push(ObjectDraft {
                media_type: row.media_type.clone(),
                date_added: row.date_added,
                policy: VersionPolicy::Fixed(version),
                header,
                body: body.clone(),
            });
        }

        let mut orphans = 0;
        for (object_id, versions) in &rows {
            for row in versions.values().filter(|r| !r.claimed) {
                orphans += 1;
                self.logger.event(
                    Event::ManifestEntryOrphaned,
                    &[
                        ("api_root", api_root),
                        ("collection_id", collection_id.as_str()),
                        ("object_id", *object_id),
                        ("version", &row.version.to_string()),
                    ],
                );
            }
        }

        Ok((drafts, orphans))
    }
}

/// Every collection id and alias of a root must name exactly one
/// collection.
fn check_collection_keys(root: &SnapshotRoot) -> StoreResult<()> {
    let mut keys: HashSet<&str> = HashSet::new();
    for collection in root.collections.iter().map(|c| &c.collection) {
        if !keys.insert(collection.id.as_str()) {
            return Err(StoreError::load(format!(
                "{}: collection key '{}' is used more than once",
                root.name, collection.id
            )));
        }
        if let Some(alias) = collection.alias.as_deref().filter(|a| *a != collection.id) {
            if !keys.insert(alias) {
                return Err(StoreError::load(format!(
                    "{}: alias '{}' of collection {} is already a collection key",
                    root.name, alias, collection.id
                )));
            }
        }
    }
    Ok(())
}

struct NormalizedRow {
    version: VersionKey,
    date_added: VersionKey,
    media_type: String,
    claimed: bool,
}

impl NormalizedRow {
    fn from_snapshot(row: &SnapshotManifestEntry) -> Result<Self, String> {
        let version = parse_version(&row.version)
            .map_err(|e| format!("manifest entry {} version: {}", row.id, e))?;
        let date_added = parse_version(&row.date_added)
            .map_err(|e| format!("manifest entry {} date_added: {}", row.id, e))?;
        Ok(Self {
            version,
            date_added,
            media_type: row.media_type.clone(),
            claimed: false,
        })
    }
}

fn root_info(root: &SnapshotRoot, url: &str) -> ApiRootInfo {
    ApiRootInfo {
        name: root.name.clone(),
        url: url.to_string(),
        title: root.information.title.clone(),
        description: root.information.description.clone(),
        versions: root.information.versions.clone(),
        max_content_length: root.information.max_content_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::filter::{Filters, PageRequest, VersionSelector};
    use serde_json::{json, Value};

    const INDICATOR: &str = "indicator--6770298f-0fd8-471a-ab8c-1c658a46574e";
    const MARKING: &str = "marking-definition--34098fce-860f-48ae-8e50-ebd3cc5e41da";
    const COLLECTION: &str = "91a7b528-80eb-42ed-a74d-c6fbd5a26116";

    fn snapshot(objects: Value, manifest: Value) -> Snapshot {
        Snapshot::from_value(json!({
            "/discovery": {"title": "T", "api_roots": ["http://localhost:5000/api1/"]},
            "api1": {
                "information": {"title": "API 1", "max_content_length": 9765625},
                "collections": [{
                    "id": COLLECTION,
                    "title": "High Value Indicator Collection",
                    "can_read": true,
                    "can_write": true,
                    "media_types": ["application/stix+json;version=2.1"],
                    "objects": objects,
                    "manifest": manifest,
                }]
            }
        }))
        .unwrap()
    }

    fn indicator(modified: &str) -> Value {
        json!({
            "type": "indicator",
            "spec_version": "2.1",
            "id": INDICATOR,
            "created": "2016-11-03T12:30:59.000Z",
            "modified": modified,
            "pattern": "[ipv4-addr:value = '198.51.100.1']",
        })
    }

    fn row(id: &str, version: &str) -> Value {
        json!({
            "id": id,
            "date_added": "2016-11-03T12:30:59.001Z",
            "version": version,
            "media_type": "application/stix+json;version=2.1",
        })
    }

    fn loader() -> (BulkLoader, Arc<dyn StorageEngine>) {
        let engine: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
        (BulkLoader::new(engine.clone(), Logger::discard()), engine)
    }

    #[test]
    fn test_objects_pair_with_manifest_rows() {
        let (loader, engine) = loader();
        let outcome = loader
            .load(
                &snapshot(
                    json!([indicator("2016-11-03T12:30:59.000Z"), indicator("2017-01-27T13:49:53.935Z")]),
                    json!([
                        row(INDICATOR, "2016-11-03T12:30:59.000Z"),
                        row(INDICATOR, "2017-01-27T13:49:53.935Z"),
                    ]),
                ),
                false,
            )
            .unwrap();

        let LoadOutcome::Loaded(stats) = outcome else {
            panic!("expected a load");
        };
        assert_eq!(stats.objects, 2);
        assert_eq!(stats.orphaned_manifest_entries, 0);

        let page = engine
            .manifest("api1", COLLECTION, &Filters::new(VersionSelector::all()), &PageRequest::default())
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(
            engine.api_root("api1").unwrap().unwrap().url,
            "http://localhost:5000/api1/"
        );
    }

    #[test]
    fn test_marking_matches_on_created() {
        let (loader, engine) = loader();
        let marking = json!({
            "type": "marking-definition",
            "spec_version": "2.1",
            "id": MARKING,
            "created": "2017-01-20T00:00:00.000Z",
            "definition_type": "tlp",
            "definition": {"tlp": "green"},
        });
        loader
            .load(&snapshot(json!([marking]), json!([row(MARKING, "2017-01-20T00:00:00Z")])), false)
            .unwrap();
        assert_eq!(engine.collection_stats("api1", COLLECTION).unwrap().version_count, 1);
    }

    #[test]
    fn test_unmatched_object_rejects_whole_snapshot() {
        let (loader, engine) = loader();
        let err = loader
            .load(
                &snapshot(
                    json!([indicator("2016-11-03T12:30:59.000Z"), indicator("2017-01-27T13:49:53.935Z")]),
                    json!([row(INDICATOR, "2016-11-03T12:30:59.000Z")]),
                ),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Load(_)));
        assert!(engine.is_empty().unwrap());
    }

    #[test]
    fn test_versions_colliding_after_normalization_are_rejected() {
        let (loader, _) = loader();
        let err = loader
            .load(
                &snapshot(
                    json!([indicator("2016-11-03T12:30:59.000Z")]),
                    json!([
                        row(INDICATOR, "2016-11-03T12:30:59.000Z"),
                        row(INDICATOR, "2016-11-03T12:30:59Z"),
                    ]),
                ),
                false,
            )
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_unadvertised_root_is_rejected() {
        let (loader, _) = loader();
        let snapshot = Snapshot::from_value(json!({
            "/discovery": {"title": "T", "api_roots": ["http://localhost:5000/api1/"]},
            "api2": {"information": {"title": "API 2"}}
        }))
        .unwrap();
        let err = loader.load(&snapshot, false).unwrap_err();
        assert!(err.to_string().contains("api2"));
    }

    #[test]
    fn test_orphan_rows_are_dropped_with_warning() {
        let engine: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
        let (logger, capture) = Logger::capture();
        let loader = BulkLoader::new(engine.clone(), logger);

        let outcome = loader
            .load(
                &snapshot(
                    json!([indicator("2016-11-03T12:30:59.000Z")]),
                    json!([
                        row(INDICATOR, "2016-11-03T12:30:59.000Z"),
                        row(INDICATOR, "2018-01-01T00:00:00.000Z"),
                    ]),
                ),
                false,
            )
            .unwrap();

        assert!(matches!(outcome, LoadOutcome::Loaded(s) if s.orphaned_manifest_entries == 1));
        assert!(capture.contains_event("MANIFEST_ENTRY_ORPHANED"));
        assert_eq!(engine.collection_stats("api1", COLLECTION).unwrap().version_count, 1);
    }

    #[test]
    fn test_reload_is_skipped_unless_cleared() {
        let (loader, engine) = loader();
        let data = snapshot(
            json!([indicator("2016-11-03T12:30:59.000Z")]),
            json!([row(INDICATOR, "2016-11-03T12:30:59.000Z")]),
        );

        assert!(matches!(loader.load(&data, false).unwrap(), LoadOutcome::Loaded(_)));
        assert_eq!(loader.load(&data, false).unwrap(), LoadOutcome::Skipped);
        assert!(matches!(loader.load(&data, true).unwrap(), LoadOutcome::Loaded(_)));
        assert_eq!(engine.collection_stats("api1", COLLECTION).unwrap().version_count, 1);
    }

    #[test]
    fn test_rejected_snapshot_with_clear_keeps_existing_contents() {
        let (loader, engine) = loader();
        let good = snapshot(
            json!([indicator("2016-11-03T12:30:59.000Z")]),
            json!([row(INDICATOR, "2016-11-03T12:30:59.000Z")]),
        );
        loader.load(&good, false).unwrap();

        let bad = snapshot(json!([indicator("2017-01-27T13:49:53.935Z")]), json!([]));
        let err = loader.load(&bad, true).unwrap_err();

        assert!(matches!(err, StoreError::Load(_)));
        assert!(engine.api_root("api1").unwrap().is_some());
        assert_eq!(engine.collection_stats("api1", COLLECTION).unwrap().version_count, 1);
    }

    fn root_with_collections(collections: Value) -> Snapshot {
        Snapshot::from_value(json!({
            "/discovery": {"title": "T", "api_roots": ["http://localhost:5000/api1/"]},
            "api1": {
                "information": {"title": "API 1"},
                "collections": collections,
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_duplicate_collection_id_is_rejected() {
        let (loader, engine) = loader();
        let err = loader
            .load(
                &root_with_collections(json!([
                    {"id": COLLECTION, "title": "First"},
                    {"id": COLLECTION, "title": "Second"},
                ])),
                false,
            )
            .unwrap_err();

        assert!(matches!(err, StoreError::Load(_)));
        assert!(err.to_string().contains("more than once"));
        assert!(engine.is_empty().unwrap());
    }

    #[test]
    fn test_alias_clashing_with_collection_key_is_rejected() {
        let (loader, _) = loader();
        let other = "52892447-4d7e-4f70-b94d-d7f22742ff63";

        let shadowing_id = root_with_collections(json!([
            {"id": COLLECTION, "title": "First"},
            {"id": other, "title": "Second", "alias": COLLECTION},
        ]));
        assert!(matches!(loader.load(&shadowing_id, false), Err(StoreError::Load(_))));

        let shared_alias = root_with_collections(json!([
            {"id": COLLECTION, "title": "First", "alias": "high-value"},
            {"id": other, "title": "Second", "alias": "high-value"},
        ]));
        let err = loader.load(&shared_alias, false).unwrap_err();
        assert!(err.to_string().contains("high-value"));
    }
}
