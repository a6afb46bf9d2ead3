//! Backend - the one surface the serving layer talks to

use std::sync::Arc;

use serde_json::Value;

use crate::config::StoreConfig;
use crate::engine::{open_engine, ObjectDraft, StorageEngine, VersionPolicy};
use crate::errors::{StoreError, StoreResult};
use crate::filter::{FilterArgs, FilterKey, Filters, Page, PageRequest, VersionSelector};
use crate::loader::{BulkLoader, ConsistencyChecker, ConsistencyReport, LoadOutcome};
use crate::model::{
    media_type_for, ApiRootInfo, Collection, CollectionStats, Discovery, ManifestEntry, ObjectHeader,
    StoredObject,
};
use crate::observability::{Event, Logger, MetricsRegistry};
use crate::registry::CollectionOrdering;
use crate::version::VersionKey;

use super::outcome::{AddOutcome, StatusReport};

/// Filters accepted by manifest and object listings.
pub const LISTING_FILTERS: &[FilterKey] = &[
    FilterKey::Id,
    FilterKey::Type,
    FilterKey::Version,
    FilterKey::SpecVersion,
    FilterKey::AddedAfter,
];

/// Filters accepted by single-object reads and deletes.
pub const OBJECT_FILTERS: &[FilterKey] = &[FilterKey::Version, FilterKey::SpecVersion, FilterKey::AddedAfter];

/// Filters accepted by version listings.
pub const VERSION_FILTERS: &[FilterKey] = &[FilterKey::SpecVersion, FilterKey::AddedAfter];

/// Store handle. Cheap to clone; clones share everything.
#[derive(Debug, Clone)]
pub struct Backend {
    engine: Arc<dyn StorageEngine>,
    config: Arc<StoreConfig>,
    logger: Logger,
    metrics: Arc<MetricsRegistry>,
}

impl Backend {
    /// Opens the configured engine, loads the initial snapshot if one is
    /// configured, and runs the consistency check.
    ///
    /// Any fatal error aborts startup; no backend is returned.
    pub fn open(config: StoreConfig, logger: Logger) -> StoreResult<Self> {
        logger.event(Event::BootStart, &[]);
        match Self::boot(config, logger.clone()) {
            Ok(backend) => {
                logger.event(Event::BootComplete, &[("engine", backend.engine.kind())]);
                Ok(backend)
            }
            Err(e) => {
                logger.event(Event::BootFailed, &[("code", e.code()), ("error", &e.to_string())]);
                Err(e)
            }
        }
    }

    fn boot(config: StoreConfig, logger: Logger) -> StoreResult<Self> {
        config.validate()?;
        let engine = open_engine(&config.engine)?;
        logger.event(Event::EngineOpened, &[("engine", engine.kind())]);

        let backend = Self::with_engine(engine, config, logger);
        if let Some(path) = &backend.config.initial_snapshot {
            let loader = BulkLoader::new(backend.engine.clone(), backend.logger.clone());
            if let LoadOutcome::Loaded(stats) = loader.load_file(path, backend.config.clear_on_start)? {
                backend.metrics.add_objects_bulk_loaded(stats.objects as u64);
            }
        }
        backend.check()?.into_result()?;
        Ok(backend)
    }

    /// Wraps an already opened engine. Loads and checks nothing.
    pub fn with_engine(engine: Arc<dyn StorageEngine>, config: StoreConfig, logger: Logger) -> Self {
        Self {
            engine,
            config: Arc::new(config),
            logger,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// Runs the consistency check against the current contents.
    pub fn check(&self) -> StoreResult<ConsistencyReport> {
        ConsistencyChecker::new(self.engine.clone(), self.config.empty_root_policy, self.logger.clone()).check()
    }

    // Registries

    pub fn discovery(&self) -> StoreResult<Option<Discovery>> {
        self.engine.discovery()
    }

    pub fn api_root_info(&self, api_root: &str) -> StoreResult<Option<ApiRootInfo>> {
        self.engine.api_root(api_root)
    }

    pub fn collections(&self, api_root: &str) -> StoreResult<Vec<Collection>> {
        self.engine
            .collections(api_root, CollectionOrdering::for_interop(self.config.interop_ordering))
    }

    /// Collection by id or alias.
    pub fn collection(&self, api_root: &str, key: &str) -> StoreResult<Option<Collection>> {
        self.engine.collection(api_root, key)
    }

    /// Object and version counts of one collection; zeroes if unknown.
    pub fn collection_stats(&self, api_root: &str, key: &str) -> StoreResult<CollectionStats> {
        match self.collection(api_root, key)? {
            Some(collection) => self.engine.collection_stats(api_root, &collection.id),
            None => Ok(CollectionStats::default()),
        }
    }

    // Reads

    pub fn manifest(
        &self,
        api_root: &str,
        key: &str,
        args: &FilterArgs,
        allowed: &[FilterKey],
        limit: Option<usize>,
    ) -> StoreResult<Page<ManifestEntry>> {
        let (filters, page) = self.parse_filters(args, allowed, VersionSelector::last(), limit)?;
        self.metrics.increment_manifest_queries();
        match self.collection(api_root, key)? {
            Some(collection) => self.engine.manifest(api_root, &collection.id, &filters, &page),
            None => Ok(Page::empty()),
        }
    }

    pub fn objects(
        &self,
        api_root: &str,
        key: &str,
        args: &FilterArgs,
        allowed: &[FilterKey],
        limit: Option<usize>,
    ) -> StoreResult<Page<StoredObject>> {
        let (filters, page) = self.parse_filters(args, allowed, VersionSelector::last(), limit)?;
        self.fetch_objects(api_root, key, &filters, &page)
    }

    /// Versions of one object, selected like [`Backend::objects`].
    pub fn object(
        &self,
        api_root: &str,
        key: &str,
        object_id: &str,
        args: &FilterArgs,
        allowed: &[FilterKey],
        limit: Option<usize>,
    ) -> StoreResult<Page<StoredObject>> {
        let (filters, page) = self.parse_filters(args, allowed, VersionSelector::last(), limit)?;
        self.fetch_objects(api_root, key, &filters.pin_id(object_id), &page)
    }

    /// Version keys of one object, oldest date_added first.
    pub fn object_versions(
        &self,
        api_root: &str,
        key: &str,
        object_id: &str,
        args: &FilterArgs,
        allowed: &[FilterKey],
        limit: Option<usize>,
    ) -> StoreResult<Page<VersionKey>> {
        let (filters, page) = self.parse_filters(args, allowed, VersionSelector::all(), limit)?;
        self.metrics.increment_manifest_queries();
        let rows = match self.collection(api_root, key)? {
            Some(collection) => {
                self.engine
                    .manifest(api_root, &collection.id, &filters.pin_id(object_id), &page)?
            }
            None => Page::empty(),
        };
        let versions = rows.items.iter().map(|e| e.version).collect();
        Ok(rows.with_items(versions))
    }

    fn fetch_objects(
        &self,
        api_root: &str,
        key: &str,
        filters: &Filters,
        page: &PageRequest,
    ) -> StoreResult<Page<StoredObject>> {
        self.metrics.increment_object_queries();
        match self.collection(api_root, key)? {
            Some(collection) => self.engine.objects(api_root, &collection.id, filters, page),
            None => Ok(Page::empty()),
        }
    }

    fn parse_filters(
        &self,
        args: &FilterArgs,
        allowed: &[FilterKey],
        default_versions: VersionSelector,
        limit: Option<usize>,
    ) -> StoreResult<(Filters, PageRequest)> {
        let (filters, mut page) = Filters::parse(args, allowed, default_versions).map_err(|e| {
            self.metrics.increment_filter_rejections();
            self.logger
                .event(Event::FilterRejected, &[("error", &e.to_string())]);
            e
        })?;
        if limit.is_some() {
            page.limit = limit;
        }
        if page.limit == Some(0) {
            return Err(StoreError::invalid_filter("limit must be > 0"));
        }
        Ok((filters, page.capped(self.config.max_page_size)))
    }

    // Writes

    /// Stores each object as a new version.
    ///
    /// A bad object fails alone; its siblings are still stored. Fails as a
    /// whole only if the collection does not exist.
    pub fn add_objects(
        &self,
        api_root: &str,
        key: &str,
        objects: &[Value],
        request_time: VersionKey,
    ) -> StoreResult<StatusReport> {
        let collection = self.require_collection(api_root, key)?;
        let outcomes = objects
            .iter()
            .map(|body| self.add_object(api_root, &collection.id, body, request_time))
            .collect();
        Ok(StatusReport::new(request_time, outcomes))
    }

    fn add_object(&self, api_root: &str, collection_id: &str, body: &Value, request_time: VersionKey) -> AddOutcome {
        let submitted_id = body.get("id").and_then(Value::as_str).unwrap_or_default();

        let result = ObjectHeader::from_body(body)
            .map_err(StoreError::invalid_object)
            .and_then(|header| {
                if header.created.is_none() && header.modified.is_some() {
                    return Err(StoreError::invalid_object(format!(
                        "object '{}' has modified but no created",
                        header.object_id
                    )));
                }
                let draft = ObjectDraft {
                    media_type: media_type_for(&header.spec_version),
                    header,
                    body: body.clone(),
                    date_added: request_time,
                    policy: VersionPolicy::Assign { request_time },
                };
                self.engine.insert(api_root, collection_id, draft)
            });

        match result {
            Ok(inserted) => {
                self.metrics.increment_objects_added();
                self.logger.event(
                    Event::ObjectAdded,
                    &[
                        ("collection_id", collection_id),
                        ("object_id", submitted_id),
                        ("version", &inserted.version.to_string()),
                        ("stored", if inserted.stored { "true" } else { "false" }),
                    ],
                );
                AddOutcome::success(submitted_id, inserted.version)
            }
            Err(e) => {
                self.metrics.increment_objects_rejected();
                self.logger.event(
                    Event::ObjectRejected,
                    &[
                        ("code", e.code()),
                        ("collection_id", collection_id),
                        ("error", &e.to_string()),
                        ("object_id", submitted_id),
                    ],
                );
                AddOutcome::failure(submitted_id, e.to_string())
            }
        }
    }

    /// Removes the selected versions of one object from both indexes.
    ///
    /// Returns the removed versions; `NotFound` if none matched.
    pub fn delete_object(
        &self,
        api_root: &str,
        key: &str,
        object_id: &str,
        args: &FilterArgs,
        allowed: &[FilterKey],
    ) -> StoreResult<Vec<VersionKey>> {
        let (filters, _) = self.parse_filters(args, allowed, VersionSelector::all(), None)?;
        let collection = self.require_collection(api_root, key)?;

        let rows = self.engine.manifest(
            api_root,
            &collection.id,
            &filters.pin_id(object_id),
            &PageRequest::default(),
        )?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(format!(
                "object '{}' in collection '{}'",
                object_id, collection.id
            )));
        }

        let mut removed = Vec::with_capacity(rows.len());
        for row in rows.items {
            if self.engine.remove(api_root, &collection.id, object_id, row.version)? {
                removed.push(row.version);
            }
        }

        self.metrics.add_objects_deleted(removed.len() as u64);
        self.logger.event(
            Event::ObjectDeleted,
            &[
                ("collection_id", collection.id.as_str()),
                ("object_id", object_id),
                ("versions", &removed.len().to_string()),
            ],
        );
        Ok(removed)
    }

    fn require_collection(&self, api_root: &str, key: &str) -> StoreResult<Collection> {
        self.collection(api_root, key)?.ok_or_else(|| {
            StoreError::NotFound(format!("collection '{}' in api root '{}'", key, api_root))
        })
    }
}
