//! ConsistencyChecker - manifest linkage verification
//!
//! Runs after a load and before the store serves. Collects every violation
//! instead of stopping at the first, so one report shows everything wrong
//! with a data set.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::EmptyRootPolicy;
use crate::engine::StorageEngine;
use crate::errors::{StoreError, StoreResult};
use crate::observability::{Event, Logger};
use crate::registry::CollectionOrdering;
use crate::version::VersionKey;

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Stored object with no manifest row
    MissingManifest {
        api_root: String,
        collection_id: String,
        object_id: String,
        version: VersionKey,
    },
    /// Manifest row present but without a media type
    EmptyManifest {
        api_root: String,
        collection_id: String,
        object_id: String,
        version: VersionKey,
    },
    /// Manifest row describing some other version or collection
    MismatchedManifest {
        api_root: String,
        collection_id: String,
        object_id: String,
        version: VersionKey,
        manifest_collection_id: String,
        manifest_version: VersionKey,
    },
    /// Manifest row with no stored object
    OrphanManifest {
        api_root: String,
        collection_id: String,
        object_id: String,
        version: VersionKey,
    },
    /// API root holding no objects
    EmptyApiRoot { api_root: String },
    /// API roots exist but no objects anywhere
    EmptyStore { api_roots: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingManifest {
                api_root,
                collection_id,
                object_id,
                version,
            } => write!(
                f,
                "{}/{}: {} version {} has no manifest entry",
                api_root, collection_id, object_id, version
            ),
            Violation::EmptyManifest {
                api_root,
                collection_id,
                object_id,
                version,
            } => write!(
                f,
                "{}/{}: {} version {} has an empty manifest entry",
                api_root, collection_id, object_id, version
            ),
            Violation::MismatchedManifest {
                api_root,
                collection_id,
                object_id,
                version,
                manifest_collection_id,
                manifest_version,
            } => write!(
                f,
                "{}/{}: {} version {} is linked to {} version {}",
                api_root, collection_id, object_id, version, manifest_collection_id, manifest_version
            ),
            Violation::OrphanManifest {
                api_root,
                collection_id,
                object_id,
                version,
            } => write!(
                f,
                "{}/{}: manifest entry {} version {} has no object",
                api_root, collection_id, object_id, version
            ),
            Violation::EmptyApiRoot { api_root } => write!(f, "api root '{}' holds no objects", api_root),
            Violation::EmptyStore { api_roots } => {
                write!(f, "{} api roots but no objects in the store", api_roots)
            }
        }
    }
}

/// Result of one check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub api_roots: usize,
    pub collections: usize,
    pub objects_checked: usize,
    pub violations: Vec<Violation>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    /// `Initialization` error listing every violation, if there are any.
    pub fn into_result(self) -> StoreResult<Self> {
        if self.is_consistent() {
            return Ok(self);
        }
        let details: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        Err(StoreError::Initialization(format!(
            "{} consistency violation(s): {}",
            self.violations.len(),
            details.join("; ")
        )))
    }
}

pub struct ConsistencyChecker {
    engine: Arc<dyn StorageEngine>,
    policy: EmptyRootPolicy,
    logger: Logger,
}

impl ConsistencyChecker {
    pub fn new(engine: Arc<dyn StorageEngine>, policy: EmptyRootPolicy, logger: Logger) -> Self {
        Self {
            engine,
            policy,
            logger,
        }
    }

    /// Scans every collection of every API root.
    ///
    /// Errors only when the engine cannot be read; violations go in the
    /// report.
    pub fn check(&self) -> StoreResult<ConsistencyReport> {
        let mut report = ConsistencyReport::default();
        let roots = self.engine.api_root_names()?;
        report.api_roots = roots.len();

        for api_root in &roots {
            let mut root_objects = 0;
            for collection in self.engine.collections(api_root, CollectionOrdering::Natural)? {
                report.collections += 1;
                let scan = self.engine.linkage_scan(api_root, &collection.id)?;
                root_objects += scan.objects.len();

                for linkage in scan.objects {
                    report.objects_checked += 1;
                    let violation = match linkage.manifest {
                        None => Some(Violation::MissingManifest {
                            api_root: api_root.clone(),
                            collection_id: linkage.collection_id,
                            object_id: linkage.object_id,
                            version: linkage.version,
                        }),
                        Some(entry)
                            if entry.version != linkage.version
                                || entry.collection_id != linkage.collection_id =>
                        {
                            Some(Violation::MismatchedManifest {
                                api_root: api_root.clone(),
                                collection_id: linkage.collection_id,
                                object_id: linkage.object_id,
                                version: linkage.version,
                                manifest_collection_id: entry.collection_id,
                                manifest_version: entry.version,
                            })
                        }
                        Some(entry) if entry.media_type.trim().is_empty() => Some(Violation::EmptyManifest {
                            api_root: api_root.clone(),
                            collection_id: linkage.collection_id,
                            object_id: linkage.object_id,
                            version: linkage.version,
                        }),
                        Some(_) => None,
                    };
                    report.violations.extend(violation);
                }

                report
                    .violations
                    .extend(scan.orphans.into_iter().map(|entry| Violation::OrphanManifest {
                        api_root: api_root.clone(),
                        collection_id: entry.collection_id,
                        object_id: entry.object_id,
                        version: entry.version,
                    }));
            }

            if self.policy == EmptyRootPolicy::PerRoot && root_objects == 0 {
                report.violations.push(Violation::EmptyApiRoot {
                    api_root: api_root.clone(),
                });
            }
        }

        if self.policy == EmptyRootPolicy::Aggregate && !roots.is_empty() && report.objects_checked == 0 {
            report.violations.push(Violation::EmptyStore {
                api_roots: roots.len(),
            });
        }

        let objects = report.objects_checked.to_string();
        if report.is_consistent() {
            self.logger.event(
                Event::ConsistencyCheckPassed,
                &[("api_roots", &report.api_roots.to_string()), ("objects", &objects)],
            );
        } else {
            self.logger.event(
                Event::ConsistencyCheckFailed,
                &[
                    ("objects", &objects),
                    ("violations", &report.violations.len().to_string()),
                ],
            );
        }
        Ok(report)
    }
}
