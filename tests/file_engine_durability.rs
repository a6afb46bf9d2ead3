//! File engine durability tests
//!
//! Covers:
//! - Added and deleted versions survive a restart
//! - A damaged journal stops startup instead of serving partial data
//! - An unusable data directory is a connection error

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use taxiidb::backend::{Backend, OBJECT_FILTERS, VERSION_FILTERS};
use taxiidb::config::EngineConfig;
use taxiidb::filter::FilterArgs;
use taxiidb::observability::Logger;
use taxiidb::version::parse_version;
use taxiidb::{StoreConfig, StoreError};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

const ROOT: &str = "trustgroup1";
const COLLECTION: &str = "91a7b528-80eb-42ed-a74d-c6fbd5a26116";
const INDICATOR: &str = "indicator--6770298f-0fd8-471a-ab8c-1c658a46574e";

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/default_data.json")
}

fn config(data_dir: &Path) -> StoreConfig {
    StoreConfig {
        engine: EngineConfig::File {
            data_dir: data_dir.to_path_buf(),
        },
        ..StoreConfig::memory()
    }
    .with_snapshot(fixture())
}

fn journal_path(data_dir: &Path) -> PathBuf {
    data_dir
        .join("collections")
        .join(ROOT)
        .join(format!("{}.journal", COLLECTION))
}

// =============================================================================
// Restart
// =============================================================================

#[test]
fn test_adds_and_deletes_survive_restart() {
    let dir = TempDir::new().unwrap();
    let request_time = parse_version("2020-01-01T00:00:00Z").unwrap();

    {
        let backend = Backend::open(config(dir.path()), Logger::discard()).unwrap();
        let report = backend
            .add_objects(
                ROOT,
                COLLECTION,
                &[json!({
                    "type": "indicator",
                    "spec_version": "2.1",
                    "id": INDICATOR,
                    "created": "2016-11-03T12:30:59.000Z",
                    "modified": "2018-01-01T00:00:00.000Z",
                    "name": "Persisted update",
                })],
                request_time,
            )
            .unwrap();
        assert_eq!(report.success_count, 1);

        let args = FilterArgs::new().with("match[version]", "first");
        let removed = backend
            .delete_object(ROOT, COLLECTION, INDICATOR, &args, OBJECT_FILTERS)
            .unwrap();
        assert_eq!(removed.len(), 1);
    }

    let backend = Backend::open(config(dir.path()), Logger::discard()).unwrap();
    let versions = backend
        .object_versions(ROOT, COLLECTION, INDICATOR, &FilterArgs::new(), VERSION_FILTERS, None)
        .unwrap();
    assert_eq!(
        versions.items,
        vec![
            parse_version("2016-12-25T12:30:59.444Z").unwrap(),
            parse_version("2017-01-27T13:49:53.935Z").unwrap(),
            parse_version("2018-01-01T00:00:00Z").unwrap(),
        ]
    );

    let latest = backend
        .object(ROOT, COLLECTION, INDICATOR, &FilterArgs::new(), OBJECT_FILTERS, None)
        .unwrap();
    assert_eq!(latest.items[0].body["name"], "Persisted update");
    assert!(backend.check().unwrap().is_consistent());
}

#[test]
fn test_registries_survive_restart_without_snapshot() {
    let dir = TempDir::new().unwrap();
    drop(Backend::open(config(dir.path()), Logger::discard()).unwrap());

    let mut without_snapshot = config(dir.path());
    without_snapshot.initial_snapshot = None;
    let backend = Backend::open(without_snapshot, Logger::discard()).unwrap();

    assert_eq!(backend.discovery().unwrap().unwrap().api_roots.len(), 3);
    assert_eq!(backend.collections(ROOT).unwrap().len(), 3);
    assert_eq!(backend.collection_stats(ROOT, "high-value").unwrap().version_count, 7);
}

// =============================================================================
// Damage
// =============================================================================

#[test]
fn test_damaged_collection_journal_stops_startup() {
    let dir = TempDir::new().unwrap();
    drop(Backend::open(config(dir.path()), Logger::discard()).unwrap());

    let path = journal_path(dir.path());
    let mut bytes = fs::read(&path).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    let (logger, capture) = Logger::capture();
    let err = Backend::open(config(dir.path()), logger).unwrap_err();
    assert!(matches!(err, StoreError::Corruption(_)), "got {:?}", err);
    assert!(err.is_fatal());
    assert!(capture.contains_event("BOOT_FAILED"));
}

#[test]
fn test_torn_journal_tail_stops_startup() {
    let dir = TempDir::new().unwrap();
    drop(Backend::open(config(dir.path()), Logger::discard()).unwrap());

    let path = journal_path(dir.path());
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let err = Backend::open(config(dir.path()), Logger::discard()).unwrap_err();
    assert!(matches!(err, StoreError::Corruption(_)));
}

#[test]
fn test_file_as_data_dir_is_connection_error() {
    let dir = TempDir::new().unwrap();
    let not_a_dir = dir.path().join("data");
    fs::write(&not_a_dir, b"occupied").unwrap();

    let err = Backend::open(config(&not_a_dir), Logger::discard()).unwrap_err();
    assert!(matches!(err, StoreError::Connection(_)));
    assert!(err.is_fatal());
}
