//! Concurrent access tests
//!
//! Covers:
//! - Writers on different collections do not interfere
//! - Readers never see an object whose manifest entry is missing
//! - The store is consistent once all writers finish

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use serde_json::json;
use taxiidb::backend::{Backend, LISTING_FILTERS};
use taxiidb::filter::FilterArgs;
use taxiidb::observability::Logger;
use taxiidb::version::parse_version;
use taxiidb::StoreConfig;

// =============================================================================
// Test Utilities
// =============================================================================

const ROOT: &str = "trustgroup1";
const TARGETS: [&str; 2] = [
    "52892447-4d7e-4f70-b94d-d7f22742ff63",
    "64993447-4d7e-4f70-b94d-d7f33742ee63",
];
const PER_WRITER: usize = 200;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/default_data.json")
}

fn indicator(writer: usize, n: usize) -> serde_json::Value {
    json!({
        "type": "indicator",
        "spec_version": "2.1",
        "id": format!("indicator--{:08x}-0000-4000-8000-{:012x}", writer, n),
        "created": "2019-01-01T00:00:00.000Z",
        "modified": "2019-01-01T00:00:00.000Z",
        "pattern": format!("[file:name = 'sample-{}-{}']", writer, n),
        "pattern_type": "stix",
    })
}

fn all_versions() -> FilterArgs {
    FilterArgs::new().with("match[version]", "all")
}

fn rows_for(object_id: &str) -> FilterArgs {
    all_versions().with("match[id]", object_id)
}

// =============================================================================
// Writers and Readers
// =============================================================================

#[test]
fn test_parallel_writers_and_readers() {
    let backend = Backend::open(StoreConfig::memory().with_snapshot(fixture()), Logger::discard()).unwrap();
    let writing = AtomicBool::new(true);
    let request_time = parse_version("2020-01-01T00:00:00Z").unwrap();

    thread::scope(|scope| {
        let writers: Vec<_> = TARGETS
            .into_iter()
            .enumerate()
            .map(|(writer, collection)| {
                let backend = backend.clone();
                scope.spawn(move || {
                    for n in 0..PER_WRITER {
                        let report = backend
                            .add_objects(ROOT, collection, &[indicator(writer, n)], request_time)
                            .unwrap();
                        assert_eq!(report.success_count, 1);
                    }
                })
            })
            .collect();

        for collection in TARGETS {
            let backend = backend.clone();
            let writing = &writing;
            scope.spawn(move || {
                while writing.load(Ordering::Acquire) {
                    let objects = backend
                        .objects(ROOT, collection, &all_versions(), LISTING_FILTERS, None)
                        .unwrap();
                    for object in &objects.items {
                        let rows = backend
                            .manifest(ROOT, collection, &rows_for(&object.object_id), LISTING_FILTERS, None)
                            .unwrap();
                        assert!(
                            rows.items.iter().any(|row| row.version == object.version),
                            "{} version {} visible without its manifest entry",
                            object.object_id,
                            object.version
                        );
                    }
                    thread::yield_now();
                }
            });
        }

        for writer in writers {
            writer.join().unwrap();
        }
        writing.store(false, Ordering::Release);
    });

    for collection in TARGETS {
        let stats = backend.collection_stats(ROOT, collection).unwrap();
        assert_eq!((stats.object_count, stats.version_count), (PER_WRITER, PER_WRITER));
    }
    let report = backend.check().unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.objects_checked, 7 + 2 * PER_WRITER);
}

#[test]
fn test_concurrent_resubmissions_store_one_version() {
    let backend = Backend::open(StoreConfig::memory().with_snapshot(fixture()), Logger::discard()).unwrap();
    let body = indicator(9, 1);
    let request_time = parse_version("2020-01-01T00:00:00Z").unwrap();

    thread::scope(|scope| {
        for _ in 0..4 {
            let backend = backend.clone();
            let body = body.clone();
            scope.spawn(move || {
                let report = backend
                    .add_objects(ROOT, TARGETS[0], &[body], request_time)
                    .unwrap();
                assert_eq!(report.success_count, 1);
            });
        }
    });

    let stats = backend.collection_stats(ROOT, TARGETS[0]).unwrap();
    assert_eq!(stats.version_count, 1);
}
