//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only when the registry is created

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters of one store instance
///
/// All counters use Relaxed atomics; exact cross-counter consistency is not
/// needed.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    objects_added: AtomicU64,
    objects_rejected: AtomicU64,
    objects_deleted: AtomicU64,
    objects_bulk_loaded: AtomicU64,
    manifest_queries: AtomicU64,
    object_queries: AtomicU64,
    filter_rejections: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_objects_added(&self) {
        self.objects_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_objects_rejected(&self) {
        self.objects_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_objects_deleted(&self, count: u64) {
        self.objects_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_objects_bulk_loaded(&self, count: u64) {
        self.objects_bulk_loaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_manifest_queries(&self) {
        self.manifest_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_object_queries(&self) {
        self.object_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_filter_rejections(&self) {
        self.filter_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            objects_added: self.objects_added.load(Ordering::Relaxed),
            objects_rejected: self.objects_rejected.load(Ordering::Relaxed),
            objects_deleted: self.objects_deleted.load(Ordering::Relaxed),
            objects_bulk_loaded: self.objects_bulk_loaded.load(Ordering::Relaxed),
            manifest_queries: self.manifest_queries.load(Ordering::Relaxed),
            object_queries: self.object_queries.load(Ordering::Relaxed),
            filter_rejections: self.filter_rejections.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub objects_added: u64,
    pub objects_rejected: u64,
    pub objects_deleted: u64,
    pub objects_bulk_loaded: u64,
    pub manifest_queries: u64,
    pub object_queries: u64,
    pub filter_rejections: u64,
}
