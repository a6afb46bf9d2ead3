//! Observable events
//!
//! Events are explicit and typed.

use std::fmt;

use super::Severity;

/// Observable store events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & lifecycle
    /// Store startup begins
    BootStart,
    /// Engine reachable, journals replayed
    EngineOpened,
    /// Store ready to serve
    BootComplete,
    /// Startup aborted
    BootFailed,

    // Bulk load
    /// Snapshot load started
    SnapshotLoadStart,
    /// Snapshot load skipped because the store already holds data
    SnapshotLoadSkipped,
    /// Snapshot load complete
    SnapshotLoadComplete,
    /// Manifest row with no matching object, ignored
    ManifestEntryOrphaned,
    /// Store wiped before a load
    StoreCleared,

    // Consistency check
    /// Every object has manifest linkage
    ConsistencyCheckPassed,
    /// Violations found
    ConsistencyCheckFailed,

    // Serving
    /// Object version stored
    ObjectAdded,
    /// Object rejected during add
    ObjectRejected,
    /// Object version deleted
    ObjectDeleted,
    /// Query rejected for its filters
    FilterRejected,
}

impl Event {
    /// Returns the event name as logged
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "BOOT_START",
            Event::EngineOpened => "ENGINE_OPENED",
            Event::BootComplete => "BOOT_COMPLETE",
            Event::BootFailed => "BOOT_FAILED",
            Event::SnapshotLoadStart => "SNAPSHOT_LOAD_START",
            Event::SnapshotLoadSkipped => "SNAPSHOT_LOAD_SKIPPED",
            Event::SnapshotLoadComplete => "SNAPSHOT_LOAD_COMPLETE",
            Event::ManifestEntryOrphaned => "MANIFEST_ENTRY_ORPHANED",
            Event::StoreCleared => "STORE_CLEARED",
            Event::ConsistencyCheckPassed => "CONSISTENCY_CHECK_PASSED",
            Event::ConsistencyCheckFailed => "CONSISTENCY_CHECK_FAILED",
            Event::ObjectAdded => "OBJECT_ADDED",
            Event::ObjectRejected => "OBJECT_REJECTED",
            Event::ObjectDeleted => "OBJECT_DELETED",
            Event::FilterRejected => "FILTER_REJECTED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::BootFailed | Event::ConsistencyCheckFailed => Severity::Fatal,
            Event::ManifestEntryOrphaned | Event::ObjectRejected | Event::FilterRejected => {
                Severity::Warn
            }
            Event::ObjectAdded | Event::ObjectDeleted => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_upper_snake() {
        for event in [Event::BootStart, Event::SnapshotLoadSkipped, Event::FilterRejected] {
            assert!(event
                .as_str()
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_failures_are_fatal() {
        assert_eq!(Event::BootFailed.severity(), Severity::Fatal);
        assert_eq!(Event::ConsistencyCheckFailed.severity(), Severity::Fatal);
        assert_eq!(Event::BootComplete.severity(), Severity::Info);
    }
}
