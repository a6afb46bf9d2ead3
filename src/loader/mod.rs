//! Bulk loading and consistency checking
//!
//! [`BulkLoader`] turns a [`Snapshot`] into engine writes: discovery, API
//! roots, collections, then every object paired with its manifest row.
//! [`ConsistencyChecker`] then verifies that each stored object is linked to
//! a manifest row describing it, and that API roots are not empty.
//!
//! Both run before the backend facade is handed out.

mod checker;
#[allow(clippy::module_inception)]
mod loader;
mod snapshot;

pub use checker::{ConsistencyChecker, ConsistencyReport, Violation};
pub use loader::{BulkLoader, LoadOutcome, LoadStats};
pub use snapshot::{RootInformation, Snapshot, SnapshotCollection, SnapshotManifestEntry, SnapshotRoot};
