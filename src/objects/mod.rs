//! Object store
//!
//! Immutable bodies keyed by (object_id, version) within a collection.

mod store;

pub use store::ObjectStore;
