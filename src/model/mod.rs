//! Typed records held by the store
//!
//! Object bodies stay opaque JSON; everything the store reasons about
//! (identity, versions, manifest linkage, collection metadata) is an
//! explicit field.

mod collection;
mod discovery;
mod object;

pub use collection::{Collection, CollectionStats};
pub use discovery::{ApiRootInfo, Discovery};
pub use object::{
    media_type_for, object_type_of, spec_version_of, validate_object_id, ManifestEntry,
    ObjectHeader, StoredObject, DEFAULT_SPEC_VERSION, LEGACY_SPEC_VERSION,
};
