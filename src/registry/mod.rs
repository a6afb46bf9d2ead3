//! Collection and discovery registries
//!
//! Read-mostly metadata fixed at load or provisioning time. Neither
//! registry holds object data.

mod collections;
mod discovery;

pub use collections::{CollectionOrdering, CollectionRegistry};
pub use discovery::DiscoveryRegistry;
