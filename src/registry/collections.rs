//! CollectionRegistry - collection metadata per API root

use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::{StoreError, StoreResult};
use crate::model::Collection;

/// Order in which collections are listed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollectionOrdering {
    /// Order of provisioning
    #[default]
    Natural,
    /// Ascending by id, so independently loaded servers agree
    ById,
}

impl CollectionOrdering {
    /// Ordering implied by the interoperability flag.
    pub fn for_interop(interop: bool) -> Self {
        if interop {
            CollectionOrdering::ById
        } else {
            CollectionOrdering::Natural
        }
    }
}

/// Collection records grouped by API root, in provisioning order.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    roots: RwLock<HashMap<String, Vec<Collection>>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection, or replaces the record with the same id in place.
    pub fn put(&self, api_root: &str, collection: Collection) -> StoreResult<()> {
        let mut roots = self
            .roots
            .write()
            .map_err(|_| StoreError::poisoned("collection registry"))?;
        let collections = roots.entry(api_root.to_string()).or_default();
        match collections.iter_mut().find(|c| c.id == collection.id) {
            Some(existing) => *existing = collection,
            None => collections.push(collection),
        }
        Ok(())
    }

    pub fn list(&self, api_root: &str, ordering: CollectionOrdering) -> StoreResult<Vec<Collection>> {
        let roots = self
            .roots
            .read()
            .map_err(|_| StoreError::poisoned("collection registry"))?;
        let mut collections = roots.get(api_root).cloned().unwrap_or_default();
        if ordering == CollectionOrdering::ById {
            collections.sort_by(|a, b| a.id.cmp(&b.id));
        }
        Ok(collections)
    }

    /// Looks a collection up by id or alias.
    pub fn get(&self, api_root: &str, key: &str) -> StoreResult<Option<Collection>> {
        let roots = self
            .roots
            .read()
            .map_err(|_| StoreError::poisoned("collection registry"))?;
        Ok(roots
            .get(api_root)
            .and_then(|collections| collections.iter().find(|c| c.answers_to(key)))
            .cloned())
    }

    pub fn clear(&self) -> StoreResult<()> {
        self.roots
            .write()
            .map_err(|_| StoreError::poisoned("collection registry"))?
            .clear();
        Ok(())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        let roots = self
            .roots
            .read()
            .map_err(|_| StoreError::poisoned("collection registry"))?;
        Ok(roots.values().all(Vec::is_empty))
    }
}
