//! ObjectStore - immutable object bodies

use std::collections::HashMap;

use crate::errors::{StoreError, StoreResult};
use crate::model::{ManifestEntry, StoredObject};
use crate::version::VersionKey;

/// Object bodies of one collection.
#[derive(Debug, Default, Clone)]
pub struct ObjectStore {
    objects: HashMap<(String, VersionKey), StoredObject>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether `object` could be stored without conflict.
    ///
    /// Returns `true` if an identical version is already present.
    pub fn check(&self, object: &StoredObject) -> StoreResult<bool> {
        match self.objects.get(&(object.object_id.clone(), object.version)) {
            None => Ok(false),
            Some(existing) if existing == object => Ok(true),
            Some(_) => Err(StoreError::Conflict(format!(
                "object {} version {} already exists with different content",
                object.object_id, object.version
            ))),
        }
    }

    /// Stores a version. Versions are never replaced in place.
    pub fn put(&mut self, object: StoredObject) -> StoreResult<()> {
        if !self.check(&object)? {
            self.objects
                .insert((object.object_id.clone(), object.version), object);
        }
        Ok(())
    }

    pub fn get(&self, object_id: &str, version: VersionKey) -> Option<&StoredObject> {
        self.objects.get(&(object_id.to_string(), version))
    }

    /// Bodies for manifest-selected rows, in manifest order.
    ///
    /// Rows whose body is missing are skipped; the consistency check is
    /// what reports such gaps.
    pub fn get_many(&self, rows: &[ManifestEntry]) -> Vec<StoredObject> {
        rows.iter()
            .filter_map(|row| self.get(&row.object_id, row.version))
            .cloned()
            .collect()
    }

    pub fn delete(&mut self, object_id: &str, version: VersionKey) -> Option<StoredObject> {
        self.objects.remove(&(object_id.to_string(), version))
    }

    /// Every stored version, unordered.
    pub fn iter(&self) -> impl Iterator<Item = &StoredObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{media_type_for, ObjectHeader};
    use serde_json::json;

    const ID: &str = "indicator--6770298f-0fd8-471a-ab8c-1c658a46574e";

    fn object(modified: &str, pattern: &str) -> StoredObject {
        let body = json!({
            "type": "indicator",
            "id": ID,
            "spec_version": "2.1",
            "created": "2016-11-03T12:30:59.000Z",
            "modified": modified,
            "pattern": pattern,
        });
        let header = ObjectHeader::from_body(&body).unwrap();
        let version = header.declared_version().unwrap();
        StoredObject::new("c1", header, version, media_type_for("2.1"), body)
    }

    #[test]
    fn test_put_get_delete() {
        let mut store = ObjectStore::new();
        let v1 = object("2016-11-03T12:30:59.000Z", "[a]");
        let key = v1.version;
        store.put(v1.clone()).unwrap();

        assert_eq!(store.get(ID, key), Some(&v1));
        assert_eq!(store.delete(ID, key), Some(v1));
        assert!(store.get(ID, key).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_versions_are_not_replaced() {
        let mut store = ObjectStore::new();
        store.put(object("2016-11-03T12:30:59.000Z", "[a]")).unwrap();
        store.put(object("2016-11-03T12:30:59.000Z", "[a]")).unwrap();
        assert_eq!(store.len(), 1);

        let err = store.put(object("2016-11-03T12:30:59.000Z", "[b]")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_get_many_follows_row_order() {
        let mut store = ObjectStore::new();
        let v1 = object("2016-11-03T12:30:59.000Z", "[a]");
        let v2 = object("2017-01-27T13:49:53.935Z", "[b]");
        store.put(v1.clone()).unwrap();
        store.put(v2.clone()).unwrap();

        let rows = vec![
            ManifestEntry::for_object(&v2, v2.version),
            ManifestEntry::for_object(&v1, v1.version),
        ];
        let bodies = store.get_many(&rows);
        assert_eq!(bodies, vec![v2, v1]);
    }
}
