//! ManifestIndex - per-collection version records

use std::collections::{BTreeMap, HashMap};

use crate::errors::{StoreError, StoreResult};
use crate::filter::{Filters, Page, PageRequest};
use crate::model::{CollectionStats, ManifestEntry};
use crate::version::VersionKey;

/// Result of a manifest upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// Identical entry already present
    Unchanged,
}

/// Version records of one collection.
#[derive(Debug, Default, Clone)]
pub struct ManifestIndex {
    entries: HashMap<String, BTreeMap<VersionKey, ManifestEntry>>,
}

impl ManifestIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether `entry` could be inserted without conflict.
    pub fn check(&self, entry: &ManifestEntry) -> StoreResult<PutOutcome> {
        match self.get(&entry.object_id, entry.version) {
            None => Ok(PutOutcome::Inserted),
            Some(existing) if existing == entry => Ok(PutOutcome::Unchanged),
            Some(_) => Err(StoreError::Conflict(format!(
                "manifest entry for {} version {} already exists with different content",
                entry.object_id, entry.version
            ))),
        }
    }

    /// Idempotent upsert keyed by (object_id, version).
    pub fn put(&mut self, entry: ManifestEntry) -> StoreResult<PutOutcome> {
        let outcome = self.check(&entry)?;
        if outcome == PutOutcome::Inserted {
            self.entries
                .entry(entry.object_id.clone())
                .or_default()
                .insert(entry.version, entry);
        }
        Ok(outcome)
    }

    pub fn get(&self, object_id: &str, version: VersionKey) -> Option<&ManifestEntry> {
        self.entries.get(object_id).and_then(|v| v.get(&version))
    }

    /// Removes one version; returns the removed entry.
    pub fn delete(&mut self, object_id: &str, version: VersionKey) -> Option<ManifestEntry> {
        let versions = self.entries.get_mut(object_id)?;
        let removed = versions.remove(&version);
        if versions.is_empty() {
            self.entries.remove(object_id);
        }
        removed
    }

    /// Highest version recorded for `object_id`.
    pub fn latest_version(&self, object_id: &str) -> Option<VersionKey> {
        self.entries
            .get(object_id)
            .and_then(|v| v.keys().next_back().copied())
    }

    /// Lowest version recorded for `object_id`.
    pub fn earliest_version(&self, object_id: &str) -> Option<VersionKey> {
        self.entries.get(object_id).and_then(|v| v.keys().next().copied())
    }

    /// Rows matching `filters`, in `(date_added, object_id, version)` order.
    ///
    /// `first`/`last` selectors compare against each id's full history, so
    /// an id contributes at most one row for each of them.
    pub fn select(&self, filters: &Filters) -> Vec<ManifestEntry> {
        let histories: Box<dyn Iterator<Item = (&String, &BTreeMap<VersionKey, ManifestEntry>)>> =
            match &filters.ids {
                Some(ids) => Box::new(ids.iter().filter_map(|id| self.entries.get_key_value(id))),
                None => Box::new(self.entries.iter()),
            };

        let mut rows = Vec::new();
        for (object_id, history) in histories {
            let (Some(earliest), Some(latest)) =
                (self.earliest_version(object_id), self.latest_version(object_id))
            else {
                continue;
            };

            rows.extend(
                history
                    .values()
                    .filter(|e| filters.versions.selects(e.version, earliest, latest))
                    .filter(|e| filters.admits(e))
                    .cloned(),
            );
        }

        rows.sort_by(|a, b| {
            a.date_added
                .cmp(&b.date_added)
                .then_with(|| a.object_id.cmp(&b.object_id))
                .then_with(|| a.version.cmp(&b.version))
        });
        rows
    }

    /// One page of matching rows.
    pub fn list(&self, filters: &Filters, page: &PageRequest) -> Page<ManifestEntry> {
        Page::from_sorted(self.select(filters), page)
    }

    /// Every entry, unordered.
    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values().flat_map(|v| v.values())
    }

    /// Counts derived from the recorded rows.
    pub fn stats(&self) -> CollectionStats {
        let mut stats = CollectionStats {
            object_count: self.entries.len(),
            ..CollectionStats::default()
        };
        for entry in self.iter() {
            stats.version_count += 1;
            stats.date_added_first = Some(
                stats
                    .date_added_first
                    .map_or(entry.date_added, |d| d.min(entry.date_added)),
            );
            stats.date_added_last = Some(
                stats
                    .date_added_last
                    .map_or(entry.date_added, |d| d.max(entry.date_added)),
            );
        }
        stats
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterArgs, FilterKey, VersionSelector};

    const ID_A: &str = "indicator--6770298f-0fd8-471a-ab8c-1c658a46574e";
    const ID_B: &str = "malware--fdd60b30-b67c-41e3-b0b9-f01faf20d111";

    fn key(micros: i64) -> VersionKey {
        VersionKey::from_micros(micros).unwrap()
    }

    fn entry(id: &str, version: i64, date_added: i64) -> ManifestEntry {
        ManifestEntry {
            collection_id: "c1".to_string(),
            object_id: id.to_string(),
            version: key(version),
            date_added: key(date_added),
            media_type: "application/stix+json;version=2.1".to_string(),
        }
    }

    fn index_with(entries: Vec<ManifestEntry>) -> ManifestIndex {
        let mut index = ManifestIndex::new();
        for e in entries {
            index.put(e).unwrap();
        }
        index
    }

    #[test]
    fn test_put_identical_is_noop() {
        let mut index = ManifestIndex::new();
        assert_eq!(index.put(entry(ID_A, 1, 1)).unwrap(), PutOutcome::Inserted);
        assert_eq!(index.put(entry(ID_A, 1, 1)).unwrap(), PutOutcome::Unchanged);
        assert_eq!(index.stats().version_count, 1);
    }

    #[test]
    fn test_put_divergent_conflicts() {
        let mut index = index_with(vec![entry(ID_A, 1, 1)]);
        let err = index.put(entry(ID_A, 1, 2)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_last_only_returns_latest_version() {
        let index = index_with(vec![entry(ID_A, 1, 1), entry(ID_A, 2, 2), entry(ID_A, 3, 3)]);
        let rows = index.select(&Filters::new(VersionSelector::last()));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].version, key(3));
    }

    #[test]
    fn test_first_and_all() {
        let index = index_with(vec![entry(ID_A, 1, 1), entry(ID_A, 2, 2), entry(ID_A, 3, 3)]);
        let first = index.select(&Filters::new(VersionSelector::first()));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].version, key(1));
        assert_eq!(index.select(&Filters::new(VersionSelector::all())).len(), 3);
    }

    #[test]
    fn test_added_after_is_exclusive() {
        let index = index_with(vec![entry(ID_A, 10, 10), entry(ID_A, 20, 20), entry(ID_A, 30, 30)]);
        let args = FilterArgs::new()
            .with("added_after", "1970-01-01T00:00:00.000020Z")
            .with("match[version]", "all");
        let (filters, _) = Filters::parse(
            &args,
            &[FilterKey::AddedAfter, FilterKey::Version],
            VersionSelector::last(),
        )
        .unwrap();
        let rows = index.select(&filters);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date_added, key(30));
    }

    #[test]
    fn test_ordering_by_date_added_then_id_then_version() {
        let index = index_with(vec![
            entry(ID_B, 5, 20),
            entry(ID_A, 7, 20),
            entry(ID_A, 3, 10),
            entry(ID_A, 6, 20),
        ]);
        let rows = index.select(&Filters::new(VersionSelector::all()));
        let order: Vec<_> = rows.iter().map(|e| (e.object_id.as_str(), e.version)).collect();
        assert_eq!(
            order,
            vec![(ID_A, key(3)), (ID_A, key(6)), (ID_A, key(7)), (ID_B, key(5))]
        );
    }

    #[test]
    fn test_type_filter_uses_id_prefix() {
        let index = index_with(vec![entry(ID_A, 1, 1), entry(ID_B, 1, 1)]);
        let mut filters = Filters::new(VersionSelector::all());
        filters.types = Some(["malware".to_string()].into_iter().collect());
        let rows = index.select(&filters);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].object_id, ID_B);
    }

    #[test]
    fn test_delete_recomputes_latest() {
        let mut index = index_with(vec![entry(ID_A, 1, 1), entry(ID_A, 2, 2), entry(ID_A, 3, 3)]);
        assert_eq!(index.latest_version(ID_A), Some(key(3)));

        index.delete(ID_A, key(3)).unwrap();
        assert_eq!(index.latest_version(ID_A), Some(key(2)));

        index.delete(ID_A, key(1)).unwrap();
        assert_eq!(index.earliest_version(ID_A), Some(key(2)));
        let first = index.select(&Filters::new(VersionSelector::first()));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].version, key(2));

        index.delete(ID_A, key(2));
        assert_eq!(index.latest_version(ID_A), None);
        assert_eq!(index.earliest_version(ID_A), None);
        assert!(index.is_empty());
    }

    #[test]
    fn test_list_truncates_with_more() {
        let index = index_with((1..=4).map(|i| entry(ID_A, i, i)).collect());
        let page = index.list(&Filters::new(VersionSelector::all()), &PageRequest::limited(3));
        assert_eq!(page.len(), 3);
        assert!(page.more);
    }

    #[test]
    fn test_stats() {
        let index = index_with(vec![entry(ID_A, 1, 5), entry(ID_A, 2, 9), entry(ID_B, 1, 7)]);
        let stats = index.stats();
        assert_eq!(stats.object_count, 2);
        assert_eq!(stats.version_count, 3);
        assert_eq!(stats.date_added_first, Some(key(5)));
        assert_eq!(stats.date_added_last, Some(key(9)));
    }
}
