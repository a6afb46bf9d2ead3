//! Filter vocabulary shared by the manifest, object and version paths
//!
//! Raw query arguments ([`FilterArgs`]) are parsed once, against the set of
//! keys an operation allows, into a typed [`Filters`] value. The manifest
//! index is the only place a `Filters` is evaluated; object listings are
//! derived from manifest results.

mod args;
mod page;
mod selector;

pub use args::{FilterArgs, FilterKey};
pub use page::{Cursor, Page, PageRequest};
pub use selector::VersionSelector;

use std::collections::BTreeSet;

use crate::errors::{StoreError, StoreResult};
use crate::model::ManifestEntry;
use crate::version::{parse_version, VersionKey};

/// Parsed, validated filter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    /// `match[id]`: id set membership
    pub ids: Option<BTreeSet<String>>,
    /// `match[type]`: type prefix set membership
    pub types: Option<BTreeSet<String>>,
    /// `match[version]`
    pub versions: VersionSelector,
    /// `match[spec_version]`: spec version set membership
    pub spec_versions: Option<BTreeSet<String>>,
    /// `added_after`: exclusive lower bound on date_added
    pub added_after: Option<VersionKey>,
}

impl Filters {
    /// No restriction except the given version selector.
    pub fn new(versions: VersionSelector) -> Self {
        Self {
            ids: None,
            types: None,
            versions,
            spec_versions: None,
            added_after: None,
        }
    }

    /// Parses `args`, rejecting any key outside `allowed`.
    ///
    /// Pagination keys (`next`, `limit`) are always accepted and come back
    /// in the returned [`PageRequest`]. `default_versions` applies when no
    /// `match[version]` is given.
    pub fn parse(
        args: &FilterArgs,
        allowed: &[FilterKey],
        default_versions: VersionSelector,
    ) -> StoreResult<(Self, PageRequest)> {
        let mut filters = Self::new(default_versions);
        let mut page = PageRequest::default();

        for (raw_key, value) in args.iter() {
            let key = FilterKey::parse(raw_key)
                .ok_or_else(|| StoreError::invalid_filter(format!("unknown filter '{}'", raw_key)))?;

            if key.is_pagination() {
                match key {
                    FilterKey::Next => page.after = Some(Cursor::decode(value)?),
                    FilterKey::Limit => page.limit = Some(parse_limit(value)?),
                    _ => {}
                }
                continue;
            }

            if !allowed.contains(&key) {
                return Err(StoreError::invalid_filter(format!(
                    "filter '{}' is not supported by this operation",
                    raw_key
                )));
            }

            match key {
                FilterKey::Id => filters.ids = Some(split_set(raw_key, value)?),
                FilterKey::Type => filters.types = Some(split_set(raw_key, value)?),
                FilterKey::SpecVersion => filters.spec_versions = Some(split_set(raw_key, value)?),
                FilterKey::Version => filters.versions = VersionSelector::parse(value)?,
                FilterKey::AddedAfter => {
                    filters.added_after = Some(
                        parse_version(value).map_err(|e| StoreError::invalid_filter(format!("added_after: {}", e)))?,
                    )
                }
                FilterKey::Next | FilterKey::Limit => {}
            }
        }

        Ok((filters, page))
    }

    /// Restricts the id set to exactly `object_id`.
    pub fn pin_id(mut self, object_id: &str) -> Self {
        let pinned = match self.ids.take() {
            Some(ids) if !ids.contains(object_id) => BTreeSet::new(),
            _ => BTreeSet::from([object_id.to_string()]),
        };
        self.ids = Some(pinned);
        self
    }

    /// Whether `entry` passes every predicate except the version selector.
    pub fn admits(&self, entry: &ManifestEntry) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&entry.object_id) {
                return false;
            }
        }
        if let Some(types) = &self.types {
            if !types.contains(entry.object_type()) {
                return false;
            }
        }
        if let Some(spec_versions) = &self.spec_versions {
            match entry.spec_version() {
                Some(v) if spec_versions.contains(v) => {}
                _ => return false,
            }
        }
        if let Some(bound) = self.added_after {
            if entry.date_added <= bound {
                return false;
            }
        }
        true
    }
}

fn split_set(key: &str, value: &str) -> StoreResult<BTreeSet<String>> {
    let set: BTreeSet<String> = value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if set.is_empty() {
        return Err(StoreError::invalid_filter(format!("'{}' has no values", key)));
    }
    Ok(set)
}

fn parse_limit(value: &str) -> StoreResult<usize> {
    match value.trim().parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(StoreError::invalid_filter(format!(
            "limit must be a positive integer, got '{}'",
            value
        ))),
    }
}
