//! `match[version]` selector

use std::collections::BTreeSet;

use crate::errors::{StoreError, StoreResult};
use crate::version::{parse_version, VersionKey};

/// Which versions of each id a query selects.
///
/// Values combine: `first,last` selects both ends of each history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSelector {
    pub all: bool,
    pub first: bool,
    pub last: bool,
    pub exact: BTreeSet<VersionKey>,
}

impl VersionSelector {
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    pub fn last() -> Self {
        Self {
            last: true,
            ..Self::default()
        }
    }

    pub fn first() -> Self {
        Self {
            first: true,
            ..Self::default()
        }
    }

    /// Parses a comma-separated `match[version]` value.
    pub fn parse(value: &str) -> StoreResult<Self> {
        let mut selector = Self::default();
        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "all" => selector.all = true,
                "first" => selector.first = true,
                "last" => selector.last = true,
                timestamp => {
                    let key = parse_version(timestamp)
                        .map_err(|e| StoreError::invalid_filter(format!("match[version]: {}", e)))?;
                    selector.exact.insert(key);
                }
            }
        }
        if selector == Self::default() {
            return Err(StoreError::invalid_filter("match[version] has no values"));
        }
        Ok(selector)
    }

    /// Whether `version` is selected, given the id's version bounds.
    pub fn selects(&self, version: VersionKey, earliest: VersionKey, latest: VersionKey) -> bool {
        self.all
            || (self.first && version == earliest)
            || (self.last && version == latest)
            || self.exact.contains(&version)
    }
}
