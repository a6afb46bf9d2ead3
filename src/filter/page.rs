//! Pages and continuation cursors

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};
use crate::model::ManifestEntry;
use crate::version::VersionKey;

/// Position of a manifest row in `(date_added, object_id, version)` order.
///
/// A cursor names the last row a caller has seen, so rows added behind it
/// do not shift later pages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cursor {
    pub date_added: VersionKey,
    pub object_id: String,
    pub version: VersionKey,
}

impl Cursor {
    pub fn of(entry: &ManifestEntry) -> Self {
        Self {
            date_added: entry.date_added,
            object_id: entry.object_id.clone(),
            version: entry.version,
        }
    }

    /// Opaque token form.
    pub fn encode(&self) -> String {
        let raw = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(token: &str) -> StoreResult<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| StoreError::invalid_filter("next: malformed cursor"))?;
        serde_json::from_slice(&raw).map_err(|_| StoreError::invalid_filter("next: malformed cursor"))
    }
}

/// Requested page bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum rows; `None` is unbounded
    pub limit: Option<usize>,
    /// Resume strictly after this position
    pub after: Option<Cursor>,
}

impl PageRequest {
    pub fn limited(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            after: None,
        }
    }

    /// Caps the limit at `max`.
    pub fn capped(mut self, max: usize) -> Self {
        self.limit = Some(self.limit.map_or(max, |l| l.min(max)));
        self
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// More rows exist past this page
    pub more: bool,
    /// Cursor to resume from when `more` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub date_added_first: Option<VersionKey>,
    pub date_added_last: Option<VersionKey>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            more: false,
            next: None,
            date_added_first: None,
            date_added_last: None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replaces the rows while keeping the paging metadata.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            more: self.more,
            next: self.next,
            date_added_first: self.date_added_first,
            date_added_last: self.date_added_last,
        }
    }
}

impl Page<ManifestEntry> {
    /// Cuts a sorted candidate list down to the requested page.
    pub fn from_sorted(sorted: Vec<ManifestEntry>, request: &PageRequest) -> Self {
        let mut rows: Vec<ManifestEntry> = match &request.after {
            Some(after) => sorted.into_iter().filter(|e| &Cursor::of(e) > after).collect(),
            None => sorted,
        };

        let more = match request.limit {
            Some(limit) if rows.len() > limit => {
                rows.truncate(limit);
                true
            }
            _ => false,
        };

        let next = if more { rows.last().map(|e| Cursor::of(e).encode()) } else { None };
        let date_added_first = rows.iter().map(|e| e.date_added).min();
        let date_added_last = rows.iter().map(|e| e.date_added).max();

        Self {
            items: rows,
            more,
            next,
            date_added_first,
            date_added_last,
        }
    }
}
