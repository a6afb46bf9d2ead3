//! Collection records

use serde::{Deserialize, Serialize};

use crate::version::VersionKey;

/// Collection metadata, scoped under an API root.
///
/// Never carries object bodies or manifest rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub can_read: bool,
    #[serde(default)]
    pub can_write: bool,
    #[serde(default)]
    pub media_types: Vec<String>,
}

impl Collection {
    /// Whether `key` names this collection by id or alias.
    pub fn answers_to(&self, key: &str) -> bool {
        self.id == key || self.alias.as_deref() == Some(key)
    }
}

/// Counts derived from the manifest index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// Distinct object ids
    pub object_count: usize,
    /// Stored versions across all ids
    pub version_count: usize,
    pub date_added_first: Option<VersionKey>,
    pub date_added_last: Option<VersionKey>,
}
