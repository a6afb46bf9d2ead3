//! VersionKey - sortable numeric version identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Microseconds since the Unix epoch.
///
/// Two stored objects with the same id differ only by version key, and the
/// derived ordering is chronological.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionKey(i64);

impl VersionKey {
    #[inline]
    pub(super) const fn new(micros: i64) -> Self {
        Self(micros)
    }

    /// Builds a key from raw microseconds, rejecting values outside the
    /// timestamp range.
    pub fn from_micros(micros: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_micros(micros).map(|_| Self(micros))
    }

    /// Returns the underlying microsecond count.
    #[inline]
    pub fn micros(&self) -> i64 {
        self.0
    }

    /// Next representable key, saturating at the upper bound.
    pub fn successor(&self) -> Self {
        self.0
            .checked_add(1)
            .and_then(Self::from_micros)
            .unwrap_or(*self)
    }
}

impl std::fmt::Display for VersionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", super::format_timestamp(&super::to_timestamp(*self)))
    }
}
