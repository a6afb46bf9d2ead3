//! Conversions between timestamps and version keys

use chrono::{DateTime, SubsecRound, Utc};

use super::VersionKey;

/// Canonical rendering, always six fractional digits.
const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Encodes a timestamp as a version key.
///
/// Digits below one microsecond are dropped.
pub fn to_version(timestamp: &DateTime<Utc>) -> VersionKey {
    VersionKey::new(timestamp.timestamp_micros())
}

/// Decodes a version key back into a timestamp.
pub fn to_timestamp(version: VersionKey) -> DateTime<Utc> {
    // Keys built through the codec or from_micros are always in range.
    DateTime::<Utc>::from_timestamp_micros(version.micros()).unwrap_or_default()
}

/// Parses an RFC 3339 timestamp, truncating to microsecond precision.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(6))
        .map_err(|e| format!("invalid timestamp '{}': {}", value, e))
}

/// Parses an RFC 3339 timestamp straight into a version key.
pub fn parse_version(value: &str) -> Result<VersionKey, String> {
    parse_timestamp(value).map(|dt| to_version(&dt))
}

/// Renders a timestamp in canonical `YYYY-MM-DDTHH:MM:SS.ffffffZ` form.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(CANONICAL_FORMAT).to_string()
}
