//! Stored objects and their manifest entries

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::version::{format_timestamp, parse_timestamp, to_timestamp, to_version, VersionKey};

/// Spec version assumed for objects that carry no `spec_version` but do
/// carry `created`/`modified` (pre-2.1 content).
pub const LEGACY_SPEC_VERSION: &str = "2.0";

/// Spec version of objects without lifecycle timestamps (cyber observables).
pub const DEFAULT_SPEC_VERSION: &str = "2.1";

const MEDIA_TYPE_BASE: &str = "application/stix+json";

fn type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]{1,248}[a-z0-9]$").expect("static pattern"))
}

/// Validates an object id of the form `<type>--<uuid>` and returns its type.
pub fn validate_object_id(id: &str) -> Result<&str, String> {
    let (object_type, uuid) = id
        .split_once("--")
        .ok_or_else(|| format!("object id '{}' is not of the form <type>--<uuid>", id))?;

    if !type_pattern().is_match(object_type) {
        return Err(format!("object id '{}' has an invalid type '{}'", id, object_type));
    }

    Uuid::parse_str(uuid)
        .map_err(|e| format!("object id '{}' has an invalid uuid: {}", id, e))?;

    Ok(object_type)
}

/// Type prefix of an object id; the whole id if it has no separator.
pub fn object_type_of(id: &str) -> &str {
    id.split_once("--").map(|(t, _)| t).unwrap_or(id)
}

/// Extracts the `version=` parameter of a media type.
pub fn spec_version_of(media_type: &str) -> Option<&str> {
    media_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().strip_prefix("version="))
        .next()
}

/// Media type for STIX content of the given spec version.
pub fn media_type_for(spec_version: &str) -> String {
    format!("{};version={}", MEDIA_TYPE_BASE, spec_version)
}

/// Identity and lifecycle fields read out of an object body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    pub object_id: String,
    pub object_type: String,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub spec_version: String,
}

impl ObjectHeader {
    /// Reads and validates the header fields of `body`.
    pub fn from_body(body: &Value) -> Result<Self, String> {
        let fields = body
            .as_object()
            .ok_or_else(|| "object body is not a JSON object".to_string())?;

        let object_id = fields
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| "object has no string 'id'".to_string())?;
        let id_type = validate_object_id(object_id)?;

        let object_type = fields
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("object '{}' has no string 'type'", object_id))?;
        if object_type != id_type {
            return Err(format!(
                "object '{}' declares type '{}' but its id says '{}'",
                object_id, object_type, id_type
            ));
        }

        let timestamp = |key: &str| -> Result<Option<DateTime<Utc>>, String> {
            match fields.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => parse_timestamp(s)
                    .map(Some)
                    .map_err(|e| format!("object '{}' {}: {}", object_id, key, e)),
                Some(_) => Err(format!("object '{}' {} is not a string", object_id, key)),
            }
        };
        let created = timestamp("created")?;
        let modified = timestamp("modified")?;

        if let (Some(c), Some(m)) = (created, modified) {
            if m < c {
                return Err(format!("object '{}' is modified before it was created", object_id));
            }
        }

        let spec_version = match fields.get("spec_version").and_then(Value::as_str) {
            Some(v) => v.to_string(),
            None if created.is_none() && modified.is_none() => DEFAULT_SPEC_VERSION.to_string(),
            None => LEGACY_SPEC_VERSION.to_string(),
        };

        Ok(Self {
            object_id: object_id.to_string(),
            object_type: object_type.to_string(),
            created,
            modified,
            spec_version,
        })
    }

    /// Version the object declares for itself: `modified`, else `created`.
    pub fn declared_version(&self) -> Option<VersionKey> {
        self.modified.or(self.created).map(|t| to_version(&t))
    }
}

/// One immutable version of an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub collection_id: String,
    pub object_id: String,
    pub object_type: String,
    pub version: VersionKey,
    pub created_at: VersionKey,
    /// Absent for append-only objects (markings, observables)
    pub modified_at: Option<VersionKey>,
    pub media_type: String,
    pub body: Value,
}

impl StoredObject {
    /// Builds a stored object from a validated header.
    ///
    /// Objects without `created` take their version as creation time.
    pub fn new(
        collection_id: impl Into<String>,
        header: ObjectHeader,
        version: VersionKey,
        media_type: impl Into<String>,
        body: Value,
    ) -> Self {
        Self {
            collection_id: collection_id.into(),
            object_id: header.object_id,
            object_type: header.object_type,
            version,
            created_at: header.created.map(|t| to_version(&t)).unwrap_or(version),
            modified_at: header.modified.map(|t| to_version(&t)),
            media_type: media_type.into(),
            body,
        }
    }

    /// Identity of this version inside its collection.
    pub fn key(&self) -> (&str, VersionKey) {
        (&self.object_id, self.version)
    }
}

/// Manifest row for one stored version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub collection_id: String,
    pub object_id: String,
    pub version: VersionKey,
    pub date_added: VersionKey,
    pub media_type: String,
}

impl ManifestEntry {
    /// Manifest entry describing `object`, added at `date_added`.
    pub fn for_object(object: &StoredObject, date_added: VersionKey) -> Self {
        Self {
            collection_id: object.collection_id.clone(),
            object_id: object.object_id.clone(),
            version: object.version,
            date_added,
            media_type: object.media_type.clone(),
        }
    }

    /// Type prefix of the entry's object id.
    pub fn object_type(&self) -> &str {
        object_type_of(&self.object_id)
    }

    /// Spec version carried in the media type.
    pub fn spec_version(&self) -> Option<&str> {
        spec_version_of(&self.media_type)
    }

    /// Renders the entry with human-readable timestamps.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.object_id,
            "date_added": format_timestamp(&to_timestamp(self.date_added)),
            "version": format_timestamp(&to_timestamp(self.version)),
            "media_type": self.media_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDICATOR: &str = "indicator--6770298f-0fd8-471a-ab8c-1c658a46574e";

    #[test]
    fn test_validate_object_id() {
        assert_eq!(validate_object_id(INDICATOR), Ok("indicator"));
        assert_eq!(
            validate_object_id("x-custom-type--6770298f-0fd8-471a-ab8c-1c658a46574e"),
            Ok("x-custom-type")
        );
        assert!(validate_object_id("indicator").is_err());
        assert!(validate_object_id("indicator--not-a-uuid").is_err());
        assert!(validate_object_id("Indicator--6770298f-0fd8-471a-ab8c-1c658a46574e").is_err());
        assert!(validate_object_id("ab--6770298f-0fd8-471a-ab8c-1c658a46574e").is_err());
    }

    #[test]
    fn test_spec_version_of_media_type() {
        assert_eq!(spec_version_of("application/stix+json;version=2.1"), Some("2.1"));
        assert_eq!(spec_version_of("application/stix+json; version=2.0"), Some("2.0"));
        assert_eq!(spec_version_of("application/stix+json"), None);
        assert_eq!(media_type_for("2.1"), "application/stix+json;version=2.1");
    }

    #[test]
    fn test_header_versioned_object() {
        let body = json!({
            "type": "indicator",
            "id": INDICATOR,
            "spec_version": "2.1",
            "created": "2016-11-03T12:30:59.000Z",
            "modified": "2017-01-27T13:49:53.935Z",
        });
        let header = ObjectHeader::from_body(&body).unwrap();
        assert_eq!(header.object_type, "indicator");
        assert_eq!(header.spec_version, "2.1");
        assert_eq!(
            header.declared_version(),
            Some(crate::version::parse_version("2017-01-27T13:49:53.935Z").unwrap())
        );
    }

    #[test]
    fn test_header_marking_uses_created() {
        let body = json!({
            "type": "marking-definition",
            "id": "marking-definition--34098fce-860f-48ae-8e50-ebd3cc5e41da",
            "created": "2017-01-20T00:00:00.000Z",
            "definition_type": "tlp",
        });
        let header = ObjectHeader::from_body(&body).unwrap();
        assert!(header.modified.is_none());
        assert_eq!(header.spec_version, LEGACY_SPEC_VERSION);
        assert_eq!(
            header.declared_version(),
            Some(crate::version::parse_version("2017-01-20T00:00:00Z").unwrap())
        );
    }

    #[test]
    fn test_header_observable_has_no_declared_version() {
        let body = json!({
            "type": "ipv4-addr",
            "id": "ipv4-addr--ff26c055-6336-5bc5-b98d-13d6226742dd",
            "value": "198.51.100.3",
        });
        let header = ObjectHeader::from_body(&body).unwrap();
        assert_eq!(header.declared_version(), None);
        assert_eq!(header.spec_version, DEFAULT_SPEC_VERSION);
    }

    #[test]
    fn test_header_rejects_type_mismatch() {
        let body = json!({"type": "malware", "id": INDICATOR, "created": "2016-11-03T12:30:59Z"});
        assert!(ObjectHeader::from_body(&body).unwrap_err().contains("declares type"));
    }

    #[test]
    fn test_header_rejects_bad_timestamp() {
        let body = json!({"type": "indicator", "id": INDICATOR, "created": "not a date"});
        assert!(ObjectHeader::from_body(&body).is_err());
    }

    #[test]
    fn test_manifest_entry_json() {
        let header = ObjectHeader::from_body(&json!({
            "type": "indicator",
            "id": INDICATOR,
            "spec_version": "2.1",
            "created": "2016-11-03T12:30:59.000Z",
            "modified": "2016-11-03T12:30:59.000Z",
        }))
        .unwrap();
        let version = header.declared_version().unwrap();
        let object = StoredObject::new("c1", header, version, media_type_for("2.1"), json!({}));
        let entry = ManifestEntry::for_object(&object, version);
        let rendered = entry.to_json();
        assert_eq!(rendered["id"], INDICATOR);
        assert_eq!(rendered["version"], "2016-11-03T12:30:59.000000Z");
        assert_eq!(entry.object_type(), "indicator");
        assert_eq!(entry.spec_version(), Some("2.1"));
    }
}
