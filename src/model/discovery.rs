//! Discovery and API root records

use serde::{Deserialize, Serialize};

/// Global discovery document, one per deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Public URLs of the advertised API roots
    #[serde(default)]
    pub api_roots: Vec<String>,
}

impl Discovery {
    /// Finds the advertised URL whose last path segment is `name`.
    pub fn url_for_root(&self, name: &str) -> Option<&str> {
        self.api_roots
            .iter()
            .map(String::as_str)
            .find(|url| url.trim_end_matches('/').rsplit('/').next() == Some(name))
    }
}

/// Descriptive information for one API root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRootInfo {
    /// Partition name (path segment)
    pub name: String,
    /// Public URL resolved from discovery
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub max_content_length: u64,
}
