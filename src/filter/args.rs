//! Raw filter arguments

use std::collections::BTreeMap;

/// Filter keys understood by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKey {
    /// `match[id]`
    Id,
    /// `match[type]`
    Type,
    /// `match[version]`
    Version,
    /// `match[spec_version]`
    SpecVersion,
    /// `added_after`
    AddedAfter,
    /// `next` (pagination cursor)
    Next,
    /// `limit` (page size)
    Limit,
}

impl FilterKey {
    /// Returns the query-parameter spelling of this key
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::Id => "match[id]",
            FilterKey::Type => "match[type]",
            FilterKey::Version => "match[version]",
            FilterKey::SpecVersion => "match[spec_version]",
            FilterKey::AddedAfter => "added_after",
            FilterKey::Next => "next",
            FilterKey::Limit => "limit",
        }
    }

    /// Parses the query-parameter spelling of a key
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "match[id]" => Some(FilterKey::Id),
            "match[type]" => Some(FilterKey::Type),
            "match[version]" => Some(FilterKey::Version),
            "match[spec_version]" => Some(FilterKey::SpecVersion),
            "added_after" => Some(FilterKey::AddedAfter),
            "next" => Some(FilterKey::Next),
            "limit" => Some(FilterKey::Limit),
            _ => None,
        }
    }

    /// Pagination keys are accepted by every operation.
    pub fn is_pagination(&self) -> bool {
        matches!(self, FilterKey::Next | FilterKey::Limit)
    }
}

impl std::fmt::Display for FilterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query-parameter style filter arguments, as handed over by the serving
/// layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterArgs {
    args: BTreeMap<String, String>,
}

impl FilterArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) one argument.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.args.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.args.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FilterArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            args: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_spelling_round_trips() {
        for key in [
            FilterKey::Id,
            FilterKey::Type,
            FilterKey::Version,
            FilterKey::SpecVersion,
            FilterKey::AddedAfter,
            FilterKey::Next,
            FilterKey::Limit,
        ] {
            assert_eq!(FilterKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(FilterKey::parse("match[colour]"), None);
    }

    #[test]
    fn test_args_from_iter() {
        let args: FilterArgs = vec![("match[id]", "a"), ("limit", "3")].into_iter().collect();
        assert_eq!(args.get("match[id]"), Some("a"));
        assert_eq!(args.iter().count(), 2);
    }
}
