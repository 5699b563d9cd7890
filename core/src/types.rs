//! Core types for persistree
//!
//! Defines the state tree model, dotted property paths and mutation records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PersistError;

/// A nested mapping from string keys to JSON values.
///
/// Arrays and scalars are opaque leaves; only mappings are traversed.
pub type StateTree = serde_json::Map<String, serde_json::Value>;

/// Separator between segments of a dotted path
pub const PATH_SEPARATOR: char = '.';

/// A location in a state tree, addressed by successive mapping keys.
///
/// Paths are usually written as dotted strings (`"userInfo.name"`). There is
/// no escape syntax for keys that contain a literal dot; build those paths
/// with [`PropPath::from_segments`] instead.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropPath(Vec<String>);

impl PropPath {
    /// Parse a dotted path, rejecting empty paths and empty segments
    pub fn parse(s: &str) -> Result<Self, PersistError> {
        if s.is_empty() {
            return Err(PersistError::invalid_path(s, "path is empty"));
        }
        let segments: Vec<String> = s.split(PATH_SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PersistError::invalid_path(s, "empty segment"));
        }
        Ok(PropPath(segments))
    }

    /// Parse every path in a list, failing on the first malformed one
    pub fn parse_all<S: AsRef<str>>(paths: &[S]) -> Result<Vec<Self>, PersistError> {
        paths.iter().map(|p| Self::parse(p.as_ref())).collect()
    }

    /// Build a path from explicit segments; segments may contain dots
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PersistError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(PersistError::invalid_path("", "path is empty"));
        }
        if segments.iter().any(String::is_empty) {
            return Err(PersistError::invalid_path(segments.join("."), "empty segment"));
        }
        Ok(PropPath(segments))
    }

    /// Path for a single top-level key
    pub fn key(key: impl Into<String>) -> Self {
        PropPath(vec![key.into()])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into the parent segments and the final key
    pub fn split_last(&self) -> Option<(&String, &[String])> {
        self.0.split_last()
    }

    /// True if `self` is `other` or one of its ancestors
    pub fn is_prefix_of(&self, other: &PropPath) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl fmt::Display for PropPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl fmt::Debug for PropPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropPath({})", self)
    }
}

impl FromStr for PropPath {
    type Err = PersistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PropPath {
    type Error = PersistError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PropPath> for String {
    fn from(path: PropPath) -> Self {
        path.to_string()
    }
}

/// How a state change was committed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Direct edit through a mutation closure or a path setter
    Direct,
    /// Deep-merge of a partial state tree
    PatchObject,
    /// Rollback patch applied by a hydrate; never persisted by the engine
    Hydrate,
}

/// A committed state mutation, delivered to listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub store_id: String,
    pub kind: MutationKind,
}

impl Mutation {
    pub fn new(store_id: impl Into<String>, kind: MutationKind) -> Self {
        Self {
            store_id: store_id.into(),
            kind,
        }
    }
}

/// Handle returned by a listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted_path() {
        let path: PropPath = "userInfo.name".parse().unwrap();
        assert_eq!(path.segments(), &["userInfo".to_string(), "name".to_string()]);
        assert_eq!(path.to_string(), "userInfo.name");
    }

    #[test]
    fn test_reject_malformed_paths() {
        assert!(PropPath::parse("").is_err());
        assert!(PropPath::parse("a..b").is_err());
        assert!(PropPath::parse(".a").is_err());
        assert!(PropPath::parse("a.").is_err());
    }

    #[test]
    fn test_segments_may_contain_dots() {
        let path = PropPath::from_segments(["hosts", "example.com"]).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.segments()[1], "example.com");
        assert!(PropPath::from_segments(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_prefix() {
        let parent = PropPath::parse("a").unwrap();
        let child = PropPath::parse("a.b").unwrap();
        assert!(parent.is_prefix_of(&child));
        assert!(!child.is_prefix_of(&parent));
        assert!(child.is_prefix_of(&child));
    }

    #[test]
    fn test_serde_as_string() {
        let path: PropPath = serde_json::from_str("\"a.b\"").unwrap();
        assert_eq!(path, PropPath::parse("a.b").unwrap());
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"a.b\"");
        assert!(serde_json::from_str::<PropPath>("\"a..b\"").is_err());
    }
}
