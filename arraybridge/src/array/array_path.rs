//! Array paths.

use arraybridge_storage::{StoreKey, StorePrefix};
use derive_more::Display;
use thiserror::Error;

/// The path of an array in a store.
///
/// A path always starts with `/`. A non-root path does not end with `/` and has no empty segments.
/// The objects of an array at `/a/b` are stored under the prefix `a/b/`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct ArrayPath(String);

/// An invalid array path.
#[derive(Clone, Debug, Error)]
#[error("invalid array path {0}")]
pub struct ArrayPathError(String);

/// The name of the descriptor object of an array.
const DESCRIPTOR_NAME: &str = "metadata";

/// The directory holding the index segments of an array.
const INDEX_DIRECTORY: &str = "index";

/// The directory holding the chunk objects of an array.
const CHUNKS_DIRECTORY: &str = "chunks";

impl ArrayPath {
    /// Create a new array path from `path`.
    ///
    /// # Errors
    /// Returns [`ArrayPathError`] if `path` is not valid according to [`ArrayPath::validate()`].
    pub fn new(path: &str) -> Result<Self, ArrayPathError> {
        if Self::validate(path) {
            Ok(Self(path.to_string()))
        } else {
            Err(ArrayPathError(path.to_string()))
        }
    }

    /// The root path.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Extracts a string slice containing the path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a path.
    #[must_use]
    pub fn validate(path: &str) -> bool {
        path.eq("/") || (path.starts_with('/') && !path.ends_with('/') && !path.contains("//"))
    }

    /// The prefix of every object of the array.
    #[must_use]
    pub fn prefix(&self) -> StorePrefix {
        let path = self.0.strip_prefix('/').unwrap_or(&self.0);
        if path.is_empty() {
            StorePrefix::root()
        } else {
            // a validated non-root path is a valid key
            StoreKey::new(path).map_or_else(|_| StorePrefix::root(), |key| key.to_prefix())
        }
    }

    /// The key of the array descriptor.
    #[must_use]
    pub fn descriptor_key(&self) -> StoreKey {
        self.child_key(DESCRIPTOR_NAME)
    }

    /// The prefix of the index segments of the array.
    #[must_use]
    pub fn index_prefix(&self) -> StorePrefix {
        self.child_key(INDEX_DIRECTORY).to_prefix()
    }

    /// The prefix of the chunk objects of the array.
    #[must_use]
    pub fn chunks_prefix(&self) -> StorePrefix {
        self.child_key(CHUNKS_DIRECTORY).to_prefix()
    }

    fn child_key(&self, name: &str) -> StoreKey {
        self.prefix()
            .key(name)
            .unwrap_or_else(|_| unreachable!("{name} is a valid key segment"))
    }
}

impl TryFrom<&str> for ArrayPath {
    type Error = ArrayPathError;

    fn try_from(path: &str) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_path() {
        assert!(ArrayPath::new("/").is_ok());
        assert!(ArrayPath::new("/a/b").is_ok());
        assert_eq!(ArrayPath::new("/a/b").unwrap().to_string(), "/a/b");
        assert!(ArrayPath::new("/a/b/").is_err());
        assert!(ArrayPath::new("a/b").is_err());
        assert!(ArrayPath::new("").is_err());
        assert_eq!(
            ArrayPath::new("/a/b/").unwrap_err().to_string(),
            "invalid array path /a/b/"
        );
        assert!(ArrayPath::new("/a//b").is_err());
    }

    #[test]
    fn array_path_keys() {
        let path = ArrayPath::new("/a/b").unwrap();
        assert_eq!(path.prefix().as_str(), "a/b/");
        assert_eq!(path.descriptor_key().as_str(), "a/b/metadata");
        assert_eq!(path.index_prefix().as_str(), "a/b/index/");
        assert_eq!(path.chunks_prefix().as_str(), "a/b/chunks/");

        let root = ArrayPath::root();
        assert_eq!(root.prefix().as_str(), "");
        assert_eq!(root.descriptor_key().as_str(), "metadata");
        assert_eq!(root.index_prefix().as_str(), "index/");
        assert_eq!(root.chunks_prefix().as_str(), "chunks/");
    }
}
