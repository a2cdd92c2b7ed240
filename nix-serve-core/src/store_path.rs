// SPDX-License-Identifier: MIT

//! Store directory and store path types.

use std::fmt;

use thiserror::Error;

use crate::base32;

/// Length of the hash part of a store path base name.
pub const HASH_PART_LEN: usize = 32;

/// Maximum length of the name part of a store path base name.
pub const MAX_NAME_LEN: usize = 211;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorePathError {
    #[error("store directory '{0}' is not an absolute path")]
    RelativeStoreDir(String),

    #[error("path '{path}' is not in the store directory '{store_dir}'")]
    NotInStore { path: String, store_dir: String },

    #[error("store path '{0}' has an invalid hash part")]
    InvalidHashPart(String),

    #[error("store path '{0}' has an invalid name")]
    InvalidName(String),
}

/// Returns true if `s` could be the hash part of a store path.
pub fn is_valid_hash_part(s: &str) -> bool {
    s.len() == HASH_PART_LEN && base32::is_valid(s.as_bytes())
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"+-._?=".contains(&b))
}

/// A store path base name, `<hash-part>-<name>`.
///
/// Ordering follows the base name, which is how Nix orders its path sets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorePath {
    hash_part: String,
    name: String,
}

impl StorePath {
    pub fn from_base_name(s: &str) -> Result<Self, StorePathError> {
        let (hash_part, name) = s
            .split_once('-')
            .ok_or_else(|| StorePathError::InvalidHashPart(s.to_string()))?;
        if !is_valid_hash_part(hash_part) {
            return Err(StorePathError::InvalidHashPart(s.to_string()));
        }
        if !is_valid_name(name) {
            return Err(StorePathError::InvalidName(s.to_string()));
        }
        Ok(Self {
            hash_part: hash_part.to_string(),
            name: name.to_string(),
        })
    }

    pub fn hash_part(&self) -> &str {
        &self.hash_part
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.hash_part, self.name)
    }
}

/// The directory store paths live in, e.g. `/nix/store`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDir(String);

impl StoreDir {
    pub fn new(dir: impl Into<String>) -> Result<Self, StorePathError> {
        let mut dir = dir.into();
        if !dir.starts_with('/') {
            return Err(StorePathError::RelativeStoreDir(dir));
        }
        while dir.len() > 1 && dir.ends_with('/') {
            dir.pop();
        }
        Ok(Self(dir))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full path of `path` inside this store directory.
    pub fn display<'a>(&'a self, path: &'a StorePath) -> impl fmt::Display + 'a {
        DisplayPath {
            store_dir: self,
            path,
        }
    }

    /// Parse a full path such as `/nix/store/<hash>-<name>/`. A single
    /// trailing separator is tolerated and dropped.
    pub fn parse_path(&self, full: &str) -> Result<StorePath, StorePathError> {
        let not_in_store = || StorePathError::NotInStore {
            path: full.to_string(),
            store_dir: self.0.clone(),
        };
        let rest = full
            .strip_prefix(self.0.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(not_in_store)?;
        let base_name = rest.strip_suffix('/').unwrap_or(rest);
        if base_name.contains('/') {
            return Err(not_in_store());
        }
        StorePath::from_base_name(base_name)
    }
}

impl Default for StoreDir {
    fn default() -> Self {
        Self("/nix/store".to_string())
    }
}

impl fmt::Display for StoreDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct DisplayPath<'a> {
    store_dir: &'a StoreDir,
    path: &'a StorePath,
}

impl fmt::Display for DisplayPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store_dir, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const HELLO: &str = "26xbg1ndr7hbcncrlf9nhx5is2b25d13-hello-2.12.1";

    #[test]
    fn test_parse_full_path() {
        let store_dir = StoreDir::default();
        let path = store_dir
            .parse_path(&format!("/nix/store/{HELLO}"))
            .unwrap();
        assert_eq!(path.hash_part(), "26xbg1ndr7hbcncrlf9nhx5is2b25d13");
        assert_eq!(path.name(), "hello-2.12.1");
        assert_eq!(
            store_dir.display(&path).to_string(),
            format!("/nix/store/{HELLO}")
        );
    }

    #[test]
    fn test_trailing_separator_is_dropped() {
        let store_dir = StoreDir::new("/nix/store/").unwrap();
        assert_eq!(store_dir.as_str(), "/nix/store");
        let path = store_dir
            .parse_path(&format!("/nix/store/{HELLO}/"))
            .unwrap();
        assert_eq!(path.to_string(), HELLO);
    }

    #[rstest]
    #[case::other_dir("/gnu/store/26xbg1ndr7hbcncrlf9nhx5is2b25d13-hello")]
    #[case::nested("/nix/store/26xbg1ndr7hbcncrlf9nhx5is2b25d13-hello/bin/hello")]
    #[case::short_hash("/nix/store/26xbg1ndr7hbcncrlf9-hello")]
    #[case::bad_alphabet("/nix/store/eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee-hello")]
    #[case::no_name("/nix/store/26xbg1ndr7hbcncrlf9nhx5is2b25d13-")]
    #[case::dot_name("/nix/store/26xbg1ndr7hbcncrlf9nhx5is2b25d13-.hidden")]
    fn test_invalid_paths(#[case] full: &str) {
        assert!(StoreDir::default().parse_path(full).is_err());
    }

    #[test]
    fn test_relative_store_dir() {
        assert_eq!(
            StoreDir::new("nix/store"),
            Err(StorePathError::RelativeStoreDir("nix/store".to_string()))
        );
    }

    #[test]
    fn test_hash_part_validation() {
        assert!(is_valid_hash_part("26xbg1ndr7hbcncrlf9nhx5is2b25d13"));
        assert!(!is_valid_hash_part("abc123"));
        assert!(!is_valid_hash_part("26xbg1ndr7hbcncrlf9nhx5is2b25d1e"));
    }
}
