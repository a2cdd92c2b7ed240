// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;

use crate::hash::Hash;
use crate::store_path::{StoreDir, StorePath};

/// Metadata of a resolved store path.
///
/// Built fresh for every request and dropped once the response is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    pub path: StorePath,
    pub nar_hash: Hash,
    /// Size of the NAR serialization, 0 if unknown.
    pub nar_size: u64,
    pub references: BTreeSet<StorePath>,
    pub deriver: Option<StorePath>,
}

impl PathInfo {
    /// The string a narinfo signature is computed over:
    ///
    /// `1;<store-path>;<nar-hash>;<nar-size>;<comma-separated-references>`
    ///
    /// Store path and references are printed in full, the NAR hash as
    /// `sha256:<nix-base32>`. Returns `None` when the NAR size is unknown,
    /// as such a path cannot be fingerprinted.
    pub fn fingerprint(&self, store_dir: &StoreDir) -> Option<Vec<u8>> {
        if self.nar_size == 0 {
            return None;
        }

        let mut result = Vec::new();
        result.extend_from_slice(b"1;");
        result.extend_from_slice(store_dir.display(&self.path).to_string().as_bytes());
        result.push(b';');
        result.extend_from_slice(self.nar_hash.to_base32_prefixed().as_bytes());
        result.push(b';');
        result.extend_from_slice(self.nar_size.to_string().as_bytes());
        result.push(b';');

        for (i, reference) in self.references.iter().enumerate() {
            if i > 0 {
                result.push(b',');
            }
            result.extend_from_slice(store_dir.display(reference).to_string().as_bytes());
        }

        Some(result)
    }
}
