// SPDX-License-Identifier: MIT

//! Database row types for Nix store metadata.

use std::collections::BTreeSet;

/// Information about a valid store path.
///
/// A row of the ValidPaths table together with its references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPathInfo {
    /// Database row ID
    pub id: i64,
    /// Full store path (e.g., /nix/store/xxx-name)
    pub path: String,
    /// NAR hash, `sha256:<base16>`
    pub hash: String,
    /// Store path of the derivation that produced this (if any)
    pub deriver: Option<String>,
    /// Size of the NAR serialization
    pub nar_size: Option<u64>,
    /// Full store paths this path references
    pub references: BTreeSet<String>,
}

/// A content-addressed derivation realisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realisation {
    /// Database row ID
    pub id: i64,
    /// Derivation output hash, `sha256:<base16>` (the column is named drvPath)
    pub drv_hash: String,
    /// Output name (usually "out")
    pub output_name: String,
    /// Full store path the output was realised to
    pub output_path: String,
    /// Space-separated signatures
    pub signatures: Option<String>,
}

impl Realisation {
    /// Parse signatures from the space-separated column.
    pub fn signatures(&self) -> Vec<&str> {
        self.signatures
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }
}
