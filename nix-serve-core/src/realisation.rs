// SPDX-License-Identifier: MIT

//! Derivation output ids and realisations of content-addressed derivations.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::hash::{Hash, ParseHashError};
use crate::store_path::StorePath;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DrvOutputError {
    #[error("Invalid derivation output id '{0}': missing '!' separator")]
    MissingSeparator(String),

    #[error("Invalid derivation output id '{id}': {source}")]
    InvalidHash {
        id: String,
        #[source]
        source: ParseHashError,
    },

    #[error("Invalid derivation output id '{0}': empty output name")]
    EmptyOutputName(String),
}

/// A derivation output id ("DOI"): the hash of a derivation's modulo
/// contents plus one of its output names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrvOutput {
    pub drv_hash: Hash,
    pub output_name: String,
}

impl FromStr for DrvOutput {
    type Err = DrvOutputError;

    /// Parses `<algo>:<digest>!<output name>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hash, output_name) = s
            .split_once('!')
            .ok_or_else(|| DrvOutputError::MissingSeparator(s.to_string()))?;
        let drv_hash = Hash::parse_prefixed(hash).map_err(|source| DrvOutputError::InvalidHash {
            id: s.to_string(),
            source,
        })?;
        if output_name.is_empty() {
            return Err(DrvOutputError::EmptyOutputName(s.to_string()));
        }
        Ok(Self {
            drv_hash,
            output_name: output_name.to_string(),
        })
    }
}

impl fmt::Display for DrvOutput {
    /// Canonical form, `sha256:<base16>!<output name>`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}!{}",
            self.drv_hash.to_base16_prefixed(),
            self.output_name
        )
    }
}

/// The concrete store path a derivation output was realised to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realisation {
    pub id: DrvOutput,
    pub out_path: StorePath,
    pub signatures: BTreeSet<String>,
    pub dependent_realisations: BTreeMap<DrvOutput, StorePath>,
}

// Field order matches the sorted keys Nix emits.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RealisationJson<'a> {
    dependent_realisations: BTreeMap<String, String>,
    id: String,
    out_path: String,
    signatures: &'a BTreeSet<String>,
}

impl Serialize for Realisation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RealisationJson {
            dependent_realisations: self
                .dependent_realisations
                .iter()
                .map(|(id, path)| (id.to_string(), path.to_string()))
                .collect(),
            id: self.id.to_string(),
            out_path: self.out_path.to_string(),
            signatures: &self.signatures,
        }
        .serialize(serializer)
    }
}
