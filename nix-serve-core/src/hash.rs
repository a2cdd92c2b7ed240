// SPDX-License-Identifier: MIT

use crate::base32;
use base64::{Engine as _, engine::general_purpose};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgo {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgo {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgo::Md5 => "md5",
            HashAlgo::Sha1 => "sha1",
            HashAlgo::Sha256 => "sha256",
            HashAlgo::Sha512 => "sha512",
        }
    }

    pub fn digest_size(&self) -> usize {
        match self {
            HashAlgo::Md5 => 16,
            HashAlgo::Sha1 => 20,
            HashAlgo::Sha256 => 32,
            HashAlgo::Sha512 => 64,
        }
    }

    pub fn base16_len(&self) -> usize {
        self.digest_size() * 2
    }

    pub fn base32_len(&self) -> usize {
        base32::encode_len(self.digest_size())
    }

    pub fn base64_len(&self) -> usize {
        self.digest_size().div_ceil(3) * 4
    }

    pub fn from_name(name: &str) -> Result<Self, ParseHashError> {
        match name {
            "md5" => Ok(HashAlgo::Md5),
            "sha1" => Ok(HashAlgo::Sha1),
            "sha256" => Ok(HashAlgo::Sha256),
            "sha512" => Ok(HashAlgo::Sha512),
            _ => Err(ParseHashError::UnknownAlgorithm(name.to_string())),
        }
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A digest together with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash {
    algo: HashAlgo,
    digest: Vec<u8>,
}

impl Hash {
    pub fn new(algo: HashAlgo, digest: Vec<u8>) -> Result<Self, ParseHashError> {
        if digest.len() != algo.digest_size() {
            return Err(ParseHashError::InvalidDigestSize {
                expected: algo.digest_size(),
                actual: digest.len(),
            });
        }
        Ok(Hash { algo, digest })
    }

    /// Parse a hash in `algo:digest` form, e.g. the database `hash` column
    /// (`sha256:<base16>`) or the hash half of a derivation output id.
    ///
    /// The digest may be base16, nix-base32 or base64.
    pub fn parse_prefixed(s: &str) -> Result<Self, ParseHashError> {
        let (algo, digest) = s
            .split_once(':')
            .ok_or_else(|| ParseHashError::InvalidFormat(s.to_string()))?;
        let algo = HashAlgo::from_name(algo)?;
        Self::parse_any(digest, algo)
    }

    /// Parse a bare digest of a known algorithm, detecting the encoding by
    /// its length.
    pub fn parse_any(digest: &str, algo: HashAlgo) -> Result<Self, ParseHashError> {
        let bytes = digest.as_bytes();
        let raw = if bytes.len() == algo.base16_len() {
            hex::decode(bytes).map_err(|e| ParseHashError::HexDecode(e.to_string()))?
        } else if bytes.len() == algo.base32_len() {
            base32::decode(bytes).map_err(|e| ParseHashError::Base32Decode(e.to_string()))?
        } else if bytes.len() == algo.base64_len() {
            general_purpose::STANDARD
                .decode(bytes)
                .map_err(|e| ParseHashError::Base64Decode(e.to_string()))?
        } else {
            return Err(ParseHashError::InvalidDigestLength {
                algo,
                actual: bytes.len(),
            });
        };
        Self::new(algo, raw)
    }

    pub fn algo(&self) -> HashAlgo {
        self.algo
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// `<algo>:<nix-base32>`, the form used in narinfo `NarHash` fields and
    /// in fingerprints.
    pub fn to_base32_prefixed(&self) -> String {
        format!("{}:{}", self.algo, self.to_base32_bare())
    }

    /// Nix-base32 digest without the algorithm, as embedded in NAR URLs.
    pub fn to_base32_bare(&self) -> String {
        base32::encode_string(&self.digest)
    }

    /// `<algo>:<base16>`, the form Nix stores in its database.
    pub fn to_base16_prefixed(&self) -> String {
        format!("{}:{}", self.algo, hex::encode(&self.digest))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseHashError {
    #[error("Unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Invalid hash format: {0}")]
    InvalidFormat(String),

    #[error("Invalid digest size: expected {expected}, got {actual}")]
    InvalidDigestSize { expected: usize, actual: usize },

    #[error("Invalid digest length {actual} for {algo}")]
    InvalidDigestLength { algo: HashAlgo, actual: usize },

    #[error("Hex decode error: {0}")]
    HexDecode(String),

    #[error("Base32 decode error: {0}")]
    Base32Decode(String),

    #[error("Base64 decode error: {0}")]
    Base64Decode(String),
}
