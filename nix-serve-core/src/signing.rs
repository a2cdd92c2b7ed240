// SPDX-License-Identifier: MIT

use base64::{Engine, engine::general_purpose};
use ed25519_dalek::{Signer, SigningKey as DalekSigningKey};
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Failed to read signing key file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode base64: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("Failed to parse signing key: {0}")]
    ParseKey(String),

    #[error("Invalid signing key length: expected 32 or 64 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// A named Ed25519 secret key, as produced by `nix key generate-secret`.
#[derive(Clone)]
pub struct SigningKey {
    name: String,
    key: DalekSigningKey,
}

impl SigningKey {
    /// Parse a secret key from a file
    ///
    /// The file should contain a key in the format: "name:base64-key"
    pub fn from_file(path: &Path) -> Result<Self, SigningError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a secret key in the format "name:base64-key"
    ///
    /// The key can be either 32 bytes (secret key only) or 64 bytes (keypair)
    pub fn parse(s: &str) -> Result<Self, SigningError> {
        let (name, key_base64) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| SigningError::ParseKey("Sign key does not contain a ':'".to_string()))?;
        if name.is_empty() {
            return Err(SigningError::ParseKey("Empty key name".to_string()));
        }

        let bytes = general_purpose::STANDARD.decode(key_base64.trim())?;
        let key = match bytes.len() {
            32 => {
                let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
                    SigningError::ParseKey("Failed to convert key bytes to [u8; 32]".to_string())
                })?;
                DalekSigningKey::from_bytes(&seed)
            }
            64 => {
                let keypair: [u8; 64] = bytes.as_slice().try_into().map_err(|_| {
                    SigningError::ParseKey("Failed to convert key bytes to [u8; 64]".to_string())
                })?;
                DalekSigningKey::from_keypair_bytes(&keypair)
                    .map_err(|e| SigningError::ParseKey(format!("Invalid Ed25519 keypair: {e}")))?
            }
            len => return Err(SigningError::InvalidKeyLength(len)),
        };

        Ok(Self {
            name: name.to_string(),
            key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sign `msg` and return the detached signature as "name:base64-signature".
    pub fn sign_detached(&self, msg: &[u8]) -> String {
        let signature = self.key.sign(msg);
        format!(
            "{}:{}",
            self.name,
            general_purpose::STANDARD.encode(signature.to_bytes())
        )
    }

    /// The matching public key as "name:base64-key", suitable for
    /// `trusted-public-keys`.
    pub fn public_key(&self) -> String {
        format!(
            "{}:{}",
            self.name,
            general_purpose::STANDARD.encode(self.key.verifying_key().to_bytes())
        )
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
