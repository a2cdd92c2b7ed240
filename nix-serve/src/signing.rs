use crate::error::{CacheError, Result};
use nix_serve_core::{PathInfo, SigningKey, StoreDir};

/// Signs narinfos with the configured secret key, if any.
///
/// Without a key narinfos are served unsigned.
#[derive(Debug, Default)]
pub struct Signer {
    key: Option<SigningKey>,
}

impl Signer {
    pub fn new(key: Option<SigningKey>) -> Self {
        Self { key }
    }

    /// Public half of the key in `trusted-public-keys` form.
    pub fn public_key(&self) -> Option<String> {
        self.key.as_ref().map(SigningKey::public_key)
    }

    /// The `Sig:` value for `info`, or `None` when signing is disabled.
    pub fn sign(&self, store_dir: &StoreDir, info: &PathInfo) -> Result<Option<String>> {
        let Some(key) = &self.key else {
            return Ok(None);
        };
        let fingerprint = info
            .fingerprint(store_dir)
            .ok_or_else(|| CacheError::Fingerprint {
                path: store_dir.display(&info.path).to_string(),
            })?;
        Ok(Some(key.sign_detached(&fingerprint)))
    }
}
