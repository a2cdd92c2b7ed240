use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use nix_serve_core::store_path::is_valid_hash_part;
use nix_serve_core::{DrvOutput, Hash, PathInfo, Realisation, StoreDir, StorePath};
use nix_serve_db::{OpenMode, StoreDb};
use nix_serve_nar::NarByteStream;

use crate::error::{Result, StoreError};

/// Read access to a Nix store, as needed by the binary cache.
///
/// Methods other than [`Store::nar_stream`] block and are called on the
/// blocking thread pool. `Ok(None)` means "not found" and is never an error.
pub trait Store: Send + Sync {
    fn store_dir(&self) -> &StoreDir;

    /// Resolve a hash part to the valid store path it belongs to.
    fn query_path_from_hash_part(&self, hash_part: &str) -> Result<Option<StorePath>>;

    fn query_path_info(&self, path: &StorePath) -> Result<Option<PathInfo>>;

    /// NAR serialization of `path`. Finite, single pass; an I/O failure is
    /// the last item.
    fn nar_stream(&self, path: &StorePath) -> BoxStream<'static, io::Result<Bytes>>;

    fn query_realisation(&self, id: &DrvOutput) -> Result<Option<Realisation>>;
}

/// A store on the local file system, described by its SQLite database.
pub struct LocalStore {
    store_dir: StoreDir,
    real_store: Option<PathBuf>,
    db: Mutex<StoreDb>,
}

impl LocalStore {
    pub fn open(store_dir: StoreDir, real_store: Option<PathBuf>, db_path: &Path) -> Result<Self> {
        let db = StoreDb::open(db_path, OpenMode::ReadOnly).map_err(StoreError::from)?;
        Ok(Self::with_db(store_dir, real_store, db))
    }

    pub fn with_db(store_dir: StoreDir, real_store: Option<PathBuf>, db: StoreDb) -> Self {
        Self {
            store_dir,
            real_store,
            db: Mutex::new(db),
        }
    }

    /// Location of `path` on disk, which differs from its store path for
    /// chroot stores.
    pub fn get_real_path(&self, path: &StorePath) -> PathBuf {
        match &self.real_store {
            Some(real_store) => real_store.join(path.to_string()),
            None => PathBuf::from(self.store_dir.display(path).to_string()),
        }
    }

    fn db(&self) -> MutexGuard<'_, StoreDb> {
        // The connection is read-only, so a panic while holding it leaves
        // nothing half-written.
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parse_store_path(&self, owner: &str, full: &str) -> Result<StorePath> {
        self.store_dir.parse_path(full).map_err(|e| {
            StoreError::CorruptPathInfo {
                path: owner.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn parse_hash(&self, owner: &str, hash: &str) -> Result<Hash> {
        Hash::parse_prefixed(hash).map_err(|e| {
            StoreError::CorruptPathInfo {
                path: owner.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

impl Store for LocalStore {
    fn store_dir(&self) -> &StoreDir {
        &self.store_dir
    }

    fn query_path_from_hash_part(&self, hash_part: &str) -> Result<Option<StorePath>> {
        if !is_valid_hash_part(hash_part) {
            return Ok(None);
        }
        let found = self
            .db()
            .query_path_from_hash_part(self.store_dir.as_str(), hash_part)
            .map_err(StoreError::from)?;
        found
            .map(|full| self.parse_store_path(&full, &full))
            .transpose()
    }

    fn query_path_info(&self, path: &StorePath) -> Result<Option<PathInfo>> {
        let full = self.store_dir.display(path).to_string();
        let row = match self.db().query_path_info(&full).map_err(StoreError::from)? {
            Some(row) => row,
            None => return Ok(None),
        };

        let references = row
            .references
            .iter()
            .map(|r| self.parse_store_path(&full, r))
            .collect::<Result<BTreeSet<_>>>()?;
        let deriver = row
            .deriver
            .as_deref()
            .map(|d| self.parse_store_path(&full, d))
            .transpose()?;

        Ok(Some(PathInfo {
            path: path.clone(),
            nar_hash: self.parse_hash(&full, &row.hash)?,
            nar_size: row.nar_size.unwrap_or(0),
            references,
            deriver,
        }))
    }

    fn nar_stream(&self, path: &StorePath) -> BoxStream<'static, io::Result<Bytes>> {
        NarByteStream::new(self.get_real_path(path)).boxed()
    }

    fn query_realisation(&self, id: &DrvOutput) -> Result<Option<Realisation>> {
        let db = self.db();
        let row = match db
            .query_realisation(&id.drv_hash.to_base16_prefixed(), &id.output_name)
            .map_err(StoreError::from)?
        {
            Some(row) => row,
            None => return Ok(None),
        };
        let owner = id.to_string();

        let mut dependent_realisations = BTreeMap::new();
        for dep in db
            .query_realisation_references(row.id)
            .map_err(StoreError::from)?
        {
            let dep_id = DrvOutput {
                drv_hash: self.parse_hash(&owner, &dep.drv_hash)?,
                output_name: dep.output_name,
            };
            let dep_path = self.parse_store_path(&owner, &dep.output_path)?;
            dependent_realisations.insert(dep_id, dep_path);
        }

        Ok(Some(Realisation {
            id: id.clone(),
            out_path: self.parse_store_path(&owner, &row.output_path)?,
            signatures: row.signatures().into_iter().map(str::to_string).collect(),
            dependent_realisations,
        }))
    }
}
