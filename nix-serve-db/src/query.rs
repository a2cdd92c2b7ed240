// SPDX-License-Identifier: MIT

//! Read queries against the store database.

use std::collections::BTreeSet;

use rusqlite::{OptionalExtension, params};

use crate::connection::StoreDb;
use crate::error::Result;
use crate::types::{Realisation, ValidPathInfo};

impl StoreDb {
    /// Look up a store path by its hash part (the 32-character prefix).
    ///
    /// `store_dir` is the store directory as recorded in the database
    /// (e.g. "/nix/store").
    pub fn query_path_from_hash_part(
        &self,
        store_dir: &str,
        hash_part: &str,
    ) -> Result<Option<String>> {
        let prefix = format!("{store_dir}/{hash_part}");

        let mut stmt = self
            .conn
            .prepare_cached("SELECT path FROM ValidPaths WHERE path >= ?1 LIMIT 1")?;
        let result: Option<String> = stmt
            .query_row(params![&prefix], |row| row.get(0))
            .optional()?;

        // The index scan lands on the next path in order, which may belong
        // to a different hash part.
        Ok(result.filter(|path| path.starts_with(&prefix)))
    }

    /// Query path info by full store path.
    ///
    /// Returns `None` if the path is not in the database.
    pub fn query_path_info(&self, path: &str) -> Result<Option<ValidPathInfo>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT id, path, hash, deriver, narSize
            FROM ValidPaths
            WHERE path = ?1
            "#,
        )?;

        let info = stmt
            .query_row(params![path], |row| {
                Ok(ValidPathInfo {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    hash: row.get(2)?,
                    deriver: row.get(3)?,
                    nar_size: row.get::<_, Option<i64>>(4)?.map(|n| n as u64),
                    references: BTreeSet::new(),
                })
            })
            .optional()?;

        match info {
            Some(mut info) => {
                info.references = self.query_references_by_id(info.id)?;
                Ok(Some(info))
            }
            None => Ok(None),
        }
    }

    fn query_references_by_id(&self, id: i64) -> Result<BTreeSet<String>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT v.path
            FROM Refs r
            JOIN ValidPaths v ON r.reference = v.id
            WHERE r.referrer = ?1
            "#,
        )?;

        let mut refs = BTreeSet::new();
        let mut rows = stmt.query(params![id])?;
        while let Some(row) = rows.next()? {
            refs.insert(row.get(0)?);
        }
        Ok(refs)
    }

    /// Query a realisation by derivation output hash and output name.
    ///
    /// `drv_hash` is in `sha256:<base16>` form, as Nix stores it in the
    /// drvPath column. Databases without the CA tables have no realisations.
    pub fn query_realisation(
        &self,
        drv_hash: &str,
        output_name: &str,
    ) -> Result<Option<Realisation>> {
        if !self.has_ca_schema()? {
            return Ok(None);
        }

        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT r.id, r.drvPath, r.outputName, v.path, r.signatures
            FROM Realisations r
            JOIN ValidPaths v ON r.outputPath = v.id
            WHERE r.drvPath = ?1 AND r.outputName = ?2
            "#,
        )?;

        let realisation = stmt
            .query_row(params![drv_hash, output_name], |row| {
                Ok(Realisation {
                    id: row.get(0)?,
                    drv_hash: row.get(1)?,
                    output_name: row.get(2)?,
                    output_path: row.get(3)?,
                    signatures: row.get(4)?,
                })
            })
            .optional()?;
        Ok(realisation)
    }

    /// Realisations the given realisation depends on.
    pub fn query_realisation_references(&self, realisation_id: i64) -> Result<Vec<Realisation>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT r.id, r.drvPath, r.outputName, v.path, r.signatures
            FROM RealisationsRefs rr
            JOIN Realisations r ON rr.realisationReference = r.id
            JOIN ValidPaths v ON r.outputPath = v.id
            WHERE rr.referrer = ?1
            "#,
        )?;

        let mut deps = Vec::new();
        let mut rows = stmt.query(params![realisation_id])?;
        while let Some(row) = rows.next()? {
            deps.push(Realisation {
                id: row.get(0)?,
                drv_hash: row.get(1)?,
                output_name: row.get(2)?,
                output_path: row.get(3)?,
                signatures: row.get(4)?,
            });
        }
        Ok(deps)
    }

    /// Count the number of valid paths.
    pub fn count_valid_paths(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ValidPaths", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
