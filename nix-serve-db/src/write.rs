// SPDX-License-Identifier: MIT

//! Write operations, used to build fixture databases.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{OptionalExtension, params};

use crate::connection::StoreDb;
use crate::error::Result;

/// Parameters for registering a new valid path.
#[derive(Debug, Clone)]
pub struct RegisterPathParams {
    /// Full store path
    pub path: String,
    /// NAR hash, `sha256:<base16>`
    pub hash: String,
    pub registration_time: SystemTime,
    pub deriver: Option<String>,
    pub nar_size: Option<u64>,
    /// Space-separated signatures
    pub sigs: Option<String>,
    /// Full store paths this references; may include `path` itself
    pub references: BTreeSet<String>,
}

impl Default for RegisterPathParams {
    fn default() -> Self {
        Self {
            path: String::new(),
            hash: String::new(),
            registration_time: SystemTime::now(),
            deriver: None,
            nar_size: None,
            sigs: None,
            references: BTreeSet::new(),
        }
    }
}

impl StoreDb {
    /// Register a new valid path.
    ///
    /// References must already be registered; unknown ones are skipped.
    /// Returns the database ID of the new path.
    pub fn register_valid_path(&mut self, params: &RegisterPathParams) -> Result<i64> {
        let tx = self.conn.transaction()?;

        let registration_time = params
            .registration_time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        tx.execute(
            r#"
            INSERT INTO ValidPaths (path, hash, registrationTime, deriver, narSize, ultimate, sigs, ca)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, NULL)
            "#,
            params![
                params.path,
                params.hash,
                registration_time,
                params.deriver,
                params.nar_size.map(|n| n as i64),
                params.sigs,
            ],
        )?;
        let id = tx.last_insert_rowid();

        for reference in &params.references {
            let ref_id: Option<i64> = tx
                .query_row(
                    "SELECT id FROM ValidPaths WHERE path = ?1",
                    params![reference],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(ref_id) = ref_id {
                tx.execute(
                    "INSERT OR REPLACE INTO Refs (referrer, reference) VALUES (?1, ?2)",
                    params![id, ref_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    /// Register a realisation of a content-addressed derivation output.
    pub fn register_realisation(
        &self,
        drv_hash: &str,
        output_name: &str,
        output_path_id: i64,
        signatures: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO Realisations (drvPath, outputName, outputPath, signatures)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![drv_hash, output_name, output_path_id, signatures],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Record that realisation `referrer_id` depends on `reference_id`.
    pub fn add_realisation_reference(&self, referrer_id: i64, reference_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO RealisationsRefs (referrer, realisationReference) VALUES (?1, ?2)",
            params![referrer_id, reference_id],
        )?;
        Ok(())
    }
}
