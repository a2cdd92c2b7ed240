// SPDX-License-Identifier: MIT

//! Database connection management.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::{CA_SCHEMA_SQL, SCHEMA_SQL};

/// Default location of the system database.
pub const SYSTEM_DB_PATH: &str = "/nix/var/nix/db/db.sqlite";

/// Database open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only access to an existing database (the serving mode)
    ReadOnly,
    /// Create the database and its schema if missing (fixtures)
    Create,
}

/// SQLite database connection for Nix store metadata.
pub struct StoreDb {
    pub(crate) conn: Connection,
}

impl StoreDb {
    /// Open a database at `path`.
    ///
    /// Read-only connections see writes committed by the Nix daemon after
    /// they were opened.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        let flags = match mode {
            OpenMode::ReadOnly => {
                if !path.exists() {
                    return Err(Error::DatabaseNotFound(path.to_owned()));
                }
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
            }
            OpenMode::Create => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        };

        let conn = Connection::open_with_flags(path, flags).map_err(|e| Error::DatabaseOpen {
            path: path.to_owned(),
            source: e,
        })?;
        let db = Self { conn };

        if mode == OpenMode::Create {
            db.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            db.create_schema()?;
        }

        debug!("Opened database at {} ({:?})", path.display(), mode);
        Ok(db)
    }

    /// Create an in-memory database with the full schema (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        db.create_schema()?;
        Ok(db)
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        self.conn.execute_batch(CA_SCHEMA_SQL)?;
        Ok(())
    }

    /// Check if the database has CA-derivations tables.
    ///
    /// Stores that never enabled the `ca-derivations` feature lack them.
    pub fn has_ca_schema(&self) -> Result<bool> {
        let count: i32 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='Realisations'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
