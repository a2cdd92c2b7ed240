// SPDX-License-Identifier: MIT

//! SQLite access to Nix store metadata.
//!
//! The binary cache only ever reads the store database: it resolves hash
//! parts to store paths, loads path metadata with references, and looks up
//! realisations of content-addressed derivation outputs. The write helpers
//! exist to build fixture databases.
//!
//! # Example
//!
//! ```ignore
//! use nix_serve_db::{OpenMode, StoreDb};
//!
//! let db = StoreDb::open("/nix/var/nix/db/db.sqlite", OpenMode::ReadOnly)?;
//! if let Some(path) = db.query_path_from_hash_part("/nix/store", "26xbg1ndr7hbcncrlf9nhx5is2b25d13")? {
//!     let info = db.query_path_info(&path)?;
//! }
//! ```

mod connection;
mod error;
mod query;
mod schema;
mod types;
mod write;

pub use connection::{OpenMode, SYSTEM_DB_PATH, StoreDb};
pub use error::{Error, Result};
pub use types::*;
pub use write::*;
