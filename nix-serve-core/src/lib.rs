// SPDX-License-Identifier: MIT

//! Core types of the Nix binary cache protocol.
//!
//! This crate holds the pure values the protocol layer works with: store
//! paths and the store directory they live in, content hashes and their
//! encodings, resolved path metadata, narinfo signing and derivation output
//! realisations. Apart from reading a key file it performs no I/O.
//!
//! # Key Modules
//!
//! - `store_path` - Store directory and store path parsing/printing
//! - `hash` - Hash algorithms, parsing and nix-base32/base16 rendering
//! - `path_info` - Resolved metadata of a store path and its fingerprint
//! - `signing` - Ed25519 secret keys and detached signatures
//! - `realisation` - Derivation output ids and their realisations

pub mod base32;
pub mod hash;
pub mod path_info;
pub mod realisation;
pub mod signing;
pub mod store_path;

pub use hash::{Hash, HashAlgo, ParseHashError};
pub use path_info::PathInfo;
pub use realisation::{DrvOutput, DrvOutputError, Realisation};
pub use signing::{SigningError, SigningKey};
pub use store_path::{StoreDir, StorePath, StorePathError};
