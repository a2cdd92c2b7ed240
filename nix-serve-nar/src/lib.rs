// SPDX-License-Identifier: MIT

//! NAR (Nix ARchive) serialization.
//!
//! A NAR is a deterministic serialization of a file system tree: no
//! timestamps, no ownership, entries sorted by name. This crate only
//! writes NARs; the binary cache never unpacks them.

pub mod archive;

pub use archive::{NarByteStream, dump};
