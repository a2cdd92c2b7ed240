// SPDX-License-Identifier: MIT

mod byte_stream;
mod dumper;

pub use byte_stream::NarByteStream;
pub use dumper::dump;

/// Magic string at the start of every NAR.
pub const NAR_VERSION_MAGIC: &[u8] = b"nix-archive-1";
