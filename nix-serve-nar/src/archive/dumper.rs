// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use walkdir::WalkDir;

use super::NAR_VERSION_MAGIC;

/// Token writer for the NAR wire format.
///
/// Every token is a little-endian u64 length, the bytes, and zero padding
/// up to the next multiple of 8.
struct NarWriter<'a, W> {
    out: &'a mut W,
}

impl<W: Write> NarWriter<'_, W> {
    fn write_len(&mut self, len: u64) -> io::Result<()> {
        self.out.write_all(&len.to_le_bytes())
    }

    fn write_padding(&mut self, len: u64) -> io::Result<()> {
        let rem = (len % 8) as usize;
        if rem > 0 {
            self.out.write_all(&[0u8; 8][rem..])?;
        }
        Ok(())
    }

    fn token(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_len(bytes.len() as u64)?;
        self.out.write_all(bytes)?;
        self.write_padding(bytes.len() as u64)
    }

    fn tokens(&mut self, tokens: &[&[u8]]) -> io::Result<()> {
        for token in tokens {
            self.token(token)?;
        }
        Ok(())
    }

    /// Copy exactly `size` bytes of `file` as a contents token.
    fn contents(&mut self, path: &Path, file: File, size: u64) -> io::Result<()> {
        self.write_len(size)?;
        let copied = io::copy(&mut file.take(size), &mut *self.out)?;
        if copied != size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "file '{}' shrank while being archived ({copied} of {size} bytes)",
                    path.display()
                ),
            ));
        }
        self.write_padding(size)
    }
}

/// Serialize the file system object at `root` as a NAR into `out`.
///
/// Symlinks are archived, never followed, including at the root. Only
/// regular files, directories and symlinks can be archived.
pub fn dump<W: Write>(root: &Path, out: &mut W) -> io::Result<()> {
    let mut nar = NarWriter { out };
    nar.tokens(&[NAR_VERSION_MAGIC])?;

    // Depths of the directories whose closing parens are still pending.
    let mut open_dirs: Vec<usize> = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .follow_root_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        let depth = entry.depth();

        while open_dirs.last().is_some_and(|&d| d >= depth) {
            close_directory(&mut nar, &mut open_dirs)?;
        }

        if depth > 0 {
            nar.tokens(&[b"entry", b"(", b"name", entry.file_name().as_bytes(), b"node"])?;
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            nar.tokens(&[b"(", b"type", b"directory"])?;
            open_dirs.push(depth);
            continue;
        }

        if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path())?;
            nar.tokens(&[b"(", b"type", b"symlink", b"target", target.as_os_str().as_bytes(), b")"])?;
        } else if file_type.is_file() {
            let metadata = entry.metadata()?;
            nar.tokens(&[b"(", b"type", b"regular"])?;
            if metadata.permissions().mode() & 0o100 != 0 {
                nar.tokens(&[b"executable", b""])?;
            }
            nar.token(b"contents")?;
            let file = File::open(entry.path())?;
            nar.contents(entry.path(), file, metadata.len())?;
            nar.token(b")")?;
        } else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file '{}' has an unsupported type", entry.path().display()),
            ));
        }

        if depth > 0 {
            nar.token(b")")?;
        }
    }

    while !open_dirs.is_empty() {
        close_directory(&mut nar, &mut open_dirs)?;
    }
    Ok(())
}

fn close_directory<W: Write>(nar: &mut NarWriter<'_, W>, open_dirs: &mut Vec<usize>) -> io::Result<()> {
    if let Some(depth) = open_dirs.pop() {
        nar.token(b")")?;
        if depth > 0 {
            // closes the enclosing entry
            nar.token(b")")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::os::unix::fs::symlink;

    use super::*;

    /// Build expected output from a token list.
    fn nar(tokens: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        NarWriter { out: &mut out }.tokens(tokens).unwrap();
        out
    }

    fn dump_to_vec(path: &Path) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        dump(path, &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_token_padding() {
        assert_eq!(nar(&[b""]), vec![0u8; 8]);
        let mut paren = 1u64.to_le_bytes().to_vec();
        paren.extend_from_slice(b"(\0\0\0\0\0\0\0");
        assert_eq!(nar(&[b"("]), paren);
        assert_eq!(nar(&[b"regular!"]).len(), 16);
        assert_eq!(nar(&[b"nix-archive-1"]).len(), 24);
    }

    #[test]
    fn test_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hello");
        fs::write(&file, "Hello, World!\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).unwrap();

        let expected = nar(&[
            b"nix-archive-1",
            b"(",
            b"type",
            b"regular",
            b"contents",
            b"Hello, World!\n",
            b")",
        ]);
        assert_eq!(dump_to_vec(&file).unwrap(), expected);
    }

    #[test]
    fn test_executable_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("run");
        fs::write(&file, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o555)).unwrap();

        let expected = nar(&[
            b"nix-archive-1",
            b"(",
            b"type",
            b"regular",
            b"executable",
            b"",
            b"contents",
            b"#!/bin/sh\n",
            b")",
        ]);
        assert_eq!(dump_to_vec(&file).unwrap(), expected);
    }

    #[test]
    fn test_root_symlink_is_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("target"), "x").unwrap();
        let link = dir.path().join("link");
        symlink("target", &link).unwrap();

        let expected = nar(&[
            b"nix-archive-1",
            b"(",
            b"type",
            b"symlink",
            b"target",
            b"target",
            b")",
        ]);
        assert_eq!(dump_to_vec(&link).unwrap(), expected);
    }

    #[test]
    fn test_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("b/inner")).unwrap();
        fs::create_dir(root.join("empty")).unwrap();
        fs::write(root.join("b/inner/file"), "abc").unwrap();
        fs::write(root.join("a"), "").unwrap();
        fs::write(root.join("c"), "12345678").unwrap();
        symlink("/nix/store/foo", root.join("b/link")).unwrap();
        for file in ["a", "c", "b/inner/file"] {
            fs::set_permissions(root.join(file), fs::Permissions::from_mode(0o444)).unwrap();
        }

        #[rustfmt::skip]
        let expected = nar(&[
            b"nix-archive-1",
            b"(", b"type", b"directory",
                b"entry", b"(", b"name", b"a", b"node",
                    b"(", b"type", b"regular", b"contents", b"", b")",
                b")",
                b"entry", b"(", b"name", b"b", b"node",
                    b"(", b"type", b"directory",
                        b"entry", b"(", b"name", b"inner", b"node",
                            b"(", b"type", b"directory",
                                b"entry", b"(", b"name", b"file", b"node",
                                    b"(", b"type", b"regular", b"contents", b"abc", b")",
                                b")",
                            b")",
                        b")",
                        b"entry", b"(", b"name", b"link", b"node",
                            b"(", b"type", b"symlink", b"target", b"/nix/store/foo", b")",
                        b")",
                    b")",
                b")",
                b"entry", b"(", b"name", b"c", b"node",
                    b"(", b"type", b"regular", b"contents", b"12345678", b")",
                b")",
                b"entry", b"(", b"name", b"empty", b"node",
                    b"(", b"type", b"directory", b")",
                b")",
            b")",
        ]);
        assert_eq!(dump_to_vec(&root).unwrap(), expected);
    }

    #[test]
    fn test_entries_sorted_bytewise() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        for name in ["b", "B", "a", "_"] {
            symlink("t", root.join(name)).unwrap();
        }

        let nar_bytes = dump_to_vec(&root).unwrap();
        let positions: Vec<usize> = ["B", "_", "a", "b"]
            .iter()
            .map(|name| {
                let token = nar(&[b"name", name.as_bytes()]);
                nar_bytes
                    .windows(token.len())
                    .position(|w| w == token.as_slice())
                    .unwrap()
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = dump_to_vec(&dir.path().join("gone")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_unsupported_file_type() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("sock");
        let _listener = std::os::unix::net::UnixListener::bind(&socket).unwrap();

        let err = dump_to_vec(&socket).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
