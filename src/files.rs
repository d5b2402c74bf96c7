use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::Result;

/// Where received files end up.
pub trait Storage {
    fn exists(&self, filename: &str) -> bool;
    /// Persists `body` under `filename`, replacing any existing file.
    fn persist(&self, filename: &str, body: &[u8]) -> Result<PathBuf>;
}

/// Files written into one directory, each through a temporary sibling that is
/// renamed into place once fully written.
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> DirStorage {
        DirStorage { root: root.into() }
    }
}

impl Storage for DirStorage {
    fn exists(&self, filename: &str) -> bool {
        self.root.join(filename).is_file()
    }

    fn persist(&self, filename: &str, body: &[u8]) -> Result<PathBuf> {
        let target = self.root.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        debug!(path = %target.display(), bytes = body.len(), "file persisted");
        Ok(target)
    }
}

/// Name used when the user declines to overwrite: everything before the
/// first `.`, then `_copy.txt`.
pub fn copy_name(filename: &str) -> String {
    let stem = filename.split('.').next().unwrap_or(filename);
    format!("{}_copy.txt", stem)
}

pub fn digest_hex(body: &[u8]) -> String {
    format!("{:x}", Sha256::digest(body))
}

/// Served names are plain entries of one directory.
pub fn is_flat_name(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(&['/', '\\', '\0'][..])
}

/// Regular files directly under `root`, in directory order.
pub fn list_dir(root: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => debug!(name = ?raw, "skipping non utf-8 filename"),
        }
    }
    Ok(names)
}

/// Reads a served file, or `None` when no regular file by that name exists.
pub fn read_served(root: &Path, filename: &str) -> io::Result<Option<Vec<u8>>> {
    if !is_flat_name(filename) {
        return Ok(None);
    }
    let path = root.join(filename);
    if !path.is_file() {
        return Ok(None);
    }
    fs::read(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_name_drops_everything_after_first_dot() {
        assert_eq!(copy_name("report.txt"), "report_copy.txt");
        assert_eq!(copy_name("archive.tar.gz"), "archive_copy.txt");
        assert_eq!(copy_name("README"), "README_copy.txt");
    }

    #[test]
    fn digest_of_known_body() {
        assert_eq!(
            digest_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn flat_names_only() {
        assert!(is_flat_name("a.txt"));
        assert!(!is_flat_name("../a.txt"));
        assert!(!is_flat_name("dir/a.txt"));
        assert!(!is_flat_name(".."));
        assert!(!is_flat_name(""));
    }

    #[test]
    fn persist_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DirStorage::new(dir.path());
        assert!(!storage.exists("out.bin"));
        storage.persist("out.bin", b"first").unwrap();
        let path = storage.persist("out.bin", &[0, 159, 146, 150]).unwrap();
        assert_eq!(fs::read(path).unwrap(), vec![0, 159, 146, 150]);
        assert!(storage.exists("out.bin"));
    }

    #[test]
    fn listing_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        assert_eq!(list_dir(dir.path()).unwrap(), vec!["a.txt"]);
    }

    #[test]
    fn served_file_lookup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.txt"), "hello world").unwrap();
        assert_eq!(
            read_served(dir.path(), "report.txt").unwrap(),
            Some(b"hello world".to_vec())
        );
        assert_eq!(read_served(dir.path(), "missing.txt").unwrap(), None);
        assert_eq!(read_served(dir.path(), "../report.txt").unwrap(), None);
    }
}
