//! Flat namespace of persisted file contents
//!
//! Names map 1:1 to stored objects. [`HostNamespace`] keeps each entry as a
//! host file directly under a root directory. The namespace is flat: a name
//! never contains a path separator and is never `.` or `..`, so two distinct
//! names never resolve to the same host file.

use crate::core::error::{Result, StoreError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Storage medium for file contents
pub trait Namespace {
    /// Host path backing `name`
    fn locate(&self, name: &str) -> PathBuf;

    fn exists(&self, name: &str) -> Result<bool>;

    /// Create `name` empty, truncating any existing content
    fn create(&mut self, name: &str) -> Result<()>;

    /// Entire content of `name`
    fn read_all(&self, name: &str) -> Result<Vec<u8>>;

    /// Write all of `data` into existing entry `name` at `offset`
    ///
    /// A failure may leave part of `data` written and the entry extended.
    /// Callers that need the previous content back must restore it with
    /// [`truncate`](Namespace::truncate) and a rewrite.
    fn write_at(&mut self, name: &str, offset: u64, data: &[u8]) -> Result<()>;

    /// Cut or extend existing entry `name` to exactly `len` bytes
    fn truncate(&mut self, name: &str, len: u64) -> Result<()>;

    fn remove(&mut self, name: &str) -> Result<()>;

    fn rename(&mut self, old: &str, new: &str) -> Result<()>;

    /// Stream `src` into a new or truncated `dst`, returning bytes copied
    fn copy(&mut self, src: &str, dst: &str) -> Result<u64>;
}

/// Check that `name` is a single flat entry name
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidArgument("name cannot be empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(StoreError::InvalidArgument(format!(
            "'{}' is not a file name",
            name
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidArgument(format!(
            "name '{}' contains a path separator",
            name.escape_default()
        )));
    }
    Ok(())
}

/// Namespace rooted at a host directory
#[derive(Debug, Clone)]
pub struct HostNamespace {
    root: PathBuf,
}

impl HostNamespace {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        HostNamespace {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Namespace for HostNamespace {
    fn locate(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.locate(name).try_exists()?)
    }

    fn create(&mut self, name: &str) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.locate(name))?;
        Ok(())
    }

    fn read_all(&self, name: &str) -> Result<Vec<u8>> {
        let mut file = File::open(self.locate(name))?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        Ok(content)
    }

    fn write_at(&mut self, name: &str, offset: u64, data: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new().write(true).open(self.locate(name))?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    fn truncate(&mut self, name: &str, len: u64) -> Result<()> {
        let file = OpenOptions::new().write(true).open(self.locate(name))?;
        file.set_len(len)?;
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        std::fs::remove_file(self.locate(name))?;
        Ok(())
    }

    fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        std::fs::rename(self.locate(old), self.locate(new))?;
        Ok(())
    }

    fn copy(&mut self, src: &str, dst: &str) -> Result<u64> {
        let mut source = File::open(self.locate(src))?;
        let mut dest = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.locate(dst))?;

        let copied = std::io::copy(&mut source, &mut dest)?;
        dest.flush()?;
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StoreError;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_read() {
        let temp = TempDir::new().unwrap();
        let mut ns = HostNamespace::new(temp.path());

        assert!(!ns.exists("a.txt").unwrap());
        ns.create("a.txt").unwrap();
        assert!(ns.exists("a.txt").unwrap());
        assert!(ns.read_all("a.txt").unwrap().is_empty());
    }

    #[test]
    fn test_create_truncates() {
        let temp = TempDir::new().unwrap();
        let mut ns = HostNamespace::new(temp.path());
        std::fs::write(temp.path().join("a.txt"), b"old").unwrap();

        ns.create("a.txt").unwrap();
        assert!(ns.read_all("a.txt").unwrap().is_empty());
    }

    #[test]
    fn test_write_at_overwrites_and_extends() {
        let temp = TempDir::new().unwrap();
        let mut ns = HostNamespace::new(temp.path());
        ns.create("a.txt").unwrap();

        ns.write_at("a.txt", 0, b"hello").unwrap();
        ns.write_at("a.txt", 3, b"p!!").unwrap();
        assert_eq!(ns.read_all("a.txt").unwrap(), b"help!!");
    }

    #[test]
    fn test_write_at_missing_entry_fails() {
        let temp = TempDir::new().unwrap();
        let mut ns = HostNamespace::new(temp.path());
        assert!(matches!(
            ns.write_at("nope", 0, b"x"),
            Err(StoreError::Io(_))
        ));
    }

    #[test]
    fn test_truncate_cuts_and_extends() {
        let temp = TempDir::new().unwrap();
        let mut ns = HostNamespace::new(temp.path());
        std::fs::write(temp.path().join("a"), b"hello world").unwrap();

        ns.truncate("a", 5).unwrap();
        assert_eq!(ns.read_all("a").unwrap(), b"hello");
        ns.truncate("a", 7).unwrap();
        assert_eq!(ns.read_all("a").unwrap(), b"hello\0\0");
        assert!(ns.truncate("missing", 0).is_err());
    }

    #[test]
    fn test_validate_name_rejects_paths() {
        for bad in ["", ".", "..", "./a", "sub/../a", "a/b", "a\\b", "a\0b", "/abs"] {
            assert!(
                matches!(validate_name(bad), Err(StoreError::InvalidArgument(_))),
                "{:?} should be rejected",
                bad
            );
        }
        for good in ["a.txt", "..hidden", "name with spaces", "partition.img"] {
            validate_name(good).unwrap();
        }
    }

    #[test]
    fn test_copy_streams_content() {
        let temp = TempDir::new().unwrap();
        let mut ns = HostNamespace::new(temp.path());
        let data = vec![0xAB; 100_000];
        std::fs::write(temp.path().join("src.bin"), &data).unwrap();

        assert_eq!(ns.copy("src.bin", "dst.bin").unwrap(), 100_000);
        assert_eq!(ns.read_all("dst.bin").unwrap(), data);
        assert_eq!(ns.read_all("src.bin").unwrap(), data);
    }

    #[test]
    fn test_copy_missing_source_leaves_no_destination() {
        let temp = TempDir::new().unwrap();
        let mut ns = HostNamespace::new(temp.path());

        assert!(ns.copy("missing", "dst").is_err());
        assert!(!ns.exists("dst").unwrap());
    }

    #[test]
    fn test_rename_and_remove() {
        let temp = TempDir::new().unwrap();
        let mut ns = HostNamespace::new(temp.path());
        ns.create("a").unwrap();

        ns.rename("a", "b").unwrap();
        assert!(!ns.exists("a").unwrap());
        assert!(ns.exists("b").unwrap());

        ns.remove("b").unwrap();
        assert!(!ns.exists("b").unwrap());
        assert!(ns.remove("b").is_err());
    }
}
