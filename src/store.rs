//! File storage backend.
//!
//! [`FileStore`] is the capability the dispatcher runs commands against;
//! [`DiskStore`] is the production implementation over one flat directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Storage operations a dispatcher needs.
pub trait FileStore: Send + Sync {
    /// Names of stored files, sorted. Subdirectories are not listed.
    fn list(&self) -> io::Result<Vec<String>>;

    /// Full contents of one file.
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Create or overwrite one file.
    fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Whether `name` is a plain file name that stays inside a store root.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Flat-directory store. Every operation resolves strictly inside the root;
/// names that would escape it are rejected before touching the filesystem.
#[derive(Debug)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<DiskStore> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(DiskStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        if !valid_name(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file name: {:?}", name),
            ));
        }
        Ok(self.root.join(name))
    }
}

impl FileStore for DiskStore {
    fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(name)?)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        fs::write(self.resolve(name)?, bytes)
    }
}
