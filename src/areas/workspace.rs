//! Working tree access
//!
//! Enumerates, reads, and writes files in the working directory. All paths
//! crossing this boundary are repository-relative with `/` separators;
//! OS-native separators never leak out.

use crate::errors::{Error, Result};
use crate::oracles::IgnoreOracle;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Stat fields the index cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub mtime_s: u64,
    pub mtime_ns: u32,
    pub size: u32,
}

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Enumerate tracked-candidate files as sorted relative paths
    ///
    /// Descends in deterministic order, asks the oracle per entry, and
    /// prunes whole subtrees when a directory is ignored. Symbolic links
    /// are not followed; the control directory is always skipped.
    pub fn list_files(&self, ignore: &dyn IgnoreOracle) -> Result<Vec<String>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.keep_entry(entry, ignore));

        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(self.relative_name(entry.path())?);
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn file_exists(&self, relative_path: &str) -> bool {
        self.absolute(relative_path).is_file()
    }

    pub fn read_file(&self, relative_path: &str) -> Result<Bytes> {
        let file_path = self.absolute(relative_path);

        match std::fs::read(&file_path) {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("working tree file {relative_path}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn stat_file(&self, relative_path: &str) -> Result<FileStat> {
        let metadata = std::fs::metadata(self.absolute(relative_path))?;
        let modified = metadata.modified()?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).unwrap_or_default();

        Ok(FileStat {
            mtime_s: since_epoch.as_secs(),
            mtime_ns: since_epoch.subsec_nanos(),
            size: metadata.len() as u32,
        })
    }

    /// Write a file, creating parent directories as needed
    pub fn write_file(&self, relative_path: &str, data: &[u8]) -> Result<()> {
        let file_path = self.absolute(relative_path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&file_path, data)?;
        Ok(())
    }

    /// Delete a file and any parent directories the deletion left empty
    ///
    /// Missing files are fine; checkout and reset call this for every path
    /// the index used to name.
    pub fn remove_file(&self, relative_path: &str) -> Result<()> {
        let file_path = self.absolute(relative_path);

        match std::fs::remove_file(&file_path) {
            Ok(()) => self.prune_empty_parents(&file_path),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn prune_empty_parents(&self, file_path: &Path) -> Result<()> {
        if let Some(parent) = file_path.parent()
            && parent != self.path.as_ref()
            && parent.starts_with(&self.path)
            && parent.read_dir()?.next().is_none()
        {
            std::fs::remove_dir(parent)?;
            self.prune_empty_parents(parent)?;
        }

        Ok(())
    }

    fn keep_entry(&self, entry: &walkdir::DirEntry, ignore: &dyn IgnoreOracle) -> bool {
        if entry.path() == self.path.as_ref() {
            return true;
        }

        let Ok(relative) = self.relative_name(entry.path()) else {
            return false;
        };

        // the control directory never belongs to the working tree
        if relative == crate::CONTROL_DIR
            || relative.starts_with(&format!("{}/", crate::CONTROL_DIR))
        {
            return false;
        }

        !ignore.is_ignored(&relative, entry.file_type().is_dir())
    }

    fn relative_name(&self, absolute: &Path) -> Result<String> {
        let relative = absolute.strip_prefix(&self.path).map_err(|_| {
            Error::NotFound(format!("path {} outside working tree", absolute.display()))
        })?;

        Ok(normalize_separators(relative))
    }

    fn absolute(&self, relative_path: &str) -> PathBuf {
        self.path.join(relative_path)
    }
}

/// Join path components with `/` regardless of the OS separator
pub fn normalize_separators(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
