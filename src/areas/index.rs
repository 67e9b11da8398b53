//! Staging index
//!
//! Tracks the files that will form the next commit's tree. Entries are
//! kept sorted by path; persistence uses the checksummed binary format
//! described in [`crate::artifacts::index`].
//!
//! Saves go through a temporary sibling file followed by a rename, so a
//! concurrent reader never observes a torn checksum footer.

use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{ENTRY_BLOCK, ENTRY_MIN_SIZE, HEADER_SIZE};
use crate::errors::{Error, Result};
use std::collections::BTreeMap;
use std::ops::DerefMut;
use std::path::Path;
use tracing::debug;

/// The staging area
#[derive(Debug, Clone)]
pub struct Index {
    path: Box<Path>,
    entries: BTreeMap<String, IndexEntry>,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the index from disk
    ///
    /// A missing or empty file yields an empty index. Anything else must
    /// parse fully and match its checksum footer or the load fails with
    /// `CorruptIndex`.
    pub fn rehydrate(&mut self) -> Result<()> {
        self.entries.clear();

        if !self.path.exists() {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new().read(true).open(&self.path)?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;

        if lock.deref_mut().metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(lock.deref_mut());
        let header = IndexHeader::deserialize(&reader.read(HEADER_SIZE)?)?;

        for _ in 0..header.entry_count {
            let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?.to_vec();

            // entries are zero-padded to the block size, so a non-zero tail
            // means the path continues into the next block
            while entry_bytes.last() != Some(&0) {
                entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::unpack(&entry_bytes)?;
            self.entries.insert(entry.path.clone(), entry);
        }

        reader.verify()
    }

    /// Persist the index with a fresh checksum footer
    pub fn write_updates(&self) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::CorruptIndex("index path has no parent".to_string()))?;
        std::fs::create_dir_all(parent)?;

        let temp_path = parent.join(format!("index-{:08x}", rand::random::<u32>()));
        let temp_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        let mut writer = Checksum::new(temp_file);
        writer.write(&IndexHeader::new(self.entries.len() as u32).serialize()?)?;
        for entry in self.entries.values() {
            writer.write(&entry.pack()?)?;
        }
        writer.write_checksum()?;

        std::fs::rename(&temp_path, &self.path)?;
        debug!(entries = self.entries.len(), "wrote index");

        Ok(())
    }

    /// Insert or replace the entry for a path
    pub fn add(&mut self, entry: IndexEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    /// Drop the entry for a path, if present
    pub fn remove(&mut self, path: &str) {
        self.entries.remove(path);
    }

    pub fn entry_by_path(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Entries in ascending ordinal path order
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::CHECKSUM_SIZE;
    use crate::artifacts::objects::codec;
    use crate::artifacts::objects::object_type::ObjectType;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    fn entry(path: &str) -> IndexEntry {
        IndexEntry::new(
            path.to_string(),
            codec::compute_id(ObjectType::Blob, path.as_bytes()),
            1_715_000_000,
            0,
            path.len() as u32,
        )
    }

    #[fixture]
    fn index() -> (assert_fs::TempDir, Index) {
        let dir = assert_fs::TempDir::new().unwrap();
        let index = Index::new(dir.path().join("index").into_boxed_path());
        (dir, index)
    }

    #[rstest]
    fn missing_file_loads_empty(index: (assert_fs::TempDir, Index)) {
        let (_dir, mut index) = index;
        index.rehydrate().unwrap();
        assert!(index.is_empty());
    }

    #[rstest]
    fn save_load_round_trips(index: (assert_fs::TempDir, Index)) {
        let (_dir, mut index) = index;
        index.add(entry("src/lib.rs"));
        index.add(entry("a.txt"));
        index.add(entry("deeply/nested/dir/file.bin"));
        index.write_updates().unwrap();

        let mut reloaded = Index::new(index.path().to_path_buf().into_boxed_path());
        reloaded.rehydrate().unwrap();

        let original: Vec<_> = index.entries().cloned().collect();
        let loaded: Vec<_> = reloaded.entries().cloned().collect();
        assert_eq!(loaded, original);
    }

    #[rstest]
    fn entries_stay_sorted_and_unique(index: (assert_fs::TempDir, Index)) {
        let (_dir, mut index) = index;
        index.add(entry("b"));
        index.add(entry("a"));
        index.add(entry("b"));

        assert_eq!(index.len(), 2);
        assert_eq!(index.paths(), vec!["a".to_string(), "b".to_string()]);
    }

    #[rstest]
    fn add_replaces_existing_path(index: (assert_fs::TempDir, Index)) {
        let (_dir, mut index) = index;
        index.add(entry("file"));

        let replacement = IndexEntry::new(
            "file".to_string(),
            codec::compute_id(ObjectType::Blob, b"other content"),
            1,
            0,
            13,
        );
        index.add(replacement.clone());

        assert_eq!(index.entry_by_path("file"), Some(&replacement));
    }

    #[rstest]
    fn flipped_payload_byte_is_detected(index: (assert_fs::TempDir, Index)) {
        let (_dir, mut index) = index;
        index.add(entry("corruptible.txt"));
        index.write_updates().unwrap();

        let mut bytes = std::fs::read(index.path()).unwrap();
        let flip_at = bytes.len() - CHECKSUM_SIZE - 4;
        bytes[flip_at] ^= 0x01;
        std::fs::write(index.path(), &bytes).unwrap();

        assert!(matches!(
            index.rehydrate(),
            Err(Error::CorruptIndex(_))
        ));
    }

    #[rstest]
    fn truncated_footer_is_detected(index: (assert_fs::TempDir, Index)) {
        let (_dir, mut index) = index;
        index.add(entry("short.txt"));
        index.write_updates().unwrap();

        let bytes = std::fs::read(index.path()).unwrap();
        std::fs::write(index.path(), &bytes[..bytes.len() - 3]).unwrap();

        assert!(matches!(
            index.rehydrate(),
            Err(Error::CorruptIndex(_))
        ));
    }
}
