//! Tree object
//!
//! Trees are directory snapshots: a sorted set of named entries, each
//! pairing an octal mode with the digest of a blob or subtree.
//!
//! ## Content form
//!
//! For each entry in ascending ordinal name order:
//! `<octal-mode> <name>\0<32-byte-digest>`

use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bytes::Bytes;
use derive_new::new;
use std::collections::BTreeMap;
use std::io::{BufRead, Cursor, Write};

/// One named child of a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct TreeEntry {
    pub mode: EntryMode,
    pub oid: ObjectId,
}

/// Directory snapshot object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    pub fn insert(&mut self, name: &str, mode: EntryMode, oid: ObjectId) {
        self.entries
            .insert(name.to_string(), TreeEntry::new(mode, oid));
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    /// Entries in ascending ordinal name order
    pub fn entries(&self) -> impl Iterator<Item = (&String, &TreeEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Packable for Tree {
    fn pack(&self) -> Result<Bytes> {
        let mut content = Vec::new();

        for (name, entry) in &self.entries {
            write!(content, "{} {}", entry.mode.as_str(), name)
                .map_err(|err| Error::MalformedObject(err.to_string()))?;
            content.push(0);
            entry.oid.write_raw_to(&mut content)?;
        }

        Ok(Bytes::from(content))
    }
}

impl Unpackable for Tree {
    fn unpack(content: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(content);
        let mut entries = BTreeMap::new();

        // scratch buffers reused across entries
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            let read = reader.read_until(b' ', &mut mode_bytes)?;
            if read == 0 {
                break; // clean end of entries
            }
            if mode_bytes.last() != Some(&b' ') {
                return Err(Error::MalformedObject(
                    "tree entry truncated inside mode".to_string(),
                ));
            }
            mode_bytes.pop();
            let mode_text = std::str::from_utf8(&mode_bytes)
                .map_err(|_| Error::MalformedObject("tree entry mode is not UTF-8".to_string()))?;
            let mode = EntryMode::try_from(mode_text)?;

            name_bytes.clear();
            let read = reader.read_until(b'\0', &mut name_bytes)?;
            if read == 0 || name_bytes.last() != Some(&b'\0') {
                return Err(Error::MalformedObject(
                    "tree entry truncated inside name".to_string(),
                ));
            }
            name_bytes.pop();
            let name = std::str::from_utf8(&name_bytes)
                .map_err(|_| Error::MalformedObject("tree entry name is not UTF-8".to_string()))?
                .to_owned();

            let oid = ObjectId::read_raw_from(&mut reader).map_err(|_| {
                Error::MalformedObject("tree entry truncated inside digest".to_string())
            })?;

            entries.insert(name, TreeEntry::new(mode, oid));
        }

        Ok(Tree { entries })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}
