//! Index entry representation
//!
//! Each row tracks one staged file: its repository-relative path (always
//! `/`-separated), the blob digest of its staged content, and the stat
//! fields used for cheap change detection.

use crate::artifacts::index::{ENTRY_BLOCK, ENTRY_MIN_SIZE, MAX_PATH_FLAG};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use byteorder::{ByteOrder, NetworkEndian, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use std::cmp::min;
use std::io::Write;

/// Width of the fixed-size prefix before the path
const FIXED_SIZE: usize = 50;

/// One staged file
///
/// The on-disk flags field is computed from the path on write and carries
/// no semantics on read, so it is not kept here.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexEntry {
    /// Repository-relative path with `/` separators
    pub path: String,
    /// Digest of the staged blob
    pub oid: ObjectId,
    /// Modification time, whole seconds
    pub mtime_s: u64,
    /// Modification time, nanosecond remainder
    pub mtime_ns: u32,
    /// File size in bytes
    pub size: u32,
}

impl IndexEntry {
    /// Serialize to the aligned on-disk form
    pub fn pack(&self) -> Result<Bytes> {
        let flags = min(self.path.len(), MAX_PATH_FLAG) as u16;

        let mut entry_bytes = Vec::with_capacity(FIXED_SIZE + self.path.len() + ENTRY_BLOCK);
        entry_bytes.write_u64::<NetworkEndian>(self.mtime_s)?;
        entry_bytes.write_u32::<NetworkEndian>(self.mtime_ns)?;
        entry_bytes.write_u32::<NetworkEndian>(self.size)?;
        self.oid.write_raw_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<NetworkEndian>(flags)?;
        entry_bytes.write_all(self.path.as_bytes())?;

        // NUL-terminate the path, then pad to the alignment block
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }

    /// Parse one aligned entry
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ENTRY_MIN_SIZE {
            return Err(Error::CorruptIndex(format!(
                "entry of {} bytes is below the minimum {ENTRY_MIN_SIZE}",
                bytes.len()
            )));
        }

        let mtime_s = NetworkEndian::read_u64(&bytes[0..8]);
        let mtime_ns = NetworkEndian::read_u32(&bytes[8..12]);
        let size = NetworkEndian::read_u32(&bytes[12..16]);
        let mut digest_cursor = std::io::Cursor::new(&bytes[16..48]);
        let oid = ObjectId::read_raw_from(&mut digest_cursor)
            .map_err(|_| Error::CorruptIndex("entry truncated inside digest".to_string()))?;
        let _flags = NetworkEndian::read_u16(&bytes[48..50]);

        let path_end = bytes[FIXED_SIZE..]
            .iter()
            .position(|byte| *byte == 0)
            .ok_or_else(|| Error::CorruptIndex("entry path missing NUL".to_string()))?;
        let path = std::str::from_utf8(&bytes[FIXED_SIZE..FIXED_SIZE + path_end])
            .map_err(|_| Error::CorruptIndex("entry path is not UTF-8".to_string()))?
            .to_string();

        Ok(IndexEntry {
            path,
            oid,
            mtime_s,
            mtime_ns,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::codec;
    use crate::artifacts::objects::object_type::ObjectType;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn oid() -> ObjectId {
        codec::compute_id(ObjectType::Blob, b"entry content")
    }

    #[rstest]
    fn pack_is_block_aligned(oid: ObjectId) {
        for path in ["a", "ab/cd.txt", "deeper/nested/path/file.rs"] {
            let entry = IndexEntry::new(path.to_string(), oid, 1_715_000_000, 0, 17);
            let bytes = entry.pack().unwrap();

            assert_eq!(bytes.len() % ENTRY_BLOCK, 0);
            assert_eq!(bytes.last(), Some(&0u8));
        }
    }

    #[rstest]
    fn pack_unpack_round_trips(oid: ObjectId) {
        let entry = IndexEntry::new("src/lib.rs".to_string(), oid, 1_715_000_000, 123, 4096);
        let decoded = IndexEntry::unpack(&entry.pack().unwrap()).unwrap();

        assert_eq!(decoded, entry);
    }

    #[rstest]
    fn unpack_rejects_short_input(oid: ObjectId) {
        let bytes = IndexEntry::new("a".to_string(), oid, 0, 0, 0).pack().unwrap();
        assert!(matches!(
            IndexEntry::unpack(&bytes[..40]),
            Err(Error::CorruptIndex(_))
        ));
    }

    proptest! {
        #[test]
        fn round_trip_arbitrary_entries(
            path in "[a-z][a-z0-9/._-]{0,80}",
            mtime_s in any::<u64>(),
            mtime_ns in any::<u32>(),
            size in any::<u32>(),
        ) {
            let oid = codec::compute_id(ObjectType::Blob, path.as_bytes());
            let entry = IndexEntry::new(path, oid, mtime_s, mtime_ns, size);
            let decoded = IndexEntry::unpack(&entry.pack().unwrap()).unwrap();

            prop_assert_eq!(decoded, entry);
        }
    }
}
