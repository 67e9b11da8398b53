//! Object identifier (SHA-256 digest)
//!
//! Object ids are 32-byte SHA-256 digests rendered as 64 lowercase hex
//! characters. They uniquely identify all objects in the store (blobs,
//! trees, commits).
//!
//! ## Storage
//!
//! Objects are stored at `objects/<first-2-hex>/<remaining-62-hex>`.

use crate::artifacts::objects::{DIGEST_SIZE, HEX_DIGEST_LENGTH};
use crate::errors::{Error, Result};
use std::io::{Read, Write};
use std::path::PathBuf;

/// Content digest identifying an object
///
/// A 32-byte SHA-256 value. Equality is byte equality; the zero digest is
/// representable but never names a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId([u8; DIGEST_SIZE]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        ObjectId(bytes)
    }

    /// Parse and validate an id from its 64-char lowercase hex form
    pub fn try_parse(hex_digest: &str) -> Result<Self> {
        if hex_digest.len() != HEX_DIGEST_LENGTH {
            return Err(Error::MalformedRef(format!(
                "digest has length {}, expected {}",
                hex_digest.len(),
                HEX_DIGEST_LENGTH
            )));
        }

        let bytes = hex::decode(hex_digest)
            .map_err(|_| Error::MalformedRef(format!("digest is not hex: {hex_digest}")))?;
        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&bytes);

        Ok(ObjectId(digest))
    }

    /// The distinguished all-zero digest
    pub fn zero() -> Self {
        ObjectId([0u8; DIGEST_SIZE])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Write the raw 32-byte form
    ///
    /// Used when serializing tree entries and index entries.
    pub fn write_raw_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }

    /// Read the raw 32-byte form
    pub fn read_raw_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut digest = [0u8; DIGEST_SIZE];
        reader.read_exact(&mut digest)?;
        Ok(ObjectId(digest))
    }

    /// Split the hex form for the on-disk layout: 2-char directory prefix,
    /// 62-char file suffix
    pub fn split_hex(&self) -> (String, String) {
        let hex_digest = self.to_hex();
        let (prefix, suffix) = hex_digest.split_at(2);
        (prefix.to_string(), suffix.to_string())
    }

    /// Convert to the relative storage path `xx/yyyy...`
    pub fn to_path(&self) -> PathBuf {
        let (prefix, suffix) = self.split_hex();
        PathBuf::from(prefix).join(suffix)
    }

    /// Abbreviated form for display
    pub fn to_short(&self) -> String {
        self.to_hex().split_at(7).0.to_string()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
