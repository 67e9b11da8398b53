//! Canonical object framing and compression
//!
//! The storable form of every object is
//!
//! ```text
//! <type> <decimal-size>\0<content>
//! ```
//!
//! hashed with SHA-256 (that digest is the object's identity), then
//! compressed with raw DEFLATE (no zlib wrapper) for the loose store.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

/// Compute the identity of an object without compressing it
///
/// Pure: the same `(object_type, content)` always yields the same digest.
pub fn compute_id(object_type: ObjectType, content: &[u8]) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(header(object_type, content.len()));
    hasher.update(content);
    ObjectId::from_bytes(hasher.finalize().into())
}

/// Frame, hash, and compress an object for storage
pub fn serialize(object_type: ObjectType, content: &[u8]) -> Result<(ObjectId, Bytes)> {
    let mut canonical = Vec::with_capacity(content.len() + 16);
    canonical.extend_from_slice(header(object_type, content.len()).as_bytes());
    canonical.extend_from_slice(content);

    let id = ObjectId::from_bytes(Sha256::digest(&canonical).into());
    Ok((id, compress(&canonical)?))
}

/// Decompress and unframe a stored object
///
/// Fails with `MalformedObject` when the header is missing its NUL or
/// space, names an unknown type, carries a non-numeric size, or declares
/// more content than the payload holds. Decompression faults surface the
/// same way.
pub fn deserialize(compressed: &[u8]) -> Result<(ObjectType, Bytes)> {
    let canonical = decompress(compressed)?;

    let nul_position = canonical
        .iter()
        .position(|byte| *byte == 0)
        .ok_or_else(|| Error::MalformedObject("missing NUL header separator".to_string()))?;

    let object_header = std::str::from_utf8(&canonical[..nul_position])
        .map_err(|_| Error::MalformedObject("header is not UTF-8".to_string()))?;
    let (type_token, size_token) = object_header
        .split_once(' ')
        .ok_or_else(|| Error::MalformedObject("header lacks a space".to_string()))?;

    let object_type = ObjectType::try_from(type_token)?;
    let declared_size: usize = size_token
        .parse()
        .map_err(|_| Error::MalformedObject(format!("bad size token {size_token:?}")))?;

    let content = &canonical[nul_position + 1..];
    if declared_size > content.len() {
        return Err(Error::MalformedObject(format!(
            "declared size {declared_size} exceeds available {} bytes",
            content.len()
        )));
    }

    Ok((object_type, Bytes::copy_from_slice(&content[..declared_size])))
}

fn header(object_type: ObjectType, size: usize) -> String {
    format!("{} {}\0", object_type.as_str(), size)
}

fn compress(data: &[u8]) -> Result<Bytes> {
    let mut encoder =
        flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;

    Ok(encoder.finish()?.into())
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::DeflateDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|err| Error::MalformedObject(format!("decompression failed: {err}")))?;

    Ok(decompressed)
}
