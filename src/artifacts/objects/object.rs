//! Core object traits
//!
//! Every object type serializes to a type-specific content form; the codec
//! wraps that content in the canonical `"<type> <size>\0"` header, hashes
//! it, and compresses it for storage. See [`crate::artifacts::objects::codec`].

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::codec;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::Result;
use bytes::Bytes;

/// Serialization to an object's canonical content bytes
pub trait Packable {
    /// Produce the type-specific content (header excluded)
    fn pack(&self) -> Result<Bytes>;
}

/// Deserialization from an object's canonical content bytes
pub trait Unpackable {
    /// Parse the type-specific content (header already stripped)
    fn unpack(content: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

/// Common object operations
pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    /// Compute the content digest over the canonical header plus content
    fn object_id(&self) -> Result<ObjectId> {
        Ok(codec::compute_id(self.object_type(), &self.pack()?))
    }
}

/// Type-erased object container
///
/// Returned when the concrete type is only known after reading the header.
#[derive(Debug, Clone)]
pub enum ObjectBox {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
}

impl ObjectBox {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
        }
    }
}
