//! Loose object store
//!
//! Content-addressed storage for blobs, trees, and commits. Each object
//! lives in its compressed canonical form at
//! `objects/<2-hex-prefix>/<62-hex-suffix>`.
//!
//! ## Invariants
//!
//! - the digest of the canonical bytes equals the path-derived key
//! - identical content maps to the same file
//! - existing files are immutable; rewriting the same id is a no-op

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::codec;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, ObjectBox, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::{Error, Result};
use bytes::Bytes;
use derive_new::new;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Object database rooted at an `objects/` directory
#[derive(Debug, new)]
pub struct Database {
    path: Box<Path>,
}

impl Database {
    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self, id: ObjectId) -> bool {
        self.path.join(id.to_path()).is_file()
    }

    /// Read an object's compressed bytes
    pub fn read(&self, id: ObjectId) -> Result<Bytes> {
        let object_path = self.path.join(id.to_path());

        match std::fs::read(&object_path) {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object {id}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Write an object's compressed bytes under the given id
    ///
    /// Idempotent: an existing file is left untouched without comparing
    /// content. The bytes land in a temporary sibling first so readers
    /// never observe a partial object.
    pub fn write(&self, id: ObjectId, compressed: &[u8]) -> Result<()> {
        let object_path = self.path.join(id.to_path());
        if object_path.exists() {
            debug!(%id, "object already present, skipping write");
            return Ok(());
        }

        let object_dir = object_path
            .parent()
            .ok_or_else(|| Error::NotFound(format!("object directory for {id}")))?;
        std::fs::create_dir_all(object_dir)?;

        let temp_path = object_dir.join(Self::temp_name());
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(compressed)?;
        drop(file);

        std::fs::rename(&temp_path, &object_path)?;
        debug!(%id, bytes = compressed.len(), "stored object");

        Ok(())
    }

    /// Serialize, hash, and store a typed object, returning its id
    pub fn store_object(&self, object: &impl Object) -> Result<ObjectId> {
        let content = object.pack()?;
        let (id, compressed) = codec::serialize(object.object_type(), &content)?;
        self.write(id, &compressed)?;

        Ok(id)
    }

    /// Load and parse an object of unknown type
    pub fn load(&self, id: ObjectId) -> Result<ObjectBox> {
        let (object_type, content) = codec::deserialize(&self.read(id)?)?;

        Ok(match object_type {
            ObjectType::Blob => ObjectBox::Blob(Blob::unpack(&content)?),
            ObjectType::Tree => ObjectBox::Tree(Tree::unpack(&content)?),
            ObjectType::Commit => ObjectBox::Commit(Commit::unpack(&content)?),
        })
    }

    pub fn load_blob(&self, id: ObjectId) -> Result<Blob> {
        match self.load(id)? {
            ObjectBox::Blob(blob) => Ok(blob),
            other => Err(Error::MalformedObject(format!(
                "object {id} is a {}, expected a blob",
                other.object_type()
            ))),
        }
    }

    pub fn load_tree(&self, id: ObjectId) -> Result<Tree> {
        match self.load(id)? {
            ObjectBox::Tree(tree) => Ok(tree),
            other => Err(Error::MalformedObject(format!(
                "object {id} is a {}, expected a tree",
                other.object_type()
            ))),
        }
    }

    pub fn load_commit(&self, id: ObjectId) -> Result<Commit> {
        match self.load(id)? {
            ObjectBox::Commit(commit) => Ok(commit),
            other => Err(Error::MalformedObject(format!(
                "object {id} is a {}, expected a commit",
                other.object_type()
            ))),
        }
    }

    fn temp_name() -> String {
        format!("tmp-obj-{:08x}", rand::random::<u32>())
    }
}
