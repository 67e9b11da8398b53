//! Reachability walker
//!
//! Computes the closure of objects reachable from a commit: the commit
//! itself, its tree, every subtree and blob, and everything reachable from
//! its parents. Push and pull both feed pack sets from this walk.

use crate::artifacts::objects::DIGEST_SIZE;
use crate::artifacts::objects::codec;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::areas::database::Database;
use crate::errors::Result;
use std::collections::BTreeSet;
use tracing::warn;

/// Collect `id` and everything reachable from it into `set`
///
/// An object missing from the local store quietly ends that branch of the
/// walk; partial local history is expected during first pushes and
/// shallow-ish clones.
pub fn collect(database: &Database, id: ObjectId, set: &mut BTreeSet<ObjectId>) -> Result<()> {
    if set.contains(&id) {
        return Ok(());
    }
    if !database.exists(id) {
        warn!(%id, "reachability walk stopped at missing object");
        return Ok(());
    }

    set.insert(id);
    let (object_type, content) = codec::deserialize(&database.read(id)?)?;

    match object_type {
        ObjectType::Blob => {}
        ObjectType::Commit => collect_commit_edges(database, &content, set)?,
        ObjectType::Tree => collect_tree_edges(database, &content, set)?,
    }

    Ok(())
}

fn collect_commit_edges(
    database: &Database,
    content: &[u8],
    set: &mut BTreeSet<ObjectId>,
) -> Result<()> {
    let text = String::from_utf8_lossy(content);

    for line in text.lines() {
        if line.is_empty() {
            break; // headers end at the blank line before the message
        }

        let referenced = line
            .strip_prefix("tree ")
            .or_else(|| line.strip_prefix("parent "));
        if let Some(hex_digest) = referenced
            && let Ok(child) = ObjectId::try_parse(hex_digest)
        {
            collect(database, child, set)?;
        }
    }

    Ok(())
}

fn collect_tree_edges(
    database: &Database,
    content: &[u8],
    set: &mut BTreeSet<ObjectId>,
) -> Result<()> {
    let mut offset = 0;

    while let Some(nul_position) = content[offset..].iter().position(|byte| *byte == 0) {
        let digest_start = offset + nul_position + 1;
        let digest_end = digest_start + DIGEST_SIZE;
        if digest_end > content.len() {
            break;
        }

        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&content[digest_start..digest_end]);
        collect(database, ObjectId::from_bytes(digest), set)?;

        offset = digest_end;
    }

    Ok(())
}
