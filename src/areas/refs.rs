//! Reference store
//!
//! References are human-readable names pointing at commits, stored as text
//! files under the control directory:
//!
//! - `HEAD` holds either `ref: refs/heads/<branch>` (symbolic) or a bare
//!   hex digest (detached)
//! - branches live under `refs/heads/`, tags under `refs/tags/`, remote
//!   tracking refs under `refs/remotes/<remote>/`
//!
//! Every ref file ends with a newline; writes are full-file overwrites
//! under an exclusive advisory lock.

use crate::artifacts::objects::HEX_DIGEST_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use derive_new::new;
use file_guard::Lock;
use std::io::Write;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Pattern for the symbolic form of a ref file
const SYMREF_PATTERN: &str = r"^ref: (.+)$";

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

/// The two shapes HEAD can take
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// HEAD names another ref, normally a branch
    Symbolic(String),
    /// HEAD holds a commit digest directly
    Detached(ObjectId),
}

impl Head {
    /// Serialize to the on-disk text form, trailing newline included
    pub fn to_file_string(&self) -> String {
        match self {
            Head::Symbolic(refpath) => format!("ref: {refpath}\n"),
            Head::Detached(id) => format!("{}\n", id.to_hex()),
        }
    }

    pub fn parse(content: &str) -> Result<Head> {
        let content = content.trim();

        let symref = regex::Regex::new(SYMREF_PATTERN)
            .map_err(|err| Error::MalformedRef(err.to_string()))?;
        if let Some(captures) = symref.captures(content) {
            let target = captures[1].to_string();
            if !target.starts_with("refs/") {
                return Err(Error::MalformedRef(format!(
                    "symbolic target {target:?} is outside refs/"
                )));
            }
            return Ok(Head::Symbolic(target));
        }

        Ok(Head::Detached(ObjectId::try_parse(content)?))
    }
}

/// Reference manager rooted at a control directory
#[derive(Debug, new)]
pub struct RefStore {
    path: Box<Path>,
}

impl RefStore {
    pub fn head_path(&self) -> PathBuf {
        self.path.join(HEAD_REF_NAME)
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    pub fn heads_path(&self) -> PathBuf {
        self.refs_path().join("heads")
    }

    pub fn tags_path(&self) -> PathBuf {
        self.refs_path().join("tags")
    }

    /// Read HEAD in its symbolic-or-detached form
    pub fn read_head(&self) -> Result<Head> {
        let head_path = self.head_path();
        if !head_path.exists() {
            return Err(Error::NotFound("HEAD".to_string()));
        }

        Head::parse(&std::fs::read_to_string(head_path)?)
    }

    pub fn write_head(&self, head: &Head) -> Result<()> {
        self.write_ref_file(&self.head_path(), &head.to_file_string())
    }

    pub fn is_detached(&self) -> Result<bool> {
        Ok(matches!(self.read_head()?, Head::Detached(_)))
    }

    /// The short branch name HEAD points at, if symbolic onto a branch
    pub fn current_branch_name(&self) -> Result<Option<String>> {
        match self.read_head()? {
            Head::Symbolic(refpath) => Ok(refpath
                .strip_prefix("refs/heads/")
                .map(|name| name.to_string())),
            Head::Detached(_) => Ok(None),
        }
    }

    /// Resolve HEAD to a commit digest
    ///
    /// A symbolic HEAD whose target ref does not exist yet is unborn and
    /// resolves to `None`.
    pub fn resolve_head(&self) -> Result<Option<ObjectId>> {
        match self.read_head()? {
            Head::Symbolic(refpath) => self.read_ref(&refpath),
            Head::Detached(id) => Ok(Some(id)),
        }
    }

    /// Read a ref by its full path under the control directory
    ///
    /// Follows symbolic indirection; a missing file resolves to `None`.
    pub fn read_ref(&self, refpath: &str) -> Result<Option<ObjectId>> {
        let file_path = self.path.join(refpath);
        if !file_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&file_path)?;
        match Head::parse(&content) {
            Ok(Head::Symbolic(target)) => self.read_ref(&target),
            Ok(Head::Detached(id)) => Ok(Some(id)),
            Err(_) => Err(Error::MalformedRef(format!(
                "ref {refpath} holds neither a digest nor a symbolic target"
            ))),
        }
    }

    /// Overwrite a ref file with a digest
    pub fn write_ref(&self, refpath: &str, id: ObjectId) -> Result<()> {
        self.write_ref_file(&self.path.join(refpath), &format!("{}\n", id.to_hex()))
    }

    pub fn create_branch(&self, name: &str, id: ObjectId) -> Result<()> {
        let branch_path = self.heads_path().join(name);
        if branch_path.exists() {
            return Err(Error::AlreadyExists(format!("branch {name}")));
        }

        self.write_ref(&format!("refs/heads/{name}"), id)
    }

    pub fn delete_branch(&self, name: &str) -> Result<ObjectId> {
        let branch_path = self.heads_path().join(name);
        let id = self
            .read_ref(&format!("refs/heads/{name}"))?
            .ok_or_else(|| Error::NotFound(format!("branch {name}")))?;

        std::fs::remove_file(&branch_path)?;
        self.prune_empty_parents(&branch_path, &self.heads_path())?;
        debug!(branch = name, "deleted branch");

        Ok(id)
    }

    pub fn resolve_branch(&self, name: &str) -> Result<Option<ObjectId>> {
        self.read_ref(&format!("refs/heads/{name}"))
    }

    /// Branch names with `/` separators, ascending ordinal order
    pub fn list_branches(&self) -> Result<Vec<String>> {
        self.list_ref_names(&self.heads_path())
    }

    pub fn create_tag(&self, name: &str, id: ObjectId) -> Result<()> {
        let tag_path = self.tags_path().join(name);
        if tag_path.exists() {
            return Err(Error::AlreadyExists(format!("tag {name}")));
        }

        self.write_ref(&format!("refs/tags/{name}"), id)
    }

    pub fn delete_tag(&self, name: &str) -> Result<()> {
        let tag_path = self.tags_path().join(name);
        if !tag_path.exists() {
            return Err(Error::NotFound(format!("tag {name}")));
        }

        std::fs::remove_file(&tag_path)?;
        self.prune_empty_parents(&tag_path, &self.tags_path())
    }

    pub fn list_tags(&self) -> Result<Vec<String>> {
        self.list_ref_names(&self.tags_path())
    }

    /// Universal resolver
    ///
    /// Tries, in order: literal `HEAD` (case-insensitive), a full path
    /// under `refs/`, a short branch name, then a 64-char hex literal.
    /// The first hit wins; anything else resolves to `None`.
    pub fn resolve(&self, revision: &str) -> Result<Option<ObjectId>> {
        if revision.eq_ignore_ascii_case(HEAD_REF_NAME) {
            return self.resolve_head();
        }

        if revision.starts_with("refs/") {
            return self.read_ref(revision);
        }

        if let Some(id) = self.resolve_branch(revision)? {
            return Ok(Some(id));
        }

        if revision.len() == HEX_DIGEST_LENGTH
            && revision.chars().all(|c| c.is_ascii_hexdigit())
            && let Ok(id) = ObjectId::try_parse(revision)
        {
            return Ok(Some(id));
        }

        Ok(None)
    }

    fn list_ref_names(&self, base: &Path) -> Result<Vec<String>> {
        if !base.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(base).follow_links(false) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(base)
                .map_err(|_| Error::MalformedRef(format!("ref outside {base:?}")))?;
            let name = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            names.push(name);
        }

        names.sort();
        Ok(names)
    }

    fn write_ref_file(&self, file_path: &Path, content: &str) -> Result<()> {
        let parent = file_path
            .parent()
            .ok_or_else(|| Error::MalformedRef(format!("ref path {file_path:?} has no parent")))?;
        std::fs::create_dir_all(parent)?;

        let mut ref_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(file_path)?;
        let mut lock = file_guard::lock(&mut ref_file, Lock::Exclusive, 0, 1)?;
        lock.deref_mut().write_all(content.as_bytes())?;

        Ok(())
    }

    fn prune_empty_parents(&self, file_path: &Path, stop: &Path) -> Result<()> {
        if let Some(parent) = file_path.parent()
            && parent != stop
            && parent.starts_with(stop)
            && parent.read_dir()?.next().is_none()
        {
            std::fs::remove_dir(parent)?;
            self.prune_empty_parents(parent, stop)?;
        }

        Ok(())
    }
}
