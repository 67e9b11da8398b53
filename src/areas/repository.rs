//! Repository facade
//!
//! Coordinates the object database, staging index, ref store, and working
//! tree into the user-facing operations: stage, commit, status, log, diff,
//! branch, tag, checkout, and reset.
//!
//! A repository is a working directory plus a `.magicrepos` control
//! directory. Operations are single-threaded; callers serialize access per
//! repository.

use crate::artifacts::diff::{FileDiff, diff_texts};
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::codec;
use crate::artifacts::objects::commit::{Commit, Signature};
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::artifacts::status::{ChangeKind, StatusReport};
use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::{Head, RefStore};
use crate::areas::workspace::Workspace;
use crate::errors::{Error, Result};
use crate::oracles::{ControlDirIgnore, IdentitySource, IgnoreOracle, StaticIdentity};
use crate::{CONTROL_DIR, DEFAULT_BRANCH};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const OBJECTS_DIR: &str = "objects";
const INDEX_FILE: &str = "index";
const CONFIG_FILE: &str = "config";

/// How far a reset reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Move HEAD only
    Soft,
    /// Move HEAD and rebuild the index
    Mixed,
    /// Move HEAD, rebuild the index, and rewrite the working tree
    Hard,
}

/// One commit as reported by `log`
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: ObjectId,
    pub commit: Commit,
}

/// A working copy with its control directory
pub struct Repository {
    workdir: Box<Path>,
    control: Box<Path>,
    database: Database,
    refs: RefStore,
    workspace: Workspace,
    ignore: Box<dyn IgnoreOracle>,
    identity: Box<dyn IdentitySource>,
}

impl Repository {
    /// Create a fresh repository at `workdir`
    ///
    /// Fails with `AlreadyExists` when a control directory is already
    /// present.
    pub fn init(workdir: impl AsRef<Path>) -> Result<Self> {
        Self::init_with(
            workdir,
            Box::new(ControlDirIgnore),
            Box::new(StaticIdentity::default()),
        )
    }

    pub fn init_with(
        workdir: impl AsRef<Path>,
        ignore: Box<dyn IgnoreOracle>,
        identity: Box<dyn IdentitySource>,
    ) -> Result<Self> {
        let workdir = workdir.as_ref();
        std::fs::create_dir_all(workdir)?;
        let workdir = workdir.canonicalize()?;
        let control = workdir.join(CONTROL_DIR);

        if control.exists() {
            return Err(Error::AlreadyExists(format!(
                "repository at {}",
                workdir.display()
            )));
        }

        std::fs::create_dir_all(control.join(OBJECTS_DIR))?;
        std::fs::create_dir_all(control.join("refs").join("heads"))?;
        std::fs::create_dir_all(control.join("refs").join("tags"))?;
        std::fs::create_dir_all(control.join("refs").join("remotes"))?;
        std::fs::write(control.join(CONFIG_FILE), "")?;

        let refs = RefStore::new(control.clone().into_boxed_path());
        refs.write_head(&Head::Symbolic(format!("refs/heads/{DEFAULT_BRANCH}")))?;

        info!(workdir = %workdir.display(), "initialized repository");
        Self::assemble(workdir, ignore, identity)
    }

    /// Open the repository containing `start`
    ///
    /// Walks parent directories until a control directory appears; fails
    /// with `NotARepository` at the filesystem root.
    pub fn open(start: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(
            start,
            Box::new(ControlDirIgnore),
            Box::new(StaticIdentity::default()),
        )
    }

    pub fn open_with(
        start: impl AsRef<Path>,
        ignore: Box<dyn IgnoreOracle>,
        identity: Box<dyn IdentitySource>,
    ) -> Result<Self> {
        let start = start.as_ref().canonicalize()?;

        let mut candidate: &Path = &start;
        loop {
            if candidate.join(CONTROL_DIR).is_dir() {
                return Self::assemble(candidate.to_path_buf(), ignore, identity);
            }

            candidate = match candidate.parent() {
                Some(parent) => parent,
                None => return Err(Error::NotARepository(start.display().to_string())),
            };
        }
    }

    fn assemble(
        workdir: PathBuf,
        ignore: Box<dyn IgnoreOracle>,
        identity: Box<dyn IdentitySource>,
    ) -> Result<Self> {
        let control = workdir.join(CONTROL_DIR);

        Ok(Repository {
            database: Database::new(control.join(OBJECTS_DIR).into_boxed_path()),
            refs: RefStore::new(control.clone().into_boxed_path()),
            workspace: Workspace::new(workdir.clone().into_boxed_path()),
            control: control.into_boxed_path(),
            workdir: workdir.into_boxed_path(),
            ignore,
            identity,
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn control_path(&self) -> &Path {
        &self.control
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn index_path(&self) -> PathBuf {
        self.control.join(INDEX_FILE)
    }

    fn load_index(&self) -> Result<Index> {
        let mut index = Index::new(self.index_path().into_boxed_path());
        index.rehydrate()?;
        Ok(index)
    }

    // ------------------------------------------------------------------
    // staging

    /// Stage one path
    ///
    /// A missing working-tree file unstages the path instead; staging an
    /// absent, unstaged path is a quiet no-op.
    pub fn stage(&self, path: &str) -> Result<()> {
        let path = path.replace('\\', "/");
        let mut index = self.load_index()?;

        if self.workspace.file_exists(&path) {
            let entry = self.stage_blob(&path)?;
            index.add(entry);
        } else {
            index.remove(&path);
        }

        index.write_updates()
    }

    /// Stage every present file and drop entries for vanished paths
    pub fn stage_all(&self) -> Result<()> {
        let mut index = self.load_index()?;
        let files = self.workspace.list_files(self.ignore.as_ref())?;
        let present: BTreeSet<&String> = files.iter().collect();

        for stale in index
            .paths()
            .into_iter()
            .filter(|path| !present.contains(path))
        {
            index.remove(&stale);
        }

        for path in &files {
            index.add(self.stage_blob(path)?);
        }

        index.write_updates()
    }

    fn stage_blob(&self, path: &str) -> Result<IndexEntry> {
        let content = self.workspace.read_file(path)?;
        let blob = Blob::from_bytes(content);
        let oid = self.database.store_object(&blob)?;
        let stat = self.workspace.stat_file(path)?;

        // seconds-only mtime: round-trip equality must not depend on
        // sub-second resolution
        Ok(IndexEntry::new(
            path.to_string(),
            oid,
            stat.mtime_s,
            0,
            stat.size,
        ))
    }

    // ------------------------------------------------------------------
    // committing

    /// Commit the staged tree
    ///
    /// With no explicit author, one is formed from the identity source
    /// with "Unknown" / "unknown@unknown" fallbacks and the current local
    /// time. The author doubles as committer.
    pub fn commit(&self, message: &str, author: Option<Signature>) -> Result<ObjectId> {
        let index = self.load_index()?;
        if index.is_empty() {
            return Err(Error::EmptyCommit);
        }

        let tree_id = self.write_tree(&index)?;
        let parents: Vec<ObjectId> = self.refs.resolve_head()?.into_iter().collect();

        let author = author.unwrap_or_else(|| {
            Signature::new(
                self.identity
                    .user_name()
                    .unwrap_or_else(|| "Unknown".to_string()),
                self.identity
                    .user_email()
                    .unwrap_or_else(|| "unknown@unknown".to_string()),
            )
        });

        let commit = Commit::new(tree_id, parents, author, message.to_string());
        let commit_id = self.database.store_object(&commit)?;

        match self.refs.read_head()? {
            Head::Symbolic(refpath) => self.refs.write_ref(&refpath, commit_id)?,
            Head::Detached(_) => self.refs.write_head(&Head::Detached(commit_id))?,
        }

        info!(id = %commit_id.to_short(), "created commit");
        Ok(commit_id)
    }

    /// Build tree objects from the index, bottom-up, returning the root id
    pub fn write_tree(&self, index: &Index) -> Result<ObjectId> {
        let entries: Vec<&IndexEntry> = index.entries().collect();
        self.build_tree(&entries, "")
    }

    fn build_tree(&self, entries: &[&IndexEntry], prefix: &str) -> Result<ObjectId> {
        let mut tree = Tree::default();
        let mut subdirs: BTreeMap<&str, Vec<&IndexEntry>> = BTreeMap::new();

        for &entry in entries {
            let relative = &entry.path[prefix.len()..];
            match relative.split_once('/') {
                None => tree.insert(relative, EntryMode::Regular, entry.oid),
                Some((directory, _)) => subdirs.entry(directory).or_default().push(entry),
            }
        }

        for (directory, children) in subdirs {
            let child_id = self.build_tree(&children, &format!("{prefix}{directory}/"))?;
            tree.insert(directory, EntryMode::Directory, child_id);
        }

        self.database.store_object(&tree)
    }

    /// Flatten a tree into `(path, blob_id)` leaves, depth-first
    ///
    /// Non-directory entries are emitted whatever their mode; executables
    /// and symlinks come back as plain leaves.
    pub fn read_tree_recursive(
        &self,
        tree_id: ObjectId,
        prefix: &str,
    ) -> Result<Vec<(String, ObjectId)>> {
        let tree = self.database.load_tree(tree_id)?;
        let mut leaves = Vec::new();

        for (name, entry) in tree.entries() {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };

            if entry.mode.is_directory() {
                leaves.extend(self.read_tree_recursive(entry.oid, &path)?);
            } else {
                leaves.push((path, entry.oid));
            }
        }

        Ok(leaves)
    }

    /// The flattened tree of the current HEAD commit, empty when unborn
    fn head_tree(&self) -> Result<BTreeMap<String, ObjectId>> {
        match self.refs.resolve_head()? {
            None => Ok(BTreeMap::new()),
            Some(head_id) => {
                let commit = self.database.load_commit(head_id)?;
                Ok(self
                    .read_tree_recursive(commit.tree(), "")?
                    .into_iter()
                    .collect())
            }
        }
    }

    // ------------------------------------------------------------------
    // inspection

    /// Compare HEAD, index, and working tree
    pub fn status(&self) -> Result<StatusReport> {
        let index = self.load_index()?;
        let head_tree = self.head_tree()?;
        let files = self.workspace.list_files(self.ignore.as_ref())?;
        let present: BTreeSet<&String> = files.iter().collect();

        let mut report = StatusReport::default();

        for entry in index.entries() {
            match head_tree.get(&entry.path) {
                None => {
                    report.staged.insert(entry.path.clone(), ChangeKind::Added);
                }
                Some(head_id) if *head_id != entry.oid => {
                    report
                        .staged
                        .insert(entry.path.clone(), ChangeKind::Modified);
                }
                Some(_) => {}
            }
        }
        for path in head_tree.keys() {
            if !index.contains(path) {
                report.staged.insert(path.clone(), ChangeKind::Deleted);
            }
        }

        for entry in index.entries() {
            if !present.contains(&entry.path) {
                report
                    .unstaged
                    .insert(entry.path.clone(), ChangeKind::Deleted);
                continue;
            }

            let content = self.workspace.read_file(&entry.path)?;
            if codec::compute_id(ObjectType::Blob, &content) != entry.oid {
                report
                    .unstaged
                    .insert(entry.path.clone(), ChangeKind::Modified);
            }
        }

        for path in &files {
            if !index.contains(path) {
                report.untracked.push(path.clone());
            }
        }

        Ok(report)
    }

    /// History from HEAD along first parents, newest first
    pub fn log(&self) -> Result<Vec<LogEntry>> {
        let mut entries = Vec::new();
        let mut cursor = self.refs.resolve_head()?;

        while let Some(id) = cursor {
            let commit = self.database.load_commit(id)?;
            cursor = commit.first_parent();
            entries.push(LogEntry { id, commit });
        }

        Ok(entries)
    }

    /// Diff index blobs against working-tree contents
    pub fn diff_unstaged(&self) -> Result<Vec<FileDiff>> {
        let index = self.load_index()?;
        let mut diffs = Vec::new();

        for entry in index.entries() {
            let old_text = self.database.load_blob(entry.oid)?.text();
            let new_text = if self.workspace.file_exists(&entry.path) {
                String::from_utf8_lossy(&self.workspace.read_file(&entry.path)?).into_owned()
            } else {
                String::new()
            };

            let diff = diff_texts(&old_text, &new_text, &entry.path, &entry.path);
            if !diff.is_empty() {
                diffs.push(diff);
            }
        }

        Ok(diffs)
    }

    /// Diff the flattened HEAD tree against index blobs
    pub fn diff_staged(&self) -> Result<Vec<FileDiff>> {
        let index = self.load_index()?;
        let head_tree = self.head_tree()?;
        let mut diffs = Vec::new();

        for entry in index.entries() {
            let old_text = match head_tree.get(&entry.path) {
                Some(head_id) if *head_id == entry.oid => continue,
                Some(head_id) => self.database.load_blob(*head_id)?.text(),
                None => String::new(),
            };
            let new_text = self.database.load_blob(entry.oid)?.text();
            diffs.push(diff_texts(&old_text, &new_text, &entry.path, &entry.path));
        }

        for (path, head_id) in &head_tree {
            if !index.contains(path) {
                let old_text = self.database.load_blob(*head_id)?.text();
                diffs.push(diff_texts(&old_text, "", path, path));
            }
        }

        diffs.sort_by(|a, b| a.old_path.cmp(&b.old_path));
        Ok(diffs)
    }

    // ------------------------------------------------------------------
    // branches and tags

    /// Create a branch at the current HEAD commit
    pub fn create_branch(&self, name: &str) -> Result<()> {
        let head_id = self
            .refs
            .resolve_head()?
            .ok_or_else(|| Error::NotFound("HEAD commit (unborn branch)".to_string()))?;

        self.refs.create_branch(name, head_id)
    }

    /// Delete a branch that is not checked out
    pub fn delete_branch(&self, name: &str) -> Result<ObjectId> {
        if self.refs.current_branch_name()?.as_deref() == Some(name) {
            return Err(Error::Unauthorized(format!(
                "refusing to delete the checked-out branch {name}"
            )));
        }

        self.refs.delete_branch(name)
    }

    /// Branch names with their tips, ascending ordinal order
    pub fn list_branches(&self) -> Result<Vec<(String, Option<ObjectId>)>> {
        self.refs
            .list_branches()?
            .into_iter()
            .map(|name| {
                let tip = self.refs.resolve_branch(&name)?;
                Ok((name, tip))
            })
            .collect()
    }

    pub fn create_tag(&self, name: &str, revision: &str) -> Result<()> {
        let id = self
            .resolve(revision)?
            .ok_or_else(|| Error::NotFound(format!("revision {revision}")))?;

        self.refs.create_tag(name, id)
    }

    pub fn delete_tag(&self, name: &str) -> Result<()> {
        self.refs.delete_tag(name)
    }

    pub fn list_tags(&self) -> Result<Vec<String>> {
        self.refs.list_tags()
    }

    /// Universal revision resolver, see [`RefStore::resolve`]
    pub fn resolve(&self, revision: &str) -> Result<Option<ObjectId>> {
        self.refs.resolve(revision)
    }

    pub fn current_branch_name(&self) -> Result<Option<String>> {
        self.refs.current_branch_name()
    }

    // ------------------------------------------------------------------
    // checkout and reset

    /// Replace the working tree and index with a branch's snapshot
    pub fn checkout(&self, branch: &str) -> Result<()> {
        let commit_id = self
            .refs
            .resolve_branch(branch)?
            .ok_or_else(|| Error::NotFound(format!("branch {branch}")))?;
        let commit = self.database.load_commit(commit_id)?;
        let leaves = self.read_tree_recursive(commit.tree(), "")?;

        let index = self.load_index()?;
        for path in index.paths() {
            self.workspace.remove_file(&path)?;
        }

        let rebuilt = self.materialize(&leaves)?;
        rebuilt.write_updates()?;

        self.refs
            .write_head(&Head::Symbolic(format!("refs/heads/{branch}")))?;
        info!(branch, commit = %commit_id.to_short(), "checked out");

        Ok(())
    }

    /// Move HEAD to a revision, optionally rebuilding index and tree
    pub fn reset(&self, revision: &str, mode: ResetMode) -> Result<()> {
        let target = self
            .resolve(revision)?
            .ok_or_else(|| Error::NotFound(format!("revision {revision}")))?;

        match self.refs.read_head()? {
            Head::Symbolic(refpath) => self.refs.write_ref(&refpath, target)?,
            Head::Detached(_) => self.refs.write_head(&Head::Detached(target))?,
        }
        debug!(target = %target.to_short(), ?mode, "moved HEAD");

        if mode == ResetMode::Soft {
            return Ok(());
        }

        let commit = self.database.load_commit(target)?;
        let leaves = self.read_tree_recursive(commit.tree(), "")?;
        let prior_index = self.load_index()?;

        if mode == ResetMode::Mixed {
            // keep working-tree files; take their stats where present
            let mut index = Index::new(self.index_path().into_boxed_path());
            for (path, blob_id) in &leaves {
                let entry = if self.workspace.file_exists(path) {
                    let stat = self.workspace.stat_file(path)?;
                    IndexEntry::new(path.clone(), *blob_id, stat.mtime_s, 0, stat.size)
                } else {
                    let size = self.database.load_blob(*blob_id)?.len() as u32;
                    IndexEntry::new(path.clone(), *blob_id, 0, 0, size)
                };
                index.add(entry);
            }
            return index.write_updates();
        }

        // hard: clear every path either index names, then write the target
        // tree and rebuild the index from what landed on disk
        let mut stale: BTreeSet<String> = prior_index.paths().into_iter().collect();
        stale.extend(leaves.iter().map(|(path, _)| path.clone()));
        for path in &stale {
            self.workspace.remove_file(path)?;
        }

        let rebuilt = self.materialize(&leaves)?;
        rebuilt.write_updates()?;
        info!(target = %target.to_short(), "hard reset");

        Ok(())
    }

    /// Write blobs into the working tree and build an index from the
    /// resulting files
    fn materialize(&self, leaves: &[(String, ObjectId)]) -> Result<Index> {
        let mut index = Index::new(self.index_path().into_boxed_path());

        for (path, blob_id) in leaves {
            let blob = self.database.load_blob(*blob_id)?;
            self.workspace.write_file(path, blob.content())?;

            let stat = self.workspace.stat_file(path)?;
            index.add(IndexEntry::new(
                path.clone(),
                *blob_id,
                stat.mtime_s,
                0,
                stat.size,
            ));
        }

        Ok(index)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("workdir", &self.workdir)
            .finish_non_exhaustive()
    }
}
