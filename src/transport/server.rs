//! Server side: bare repositories and session dispatch
//!
//! The server hosts bare repositories at `{root}/{owner}/{repo}.mr/`: the
//! control directory contents without a working tree or index. Each
//! accepted stream runs exactly one sequential session on behalf of an
//! already-authenticated username.

use crate::areas::database::Database;
use crate::areas::refs::{Head, RefStore};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use crate::oracles::AccessControl;
use crate::transport::message::{Message, Op, PROTOCOL_VERSION};
use crate::transport::walker;
use crate::DEFAULT_BRANCH;
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Suffix of server-side repository directories
pub const BARE_SUFFIX: &str = ".mr";

/// A repository without a working tree
#[derive(Debug)]
pub struct BareRepository {
    control: Box<Path>,
    database: Database,
    refs: RefStore,
}

impl BareRepository {
    fn control_dir(root: &Path, owner: &str, repo: &str) -> PathBuf {
        root.join(owner).join(format!("{repo}{BARE_SUFFIX}"))
    }

    pub fn exists(root: &Path, owner: &str, repo: &str) -> bool {
        Self::control_dir(root, owner, repo).is_dir()
    }

    /// Open an existing bare repository
    pub fn open(root: &Path, owner: &str, repo: &str) -> Result<Self> {
        let control = Self::control_dir(root, owner, repo);
        if !control.is_dir() {
            return Err(Error::NotFound(format!("repository {owner}/{repo}")));
        }

        Ok(Self::assemble(control))
    }

    /// Create a fresh bare repository: object store, ref namespace, and a
    /// symbolic HEAD on the default branch
    pub fn create(root: &Path, owner: &str, repo: &str) -> Result<Self> {
        let control = Self::control_dir(root, owner, repo);
        if control.exists() {
            return Err(Error::AlreadyExists(format!("repository {owner}/{repo}")));
        }

        std::fs::create_dir_all(control.join("objects"))?;
        std::fs::create_dir_all(control.join("refs").join("heads"))?;
        std::fs::create_dir_all(control.join("refs").join("tags"))?;
        std::fs::create_dir_all(control.join("refs").join("remotes"))?;

        let bare = Self::assemble(control);
        bare.refs
            .write_head(&Head::Symbolic(format!("refs/heads/{DEFAULT_BRANCH}")))?;

        info!(owner, repo, "created bare repository");
        Ok(bare)
    }

    fn assemble(control: PathBuf) -> Self {
        BareRepository {
            database: Database::new(control.join("objects").into_boxed_path()),
            refs: RefStore::new(control.clone().into_boxed_path()),
            control: control.into_boxed_path(),
        }
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

    /// HEAD (when resolvable) followed by every branch, sorted
    pub fn advertised_refs(&self) -> Result<Vec<(String, ObjectId)>> {
        let mut advertised = Vec::new();

        if let Some(head_id) = self.refs.resolve_head()? {
            advertised.push(("HEAD".to_string(), head_id));
        }
        for name in self.refs.list_branches()? {
            if let Some(tip) = self.refs.resolve_branch(&name)? {
                advertised.push((format!("refs/heads/{name}"), tip));
            }
        }

        Ok(advertised)
    }
}

/// Run one server session over a stream pair
///
/// `username` is the identity the outer transport already authenticated.
/// Protocol or authorization faults are reported to the peer with an Error
/// reply, then surfaced to the caller.
pub fn serve<R: Read, W: Write, A: AccessControl>(
    root: &Path,
    auth: &A,
    username: &str,
    reader: &mut R,
    writer: &mut W,
) -> Result<()> {
    let (op, owner, repo) = match Message::read_from(reader) {
        Ok(Message::NegotiateRequest { op, owner, repo }) => (op, owner, repo),
        Ok(other) => {
            let violation = Error::ProtocolViolation(format!(
                "session must open with NegotiateRequest, got {}",
                other.name()
            ));
            return refuse(writer, violation);
        }
        Err(Error::ProtocolViolation(detail)) => {
            return refuse(writer, Error::ProtocolViolation(detail));
        }
        Err(err) => return Err(err),
    };

    info!(user = username, op = op.as_str(), %owner, %repo, "session negotiated");

    let authorized = match op {
        Op::Push => auth.can_write(username, &owner, &repo),
        Op::Pull | Op::Pr => auth.can_read(username),
    };
    if !authorized {
        return refuse(
            writer,
            Error::Unauthorized(format!("{username} may not {} {owner}/{repo}", op.as_str())),
        );
    }

    let bare = if BareRepository::exists(root, &owner, &repo) {
        BareRepository::open(root, &owner, &repo)?
    } else if op == Op::Push && auth.can_write(username, &owner, &repo) {
        BareRepository::create(root, &owner, &repo)?
    } else {
        return refuse(writer, Error::NotFound(format!("repository {owner}/{repo}")));
    };

    Message::NegotiateResponse {
        version: PROTOCOL_VERSION.to_string(),
    }
    .write_to(writer)?;

    match op {
        Op::Push => serve_push(&bare, reader, writer),
        Op::Pull => serve_pull(&bare, reader, writer),
        Op::Pr => {
            // pull requests live in an external storage tier
            Message::Error {
                detail: "pr operations are not supported by this server".to_string(),
            }
            .write_to(writer)?;
            Ok(())
        }
    }
}

fn serve_push<R: Read, W: Write>(
    bare: &BareRepository,
    reader: &mut R,
    writer: &mut W,
) -> Result<()> {
    Message::RefAdvertisement {
        refs: bare.advertised_refs()?,
    }
    .write_to(writer)?;

    let mut updates = Vec::new();
    let mut received = 0usize;

    loop {
        match Message::read_from(reader)? {
            Message::RefUpdate { name, id } => updates.push((name, id)),
            Message::PackData { id, bytes } => {
                // the embedded id is trusted as-is, the payload is not
                // re-hashed against it
                bare.database.write(id, &bytes)?;
                received += 1;
            }
            Message::PackComplete => break,
            other => {
                let violation = Error::ProtocolViolation(format!(
                    "push session got {} mid-pack",
                    other.name()
                ));
                return refuse(writer, violation);
            }
        }
    }

    // ref updates apply only after the full pack arrived, so an aborted
    // session leaves every advertised ref untouched
    for (name, id) in &updates {
        bare.refs.write_ref(name, *id)?;
    }

    info!(
        refs = updates.len(),
        objects = received,
        "push applied"
    );
    Message::Ok {
        detail: format!("updated {} refs, received {} objects", updates.len(), received),
    }
    .write_to(writer)
}

fn serve_pull<R: Read, W: Write>(
    bare: &BareRepository,
    reader: &mut R,
    writer: &mut W,
) -> Result<()> {
    Message::RefAdvertisement {
        refs: bare.advertised_refs()?,
    }
    .write_to(writer)?;

    let wanted = match Message::read_from(reader)? {
        Message::RefWanted { names } => names,
        other => {
            let violation =
                Error::ProtocolViolation(format!("pull session got {}, wanted RefWanted", other.name()));
            return refuse(writer, violation);
        }
    };

    let mut closure = BTreeSet::new();
    for name in &wanted {
        match bare.refs.resolve(name)? {
            Some(tip) => walker::collect(&bare.database, tip, &mut closure)?,
            None => warn!(%name, "peer wanted an unresolvable ref"),
        }
    }

    for id in &closure {
        Message::PackData {
            id: *id,
            bytes: bare.database.read(*id)?,
        }
        .write_to(writer)?;
    }
    Message::PackComplete.write_to(writer)?;

    info!(objects = closure.len(), "pull served");
    Ok(())
}

/// Report a fault to the peer, then surface it locally
fn refuse<W: Write>(writer: &mut W, error: Error) -> Result<()> {
    Message::Error {
        detail: error.to_string(),
    }
    .write_to(writer)?;

    Err(error)
}
