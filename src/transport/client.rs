//! Client side of push and pull
//!
//! Both run over an already-authenticated pair of byte streams supplied by
//! the caller, typically the stdin and stdout of a spawned remote shell.
//! One sequential session per stream pair; a failed session is abandoned
//! and the caller reopens the transport to retry.

use crate::areas::database::Database;
use crate::areas::refs::RefStore;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use crate::transport::message::{Message, Op, PROTOCOL_VERSION};
use crate::transport::remote_url::RemoteTarget;
use crate::transport::walker;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use tracing::{debug, info};

/// Push every local branch and its reachable objects to the remote
///
/// Returns the server's success detail. The whole closure of every branch
/// tip goes on the wire; nothing is subtracted for objects the remote
/// already advertised, which wastes bandwidth but stays correct.
pub fn push<R: Read, W: Write>(
    database: &Database,
    refs: &RefStore,
    target: &RemoteTarget,
    reader: &mut R,
    writer: &mut W,
) -> Result<String> {
    negotiate(Op::Push, target, reader, writer, |detail| {
        Error::PushFailed(detail)
    })?;

    // the advertisement is parsed for protocol lockstep, not consulted
    let _advertised = match Message::read_from(reader)? {
        Message::RefAdvertisement { refs } => refs,
        other => return Err(unexpected("RefAdvertisement", &other)),
    };

    let mut updates = Vec::new();
    let mut closure = BTreeSet::new();
    for name in refs.list_branches()? {
        if let Some(tip) = refs.resolve_branch(&name)? {
            updates.push((format!("refs/heads/{name}"), tip));
            walker::collect(database, tip, &mut closure)?;
        }
    }

    for (name, id) in &updates {
        Message::RefUpdate {
            name: name.clone(),
            id: *id,
        }
        .write_to(writer)?;
    }
    for id in &closure {
        Message::PackData {
            id: *id,
            bytes: database.read(*id)?,
        }
        .write_to(writer)?;
    }
    Message::PackComplete.write_to(writer)?;

    debug!(refs = updates.len(), objects = closure.len(), "push sent");

    match Message::read_from(reader)? {
        Message::Ok { detail } => {
            info!(%target, "push accepted");
            Ok(detail)
        }
        Message::Error { detail } => Err(Error::PushFailed(detail)),
        other => Err(unexpected("Ok", &other)),
    }
}

/// Fetch the remote's advertised branches and their objects
///
/// Received pack objects are stored under the id the peer embedded; the
/// bytes are not re-hashed against it. Advertised branches are recorded as
/// `refs/remotes/{remote_name}/{branch}` tracking refs. Returns the
/// advertised ref map.
pub fn pull<R: Read, W: Write>(
    database: &Database,
    refs: &RefStore,
    target: &RemoteTarget,
    remote_name: &str,
    reader: &mut R,
    writer: &mut W,
) -> Result<BTreeMap<String, ObjectId>> {
    negotiate(Op::Pull, target, reader, writer, |detail| {
        Error::PullFailed(detail)
    })?;

    let advertised = match Message::read_from(reader)? {
        Message::RefAdvertisement { refs } => refs,
        other => return Err(unexpected("RefAdvertisement", &other)),
    };

    if advertised.is_empty() {
        Message::RefWanted { names: vec![] }.write_to(writer)?;
        return match Message::read_from(reader)? {
            Message::PackComplete => Ok(BTreeMap::new()),
            other => Err(unexpected("PackComplete", &other)),
        };
    }

    Message::RefWanted {
        names: advertised.iter().map(|(name, _)| name.clone()).collect(),
    }
    .write_to(writer)?;

    let mut received = 0usize;
    loop {
        match Message::read_from(reader)? {
            Message::PackData { id, bytes } => {
                database.write(id, &bytes)?;
                received += 1;
            }
            Message::PackComplete => break,
            Message::Error { detail } => return Err(Error::PullFailed(detail)),
            other => return Err(unexpected("PackData", &other)),
        }
    }
    debug!(objects = received, "pull received");

    for (name, id) in &advertised {
        if let Some(branch) = name.strip_prefix("refs/heads/") {
            refs.write_ref(&format!("refs/remotes/{remote_name}/{branch}"), *id)?;
        }
    }

    info!(%target, remote = remote_name, "pull complete");
    Ok(advertised.into_iter().collect())
}

fn negotiate<R: Read, W: Write>(
    op: Op,
    target: &RemoteTarget,
    reader: &mut R,
    writer: &mut W,
    refusal: impl Fn(String) -> Error,
) -> Result<()> {
    Message::NegotiateRequest {
        op,
        owner: target.owner.clone(),
        repo: target.repo.clone(),
    }
    .write_to(writer)?;

    match Message::read_from(reader)? {
        Message::NegotiateResponse { version } if version == PROTOCOL_VERSION => Ok(()),
        Message::NegotiateResponse { version } => Err(Error::ProtocolViolation(format!(
            "server speaks {version:?}, expected {PROTOCOL_VERSION:?}"
        ))),
        Message::Error { detail } => Err(refusal(detail)),
        other => Err(unexpected("NegotiateResponse", &other)),
    }
}

fn unexpected(wanted: &str, got: &Message) -> Error {
    Error::ProtocolViolation(format!("expected {wanted}, got {}", got.name()))
}
