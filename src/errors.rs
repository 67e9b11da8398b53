//! Error kinds shared across the engine
//!
//! Every fallible operation in the crate returns [`Result`]. The variants
//! are the stable surface callers match on; the payload strings carry the
//! offending path, ref name, or token for diagnostics.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the version control engine and its transport
#[derive(Debug, Error)]
pub enum Error {
    #[error("not a repository (no control directory found above {0})")]
    NotARepository(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("nothing staged, refusing to create an empty commit")]
    EmptyCommit,

    #[error("malformed object: {0}")]
    MalformedObject(String),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed ref: {0}")]
    MalformedRef(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("transport ended mid-frame")]
    UnexpectedEof,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("push failed: {0}")]
    PushFailed(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("malformed remote url: {0}")]
    MalformedUrl(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
