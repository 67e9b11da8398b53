//! A from-scratch distributed version control engine
//!
//! The pieces compose leaves-first: a content-addressed object store holds
//! blobs, trees, and commits in compressed canonical form; a binary staging
//! index snapshots the next commit's tree; a reference namespace maps names
//! to commits; and a framed wire protocol moves object graphs and ref
//! updates between peers over any pair of byte streams.
//!
//! ```no_run
//! use magicrepos::Repository;
//!
//! let repo = Repository::init("/tmp/project")?;
//! std::fs::write("/tmp/project/hello.txt", "hello")?;
//! repo.stage("hello.txt")?;
//! repo.commit("first commit", None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod areas;
pub mod artifacts;
pub mod errors;
pub mod oracles;
pub mod transport;

/// Name of the hidden control directory inside a working copy
pub const CONTROL_DIR: &str = ".magicrepos";

/// Branch a fresh repository's HEAD points at
pub const DEFAULT_BRANCH: &str = "main";

pub use areas::repository::{LogEntry, Repository, ResetMode};
pub use artifacts::objects::object_id::ObjectId;
pub use artifacts::status::{ChangeKind, StatusReport};
pub use errors::{Error, Result};
pub use oracles::{AccessControl, IdentitySource, IgnoreOracle};
