//! External collaborator interfaces
//!
//! The engine deliberately does not parse ignore patterns, config files, or
//! authorization rules. Embedders supply those concerns through the traits
//! below; the engine only consumes their answers.

use derive_new::new;

/// Answers "is this working-tree path ignored?"
///
/// Paths are relative to the working-tree root and use `/` separators.
/// Implementations must always report the control directory (and anything
/// under it) as ignored; [`ControlDirIgnore`] is the minimal conforming
/// implementation.
pub trait IgnoreOracle {
    fn is_ignored(&self, relative_path: &str, is_directory: bool) -> bool;
}

/// Ignore oracle that only excludes the control directory
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlDirIgnore;

impl IgnoreOracle for ControlDirIgnore {
    fn is_ignored(&self, relative_path: &str, _is_directory: bool) -> bool {
        relative_path == crate::CONTROL_DIR
            || relative_path.starts_with(&format!("{}/", crate::CONTROL_DIR))
    }
}

/// Supplies the committer identity from external configuration
///
/// Both answers are optional; the commit path substitutes "Unknown" and
/// "unknown@unknown" when the source has nothing.
pub trait IdentitySource {
    fn user_name(&self) -> Option<String>;
    fn user_email(&self) -> Option<String>;
}

/// Fixed identity, handy for embedders and tests
#[derive(Debug, Clone, Default, new)]
pub struct StaticIdentity {
    name: Option<String>,
    email: Option<String>,
}

impl StaticIdentity {
    pub fn named(name: &str, email: &str) -> Self {
        Self::new(Some(name.to_string()), Some(email.to_string()))
    }
}

impl IdentitySource for StaticIdentity {
    fn user_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn user_email(&self) -> Option<String> {
        self.email.clone()
    }
}

/// Authorization oracle consulted by the server side of the protocol
pub trait AccessControl {
    /// May this authenticated user read any repository on this host?
    fn can_read(&self, user: &str) -> bool;

    /// May this user write (and auto-create) `{owner}/{repo}`?
    fn can_write(&self, user: &str, owner: &str, repo: &str) -> bool;
}

/// Default policy: every authenticated user reads, owners write their own
/// namespace
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerWritesAccess;

impl AccessControl for OwnerWritesAccess {
    fn can_read(&self, user: &str) -> bool {
        !user.is_empty()
    }

    fn can_write(&self, user: &str, owner: &str, _repo: &str) -> bool {
        !user.is_empty() && user == owner
    }
}
