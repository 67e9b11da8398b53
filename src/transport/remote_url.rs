//! Remote target grammar
//!
//! `user "@" host ":" owner "/" repo`, every part non-empty. No percent
//! decoding; IPv6 literal hosts with colons are out of scope.

use crate::errors::{Error, Result};
use derive_new::new;

/// Parsed remote location
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct RemoteTarget {
    pub user: String,
    pub host: String,
    pub owner: String,
    pub repo: String,
}

impl RemoteTarget {
    pub fn parse(url: &str) -> Result<Self> {
        let bad = |why: &str| Error::MalformedUrl(format!("{url:?}: {why}"));

        let (user, rest) = url
            .split_once('@')
            .ok_or_else(|| bad("missing '@' between user and host"))?;
        let (host, path) = rest
            .split_once(':')
            .ok_or_else(|| bad("missing ':' between host and path"))?;
        let (owner, repo) = path
            .split_once('/')
            .ok_or_else(|| bad("missing '/' between owner and repo"))?;

        if user.is_empty() || host.is_empty() || owner.is_empty() || repo.is_empty() {
            return Err(bad("user, host, owner, and repo must be non-empty"));
        }
        if repo.contains('/') {
            return Err(bad("repo may not contain '/'"));
        }

        Ok(RemoteTarget::new(
            user.to_string(),
            host.to_string(),
            owner.to_string(),
            repo.to_string(),
        ))
    }
}

impl std::fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.user, self.host, self.owner, self.repo
        )
    }
}
