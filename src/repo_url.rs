//! Parsing of repository remote URLs into host, owner and name.
//!
//! Two remote syntaxes are accepted:
//!
//! - HTTPS: `https://<host>/<owner>/<name>[.git]`
//! - SSH: `git@<host>:<owner>/<name>.git` (also spelled
//!   `ssh://git@<host>/<owner>/<name>.git`)
//!
//! GitLab nested groups are supported by letting the owner span several
//! path segments: `https://gitlab.com/group/sub/project` has owner
//! `group/sub`.
use git_url_parse::{GitUrl, Scheme};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    credential::HostIdentity,
    error::{ManygitError, Result},
};

const GIT_SUFFIX: &str = ".git";

/// Remote syntax a repository reference was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteScheme {
    Https,
    Ssh,
}

impl fmt::Display for RemoteScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteScheme::Https => write!(f, "https"),
            RemoteScheme::Ssh => write!(f, "ssh"),
        }
    }
}

/// A repository reference extracted from a remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRepoRef {
    /// Lower-cased host, with the port appended when one was given.
    pub host: String,
    /// Owner or namespace, verbatim.
    pub owner: String,
    /// Repository name without any `.git` suffix, verbatim.
    pub name: String,
    pub scheme: RemoteScheme,
}

impl ParsedRepoRef {
    /// Key used to look up the credential for this repository.
    pub fn host_identity(&self) -> HostIdentity {
        HostIdentity::new(&self.host)
    }

    /// `owner/name`, the path both hosts use to address a project.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Borrow the owner/name pair adapters address repositories by.
    pub fn repo_path(&self) -> RepoPath {
        RepoPath {
            owner: self.owner.clone(),
            name: self.name.clone(),
        }
    }
}

/// Owner and name of a repository on an already selected host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoPath {
    pub owner: String,
    pub name: String,
}

impl RepoPath {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Parse a repository URL in HTTPS or SSH syntax.
pub fn parse(url: &str) -> Result<ParsedRepoRef> {
    let trimmed = url.trim().trim_end_matches('/');

    if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
        return Err(ManygitError::invalid_url(url));
    }

    let parsed =
        GitUrl::parse(trimmed).map_err(|_| ManygitError::invalid_url(url))?;

    let has_suffix = trimmed.ends_with(GIT_SUFFIX);

    let scheme = match parsed.scheme {
        Scheme::Https => RemoteScheme::Https,
        Scheme::Ssh | Scheme::GitSsh => {
            if parsed.user.is_none() || !has_suffix {
                return Err(ManygitError::invalid_url(url));
            }
            RemoteScheme::Ssh
        }
        _ => return Err(ManygitError::invalid_url(url)),
    };

    let host = parsed
        .host
        .as_deref()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ManygitError::invalid_url(url))?
        .to_ascii_lowercase();

    let host = match (scheme, parsed.port) {
        (RemoteScheme::Https, Some(port)) if port != 443 => {
            format!("{host}:{port}")
        }
        _ => host,
    };

    let (owner, name) = split_path(&parsed.path)
        .ok_or_else(|| ManygitError::invalid_url(url))?;

    Ok(ParsedRepoRef {
        host,
        owner,
        name,
        scheme,
    })
}

/// Split a remote path into (owner, name), stripping a `.git` suffix.
fn split_path(path: &str) -> Option<(String, String)> {
    let path = path.trim_matches('/');
    let path = path.strip_suffix(GIT_SUFFIX).unwrap_or(path);

    let segments = path.split('/').collect::<Vec<&str>>();

    if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    let (name, owner) = segments.split_last()?;

    Some((owner.join("/"), name.to_string()))
}
