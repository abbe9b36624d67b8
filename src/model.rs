//! Host-agnostic snapshots returned by every adapter.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized outcome of a commit status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommitState {
    Success,
    Failure,
    Pending,
    Error,
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitState::Success => write!(f, "SUCCESS"),
            CommitState::Failure => write!(f, "FAILURE"),
            CommitState::Pending => write!(f, "PENDING"),
            CommitState::Error => write!(f, "ERROR"),
        }
    }
}

/// One status check reported against a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    /// Name of the check, e.g. `ci/build`.
    pub context: String,
    pub status: CommitState,
    pub description: Option<String>,
    pub target_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full 40 character hex sha.
    pub sha: String,
    /// Parent shas in the order the host reports them.
    pub parents: Vec<String>,
    /// Statuses in the order the host reports them (newest first).
    pub statuses: Vec<CommitStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub head: Commit,
}

/// Snapshot of a repository and its default branch at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub host: String,
    pub owner: String,
    pub name: String,
    pub default_branch: Branch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    /// Sha of the commit the tag points at.
    pub commit_sha: String,
    /// Message of an annotated tag.
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub name: String,
    pub body: Option<String>,
    pub is_draft: bool,
    pub is_prerelease: bool,
}

/// An open pull request (GitHub) or merge request (GitLab).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    /// Branch the changes are proposed into.
    pub base: String,
    /// Branch the changes come from.
    pub source: String,
    pub source_sha: String,
    pub web_url: String,
}

/// True for a full 40 character hex object id.
pub fn is_full_sha(sha: &str) -> bool {
    sha.len() == 40 && sha.chars().all(|c| c.is_ascii_hexdigit())
}
