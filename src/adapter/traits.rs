//! Traits related to remote git hosts
#[cfg(test)]
use mockall::automock;

use crate::{
    adapter::types::{BranchInfo, CommitInfo, RepositoryInfo},
    error::Result,
    model::{CommitStatus, PullRequest, Release, Tag},
    repo_url::RepoPath,
};

/// Normalized operations a host family must support. Every failure is
/// already mapped into [`crate::error::ManygitError`].
#[cfg_attr(test, automock)]
pub trait HostAdapter {
    fn fetch_repository(&self, repo: &RepoPath) -> Result<RepositoryInfo>;
    fn fetch_branch(&self, repo: &RepoPath, name: &str) -> Result<BranchInfo>;
    fn list_branches(&self, repo: &RepoPath) -> Result<Vec<String>>;
    fn fetch_commit(&self, repo: &RepoPath, sha: &str) -> Result<CommitInfo>;
    fn fetch_commit_statuses(
        &self,
        repo: &RepoPath,
        sha: &str,
    ) -> Result<Vec<CommitStatus>>;
    fn fetch_tag(&self, repo: &RepoPath, name: &str) -> Result<Tag>;
    /// Tags in host order. Annotations are not included in listings.
    fn list_tags(&self, repo: &RepoPath) -> Result<Vec<Tag>>;
    fn fetch_release(&self, repo: &RepoPath, tag: &str) -> Result<Release>;
    /// Published releases, newest first.
    fn list_releases(&self, repo: &RepoPath) -> Result<Vec<Release>>;
    /// Open pull requests (merge requests on GitLab).
    fn list_pull_requests(&self, repo: &RepoPath) -> Result<Vec<PullRequest>>;
}
