//! Implements the HostAdapter trait for GitLab
use gitlab::{
    AsyncGitlab, GitlabError, RestError,
    api::{
        ApiError, AsyncQuery, Pagination,
        merge_requests::MergeRequestState,
        paged,
        projects::{
            Project,
            merge_requests::MergeRequests,
            releases::{ProjectReleaseByTag, ProjectReleases},
            repository::{
                branches::{Branch, Branches},
                commits::{Commit, CommitStatuses},
                tags::{Tag as TagEndpoint, Tags},
            },
        },
    },
};
use log::*;
use secrecy::ExposeSecret;
use serde::Deserialize;
use url::Url;

use crate::{
    adapter::{
        config::{ClientOptions, gitlab_host},
        runtime::BlockingRuntime,
        tls::install_crypto_provider,
        traits::HostAdapter,
        types::{BranchInfo, CommitInfo, RepositoryInfo},
    },
    credential::{Credential, TokenKind},
    error::{ManygitError, Resource, Result},
    model::{CommitState, CommitStatus, PullRequest, Release, Tag},
    repo_url::RepoPath,
};

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BranchPayload {
    name: String,
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    id: String,
    #[serde(default)]
    parent_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    name: String,
    status: String,
    description: Option<String>,
    target_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleasePayload {
    tag_name: String,
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    upcoming_release: bool,
}

#[derive(Debug, Deserialize)]
struct TagPayload {
    name: String,
    message: Option<String>,
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct MergeRequestPayload {
    iid: u64,
    title: String,
    target_branch: String,
    source_branch: String,
    sha: Option<String>,
    web_url: String,
}

/// Map a GitLab pipeline status onto the normalized states.
pub fn commit_state_from_gitlab(status: &str) -> Result<CommitState> {
    match status {
        "success" => Ok(CommitState::Success),
        "failed" => Ok(CommitState::Failure),
        "created" | "waiting_for_resource" | "preparing" | "pending"
        | "running" | "scheduled" | "manual" => Ok(CommitState::Pending),
        "canceled" | "skipped" => Ok(CommitState::Error),
        other => Err(ManygitError::api(format!(
            "unknown gitlab commit status: {other}"
        ))),
    }
}

fn map_api_error(
    err: ApiError<RestError>,
    resource: Resource,
    subject: &str,
) -> ManygitError {
    match err {
        ApiError::GitlabWithStatus { status, msg } => {
            ManygitError::from_status(status.as_u16(), &msg, resource, subject)
        }
        ApiError::GitlabService { status, .. } => ManygitError::from_status(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            resource,
            subject,
        ),
        ApiError::GitlabObjectWithStatus { status, obj }
        | ApiError::GitlabUnrecognizedWithStatus { status, obj } => {
            ManygitError::from_status(
                status.as_u16(),
                &obj.to_string(),
                resource,
                subject,
            )
        }
        ApiError::GitlabRateLimited { rl_reset, .. } => {
            ManygitError::HostUnavailable(format!(
                "rate limit exceeded while requesting {subject}, resets at {rl_reset}"
            ))
        }
        ApiError::Client { source } => ManygitError::HostUnavailable(format!(
            "request for {subject} failed: {source}"
        )),
        other => ManygitError::api(format!(
            "unexpected response for {subject}: {other}"
        )),
    }
}

fn map_client_error(err: GitlabError, host: &str) -> ManygitError {
    let subject = format!("gitlab user on {host}");
    match err {
        GitlabError::Api { source } => {
            map_api_error(source, Resource::Repository, &subject)
        }
        GitlabError::Communication { source } => ManygitError::HostUnavailable(
            format!("failed to reach {host}: {source}"),
        ),
        other => ManygitError::api(format!(
            "failed to create gitlab client for {host}: {other}"
        )),
    }
}

fn build_error(err: impl std::fmt::Display) -> ManygitError {
    ManygitError::api(format!("invalid gitlab request: {err}"))
}

/// The release endpoint inserts the tag into its route verbatim.
fn escape_segment(segment: &str) -> Result<String> {
    let mut url = Url::parse("https://gitlab.invalid/")
        .map_err(|err| ManygitError::api(format!("invalid route: {err}")))?;

    url.path_segments_mut()
        .map_err(|_| ManygitError::api("invalid route base"))?
        .pop_if_empty()
        .push(segment);

    Ok(url.path().trim_start_matches('/').to_string())
}

// GitLab has no drafts, upcoming releases are its prereleases
fn release_from_payload(release: ReleasePayload) -> Release {
    Release {
        name: release
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| release.tag_name.clone()),
        tag_name: release.tag_name,
        body: release.description.filter(|d| !d.is_empty()),
        is_draft: false,
        is_prerelease: release.upcoming_release,
    }
}

fn tag_from_payload(tag: TagPayload) -> Tag {
    Tag {
        name: tag.name,
        commit_sha: tag.commit.id,
        annotation: tag.message.filter(|m| !m.is_empty()),
    }
}

fn status_from_payload(status: StatusPayload) -> Result<CommitStatus> {
    Ok(CommitStatus {
        status: commit_state_from_gitlab(&status.status)?,
        context: status.name,
        description: status.description,
        target_url: status.target_url,
    })
}

fn pull_request_from_payload(mr: MergeRequestPayload) -> PullRequest {
    PullRequest {
        number: mr.iid,
        title: mr.title,
        base: mr.target_branch,
        source: mr.source_branch,
        source_sha: mr.sha.unwrap_or_default(),
        web_url: mr.web_url,
    }
}

/// GitLab adapter driving the async `gitlab` client for gitlab.com or a
/// self-managed instance.
pub struct Gitlab {
    client: AsyncGitlab,
    runtime: BlockingRuntime,
}

impl Gitlab {
    /// Create a GitLab client for the credential's host. The client checks
    /// the token against the current user before returning.
    pub fn new(credential: &Credential, options: &ClientOptions) -> Result<Self> {
        install_crypto_provider();

        let runtime = BlockingRuntime::new(options.timeout)?;
        let (host, insecure) = gitlab_host(credential.enterprise_url());
        let token = credential.token().expose_secret().to_string();

        let mut builder = gitlab::GitlabBuilder::new(host.clone(), token);

        if insecure {
            builder.insecure();
        }

        if credential.token_kind() == TokenKind::OAuth {
            builder.oauth2_token();
        }

        let client = runtime.run(async {
            builder
                .build_async()
                .await
                .map_err(|err| map_client_error(err, &host))
        })?;

        debug!("created gitlab client for host: {host}");

        Ok(Self { client, runtime })
    }
}

impl HostAdapter for Gitlab {
    fn fetch_repository(&self, repo: &RepoPath) -> Result<RepositoryInfo> {
        let subject = repo.to_string();
        self.runtime.run(async {
            let endpoint = Project::builder()
                .project(subject.as_str())
                .build()
                .map_err(build_error)?;

            let project: ProjectInfo = endpoint
                .query_async(&self.client)
                .await
                .map_err(|err| map_api_error(err, Resource::Repository, &subject))?;

            let default_branch = project.default_branch.ok_or_else(|| {
                ManygitError::NotFound(format!("default branch of {subject}"))
            })?;

            Ok(RepositoryInfo { default_branch })
        })
    }

    fn fetch_branch(&self, repo: &RepoPath, name: &str) -> Result<BranchInfo> {
        let subject = format!("branch {name} in {repo}");
        self.runtime.run(async {
            let endpoint = Branch::builder()
                .project(repo.to_string())
                .branch(name)
                .build()
                .map_err(build_error)?;

            let branch: BranchPayload = endpoint
                .query_async(&self.client)
                .await
                .map_err(|err| map_api_error(err, Resource::Branch, &subject))?;

            Ok(BranchInfo {
                name: branch.name,
                head_sha: branch.commit.id,
            })
        })
    }

    fn list_branches(&self, repo: &RepoPath) -> Result<Vec<String>> {
        let subject = format!("branches of {repo}");
        self.runtime.run(async {
            let endpoint = Branches::builder()
                .project(repo.to_string())
                .build()
                .map_err(build_error)?;

            let branches: Vec<BranchPayload> = paged(endpoint, Pagination::All)
                .query_async(&self.client)
                .await
                .map_err(|err| {
                    map_api_error(err, Resource::Repository, &subject)
                })?;

            Ok(branches.into_iter().map(|b| b.name).collect())
        })
    }

    fn fetch_commit(&self, repo: &RepoPath, sha: &str) -> Result<CommitInfo> {
        let subject = format!("commit {sha} in {repo}");
        self.runtime.run(async {
            let endpoint = Commit::builder()
                .project(repo.to_string())
                .commit(sha)
                .build()
                .map_err(build_error)?;

            let commit: CommitPayload = endpoint
                .query_async(&self.client)
                .await
                .map_err(|err| map_api_error(err, Resource::Commit, &subject))?;

            Ok(CommitInfo {
                sha: commit.id,
                parents: commit.parent_ids,
            })
        })
    }

    fn fetch_commit_statuses(
        &self,
        repo: &RepoPath,
        sha: &str,
    ) -> Result<Vec<CommitStatus>> {
        let subject = format!("statuses of {sha} in {repo}");
        self.runtime.run(async {
            let endpoint = CommitStatuses::builder()
                .project(repo.to_string())
                .commit(sha)
                .build()
                .map_err(build_error)?;

            let statuses: Vec<StatusPayload> = paged(endpoint, Pagination::All)
                .query_async(&self.client)
                .await
                .map_err(|err| map_api_error(err, Resource::Commit, &subject))?;

            statuses.into_iter().map(status_from_payload).collect()
        })
    }

    fn fetch_tag(&self, repo: &RepoPath, name: &str) -> Result<Tag> {
        let subject = format!("tag {name} in {repo}");
        self.runtime.run(async {
            let endpoint = TagEndpoint::builder()
                .project(repo.to_string())
                .tag_name(name)
                .build()
                .map_err(build_error)?;

            let tag: TagPayload = endpoint
                .query_async(&self.client)
                .await
                .map_err(|err| map_api_error(err, Resource::Tag, &subject))?;

            Ok(tag_from_payload(tag))
        })
    }

    fn list_tags(&self, repo: &RepoPath) -> Result<Vec<Tag>> {
        let subject = format!("tags of {repo}");
        self.runtime.run(async {
            let endpoint = Tags::builder()
                .project(repo.to_string())
                .build()
                .map_err(build_error)?;

            let tags: Vec<TagPayload> = paged(endpoint, Pagination::All)
                .query_async(&self.client)
                .await
                .map_err(|err| {
                    map_api_error(err, Resource::Repository, &subject)
                })?;

            // listings carry no annotations on either host family
            Ok(tags
                .into_iter()
                .map(|t| Tag {
                    annotation: None,
                    ..tag_from_payload(t)
                })
                .collect())
        })
    }

    fn fetch_release(&self, repo: &RepoPath, tag: &str) -> Result<Release> {
        let subject = format!("release {tag} in {repo}");
        self.runtime.run(async {
            let endpoint = ProjectReleaseByTag::builder()
                .project(repo.to_string())
                .tag(escape_segment(tag)?)
                .build()
                .map_err(build_error)?;

            let release: ReleasePayload = endpoint
                .query_async(&self.client)
                .await
                .map_err(|err| map_api_error(err, Resource::Release, &subject))?;

            Ok(release_from_payload(release))
        })
    }

    fn list_releases(&self, repo: &RepoPath) -> Result<Vec<Release>> {
        let subject = format!("releases of {repo}");
        self.runtime.run(async {
            let endpoint = ProjectReleases::builder()
                .project(repo.to_string())
                .build()
                .map_err(build_error)?;

            let releases: Vec<ReleasePayload> = paged(endpoint, Pagination::All)
                .query_async(&self.client)
                .await
                .map_err(|err| {
                    map_api_error(err, Resource::Repository, &subject)
                })?;

            Ok(releases.into_iter().map(release_from_payload).collect())
        })
    }

    fn list_pull_requests(&self, repo: &RepoPath) -> Result<Vec<PullRequest>> {
        let subject = format!("merge requests of {repo}");
        self.runtime.run(async {
            let endpoint = MergeRequests::builder()
                .project(repo.to_string())
                .state(MergeRequestState::Opened)
                .build()
                .map_err(build_error)?;

            let mrs: Vec<MergeRequestPayload> = paged(endpoint, Pagination::All)
                .query_async(&self.client)
                .await
                .map_err(|err| {
                    map_api_error(err, Resource::PullRequests, &subject)
                })?;

            Ok(mrs.into_iter().map(pull_request_from_payload).collect())
        })
    }
}
