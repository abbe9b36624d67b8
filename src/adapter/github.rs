//! Implements the HostAdapter trait for GitHub
use log::*;
use octocrab::{
    FromResponse, Octocrab, Page,
    models::{
        Repository, Status, StatusState,
        pulls::PullRequest as GithubPullRequest,
        repos::{
            Branch as GithubBranch, Object, Ref, Release as GithubRelease,
            Tag as GithubTag,
        },
    },
    service::middleware::retry::RetryConfig,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, de::DeserializeOwned};
use url::Url;

use crate::{
    adapter::{
        config::{ClientOptions, DEFAULT_PAGE_SIZE, github_api_base},
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

// octocrab's commit model requires the full author and tree payload
#[derive(Debug, Deserialize)]
struct CommitPayload {
    sha: String,
    #[serde(default)]
    parents: Vec<ParentRef>,
}

#[derive(Debug, Deserialize)]
struct ParentRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct AnnotatedTag {
    message: Option<String>,
    object: Object,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map a GitHub commit status state onto the normalized states.
pub fn commit_state_from_github(state: StatusState) -> Result<CommitState> {
    match state {
        StatusState::Success => Ok(CommitState::Success),
        StatusState::Failure => Ok(CommitState::Failure),
        StatusState::Pending => Ok(CommitState::Pending),
        StatusState::Error => Ok(CommitState::Error),
        other => Err(ManygitError::api(format!(
            "unknown github commit state: {other:?}"
        ))),
    }
}

/// Failures before any response arrived.
fn transport_error(err: octocrab::Error, subject: &str) -> ManygitError {
    ManygitError::HostUnavailable(format!("request for {subject} failed: {err}"))
}

/// Message of a failed response. GitHub answers with a JSON `message`, but
/// proxies and outages return HTML or nothing at all.
fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.message;
    }

    match body.trim() {
        "" => reason.unwrap_or_default().to_string(),
        text => text.chars().take(200).collect(),
    }
}

/// Percent-encode `segments` into a route relative to the API root.
fn route(segments: &[&str], query: &[(&str, &str)]) -> Result<String> {
    let mut url = Url::parse("https://api.invalid/")
        .map_err(|err| ManygitError::api(format!("invalid route: {err}")))?;

    url.path_segments_mut()
        .map_err(|_| ManygitError::api("invalid route base"))?
        .pop_if_empty()
        .extend(segments);

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    Ok(match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    })
}

fn repo_route(repo: &RepoPath, rest: &[&str]) -> Result<String> {
    repo_route_with_query(repo, rest, &[])
}

fn repo_route_with_query(
    repo: &RepoPath,
    rest: &[&str],
    query: &[(&str, &str)],
) -> Result<String> {
    let mut segments = vec!["repos", repo.owner.as_str(), repo.name.as_str()];
    segments.extend_from_slice(rest);
    route(&segments, query)
}

fn release_from_github(release: GithubRelease) -> Release {
    Release {
        name: release
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| release.tag_name.clone()),
        tag_name: release.tag_name,
        body: release.body.filter(|b| !b.is_empty()),
        is_draft: release.draft,
        is_prerelease: release.prerelease,
    }
}

/// GitHub adapter using Octocrab for REST v3 calls against github.com or
/// an Enterprise instance.
pub struct Github {
    instance: Octocrab,
    runtime: BlockingRuntime,
    // path of the API root, stripped from pagination links
    base_path: String,
}

impl Github {
    /// Create a GitHub client for the credential's host.
    pub fn new(credential: &Credential, options: &ClientOptions) -> Result<Self> {
        let base_uri = github_api_base(credential.enterprise_url());
        Self::with_base_uri(credential, options, &base_uri)
    }

    /// Create a GitHub client against an explicit API root.
    pub fn with_base_uri(
        credential: &Credential,
        options: &ClientOptions,
        base_uri: &str,
    ) -> Result<Self> {
        install_crypto_provider();

        let base_path = Url::parse(base_uri)
            .map_err(|err| {
                ManygitError::invalid_credential(format!(
                    "invalid github api root {base_uri}: {err}"
                ))
            })?
            .path()
            .trim_end_matches('/')
            .to_string();

        let runtime = BlockingRuntime::new(options.timeout)?;

        let instance = {
            let _guard = runtime.enter();
            Self::build_instance(credential, base_uri)?
        };

        debug!("created github client for api: {base_uri}");

        Ok(Self {
            instance,
            runtime,
            base_path,
        })
    }

    fn build_instance(credential: &Credential, base_uri: &str) -> Result<Octocrab> {
        // failures surface immediately, the caller decides on retries
        let builder = Octocrab::builder().add_retry_config(RetryConfig::None);

        let token = credential.token().expose_secret().to_string();

        let builder = match (credential.token_kind(), credential.username()) {
            (TokenKind::PersonalAccessToken, Some(username)) => {
                builder.basic_auth(username.to_string(), token)
            }
            _ => builder.personal_token(token),
        };

        builder
            .base_uri(base_uri)
            .and_then(|b| b.build())
            .map_err(|err| {
                ManygitError::invalid_credential(format!(
                    "failed to build github client for {base_uri}: {err}"
                ))
            })
    }

    /// GET `route` and decode the body. The status is checked before the
    /// body is decoded, so error pages of any shape keep their status.
    async fn get<R: FromResponse>(
        &self,
        route: String,
        resource: Resource,
        subject: &str,
    ) -> Result<R> {
        debug!("GET {route}");

        let response = self
            .instance
            ._get(route.as_str())
            .await
            .map_err(|err| transport_error(err, subject))?;

        let status = response.status();

        if !status.is_success() {
            let body = self
                .instance
                .body_to_string(response)
                .await
                .unwrap_or_default();

            return Err(ManygitError::from_status(
                status.as_u16(),
                &error_message(&body, status.canonical_reason()),
                resource,
                subject,
            ));
        }

        R::from_response(response).await.map_err(|err| {
            ManygitError::api(format!("unexpected response for {subject}: {err}"))
        })
    }

    /// Follow `next` links until the last page.
    async fn get_all<T: DeserializeOwned>(
        &self,
        route: String,
        resource: Resource,
        subject: &str,
    ) -> Result<Vec<T>> {
        let mut page: Page<T> = self.get(route, resource, subject).await?;
        let mut items = page.take_items();

        while let Some(next) = self.next_route(&page) {
            page = self.get(next, resource, subject).await?;
            items.append(&mut page.take_items());
        }

        Ok(items)
    }

    /// Links are absolute, while routes are relative to the API root.
    fn next_route<T>(&self, page: &Page<T>) -> Option<String> {
        let pq = page.next.as_ref()?.path_and_query()?.as_str();
        Some(pq.strip_prefix(self.base_path.as_str()).unwrap_or(pq).to_string())
    }
}

impl HostAdapter for Github {
    fn fetch_repository(&self, repo: &RepoPath) -> Result<RepositoryInfo> {
        let subject = repo.to_string();
        self.runtime.run(async {
            let info: Repository = self
                .get(repo_route(repo, &[])?, Resource::Repository, &subject)
                .await?;

            let default_branch = info.default_branch.ok_or_else(|| {
                ManygitError::NotFound(format!("default branch of {subject}"))
            })?;

            Ok(RepositoryInfo { default_branch })
        })
    }

    fn fetch_branch(&self, repo: &RepoPath, name: &str) -> Result<BranchInfo> {
        let subject = format!("branch {name} in {repo}");
        self.runtime.run(async {
            let branch: GithubBranch = self
                .get(
                    repo_route(repo, &["branches", name])?,
                    Resource::Branch,
                    &subject,
                )
                .await?;

            Ok(BranchInfo {
                name: branch.name,
                head_sha: branch.commit.sha,
            })
        })
    }

    fn list_branches(&self, repo: &RepoPath) -> Result<Vec<String>> {
        let subject = format!("branches of {repo}");
        let per_page = DEFAULT_PAGE_SIZE.to_string();
        self.runtime.run(async {
            let branches: Vec<GithubBranch> = self
                .get_all(
                    repo_route_with_query(
                        repo,
                        &["branches"],
                        &[("per_page", &per_page)],
                    )?,
                    Resource::Repository,
                    &subject,
                )
                .await?;

            Ok(branches.into_iter().map(|b| b.name).collect())
        })
    }

    fn fetch_commit(&self, repo: &RepoPath, sha: &str) -> Result<CommitInfo> {
        let subject = format!("commit {sha} in {repo}");
        self.runtime.run(async {
            let commit: CommitPayload = self
                .get(
                    repo_route(repo, &["commits", sha])?,
                    Resource::Commit,
                    &subject,
                )
                .await?;

            Ok(CommitInfo {
                sha: commit.sha,
                parents: commit.parents.into_iter().map(|p| p.sha).collect(),
            })
        })
    }

    fn fetch_commit_statuses(
        &self,
        repo: &RepoPath,
        sha: &str,
    ) -> Result<Vec<CommitStatus>> {
        let subject = format!("statuses of {sha} in {repo}");
        let per_page = DEFAULT_PAGE_SIZE.to_string();
        self.runtime.run(async {
            let statuses: Vec<Status> = self
                .get_all(
                    repo_route_with_query(
                        repo,
                        &["commits", sha, "statuses"],
                        &[("per_page", &per_page)],
                    )?,
                    Resource::Commit,
                    &subject,
                )
                .await?;

            statuses
                .into_iter()
                .map(|s| {
                    Ok(CommitStatus {
                        status: commit_state_from_github(s.state)?,
                        context: s.context.unwrap_or_default(),
                        description: s.description,
                        target_url: s.target_url,
                    })
                })
                .collect()
        })
    }

    fn fetch_tag(&self, repo: &RepoPath, name: &str) -> Result<Tag> {
        let subject = format!("tag {name} in {repo}");
        self.runtime.run(async {
            let git_ref: Ref = self
                .get(
                    repo_route(repo, &["git", "ref", "tags", name])?,
                    Resource::Tag,
                    &subject,
                )
                .await?;

            let tag_sha = match git_ref.object {
                // lightweight tags point straight at the commit
                Object::Commit { sha, .. } => {
                    return Ok(Tag {
                        name: name.to_string(),
                        commit_sha: sha,
                        annotation: None,
                    });
                }
                Object::Tag { sha, .. } => sha,
                other => {
                    return Err(ManygitError::api(format!(
                        "unexpected object for {subject}: {other:?}"
                    )));
                }
            };

            let annotated: AnnotatedTag = self
                .get(
                    repo_route(repo, &["git", "tags", &tag_sha])?,
                    Resource::Tag,
                    &subject,
                )
                .await?;

            let commit_sha = match annotated.object {
                Object::Commit { sha, .. } => sha,
                other => {
                    return Err(ManygitError::api(format!(
                        "tag {name} in {repo} does not point at a commit: {other:?}"
                    )));
                }
            };

            Ok(Tag {
                name: name.to_string(),
                commit_sha,
                annotation: annotated.message.filter(|m| !m.is_empty()),
            })
        })
    }

    fn list_tags(&self, repo: &RepoPath) -> Result<Vec<Tag>> {
        let subject = format!("tags of {repo}");
        let per_page = DEFAULT_PAGE_SIZE.to_string();
        self.runtime.run(async {
            let tags: Vec<GithubTag> = self
                .get_all(
                    repo_route_with_query(
                        repo,
                        &["tags"],
                        &[("per_page", &per_page)],
                    )?,
                    Resource::Repository,
                    &subject,
                )
                .await?;

            Ok(tags
                .into_iter()
                .map(|t| Tag {
                    name: t.name,
                    commit_sha: t.commit.sha,
                    annotation: None,
                })
                .collect())
        })
    }

    fn fetch_release(&self, repo: &RepoPath, tag: &str) -> Result<Release> {
        let subject = format!("release {tag} in {repo}");
        self.runtime.run(async {
            let release: GithubRelease = self
                .get(
                    repo_route(repo, &["releases", "tags", tag])?,
                    Resource::Release,
                    &subject,
                )
                .await?;

            Ok(release_from_github(release))
        })
    }

    fn list_releases(&self, repo: &RepoPath) -> Result<Vec<Release>> {
        let subject = format!("releases of {repo}");
        let per_page = DEFAULT_PAGE_SIZE.to_string();
        self.runtime.run(async {
            let releases: Vec<GithubRelease> = self
                .get_all(
                    repo_route_with_query(
                        repo,
                        &["releases"],
                        &[("per_page", &per_page)],
                    )?,
                    Resource::Repository,
                    &subject,
                )
                .await?;

            Ok(releases.into_iter().map(release_from_github).collect())
        })
    }

    fn list_pull_requests(&self, repo: &RepoPath) -> Result<Vec<PullRequest>> {
        let subject = format!("pull requests of {repo}");
        let per_page = DEFAULT_PAGE_SIZE.to_string();
        self.runtime.run(async {
            let pulls: Vec<GithubPullRequest> = self
                .get_all(
                    repo_route_with_query(
                        repo,
                        &["pulls"],
                        &[("state", "open"), ("per_page", &per_page)],
                    )?,
                    Resource::PullRequests,
                    &subject,
                )
                .await?;

            Ok(pulls
                .into_iter()
                .map(|p| PullRequest {
                    number: p.number,
                    title: p.title.unwrap_or_default(),
                    base: p.base.ref_field,
                    source: p.head.ref_field,
                    source_sha: p.head.sha,
                    web_url: p.html_url.map(String::from).unwrap_or_default(),
                })
                .collect())
        })
    }
}
