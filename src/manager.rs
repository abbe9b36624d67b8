//! Credential table and dispatch of repository queries to host adapters.
use log::*;
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use crate::{
    adapter::{
        config::ClientOptions,
        factory::{AdapterFactory, DefaultAdapterFactory},
        traits::HostAdapter,
    },
    credential::{Credential, HostIdentity},
    error::{ManygitError, Result},
    model::{Branch, Commit, PullRequest, Release, Repository, Tag},
    repo_url::{self, ParsedRepoRef, RemoteScheme, RepoPath},
};

struct Connection {
    credential: Credential,
    // built on first use, dropped with the connection
    adapter: RefCell<Option<Rc<dyn HostAdapter>>>,
}

impl Connection {
    fn new(credential: Credential) -> Self {
        Self {
            credential,
            adapter: RefCell::new(None),
        }
    }
}

/// Holds one credential per host and answers repository queries by URL.
///
/// The manager is single threaded. Each query blocks until the host answers
/// or the configured timeout elapses, and nothing is cached between calls
/// apart from the authenticated client for each host.
pub struct ConnectionManager {
    connections: BTreeMap<HostIdentity, Connection>,
    options: ClientOptions,
    factory: Box<dyn AdapterFactory>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::with_options(ClientOptions::default())
    }

    pub fn with_options(options: ClientOptions) -> Self {
        Self::with_factory(options, Box::new(DefaultAdapterFactory))
    }

    /// Use a custom factory to build adapters for registered credentials.
    pub fn with_factory(
        options: ClientOptions,
        factory: Box<dyn AdapterFactory>,
    ) -> Self {
        Self {
            connections: BTreeMap::new(),
            options,
            factory,
        }
    }

    /// Register `credential` for its host, replacing any previous one.
    /// Nothing is sent to the host until the first query.
    pub fn add_connection(&mut self, credential: impl Into<Credential>) {
        let credential = credential.into();
        let host = credential.host_identity();

        let unchanged = self
            .connections
            .get(&host)
            .is_some_and(|existing| existing.credential == credential);

        if unchanged {
            debug!("credential for {host} already registered");
            return;
        }

        info!("registering {} credential for {host}", credential.family());

        self.connections.insert(host, Connection::new(credential));
    }

    /// Forget the credential for `host`, returning it if one was registered.
    pub fn remove_connection(&mut self, host: &str) -> Option<Credential> {
        let host = HostIdentity::new(host);
        let removed = self.connections.remove(&host).map(|c| c.credential);

        if removed.is_some() {
            info!("removed credential for {host}");
        }

        removed
    }

    /// Registered host identities in sorted order.
    pub fn hosts(&self) -> Vec<HostIdentity> {
        self.connections.keys().cloned().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Fetch a repository together with its default branch, the head commit
    /// of that branch and the statuses reported against it.
    pub fn get_repo(&self, url: &str) -> Result<Repository> {
        let (parsed, adapter) = self.resolve(url)?;
        let repo = parsed.repo_path();

        let info = adapter.fetch_repository(&repo)?;
        debug!("{repo} default branch: {}", info.default_branch);

        let default_branch =
            self.load_branch(adapter.as_ref(), &repo, &info.default_branch)?;

        Ok(Repository {
            host: parsed.host,
            owner: parsed.owner,
            name: parsed.name,
            default_branch,
        })
    }

    pub fn get_branch(&self, url: &str, name: &str) -> Result<Branch> {
        let (parsed, adapter) = self.resolve(url)?;
        self.load_branch(adapter.as_ref(), &parsed.repo_path(), name)
    }

    pub fn list_branches(&self, url: &str) -> Result<Vec<String>> {
        let (parsed, adapter) = self.resolve(url)?;
        adapter.list_branches(&parsed.repo_path())
    }

    pub fn get_commit(&self, url: &str, sha: &str) -> Result<Commit> {
        let (parsed, adapter) = self.resolve(url)?;
        self.load_commit(adapter.as_ref(), &parsed.repo_path(), sha)
    }

    pub fn get_tag(&self, url: &str, name: &str) -> Result<Tag> {
        let (parsed, adapter) = self.resolve(url)?;
        adapter.fetch_tag(&parsed.repo_path(), name)
    }

    pub fn list_tags(&self, url: &str) -> Result<Vec<Tag>> {
        let (parsed, adapter) = self.resolve(url)?;
        adapter.list_tags(&parsed.repo_path())
    }

    /// Fetch the release published for `tag`.
    pub fn get_release(&self, url: &str, tag: &str) -> Result<Release> {
        let (parsed, adapter) = self.resolve(url)?;
        adapter.fetch_release(&parsed.repo_path(), tag)
    }

    pub fn list_releases(&self, url: &str) -> Result<Vec<Release>> {
        let (parsed, adapter) = self.resolve(url)?;
        adapter.list_releases(&parsed.repo_path())
    }

    /// Open pull requests, or merge requests on GitLab.
    pub fn list_pull_requests(&self, url: &str) -> Result<Vec<PullRequest>> {
        let (parsed, adapter) = self.resolve(url)?;
        adapter.list_pull_requests(&parsed.repo_path())
    }

    fn load_branch(
        &self,
        adapter: &dyn HostAdapter,
        repo: &RepoPath,
        name: &str,
    ) -> Result<Branch> {
        let branch = adapter.fetch_branch(repo, name)?;
        let head = self.load_commit(adapter, repo, &branch.head_sha)?;

        Ok(Branch {
            name: branch.name,
            head,
        })
    }

    fn load_commit(
        &self,
        adapter: &dyn HostAdapter,
        repo: &RepoPath,
        sha: &str,
    ) -> Result<Commit> {
        let commit = adapter.fetch_commit(repo, sha)?;
        let statuses = adapter.fetch_commit_statuses(repo, &commit.sha)?;

        debug!(
            "{repo} commit {} has {} statuses",
            commit.sha,
            statuses.len()
        );

        Ok(Commit {
            sha: commit.sha,
            parents: commit.parents,
            statuses,
        })
    }

    /// Parse `url` and find the adapter for its host.
    fn resolve(&self, url: &str) -> Result<(ParsedRepoRef, Rc<dyn HostAdapter>)> {
        let parsed = repo_url::parse(url)?;
        let host = parsed.host_identity();

        let (registered, connection) = self
            .find_connection(&host, parsed.scheme)
            .ok_or_else(|| ManygitError::NoCredential(host.to_string()))?;

        let adapter = self.adapter_for(registered, connection)?;

        Ok((parsed, adapter))
    }

    /// Exact identity first. SSH remotes carry no port, so they also match
    /// an instance registered as `host:port` (lowest port wins).
    fn find_connection(
        &self,
        host: &HostIdentity,
        scheme: RemoteScheme,
    ) -> Option<(&HostIdentity, &Connection)> {
        if let Some(found) = self.connections.get_key_value(host) {
            return Some(found);
        }

        if scheme != RemoteScheme::Ssh {
            return None;
        }

        self.connections
            .iter()
            .find(|(registered, _)| registered.hostname() == host.as_str())
    }

    fn adapter_for(
        &self,
        host: &HostIdentity,
        connection: &Connection,
    ) -> Result<Rc<dyn HostAdapter>> {
        if let Some(adapter) = connection.adapter.borrow().as_ref() {
            return Ok(Rc::clone(adapter));
        }

        debug!("creating {} adapter for {host}", connection.credential.family());

        let adapter: Rc<dyn HostAdapter> = Rc::from(
            self.factory.create(&connection.credential, &self.options)?,
        );

        connection.adapter.replace(Some(Rc::clone(&adapter)));

        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adapter::{
            factory::MockAdapterFactory,
            traits::MockHostAdapter,
            types::{BranchInfo, CommitInfo, RepositoryInfo},
        },
        credential::{GitHubPersonalAccessTokenAuth, GitLabPersonalAccessTokenAuth},
        model::{CommitState, CommitStatus},
    };
    use mockall::predicate::eq;

    const SHA: &str = "0123456789abcdef0123456789abcdef01234567";
    const PARENT: &str = "89abcdef0123456789abcdef0123456789abcdef";

    fn github_pat(token: &str) -> Credential {
        GitHubPersonalAccessTokenAuth::new(token).unwrap().into()
    }

    fn successful_adapter() -> MockHostAdapter {
        let mut adapter = MockHostAdapter::new();

        adapter
            .expect_fetch_repository()
            .with(eq(RepoPath::new("acme", "widget")))
            .returning(|_| {
                Ok(RepositoryInfo {
                    default_branch: "main".into(),
                })
            });

        adapter
            .expect_fetch_branch()
            .withf(|repo, name| repo.to_string() == "acme/widget" && name == "main")
            .returning(|_, name| {
                Ok(BranchInfo {
                    name: name.to_string(),
                    head_sha: SHA.into(),
                })
            });

        adapter.expect_fetch_commit().returning(|_, sha| {
            Ok(CommitInfo {
                sha: sha.to_string(),
                parents: vec![PARENT.into()],
            })
        });

        adapter.expect_fetch_commit_statuses().returning(|_, _| {
            Ok(vec![CommitStatus {
                context: "ci/build".into(),
                status: CommitState::Success,
                description: Some("passed".into()),
                target_url: None,
            }])
        });

        adapter
    }

    fn manager_with(adapter: MockHostAdapter) -> ConnectionManager {
        let mut factory = MockAdapterFactory::new();
        let mut adapter = Some(adapter);
        factory
            .expect_create()
            .times(1)
            .returning(move |_, _| match adapter.take() {
                Some(a) => Ok(Box::new(a) as Box<dyn HostAdapter>),
                None => Err(ManygitError::api("adapter already created")),
            });

        ConnectionManager::with_factory(
            ClientOptions::default(),
            Box::new(factory),
        )
    }

    #[test_log::test]
    fn get_repo_composes_default_branch_head() {
        let mut manager = manager_with(successful_adapter());
        manager.add_connection(github_pat("ghp_token"));

        let repo = manager.get_repo("https://github.com/acme/widget").unwrap();

        assert_eq!(repo.host, "github.com");
        assert_eq!(repo.owner, "acme");
        assert_eq!(repo.name, "widget");
        assert_eq!(repo.default_branch.name, "main");
        assert_eq!(repo.default_branch.head.sha, SHA);
        assert_eq!(repo.default_branch.head.parents, vec![PARENT.to_string()]);
        assert_eq!(repo.default_branch.head.statuses.len(), 1);
        assert_eq!(
            repo.default_branch.head.statuses[0].status,
            CommitState::Success
        );
    }

    #[test_log::test]
    fn ssh_and_https_urls_resolve_the_same_repo() {
        let mut manager = manager_with(successful_adapter());
        manager.add_connection(github_pat("ghp_token"));

        let https = manager.get_repo("https://github.com/acme/widget.git").unwrap();
        let ssh = manager.get_repo("git@github.com:acme/widget.git").unwrap();

        assert_eq!(https, ssh);
    }

    #[test_log::test]
    fn adapter_is_built_once_per_connection() {
        // manager_with allows a single create call
        let mut manager = manager_with(successful_adapter());
        manager.add_connection(github_pat("ghp_token"));

        manager.get_repo("https://github.com/acme/widget").unwrap();
        manager.get_repo("https://github.com/acme/widget").unwrap();
    }

    #[test_log::test]
    fn missing_repository_is_reported() {
        let mut adapter = MockHostAdapter::new();
        adapter.expect_fetch_repository().returning(|repo| {
            Err(ManygitError::RepositoryNotFound(repo.to_string()))
        });
        adapter.expect_fetch_branch().never();

        let mut manager = manager_with(adapter);
        manager.add_connection(github_pat("ghp_token"));

        let err = manager
            .get_repo("https://github.com/acme/missing")
            .unwrap_err();

        assert!(matches!(err, ManygitError::RepositoryNotFound(_)));
    }

    #[test_log::test]
    fn no_credential_for_other_host() {
        let mut factory = MockAdapterFactory::new();
        factory.expect_create().never();

        let mut manager = ConnectionManager::with_factory(
            ClientOptions::default(),
            Box::new(factory),
        );
        manager.add_connection(github_pat("ghp_token"));

        let err = manager
            .get_repo("https://gitlab.com/acme/widget")
            .unwrap_err();

        assert!(matches!(err, ManygitError::NoCredential(host) if host == "gitlab.com"));
    }

    #[test_log::test]
    fn invalid_url_fails_before_lookup() {
        let mut factory = MockAdapterFactory::new();
        factory.expect_create().never();

        let manager = ConnectionManager::with_factory(
            ClientOptions::default(),
            Box::new(factory),
        );

        let err = manager.get_repo("not a url").unwrap_err();
        assert!(matches!(err, ManygitError::InvalidUrl(_)));
    }

    #[test]
    fn identical_credential_is_not_duplicated() {
        let mut manager = ConnectionManager::new();

        manager.add_connection(github_pat("ghp_token"));
        manager.add_connection(github_pat("ghp_token"));

        assert_eq!(manager.connection_count(), 1);
        assert_eq!(manager.hosts(), vec![HostIdentity::new("github.com")]);
    }

    #[test]
    fn new_credential_replaces_old_one() {
        let mut manager = ConnectionManager::new();

        manager.add_connection(github_pat("old"));
        manager.add_connection(github_pat("new"));

        assert_eq!(manager.connection_count(), 1);
        let removed = manager.remove_connection("github.com").unwrap();
        assert_eq!(removed, github_pat("new"));
    }

    #[test]
    fn hosts_are_sorted() {
        let mut manager = ConnectionManager::new();

        manager.add_connection(
            GitLabPersonalAccessTokenAuth::new("glpat").unwrap(),
        );
        manager.add_connection(
            Credential::github_enterprise("https://ghe.example.com", "ghp")
                .unwrap(),
        );
        manager.add_connection(github_pat("ghp"));

        let hosts: Vec<String> =
            manager.hosts().iter().map(|h| h.to_string()).collect();

        assert_eq!(hosts, vec!["ghe.example.com", "github.com", "gitlab.com"]);
    }

    #[test_log::test]
    fn removing_connection_restores_no_credential() {
        let mut factory = MockAdapterFactory::new();
        factory.expect_create().never();

        let mut manager = ConnectionManager::with_factory(
            ClientOptions::default(),
            Box::new(factory),
        );
        manager.add_connection(github_pat("ghp_token"));

        assert!(manager.remove_connection("GitHub.com").is_some());
        assert!(manager.remove_connection("github.com").is_none());

        let err = manager
            .get_repo("https://github.com/acme/widget")
            .unwrap_err();
        assert!(matches!(err, ManygitError::NoCredential(_)));
    }

    #[test_log::test]
    fn missing_branch_is_not_found() {
        let mut adapter = MockHostAdapter::new();
        adapter
            .expect_fetch_branch()
            .returning(|_, name| Err(ManygitError::NotFound(name.to_string())));

        let mut manager = manager_with(adapter);
        manager.add_connection(github_pat("ghp_token"));

        let err = manager
            .get_branch("https://github.com/acme/widget", "gone")
            .unwrap_err();

        assert!(matches!(err, ManygitError::NotFound(_)));
    }

    #[test_log::test]
    fn get_commit_includes_statuses() {
        let mut manager = manager_with(successful_adapter());
        manager.add_connection(github_pat("ghp_token"));

        let commit = manager
            .get_commit("https://github.com/acme/widget", SHA)
            .unwrap();

        assert_eq!(commit.sha, SHA);
        assert_eq!(commit.statuses[0].context, "ci/build");
    }

    #[test_log::test]
    fn nested_gitlab_namespace_is_passed_through() {
        let mut adapter = MockHostAdapter::new();
        adapter
            .expect_list_tags()
            .with(eq(RepoPath::new("group/sub", "project")))
            .returning(|_| {
                Ok(vec![Tag {
                    name: "v1.0.0".into(),
                    commit_sha: SHA.into(),
                    annotation: None,
                }])
            });

        let mut manager = manager_with(adapter);
        manager
            .add_connection(GitLabPersonalAccessTokenAuth::new("glpat").unwrap());

        let tags = manager
            .list_tags("https://gitlab.com/group/sub/project.git")
            .unwrap();

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "v1.0.0");
    }

    #[test_log::test]
    fn ssh_remote_matches_instance_registered_with_port() {
        let mut adapter = MockHostAdapter::new();
        adapter
            .expect_list_branches()
            .returning(|_| Ok(vec!["main".into()]));

        let mut manager = manager_with(adapter);
        manager.add_connection(
            Credential::github_enterprise("https://ghe.example.com:8443", "ghp")
                .unwrap(),
        );

        let branches = manager
            .list_branches("git@ghe.example.com:acme/widget.git")
            .unwrap();
        assert_eq!(branches, vec!["main"]);

        // https keeps the port, so a port-less https url is another host
        let err = manager
            .list_branches("https://ghe.example.com/acme/widget")
            .unwrap_err();
        assert!(matches!(err, ManygitError::NoCredential(_)));
    }

    #[test_log::test]
    fn lists_releases() {
        let mut adapter = MockHostAdapter::new();
        adapter.expect_list_releases().returning(|_| {
            Ok(vec![Release {
                tag_name: "v2.0.0".into(),
                name: "Second".into(),
                body: None,
                is_draft: false,
                is_prerelease: true,
            }])
        });

        let mut manager = manager_with(adapter);
        manager.add_connection(github_pat("ghp_token"));

        let releases = manager
            .list_releases("https://github.com/acme/widget")
            .unwrap();

        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].name, "Second");
        assert!(releases[0].is_prerelease);
    }

    #[test_log::test]
    fn adapter_creation_failure_is_returned() {
        let mut factory = MockAdapterFactory::new();
        factory.expect_create().returning(|_, _| {
            Err(ManygitError::Authentication("bad token".into()))
        });

        let mut manager = ConnectionManager::with_factory(
            ClientOptions::default(),
            Box::new(factory),
        );
        manager.add_connection(github_pat("ghp_token"));

        let err = manager
            .list_pull_requests("https://github.com/acme/widget")
            .unwrap_err();

        assert!(matches!(err, ManygitError::Authentication(_)));
    }
}
