//! One typed interface for repositories hosted on GitHub, GitLab and their
//! self-hosted Enterprise instances.
//!
//! Register a credential per host on a [`ConnectionManager`], then query
//! repositories by their remote URL:
//!
//! ```no_run
//! use manygit::{CommitState, ConnectionManager, GitHubPersonalAccessTokenAuth};
//!
//! let mut manager = ConnectionManager::new();
//! manager.add_connection(GitHubPersonalAccessTokenAuth::new("ghp_...")?);
//!
//! let repo = manager.get_repo("https://github.com/acme/widget")?;
//! let passing = repo
//!     .default_branch
//!     .head
//!     .statuses
//!     .iter()
//!     .all(|s| s.status == CommitState::Success);
//! # Ok::<(), manygit::ManygitError>(())
//! ```
pub mod adapter;
pub mod config;
pub mod credential;
pub mod error;
pub mod manager;
pub mod model;
pub mod repo_url;

pub use adapter::{
    config::ClientOptions,
    factory::{AdapterFactory, DefaultAdapterFactory},
    traits::HostAdapter,
};
pub use config::ManygitConfig;
pub use credential::{
    Credential, GitHubOAuthTokenAuth, GitHubPersonalAccessTokenAuth,
    GitLabOAuthTokenAuth, GitLabPersonalAccessTokenAuth, HostFamily,
    HostIdentity, TokenKind,
};
pub use error::{ManygitError, Result};
pub use manager::ConnectionManager;
pub use model::{
    Branch, Commit, CommitState, CommitStatus, PullRequest, Release,
    Repository, Tag,
};
pub use repo_url::{ParsedRepoRef, RemoteScheme, parse};
