//! Configuration loading for connection manager setups kept in TOML files.
//!
//! ```toml
//! timeout_secs = 30
//!
//! [[connection]]
//! host = "github"
//! auth = "personal_access_token"
//! token = "ghp_..."
//! username = "octocat"
//! enterprise_url = "https://ghe.example.com"
//! ```
//!
//! Tokens left out of the file are read from `GITHUB_TOKEN` or
//! `GITLAB_TOKEN`.
use log::*;
use serde::Deserialize;
use std::{env, fs, path::Path, time::Duration};

use crate::{
    adapter::config::{ClientOptions, DEFAULT_TIMEOUT_SECS},
    credential::{
        Credential, GitHubOAuthTokenAuth, GitHubPersonalAccessTokenAuth,
        GitLabOAuthTokenAuth, GitLabPersonalAccessTokenAuth, HostFamily,
    },
    error::{ManygitError, Result},
    manager::ConnectionManager,
};

/// How a configured token authenticates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    #[default]
    PersonalAccessToken,
    #[serde(alias = "oauth_token")]
    Oauth,
}

/// One `[[connection]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Host family name, `github` or `gitlab`.
    pub host: String,
    #[serde(default)]
    pub auth: AuthKind,
    /// Falls back to the family's token environment variable when absent.
    pub token: Option<String>,
    /// GitHub personal access tokens only.
    pub username: Option<String>,
    /// Base URL of an Enterprise or self-hosted instance.
    pub enterprise_url: Option<String>,
}

/// Root of a manygit configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManygitConfig {
    /// Upper bound for a single host request.
    pub timeout_secs: u64,
    #[serde(rename = "connection")]
    pub connections: Vec<ConnectionConfig>,
}

impl Default for ManygitConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connections: vec![],
        }
    }
}

impl ManygitConfig {
    /// Read and parse the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ManygitConfig = toml::from_str(content)?;

        if config.timeout_secs == 0 {
            return Err(ManygitError::invalid_config(
                "timeout_secs must be greater than zero",
            ));
        }

        Ok(config)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::with_timeout(Duration::from_secs(self.timeout_secs))
    }

    /// Resolve every connection entry into a credential, in file order.
    pub fn credentials(&self) -> Result<Vec<Credential>> {
        self.connections.iter().map(ConnectionConfig::credential).collect()
    }

    /// Build a manager with every configured credential registered. Later
    /// entries for the same host replace earlier ones.
    pub fn into_manager(self) -> Result<ConnectionManager> {
        let credentials = self.credentials()?;
        let mut manager = ConnectionManager::with_options(self.client_options());

        for credential in credentials {
            manager.add_connection(credential);
        }

        Ok(manager)
    }
}

impl ConnectionConfig {
    /// Build the credential this entry describes.
    pub fn credential(&self) -> Result<Credential> {
        let family: HostFamily = self.host.parse()?;
        let token = self.resolve_token(family)?;

        if self.username.is_some()
            && (family != HostFamily::GitHub
                || self.auth != AuthKind::PersonalAccessToken)
        {
            return Err(ManygitError::invalid_config(format!(
                "username is only supported for github personal access tokens, found on {} {:?}",
                family, self.auth
            )));
        }

        let enterprise_url = self.enterprise_url.as_deref();

        let credential: Credential = match (family, self.auth) {
            (HostFamily::GitHub, AuthKind::PersonalAccessToken) => {
                let mut auth = GitHubPersonalAccessTokenAuth::new(token)?;
                if let Some(username) = &self.username {
                    auth = auth.with_username(username.as_str())?;
                }
                if let Some(url) = enterprise_url {
                    auth = auth.with_enterprise_url(url)?;
                }
                auth.into()
            }
            (HostFamily::GitHub, AuthKind::Oauth) => {
                let mut auth = GitHubOAuthTokenAuth::new(token)?;
                if let Some(url) = enterprise_url {
                    auth = auth.with_enterprise_url(url)?;
                }
                auth.into()
            }
            (HostFamily::GitLab, AuthKind::PersonalAccessToken) => {
                let mut auth = GitLabPersonalAccessTokenAuth::new(token)?;
                if let Some(url) = enterprise_url {
                    auth = auth.with_enterprise_url(url)?;
                }
                auth.into()
            }
            (HostFamily::GitLab, AuthKind::Oauth) => {
                let mut auth = GitLabOAuthTokenAuth::new(token)?;
                if let Some(url) = enterprise_url {
                    auth = auth.with_enterprise_url(url)?;
                }
                auth.into()
            }
        };

        Ok(credential)
    }

    fn resolve_token(&self, family: HostFamily) -> Result<String> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.trim().is_empty())
        {
            return Ok(token.clone());
        }

        let var = family.token_env_var();

        match env::var(var) {
            Ok(token) if !token.trim().is_empty() => {
                debug!("using token from {var} for {family}");
                Ok(token)
            }
            _ => Err(ManygitError::invalid_config(format!(
                "no token configured for {family} and {var} is not set"
            ))),
        }
    }
}
