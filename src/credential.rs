//! Authentication material for each supported host family.
//!
//! Credentials are a closed set of variants, one per host family and
//! authentication mode. Enterprise (self-hosted) instances use the same
//! types with an `enterprise_url` pointing at the instance.
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use url::Url;

use crate::error::{ManygitError, Result};

/// Public GitHub host.
pub const GITHUB_HOST: &str = "github.com";
/// Public GitLab host.
pub const GITLAB_HOST: &str = "gitlab.com";

/// The kind of software a host runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostFamily {
    GitHub,
    GitLab,
}

impl HostFamily {
    /// Host used when a credential carries no enterprise URL.
    pub fn default_host(&self) -> &'static str {
        match self {
            HostFamily::GitHub => GITHUB_HOST,
            HostFamily::GitLab => GITLAB_HOST,
        }
    }

    /// Environment variable consulted for a token when none is configured.
    pub fn token_env_var(&self) -> &'static str {
        match self {
            HostFamily::GitHub => "GITHUB_TOKEN",
            HostFamily::GitLab => "GITLAB_TOKEN",
        }
    }
}

impl fmt::Display for HostFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostFamily::GitHub => write!(f, "github"),
            HostFamily::GitLab => write!(f, "gitlab"),
        }
    }
}

impl FromStr for HostFamily {
    type Err = ManygitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(HostFamily::GitHub),
            "gitlab" => Ok(HostFamily::GitLab),
            other => Err(ManygitError::UnsupportedHost(other.to_string())),
        }
    }
}

/// Normalized `host[:port]` key of the credential table.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct HostIdentity(String);

impl HostIdentity {
    pub fn new(host: &str) -> Self {
        Self(host.trim().to_ascii_lowercase())
    }

    /// Derive the identity of an instance from its base URL.
    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url.host_str().ok_or_else(|| {
            ManygitError::invalid_credential(format!("no host in url: {url}"))
        })?;

        match url.port() {
            Some(port) => Ok(Self::new(&format!("{host}:{port}"))),
            None => Ok(Self::new(host)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity without any `:port` suffix.
    pub fn hostname(&self) -> &str {
        match self.0.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
                host
            }
            _ => &self.0,
        }
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// GitHub personal access token, optionally paired with the username it
/// belongs to.
///
/// Fields are only reachable through the validating constructors:
///
/// ```compile_fail
/// let auth = manygit::GitHubPersonalAccessTokenAuth {
///     username: None,
///     personal_access_token: "".into(),
///     enterprise_url: None,
/// };
/// ```
#[derive(Clone)]
pub struct GitHubPersonalAccessTokenAuth {
    username: Option<String>,
    personal_access_token: SecretString,
    enterprise_url: Option<Url>,
}

impl GitHubPersonalAccessTokenAuth {
    pub fn new(personal_access_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            username: None,
            personal_access_token: validate_token(
                personal_access_token.into(),
            )?,
            enterprise_url: None,
        })
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Result<Self> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(ManygitError::invalid_credential(
                "username must not be empty",
            ));
        }
        self.username = Some(username);
        Ok(self)
    }

    pub fn with_enterprise_url(mut self, base_url: &str) -> Result<Self> {
        self.enterprise_url = Some(validate_base_url(base_url)?);
        Ok(self)
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn personal_access_token(&self) -> &SecretString {
        &self.personal_access_token
    }

    pub fn enterprise_url(&self) -> Option<&Url> {
        self.enterprise_url.as_ref()
    }
}

/// GitHub OAuth token.
#[derive(Clone)]
pub struct GitHubOAuthTokenAuth {
    oauth_token: SecretString,
    enterprise_url: Option<Url>,
}

impl GitHubOAuthTokenAuth {
    pub fn new(oauth_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            oauth_token: validate_token(oauth_token.into())?,
            enterprise_url: None,
        })
    }

    pub fn with_enterprise_url(mut self, base_url: &str) -> Result<Self> {
        self.enterprise_url = Some(validate_base_url(base_url)?);
        Ok(self)
    }

    pub fn oauth_token(&self) -> &SecretString {
        &self.oauth_token
    }

    pub fn enterprise_url(&self) -> Option<&Url> {
        self.enterprise_url.as_ref()
    }
}

/// GitLab personal access token.
#[derive(Clone)]
pub struct GitLabPersonalAccessTokenAuth {
    personal_access_token: SecretString,
    enterprise_url: Option<Url>,
}

impl GitLabPersonalAccessTokenAuth {
    pub fn new(personal_access_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            personal_access_token: validate_token(
                personal_access_token.into(),
            )?,
            enterprise_url: None,
        })
    }

    pub fn with_enterprise_url(mut self, base_url: &str) -> Result<Self> {
        self.enterprise_url = Some(validate_base_url(base_url)?);
        Ok(self)
    }

    pub fn personal_access_token(&self) -> &SecretString {
        &self.personal_access_token
    }

    pub fn enterprise_url(&self) -> Option<&Url> {
        self.enterprise_url.as_ref()
    }
}

/// GitLab OAuth2 token.
#[derive(Clone)]
pub struct GitLabOAuthTokenAuth {
    oauth_token: SecretString,
    enterprise_url: Option<Url>,
}

impl GitLabOAuthTokenAuth {
    pub fn new(oauth_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            oauth_token: validate_token(oauth_token.into())?,
            enterprise_url: None,
        })
    }

    pub fn with_enterprise_url(mut self, base_url: &str) -> Result<Self> {
        self.enterprise_url = Some(validate_base_url(base_url)?);
        Ok(self)
    }

    pub fn oauth_token(&self) -> &SecretString {
        &self.oauth_token
    }

    pub fn enterprise_url(&self) -> Option<&Url> {
        self.enterprise_url.as_ref()
    }
}

/// How a token is presented to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    PersonalAccessToken,
    OAuth,
}

/// Any supported credential.
#[derive(Clone)]
pub enum Credential {
    GitHubPersonalAccessToken(GitHubPersonalAccessTokenAuth),
    GitHubOAuthToken(GitHubOAuthTokenAuth),
    GitLabPersonalAccessToken(GitLabPersonalAccessTokenAuth),
    GitLabOAuthToken(GitLabOAuthTokenAuth),
}

impl Credential {
    /// Personal access token for a GitHub Enterprise instance.
    pub fn github_enterprise(
        base_url: &str,
        personal_access_token: impl Into<String>,
    ) -> Result<Self> {
        Ok(GitHubPersonalAccessTokenAuth::new(personal_access_token)?
            .with_enterprise_url(base_url)?
            .into())
    }

    /// Personal access token for a self-hosted GitLab instance.
    pub fn gitlab_enterprise(
        base_url: &str,
        personal_access_token: impl Into<String>,
    ) -> Result<Self> {
        Ok(GitLabPersonalAccessTokenAuth::new(personal_access_token)?
            .with_enterprise_url(base_url)?
            .into())
    }

    pub fn family(&self) -> HostFamily {
        match self {
            Credential::GitHubPersonalAccessToken(_)
            | Credential::GitHubOAuthToken(_) => HostFamily::GitHub,
            Credential::GitLabPersonalAccessToken(_)
            | Credential::GitLabOAuthToken(_) => HostFamily::GitLab,
        }
    }

    pub fn token_kind(&self) -> TokenKind {
        match self {
            Credential::GitHubPersonalAccessToken(_)
            | Credential::GitLabPersonalAccessToken(_) => {
                TokenKind::PersonalAccessToken
            }
            Credential::GitHubOAuthToken(_)
            | Credential::GitLabOAuthToken(_) => TokenKind::OAuth,
        }
    }

    pub fn enterprise_url(&self) -> Option<&Url> {
        match self {
            Credential::GitHubPersonalAccessToken(auth) => {
                auth.enterprise_url.as_ref()
            }
            Credential::GitHubOAuthToken(auth) => auth.enterprise_url.as_ref(),
            Credential::GitLabPersonalAccessToken(auth) => {
                auth.enterprise_url.as_ref()
            }
            Credential::GitLabOAuthToken(auth) => auth.enterprise_url.as_ref(),
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Credential::GitHubPersonalAccessToken(auth) => {
                auth.username.as_deref()
            }
            _ => None,
        }
    }

    pub fn token(&self) -> &SecretString {
        match self {
            Credential::GitHubPersonalAccessToken(auth) => {
                &auth.personal_access_token
            }
            Credential::GitHubOAuthToken(auth) => &auth.oauth_token,
            Credential::GitLabPersonalAccessToken(auth) => {
                &auth.personal_access_token
            }
            Credential::GitLabOAuthToken(auth) => &auth.oauth_token,
        }
    }

    /// The host identity this credential is registered under.
    pub fn host_identity(&self) -> HostIdentity {
        match self.enterprise_url() {
            // validated at construction, a host is always present
            Some(url) => HostIdentity::from_url(url)
                .unwrap_or_else(|_| HostIdentity::new(url.as_str())),
            None => HostIdentity::new(self.family().default_host()),
        }
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.family() == other.family()
            && self.token_kind() == other.token_kind()
            && self.username() == other.username()
            && self.enterprise_url() == other.enterprise_url()
            && self.token().expose_secret() == other.token().expose_secret()
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("family", &self.family())
            .field("token_kind", &self.token_kind())
            .field("username", &self.username())
            .field("enterprise_url", &self.enterprise_url().map(Url::as_str))
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl From<GitHubPersonalAccessTokenAuth> for Credential {
    fn from(auth: GitHubPersonalAccessTokenAuth) -> Self {
        Credential::GitHubPersonalAccessToken(auth)
    }
}

impl From<GitHubOAuthTokenAuth> for Credential {
    fn from(auth: GitHubOAuthTokenAuth) -> Self {
        Credential::GitHubOAuthToken(auth)
    }
}

impl From<GitLabPersonalAccessTokenAuth> for Credential {
    fn from(auth: GitLabPersonalAccessTokenAuth) -> Self {
        Credential::GitLabPersonalAccessToken(auth)
    }
}

impl From<GitLabOAuthTokenAuth> for Credential {
    fn from(auth: GitLabOAuthTokenAuth) -> Self {
        Credential::GitLabOAuthToken(auth)
    }
}

fn validate_token(token: String) -> Result<SecretString> {
    if token.trim().is_empty() {
        return Err(ManygitError::invalid_credential("token must not be empty"));
    }
    Ok(SecretString::from(token))
}

fn validate_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url.trim()).map_err(|err| {
        ManygitError::invalid_credential(format!(
            "invalid enterprise url {base_url}: {err}"
        ))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ManygitError::invalid_credential(format!(
            "enterprise url must use http or https: {base_url}"
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ManygitError::invalid_credential(format!(
            "enterprise url has no host: {base_url}"
        )));
    }

    Ok(url)
}
