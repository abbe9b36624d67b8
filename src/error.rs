//! Error taxonomy shared by every host adapter.
//!
//! Host specific failures (octocrab, gitlab, transport) are always mapped
//! into [`ManygitError`] so callers can branch on the kind of failure
//! without knowing which host produced it.

use thiserror::Error;

/// Main error type for manygit operations.
#[derive(Error, Debug)]
pub enum ManygitError {
    // Caller input errors
    #[error("Invalid repository URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Dispatch errors
    #[error("No credential registered for host: {0}")]
    NoCredential(String),

    #[error("Unsupported host: {0}")]
    UnsupportedHost(String),

    // Host errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Host unavailable: {0}")]
    HostUnavailable(String),

    #[error("Unexpected host response: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using ManygitError
pub type Result<T> = std::result::Result<T, ManygitError>;

/// Which kind of resource a request was addressing. Decides whether a 404
/// means the repository itself is missing or only something inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Repository,
    Branch,
    Commit,
    Tag,
    Release,
    PullRequests,
}

impl ManygitError {
    pub fn invalid_url(msg: impl Into<String>) -> Self {
        Self::InvalidUrl(msg.into())
    }

    pub fn invalid_credential(msg: impl Into<String>) -> Self {
        Self::InvalidCredential(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Classify an HTTP status returned by a host.
    ///
    /// `subject` names what was requested (e.g. `acme/widget` or
    /// `branch main`) and ends up in the error message.
    pub fn from_status(
        status: u16,
        message: &str,
        resource: Resource,
        subject: &str,
    ) -> Self {
        match status {
            404 if matches!(
                resource,
                Resource::Repository | Resource::PullRequests
            ) =>
            {
                Self::RepositoryNotFound(subject.to_string())
            }
            404 => Self::NotFound(subject.to_string()),
            401 => Self::Authentication(format!("{subject}: {message}")),
            429 => Self::HostUnavailable(format!(
                "rate limit exceeded while requesting {subject}"
            )),
            403 if is_rate_limit_message(message) => Self::HostUnavailable(
                format!("rate limit exceeded while requesting {subject}"),
            ),
            403 => Self::Authentication(format!("{subject}: {message}")),
            s if s >= 500 => Self::HostUnavailable(format!(
                "status {s} while requesting {subject}: {message}"
            )),
            s => Self::Api(format!(
                "status {s} while requesting {subject}: {message}"
            )),
        }
    }

    /// True when retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::HostUnavailable(_))
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("rate limit")
}

impl From<toml::de::Error> for ManygitError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ManygitError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::HostUnavailable("request timed out".to_string())
    }
}
