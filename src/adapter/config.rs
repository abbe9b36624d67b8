//! Configuration shared by every host adapter.
use std::time::Duration;
use url::Url;

/// API root of github.com.
pub const GITHUB_API_URL: &str = "https://api.github.com";
/// Path of the REST API on a GitHub Enterprise instance.
pub const GITHUB_ENTERPRISE_API_PATH: &str = "api/v3";
/// Default upper bound for a single call against a host.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Page size used when listing from GitHub.
pub const DEFAULT_PAGE_SIZE: u8 = 100;

/// Options applied to every client the manager builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Upper bound for a single adapter call. Composed queries make several
    /// calls, `get_repo` makes four, and each gets the full timeout.
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// REST API root for a GitHub host.
pub fn github_api_base(enterprise_url: Option<&Url>) -> String {
    match enterprise_url {
        Some(url) => format!(
            "{}/{}",
            url.as_str().trim_end_matches('/'),
            GITHUB_ENTERPRISE_API_PATH
        ),
        None => GITHUB_API_URL.to_string(),
    }
}

/// Host string handed to the gitlab client builder, plus whether the
/// instance is only reachable over plain http.
pub fn gitlab_host(enterprise_url: Option<&Url>) -> (String, bool) {
    match enterprise_url {
        Some(url) => {
            let mut host = url.host_str().unwrap_or_default().to_string();
            if let Some(port) = url.port() {
                host = format!("{host}:{port}");
            }
            let path = url.path().trim_matches('/');
            if !path.is_empty() {
                host = format!("{host}/{path}");
            }
            (host, url.scheme() == "http")
        }
        None => (crate::credential::GITLAB_HOST.to_string(), false),
    }
}
