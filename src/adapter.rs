//! Unified interface over Git hosting platforms (GitHub, GitLab).
//!
//! Each host family gets one [`traits::HostAdapter`] implementation that
//! translates normalized queries into provider API calls and maps the
//! responses back into [`crate::model`] types.

/// Client options and host API constants.
pub mod config;

/// Static selection of an adapter from a credential.
pub mod factory;

/// GitHub and GitHub Enterprise adapter.
pub mod github;

/// GitLab.com and self-hosted GitLab adapter.
pub mod gitlab;

/// Sync facade over the async host clients.
mod runtime;

/// Process-wide TLS setup shared by both host clients.
mod tls;

/// The capability set every adapter provides.
pub mod traits;

/// Raw results returned by adapters before they are composed into models.
pub mod types;
