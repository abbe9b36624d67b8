//! Factory for creating adapter implementations based on a credential.
#[cfg(test)]
use mockall::automock;

use crate::{
    adapter::{
        config::ClientOptions, github::Github, gitlab::Gitlab,
        traits::HostAdapter,
    },
    credential::{Credential, HostFamily},
    error::Result,
};

/// Builds the authenticated adapter for a registered credential.
#[cfg_attr(test, automock)]
pub trait AdapterFactory {
    fn create(
        &self,
        credential: &Credential,
        options: &ClientOptions,
    ) -> Result<Box<dyn HostAdapter>>;
}

/// Selects the adapter from the credential's host family.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAdapterFactory;

impl AdapterFactory for DefaultAdapterFactory {
    fn create(
        &self,
        credential: &Credential,
        options: &ClientOptions,
    ) -> Result<Box<dyn HostAdapter>> {
        match credential.family() {
            HostFamily::GitHub => Self::create_github(credential, options),
            HostFamily::GitLab => Self::create_gitlab(credential, options),
        }
    }
}

impl DefaultAdapterFactory {
    fn create_github(
        credential: &Credential,
        options: &ClientOptions,
    ) -> Result<Box<dyn HostAdapter>> {
        Ok(Box::new(Github::new(credential, options)?))
    }

    fn create_gitlab(
        credential: &Credential,
        options: &ClientOptions,
    ) -> Result<Box<dyn HostAdapter>> {
        Ok(Box::new(Gitlab::new(credential, options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::GitHubOAuthTokenAuth;

    #[test]
    fn builds_github_adapter_without_contacting_host() {
        let credential: Credential = GitHubOAuthTokenAuth::new("gho_token")
            .unwrap()
            .with_enterprise_url("https://ghe.example.com")
            .unwrap()
            .into();

        let adapter =
            DefaultAdapterFactory.create(&credential, &ClientOptions::default());

        assert!(adapter.is_ok());
    }
}
