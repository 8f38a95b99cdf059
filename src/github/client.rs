//! Octocrab client wrapper shared by every repository.
//!
//! Unlike a repo-scoped client, a single `GitHubClient` serves all
//! repositories the bot is installed on; each call names its repository.

use std::future::Future;

use octocrab::Octocrab;

use super::error::GitHubApiError;
use super::retry::{RetryConfig, retry_with_backoff};
use crate::clients::ClientError;

/// Default path of the plugin configuration file inside a repository.
pub const DEFAULT_CONFIG_PATH: &str = ".github/tidebot.yml";

/// Default governance file name.
pub const DEFAULT_OWNERS_FILE: &str = "OWNERS";

/// A GitHub API client implementing every capability trait.
#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
    retry: RetryConfig,
    config_path: String,
    owners_file: String,
}

impl GitHubClient {
    pub fn new(client: Octocrab) -> Self {
        Self {
            client,
            retry: RetryConfig::DEFAULT,
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            owners_file: DEFAULT_OWNERS_FILE.to_string(),
        }
    }

    /// Creates a client authenticated with a personal access token.
    pub fn from_token(token: impl Into<String>) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(Self::new(client))
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn with_owners_file(mut self, file: impl Into<String>) -> Self {
        self.owners_file = file.into();
        self
    }

    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    pub fn config_path(&self) -> &str {
        &self.config_path
    }

    pub fn owners_file(&self) -> &str {
        &self.owners_file
    }

    /// Runs an octocrab request with retry, classifying its failure.
    pub(crate) async fn send<T, F, Fut>(&self, op: &'static str, mut request: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, octocrab::Error>>,
    {
        self.attempt(op, || {
            let fut = request();
            async move { fut.await.map_err(GitHubApiError::from_octocrab) }
        })
        .await
    }

    /// Runs an already-classified request with retry.
    pub(crate) async fn attempt<T, F, Fut>(&self, op: &'static str, request: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GitHubApiError>>,
    {
        retry_with_backoff(self.retry, op, request)
            .await
            .map_err(ClientError::from)
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("retry", &self.retry)
            .field("config_path", &self.config_path)
            .field("owners_file", &self.owners_file)
            .finish_non_exhaustive()
    }
}
