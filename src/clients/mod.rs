//! Capability contracts consumed by plugins and the merge controller.
//!
//! Each trait is narrow and independently mockable. A [`Capabilities`]
//! bundle composes them explicitly; there is no global client state.
//!
//! The GitHub-backed implementations live in `crate::github`; cache-backed
//! [`ConfigClient`] and [`OwnersClient`] implementations live in [`cached`].

pub mod cached;
pub mod error;

use std::sync::Arc;

use async_trait::async_trait;

pub use cached::{CachedConfigClient, CachedOwnersClient, ConfigSource, OwnersSource};
pub use error::{ClientError, with_deadline};

use crate::types::{
    CommitCheck, CommitStatus, Configuration, IssueNumber, MergeMethod, OwnersConfiguration,
    PullRequestSnapshot, RepoId, Sha,
};

/// Result alias for capability calls.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Issue comments and labels.
#[async_trait]
pub trait IssueClient: Send + Sync {
    async fn create_comment(&self, repo: &RepoId, issue: IssueNumber, body: &str) -> Result<()>;

    async fn add_labels(&self, repo: &RepoId, issue: IssueNumber, labels: &[String])
    -> Result<()>;

    async fn remove_label(&self, repo: &RepoId, issue: IssueNumber, label: &str) -> Result<()>;
}

/// Pull request reads and merges.
#[async_trait]
pub trait PrClient: Send + Sync {
    /// Paths of every file the PR touches.
    async fn list_changed_files(&self, repo: &RepoId, pr: IssueNumber) -> Result<Vec<String>>;

    /// Fetches a snapshot. Implementations may attach the head commit's
    /// statuses and checks; when they do not, callers fall back to
    /// [`RepoClient::list_statuses`] and [`RepoClient::list_checks`].
    async fn get_pr(&self, repo: &RepoId, pr: IssueNumber) -> Result<PullRequestSnapshot>;

    async fn merge_pr(&self, repo: &RepoId, pr: IssueNumber, method: MergeMethod) -> Result<()>;
}

/// Commit statuses and checks.
#[async_trait]
pub trait RepoClient: Send + Sync {
    async fn create_status(&self, repo: &RepoId, sha: &Sha, status: &CommitStatus) -> Result<()>;

    async fn list_statuses(&self, _repo: &RepoId, _sha: &Sha) -> Result<Vec<CommitStatus>> {
        Ok(Vec::new())
    }

    async fn list_checks(&self, _repo: &RepoId, _sha: &Sha) -> Result<Vec<CommitCheck>> {
        Ok(Vec::new())
    }
}

/// Enumerates open pull requests.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Every open PR with its head commit statuses/checks attached.
    async fn search_open_prs(&self, repo: &RepoId) -> Result<Vec<PullRequestSnapshot>>;
}

/// Per-repository plugin configuration.
#[async_trait]
pub trait ConfigClient: Send + Sync {
    async fn get_config(&self, repo: &RepoId) -> Result<Configuration>;
}

/// Governance file resolution for a path.
#[async_trait]
pub trait OwnersClient: Send + Sync {
    async fn get_owners(&self, repo: &RepoId, path: &str) -> Result<OwnersConfiguration>;
}

/// Source of the structured logging span for work done on a client's behalf.
pub trait LoggerClient: Send + Sync {
    fn logger(&self) -> tracing::Span;
}

/// [`LoggerClient`] that hands out a fixed parent span.
#[derive(Debug, Clone)]
pub struct SpanLogger {
    span: tracing::Span,
}

impl SpanLogger {
    pub fn new(span: tracing::Span) -> Self {
        SpanLogger { span }
    }
}

impl Default for SpanLogger {
    fn default() -> Self {
        SpanLogger::new(tracing::info_span!("tidebot"))
    }
}

impl LoggerClient for SpanLogger {
    fn logger(&self) -> tracing::Span {
        self.span.clone()
    }
}

/// Everything a plugin may call, composed explicitly.
#[derive(Clone)]
pub struct Capabilities {
    pub issues: Arc<dyn IssueClient>,
    pub pulls: Arc<dyn PrClient>,
    pub repos: Arc<dyn RepoClient>,
    pub search: Arc<dyn SearchClient>,
    pub config: Arc<dyn ConfigClient>,
    pub owners: Arc<dyn OwnersClient>,
    pub logger: Arc<dyn LoggerClient>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
