//! Pull request snapshots and commit status types.
//!
//! A [`PullRequestSnapshot`] is fetched fresh for every reconciliation pass and
//! replaced wholesale; nothing here is mutated in place by the controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::ids::{IssueNumber, Sha};

/// The state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl PrState {
    /// Parses GitHub's representation (`OPEN` in GraphQL, `open` in REST).
    ///
    /// REST reports merged PRs as `closed`; callers that know the PR was merged
    /// should map that themselves.
    pub fn from_api(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Some(PrState::Open),
            "CLOSED" => Some(PrState::Closed),
            "MERGED" => Some(PrState::Merged),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, PrState::Open)
    }
}

/// Whether or not a pull request can be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeableState {
    /// The pull request can be merged.
    Mergeable,
    /// The pull request cannot be merged due to merge conflicts.
    Conflicting,
    /// Mergeability is still being calculated.
    Unknown,
}

impl MergeableState {
    /// Parses the GraphQL `mergeable` field. Anything unrecognised is `Unknown`.
    pub fn from_api(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "MERGEABLE" => MergeableState::Mergeable,
            "CONFLICTING" => MergeableState::Conflicting,
            _ => MergeableState::Unknown,
        }
    }
}

/// State of a commit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusState {
    Expected,
    Error,
    Failure,
    Pending,
    Success,
}

impl StatusState {
    pub fn from_api(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "EXPECTED" => Some(StatusState::Expected),
            "ERROR" => Some(StatusState::Error),
            "FAILURE" => Some(StatusState::Failure),
            "PENDING" => Some(StatusState::Pending),
            "SUCCESS" => Some(StatusState::Success),
            _ => None,
        }
    }

    /// The lowercase form the REST status endpoint accepts.
    ///
    /// `Expected` is not writable over REST and is sent as `pending`.
    pub fn as_rest_str(&self) -> &'static str {
        match self {
            StatusState::Error => "error",
            StatusState::Failure => "failure",
            StatusState::Expected | StatusState::Pending => "pending",
            StatusState::Success => "success",
        }
    }
}

impl fmt::Display for StatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusState::Expected => "EXPECTED",
            StatusState::Error => "ERROR",
            StatusState::Failure => "FAILURE",
            StatusState::Pending => "PENDING",
            StatusState::Success => "SUCCESS",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
    Waiting,
    Requested,
    Pending,
}

impl CheckStatus {
    /// Unrecognised values are treated as `Pending`, i.e. not yet complete.
    pub fn from_api(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => CheckStatus::Queued,
            "IN_PROGRESS" => CheckStatus::InProgress,
            "COMPLETED" => CheckStatus::Completed,
            "WAITING" => CheckStatus::Waiting,
            "REQUESTED" => CheckStatus::Requested,
            _ => CheckStatus::Pending,
        }
    }
}

/// Conclusion of a completed check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckConclusion {
    ActionRequired,
    Cancelled,
    Failure,
    Neutral,
    Success,
    Skipped,
    Stale,
    StartupFailure,
    TimedOut,
}

impl CheckConclusion {
    pub fn from_api(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ACTION_REQUIRED" => Some(CheckConclusion::ActionRequired),
            "CANCELLED" => Some(CheckConclusion::Cancelled),
            "FAILURE" => Some(CheckConclusion::Failure),
            "NEUTRAL" => Some(CheckConclusion::Neutral),
            "SUCCESS" => Some(CheckConclusion::Success),
            "SKIPPED" => Some(CheckConclusion::Skipped),
            "STALE" => Some(CheckConclusion::Stale),
            "STARTUP_FAILURE" => Some(CheckConclusion::StartupFailure),
            "TIMED_OUT" => Some(CheckConclusion::TimedOut),
            _ => None,
        }
    }
}

/// A commit status entry (the legacy Status API).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub context: String,
    pub state: StatusState,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_url: Option<String>,
}

/// A check run attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitCheck {
    pub name: String,
    pub status: CheckStatus,
    #[serde(default)]
    pub conclusion: Option<CheckConclusion>,
}

impl CommitCheck {
    /// Completed with a success or neutral conclusion.
    pub fn succeeded(&self) -> bool {
        self.status == CheckStatus::Completed
            && matches!(
                self.conclusion,
                Some(CheckConclusion::Success | CheckConclusion::Neutral)
            )
    }
}

/// A commit together with the statuses and checks reported against it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Commit {
    pub sha: Sha,
    #[serde(default)]
    pub statuses: Vec<CommitStatus>,
    #[serde(default)]
    pub checks: Vec<CommitCheck>,
}

/// Head branch of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Branch {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: Sha,
}

/// A point-in-time view of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSnapshot {
    pub number: IssueNumber,
    pub state: PrState,
    #[serde(default)]
    pub title: String,
    /// Login of the PR author.
    #[serde(default)]
    pub author: String,
    pub head: Branch,
    #[serde(default)]
    pub labels: Vec<String>,
    pub mergeable: MergeableState,
    /// Commits with statuses/checks attached. Usually only the head commit.
    #[serde(default)]
    pub commits: Vec<Commit>,
}

impl PullRequestSnapshot {
    /// Returns the commit whose SHA matches the PR head, if it was attached.
    pub fn head_commit(&self) -> Option<&Commit> {
        self.commits.iter().find(|c| c.sha == self.head.sha)
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }
}

/// Merge strategy used when the controller merges a PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised merge method string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown merge method {0:?} (expected merge, squash or rebase)")]
pub struct UnknownMergeMethod(pub String);

impl FromStr for MergeMethod {
    type Err = UnknownMergeMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(MergeMethod::Merge),
            "squash" => Ok(MergeMethod::Squash),
            "rebase" => Ok(MergeMethod::Rebase),
            _ => Err(UnknownMergeMethod(s.to_string())),
        }
    }
}
