//! Canonical events consumed by plugins.
//!
//! Five upstream comment-like event kinds collapse into [`CommentEvent`];
//! remaining pull request lifecycle activity becomes a [`PullRequestEvent`].
//! Plugins never see platform payloads.

use serde::{Deserialize, Serialize};

use super::ids::{IssueNumber, RepoId, Sha};

/// Action performed on comment-like content.
///
/// The richer upstream vocabulary is coerced onto these three values:
/// `opened` and `submitted` become `Created`, `dismissed` becomes `Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentAction {
    #[default]
    Created,
    Edited,
    Deleted,
}

impl CommentAction {
    /// Coerces an upstream action string. Returns `None` for actions that do
    /// not create, edit or retract comment content (e.g. `closed`).
    pub fn coerce(action: &str) -> Option<Self> {
        match action {
            "created" | "opened" | "submitted" => Some(CommentAction::Created),
            "edited" => Some(CommentAction::Edited),
            "deleted" | "dismissed" => Some(CommentAction::Deleted),
            _ => None,
        }
    }
}

/// The single normalized shape for anything that carries comment text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommentEvent {
    /// Id of the issue or pull request record.
    pub id: u64,
    /// Id of the comment or review, when the content came from one.
    pub comment_id: Option<u64>,
    pub is_pr: bool,
    pub body: String,
    /// Link to the comment (or to the issue when the body is the issue body).
    pub html_url: String,
    pub number: IssueNumber,
    /// Login of whoever wrote `body`.
    pub author: String,
    pub issue_author: String,
    pub assignees: Vec<String>,
    pub issue_state: String,
    pub issue_title: String,
    pub issue_body: String,
    pub issue_html_url: String,
    pub action: CommentAction,
    pub repo: RepoId,
}

/// Pull request activity that is not comment-like (pushes, label changes,
/// reopen, ready-for-review, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub repo: RepoId,
    pub number: IssueNumber,
    /// Raw upstream action, e.g. `synchronize` or `labeled`.
    pub action: String,
    pub head_sha: Sha,
    pub author: String,
}

/// Anything a plugin can be asked to handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Comment(CommentEvent),
    PullRequest(PullRequestEvent),
}

impl Event {
    pub fn repo(&self) -> &RepoId {
        match self {
            Event::Comment(e) => &e.repo,
            Event::PullRequest(e) => &e.repo,
        }
    }

    pub fn number(&self) -> IssueNumber {
        match self {
            Event::Comment(e) => e.number,
            Event::PullRequest(e) => e.number,
        }
    }

    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Comment(_) => "comment",
            Event::PullRequest(_) => "pull_request",
        }
    }
}
