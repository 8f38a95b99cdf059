//! Canonicalizes webhook payloads into plugin [`Event`]s.
//!
//! # Routing
//!
//! An [`EventRouter`] is a table from the `X-GitHub-Event` header value to a
//! canonicalizer. The default table covers the five comment-like kinds:
//!
//! | kind                          | body taken from | `is_pr`             |
//! |-------------------------------|-----------------|---------------------|
//! | `issues`                      | issue body      | issue is a PR       |
//! | `issue_comment`               | comment body    | issue is a PR       |
//! | `pull_request`                | PR body         | always              |
//! | `pull_request_review`         | review body     | always              |
//! | `pull_request_review_comment` | comment body    | always              |
//!
//! Unregistered kinds yield `Ok(None)`. Actions that are not comment-like
//! also yield `Ok(None)`, except on `pull_request`, where anything other than
//! `closed` becomes a [`PullRequestEvent`].

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::types::{
    CommentAction, CommentEvent, Event, IssueNumber, PullRequestEvent, RepoId, Sha,
};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns one kind of payload into an event, if it maps to one.
pub type Canonicalizer = fn(&[u8]) -> Result<Option<Event>, ParseError>;

/// Registration table of canonicalizers keyed by event kind.
#[derive(Debug, Clone, Default)]
pub struct EventRouter {
    routes: HashMap<&'static str, Canonicalizer>,
}

impl EventRouter {
    /// A router with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A router for every comment-like kind.
    pub fn new() -> Self {
        let mut router = Self::empty();
        router.register("issues", canonicalize_issue);
        router.register("issue_comment", canonicalize_issue_comment);
        router.register("pull_request", canonicalize_pull_request);
        router.register("pull_request_review", canonicalize_review);
        router.register("pull_request_review_comment", canonicalize_review_comment);
        router
    }

    /// Registers `canonicalizer` for `kind`, replacing any previous entry.
    pub fn register(&mut self, kind: &'static str, canonicalizer: Canonicalizer) {
        self.routes.insert(kind, canonicalizer);
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.routes.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Parses `payload` as an event of `kind`.
    ///
    /// * `Ok(Some(event))` - the payload maps to an event
    /// * `Ok(None)` - unknown kind, or an action plugins do not see
    /// * `Err(e)` - malformed payload for a known kind
    pub fn route(&self, kind: &str, payload: &[u8]) -> Result<Option<Event>, ParseError> {
        match self.routes.get(kind) {
            Some(canonicalize) => canonicalize(payload),
            None => Ok(None),
        }
    }
}

// ─── Raw Payload Structures ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawUser,
    name: String,
}

impl RawRepository {
    fn id(self) -> RepoId {
        RepoId::new(self.owner.login, self.name)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawUser {
    login: String,
}

/// An issue or a pull request; GitHub gives both the same core fields.
#[derive(Debug, Deserialize)]
struct RawIssue {
    id: u64,
    number: u64,
    #[serde(default)]
    title: String,
    body: Option<String>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    user: RawUser,
    #[serde(default)]
    assignees: Vec<RawUser>,
    /// Present only when the issue is a pull request.
    pull_request: Option<serde_json::Value>,
    /// Present only on pull request payloads.
    head: Option<RawHead>,
}

#[derive(Debug, Deserialize)]
struct RawHead {
    sha: String,
}

/// A comment or review.
#[derive(Debug, Deserialize)]
struct RawComment {
    id: u64,
    body: Option<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    user: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawIssuesPayload {
    action: String,
    issue: RawIssue,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawIssueCommentPayload {
    action: String,
    issue: RawIssue,
    comment: RawComment,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawIssue,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawReviewPayload {
    action: String,
    pull_request: RawIssue,
    review: RawComment,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawReviewCommentPayload {
    action: String,
    pull_request: RawIssue,
    comment: RawComment,
    repository: RawRepository,
}

// ─── Canonicalizers ───────────────────────────────────────────────────────────

/// The issue-level part of a comment event; callers fill in the content.
fn issue_event(issue: RawIssue, is_pr: bool, action: CommentAction, repo: RepoId) -> CommentEvent {
    let issue_body = issue.body.unwrap_or_default();
    CommentEvent {
        id: issue.id,
        comment_id: None,
        is_pr,
        body: issue_body.clone(),
        html_url: issue.html_url.clone(),
        number: IssueNumber(issue.number),
        author: issue.user.login.clone(),
        issue_author: issue.user.login,
        assignees: issue.assignees.into_iter().map(|u| u.login).collect(),
        issue_state: issue.state,
        issue_title: issue.title,
        issue_body,
        issue_html_url: issue.html_url,
        action,
        repo,
    }
}

fn with_comment(event: CommentEvent, comment: RawComment) -> CommentEvent {
    CommentEvent {
        comment_id: Some(comment.id),
        body: comment.body.unwrap_or_default(),
        html_url: comment.html_url,
        author: comment.user.login,
        ..event
    }
}

fn canonicalize_issue(payload: &[u8]) -> Result<Option<Event>, ParseError> {
    let raw: RawIssuesPayload = serde_json::from_slice(payload)?;
    let Some(action) = CommentAction::coerce(&raw.action) else {
        return Ok(None);
    };
    let is_pr = raw.issue.pull_request.is_some();
    let event = issue_event(raw.issue, is_pr, action, raw.repository.id());
    Ok(Some(Event::Comment(event)))
}

fn canonicalize_issue_comment(payload: &[u8]) -> Result<Option<Event>, ParseError> {
    let raw: RawIssueCommentPayload = serde_json::from_slice(payload)?;
    let Some(action) = CommentAction::coerce(&raw.action) else {
        return Ok(None);
    };
    let is_pr = raw.issue.pull_request.is_some();
    let event = issue_event(raw.issue, is_pr, action, raw.repository.id());
    Ok(Some(Event::Comment(with_comment(event, raw.comment))))
}

fn canonicalize_pull_request(payload: &[u8]) -> Result<Option<Event>, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;
    if raw.action == "closed" {
        return Ok(None);
    }
    let repo = raw.repository.id();

    if let Some(action) = CommentAction::coerce(&raw.action) {
        let event = issue_event(raw.pull_request, true, action, repo);
        return Ok(Some(Event::Comment(event)));
    }

    let pr = raw.pull_request;
    Ok(Some(Event::PullRequest(PullRequestEvent {
        repo,
        number: IssueNumber(pr.number),
        action: raw.action,
        head_sha: pr.head.map(|h| Sha::new(h.sha)).unwrap_or_default(),
        author: pr.user.login,
    })))
}

fn canonicalize_review(payload: &[u8]) -> Result<Option<Event>, ParseError> {
    let raw: RawReviewPayload = serde_json::from_slice(payload)?;
    let Some(action) = CommentAction::coerce(&raw.action) else {
        return Ok(None);
    };
    let event = issue_event(raw.pull_request, true, action, raw.repository.id());
    Ok(Some(Event::Comment(with_comment(event, raw.review))))
}

fn canonicalize_review_comment(payload: &[u8]) -> Result<Option<Event>, ParseError> {
    let raw: RawReviewCommentPayload = serde_json::from_slice(payload)?;
    let Some(action) = CommentAction::coerce(&raw.action) else {
        return Ok(None);
    };
    let event = issue_event(raw.pull_request, true, action, raw.repository.id());
    Ok(Some(Event::Comment(with_comment(event, raw.comment))))
}
