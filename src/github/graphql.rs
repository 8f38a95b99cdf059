//! GraphQL queries for pull request snapshots.
//!
//! Both the single-PR lookup and the open-PR listing request the same field
//! set: labels, mergeability and the last commit's status check rollup, so a
//! snapshot arrives with its head commit's statuses and checks attached.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::{GitHubApiError, classify};
use crate::types::{
    Branch, CheckConclusion, CheckStatus, Commit, CommitCheck, CommitStatus, IssueNumber,
    MergeableState, PrState, PullRequestSnapshot, Sha, StatusState,
};

const PR_FIELDS: &str = r#"
fragment PrFields on PullRequest {
  number
  state
  title
  author { login }
  headRefName
  headRefOid
  mergeable
  labels(first: 100) { nodes { name } }
  commits(last: 1) {
    nodes {
      commit {
        oid
        statusCheckRollup {
          contexts(first: 100) {
            nodes {
              __typename
              ... on CheckRun { name status conclusion }
              ... on StatusContext { context state description targetUrl }
            }
          }
        }
      }
    }
  }
}
"#;

pub(crate) fn pull_request_query() -> String {
    format!(
        r#"query($owner: String!, $repo: String!, $number: Int!) {{
  repository(owner: $owner, name: $repo) {{
    pullRequest(number: $number) {{ ...PrFields }}
  }}
}}
{PR_FIELDS}"#
    )
}

pub(crate) fn open_pull_requests_query() -> String {
    format!(
        r#"query($owner: String!, $repo: String!, $after: String) {{
  repository(owner: $owner, name: $repo) {{
    pullRequests(first: 100, after: $after, states: OPEN, orderBy: {{field: CREATED_AT, direction: ASC}}) {{
      pageInfo {{ hasNextPage endCursor }}
      nodes {{ ...PrFields }}
    }}
  }}
}}
{PR_FIELDS}"#
    )
}

#[derive(Debug, Serialize)]
pub(crate) struct PullRequestVariables<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub number: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenPullRequestsVariables<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub after: Option<&'a str>,
}

// ─── Response Envelope ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl<T> GraphQlResponse<T> {
    /// The `data` payload, or the reported errors as an API error.
    ///
    /// Partial data is returned as-is; errors accompanying it are logged.
    pub fn into_data(self) -> Result<T, GitHubApiError> {
        let message = self
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        match self.data {
            Some(data) => {
                if !self.errors.is_empty() {
                    warn!(errors = %message, "GraphQL response carried partial errors");
                }
                Ok(data)
            }
            None if self.errors.iter().any(|e| e.kind.as_deref() == Some("NOT_FOUND")) => {
                Err(GitHubApiError::not_found(message))
            }
            None => Err(GitHubApiError {
                kind: classify(None, &message),
                status_code: None,
                message,
                source: None,
            }),
        }
    }
}

// ─── Raw Types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct PullRequestData {
    repository: Option<RawRepository<RawPullRequestField>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenPullRequestsData {
    repository: Option<RawRepository<RawPullRequestsField>>,
}

#[derive(Debug, Deserialize)]
struct RawRepository<T> {
    #[serde(flatten)]
    field: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPullRequestField {
    pull_request: Option<RawPullRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPullRequestsField {
    pull_requests: RawConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConnection {
    page_info: RawPageInfo,
    #[serde(default)]
    nodes: Vec<RawPullRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPullRequest {
    number: u64,
    state: String,
    #[serde(default)]
    title: String,
    author: Option<RawActor>,
    head_ref_name: String,
    head_ref_oid: String,
    #[serde(default)]
    mergeable: Option<String>,
    labels: Option<RawNodes<RawLabel>>,
    commits: RawNodes<RawCommitNode>,
}

#[derive(Debug, Deserialize)]
struct RawActor {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawNodes<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawCommitNode {
    commit: RawCommit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCommit {
    oid: String,
    status_check_rollup: Option<RawRollup>,
}

#[derive(Debug, Deserialize)]
struct RawRollup {
    contexts: RawNodes<RawRollupNode>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum RawRollupNode {
    CheckRun {
        name: String,
        status: String,
        conclusion: Option<String>,
    },
    StatusContext {
        context: String,
        state: String,
        description: Option<String>,
        #[serde(rename = "targetUrl")]
        target_url: Option<String>,
    },
}

// ─── Conversion ───────────────────────────────────────────────────────────────

impl PullRequestData {
    /// The requested PR, or not-found when the repository or PR is absent.
    pub fn into_snapshot(self, number: u64) -> Result<PullRequestSnapshot, GitHubApiError> {
        let raw = self
            .repository
            .and_then(|r| r.field.pull_request)
            .ok_or_else(|| GitHubApiError::not_found(format!("PR #{number} not found")))?;
        raw.into_snapshot()
    }
}

/// One page of open pull requests and the cursor for the next page.
#[derive(Debug)]
pub(crate) struct OpenPullRequestsPage {
    pub snapshots: Vec<PullRequestSnapshot>,
    pub next_cursor: Option<String>,
}

impl OpenPullRequestsData {
    pub fn into_page(self) -> Result<OpenPullRequestsPage, GitHubApiError> {
        let connection = self
            .repository
            .map(|r| r.field.pull_requests)
            .ok_or_else(|| GitHubApiError::not_found("repository not found"))?;

        let mut snapshots = Vec::with_capacity(connection.nodes.len());
        for raw in connection.nodes {
            let number = raw.number;
            match raw.into_snapshot() {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!(pr = number, error = %e, "Skipping unreadable PR"),
            }
        }

        let next_cursor = if connection.page_info.has_next_page {
            connection.page_info.end_cursor
        } else {
            None
        };
        Ok(OpenPullRequestsPage {
            snapshots,
            next_cursor,
        })
    }
}

impl RawPullRequest {
    fn into_snapshot(self) -> Result<PullRequestSnapshot, GitHubApiError> {
        let state = PrState::from_api(&self.state).ok_or_else(|| {
            GitHubApiError::permanent_without_source(format!(
                "unknown PR state {:?} on #{}",
                self.state, self.number
            ))
        })?;

        let commits = self
            .commits
            .nodes
            .into_iter()
            .map(|node| node.commit.into_commit())
            .collect();

        Ok(PullRequestSnapshot {
            number: IssueNumber(self.number),
            state,
            title: self.title,
            // Deleted accounts have no author.
            author: self.author.map(|a| a.login).unwrap_or_default(),
            head: Branch {
                ref_name: self.head_ref_name,
                sha: Sha::new(self.head_ref_oid),
            },
            labels: self
                .labels
                .map(|l| l.nodes.into_iter().map(|n| n.name).collect())
                .unwrap_or_default(),
            mergeable: self
                .mergeable
                .as_deref()
                .map(MergeableState::from_api)
                .unwrap_or(MergeableState::Unknown),
            commits,
        })
    }
}

impl RawCommit {
    fn into_commit(self) -> Commit {
        let mut commit = Commit {
            sha: Sha::new(self.oid),
            ..Default::default()
        };
        let nodes = self
            .status_check_rollup
            .map(|r| r.contexts.nodes)
            .unwrap_or_default();

        for node in nodes {
            match node {
                RawRollupNode::CheckRun {
                    name,
                    status,
                    conclusion,
                } => commit.checks.push(CommitCheck {
                    name,
                    status: CheckStatus::from_api(&status),
                    conclusion: conclusion.as_deref().and_then(CheckConclusion::from_api),
                }),
                RawRollupNode::StatusContext {
                    context,
                    state,
                    description,
                    target_url,
                } => match StatusState::from_api(&state) {
                    Some(state) => commit.statuses.push(CommitStatus {
                        context,
                        state,
                        description: description.unwrap_or_default(),
                        target_url,
                    }),
                    None => warn!(context = %context, state = %state, "Ignoring status with unknown state"),
                },
            }
        }
        commit
    }
}
