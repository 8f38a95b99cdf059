//! Capability implementations over the GitHub REST and GraphQL APIs.

use async_trait::async_trait;
use octocrab::models::repos::ContentItems;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::client::GitHubClient;
use super::error::GitHubApiError;
use super::graphql::{
    GraphQlResponse, OpenPullRequestsData, OpenPullRequestsVariables, PullRequestData,
    PullRequestVariables, open_pull_requests_query, pull_request_query,
};
use crate::clients::{
    ClientError, ConfigSource, IssueClient, OwnersSource, PrClient, RepoClient, Result,
    SearchClient,
};
use crate::types::{
    CheckConclusion, CheckStatus, CommitCheck, CommitStatus, Configuration, IssueNumber,
    MergeMethod, OwnersConfiguration, PullRequestSnapshot, RepoId, Sha, StatusState,
};

const PER_PAGE: usize = 100;

/// Upper bound on pages read from any listing.
const MAX_PAGES: u32 = 30;

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: usize,
    page: u32,
}

// ─── Issues ───────────────────────────────────────────────────────────────────

#[async_trait]
impl IssueClient for GitHubClient {
    async fn create_comment(&self, repo: &RepoId, issue: IssueNumber, body: &str) -> Result<()> {
        self.send("create_comment", || async move {
            self.inner()
                .issues(&repo.owner, &repo.repo)
                .create_comment(issue.0, body)
                .await
        })
        .await?;
        debug!(repo = %repo, issue = %issue, "Posted comment");
        Ok(())
    }

    async fn add_labels(&self, repo: &RepoId, issue: IssueNumber, labels: &[String]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        self.send("add_labels", || async move {
            self.inner()
                .issues(&repo.owner, &repo.repo)
                .add_labels(issue.0, labels)
                .await
        })
        .await?;
        Ok(())
    }

    async fn remove_label(&self, repo: &RepoId, issue: IssueNumber, label: &str) -> Result<()> {
        let result = self
            .send("remove_label", || async move {
                self.inner()
                    .issues(&repo.owner, &repo.repo)
                    .remove_label(issue.0, label)
                    .await
            })
            .await;
        match result {
            Ok(_) => Ok(()),
            // The label was not there to begin with.
            Err(ClientError::NotFound(_)) => {
                debug!(repo = %repo, issue = %issue, label, "Label already absent");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

// ─── Pull Requests ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawFile {
    filename: String,
}

#[derive(Debug, Serialize)]
struct MergeRequest {
    merge_method: &'static str,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    merged: bool,
    message: Option<String>,
}

#[async_trait]
impl PrClient for GitHubClient {
    async fn list_changed_files(&self, repo: &RepoId, pr: IssueNumber) -> Result<Vec<String>> {
        let url = format!("/repos/{}/{}/pulls/{}/files", repo.owner, repo.repo, pr.0);
        let mut files = Vec::new();

        for page in 1..=MAX_PAGES {
            let params = PageParams {
                per_page: PER_PAGE,
                page,
            };
            let items: Vec<RawFile> = self
                .send("list_changed_files", || self.inner().get(&url, Some(&params)))
                .await?;
            let is_last_page = items.len() < PER_PAGE;
            files.extend(items.into_iter().map(|f| f.filename));
            if is_last_page {
                break;
            }
        }
        Ok(files)
    }

    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn get_pr(&self, repo: &RepoId, pr: IssueNumber) -> Result<PullRequestSnapshot> {
        let query = pull_request_query();
        let variables = PullRequestVariables {
            owner: &repo.owner,
            repo: &repo.repo,
            number: pr.0,
        };
        let payload = serde_json::json!({ "query": query, "variables": variables });

        self.attempt("get_pr", || async {
            let response: GraphQlResponse<PullRequestData> = self
                .inner()
                .graphql(&payload)
                .await
                .map_err(GitHubApiError::from_octocrab)?;
            response.into_data()?.into_snapshot(pr.0)
        })
        .await
    }

    async fn merge_pr(&self, repo: &RepoId, pr: IssueNumber, method: MergeMethod) -> Result<()> {
        let url = format!("/repos/{}/{}/pulls/{}/merge", repo.owner, repo.repo, pr.0);
        let request = MergeRequest {
            merge_method: method.as_str(),
        };

        let response: MergeResponse = self
            .send("merge_pr", || self.inner().put(&url, Some(&request)))
            .await?;
        if !response.merged {
            return Err(ClientError::Remote(format!(
                "merge of {repo}#{pr} returned merged=false: {}",
                response.message.as_deref().unwrap_or("unknown reason")
            )));
        }
        Ok(())
    }
}

// ─── Statuses and Checks ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    state: &'static str,
    context: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RawCombinedStatus {
    #[serde(default)]
    statuses: Vec<RawStatus>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    context: String,
    state: String,
    description: Option<String>,
    target_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCheckRuns {
    #[serde(default)]
    check_runs: Vec<RawCheckRun>,
}

#[derive(Debug, Deserialize)]
struct RawCheckRun {
    name: String,
    status: String,
    conclusion: Option<String>,
}

#[async_trait]
impl RepoClient for GitHubClient {
    async fn create_status(&self, repo: &RepoId, sha: &Sha, status: &CommitStatus) -> Result<()> {
        let url = format!("/repos/{}/{}/statuses/{}", repo.owner, repo.repo, sha);
        let request = StatusRequest {
            state: status.state.as_rest_str(),
            context: &status.context,
            description: &status.description,
            target_url: status.target_url.as_deref(),
        };
        let _: serde_json::Value = self
            .send("create_status", || self.inner().post(&url, Some(&request)))
            .await?;
        Ok(())
    }

    async fn list_statuses(&self, repo: &RepoId, sha: &Sha) -> Result<Vec<CommitStatus>> {
        let url = format!("/repos/{}/{}/commits/{}/status", repo.owner, repo.repo, sha);
        let params = PageParams {
            per_page: PER_PAGE,
            page: 1,
        };
        let combined: RawCombinedStatus = self
            .send("list_statuses", || self.inner().get(&url, Some(&params)))
            .await?;

        Ok(combined
            .statuses
            .into_iter()
            .filter_map(|s| {
                let state = StatusState::from_api(&s.state)?;
                Some(CommitStatus {
                    context: s.context,
                    state,
                    description: s.description.unwrap_or_default(),
                    target_url: s.target_url,
                })
            })
            .collect())
    }

    async fn list_checks(&self, repo: &RepoId, sha: &Sha) -> Result<Vec<CommitCheck>> {
        let url = format!("/repos/{}/{}/commits/{}/check-runs", repo.owner, repo.repo, sha);
        let params = PageParams {
            per_page: PER_PAGE,
            page: 1,
        };
        let runs: RawCheckRuns = self
            .send("list_checks", || self.inner().get(&url, Some(&params)))
            .await?;

        Ok(runs
            .check_runs
            .into_iter()
            .map(|r| CommitCheck {
                name: r.name,
                status: CheckStatus::from_api(&r.status),
                conclusion: r.conclusion.as_deref().and_then(CheckConclusion::from_api),
            })
            .collect())
    }
}

// ─── Search ───────────────────────────────────────────────────────────────────

#[async_trait]
impl SearchClient for GitHubClient {
    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn search_open_prs(&self, repo: &RepoId) -> Result<Vec<PullRequestSnapshot>> {
        let query = open_pull_requests_query();
        let mut cursor: Option<String> = None;
        let mut snapshots = Vec::new();

        for _ in 0..MAX_PAGES {
            let variables = OpenPullRequestsVariables {
                owner: &repo.owner,
                repo: &repo.repo,
                after: cursor.as_deref(),
            };
            let payload = serde_json::json!({ "query": query, "variables": variables });

            let page = self
                .attempt("search_open_prs", || async {
                    let response: GraphQlResponse<OpenPullRequestsData> = self
                        .inner()
                        .graphql(&payload)
                        .await
                        .map_err(GitHubApiError::from_octocrab)?;
                    response.into_data()?.into_page()
                })
                .await?;

            snapshots.extend(page.snapshots);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!(count = snapshots.len(), "Listed open PRs");
        Ok(snapshots)
    }
}

// ─── Repository Files ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawCodeSearch {
    #[serde(default)]
    items: Vec<RawCodeHit>,
}

#[derive(Debug, Deserialize)]
struct RawCodeHit {
    name: String,
    path: String,
}

#[derive(Debug, Serialize)]
struct CodeSearchParams<'a> {
    q: &'a str,
    per_page: usize,
    page: u32,
}

impl GitHubClient {
    /// Decoded text of the file at `path` on the default branch.
    async fn file_text(&self, repo: &RepoId, path: &str) -> Result<String> {
        let items: ContentItems = self
            .send("get_content", || async move {
                self.inner()
                    .repos(&repo.owner, &repo.repo)
                    .get_content()
                    .path(path)
                    .send()
                    .await
            })
            .await?;

        // A directory listing has several entries and no inline content.
        items
            .items
            .into_iter()
            .next()
            .and_then(|item| item.decoded_content())
            .ok_or_else(|| ClientError::NotFound(format!("{repo}/{path} is not a file")))
    }

    /// Paths of every governance file in the repository.
    async fn owners_paths(&self, repo: &RepoId) -> Result<Vec<String>> {
        let q = format!("repo:{}/{} filename:{}", repo.owner, repo.repo, self.owners_file());
        let mut paths = Vec::new();

        for page in 1..=MAX_PAGES {
            let params = CodeSearchParams {
                q: &q,
                per_page: PER_PAGE,
                page,
            };
            let result: RawCodeSearch = self
                .send("search_code", || self.inner().get("/search/code", Some(&params)))
                .await?;
            let is_last_page = result.items.len() < PER_PAGE;
            paths.extend(
                result
                    .items
                    .into_iter()
                    .filter(|hit| hit.name == self.owners_file())
                    .map(|hit| hit.path),
            );
            if is_last_page {
                break;
            }
        }
        Ok(paths)
    }
}

#[async_trait]
impl ConfigSource for GitHubClient {
    async fn fetch_config(&self, repo: &RepoId) -> Result<Configuration> {
        let text = self.file_text(repo, self.config_path()).await?;
        Ok(Configuration::from_yaml(&text)?)
    }
}

#[async_trait]
impl OwnersSource for GitHubClient {
    async fn fetch_owners(&self, repo: &RepoId) -> Result<Vec<(String, OwnersConfiguration)>> {
        let mut files = Vec::new();
        for path in self.owners_paths(repo).await? {
            let text = match self.file_text(repo, &path).await {
                Ok(text) => text,
                // Deleted since the search index was built.
                Err(ClientError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            match OwnersConfiguration::from_yaml(&text) {
                Ok(owners) => files.push((path, owners)),
                Err(e) => warn!(repo = %repo, path = %path, error = %e, "Skipping malformed owners file"),
            }
        }
        Ok(files)
    }
}
