//! Shared test utilities: an in-memory GitHub fake and proptest generators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;

use crate::cache::{ConfigStore, NearestCache};
use crate::clients::{
    Capabilities, ClientError, ConfigClient, IssueClient, OwnersClient, PrClient, RepoClient,
    Result, SearchClient, SpanLogger,
};
use crate::types::{
    Branch, Commit, CommentAction, CommentEvent, CommitCheck, CommitStatus, Configuration,
    IssueNumber, MergeMethod, MergeableState, OwnersConfiguration, PrState, PullRequestSnapshot,
    RepoId, Sha,
};

pub fn arb_repo_id() -> impl Strategy<Value = RepoId> {
    ("[a-z][a-z0-9-]{0,10}", "[a-z][a-z0-9_.-]{0,10}").prop_map(|(o, r)| RepoId::new(o, r))
}

pub fn arb_label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9/-]{0,20}".prop_map(String::from)
}

pub fn arb_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,4}", 0..5).prop_map(|parts| parts.join("/"))
}

/// An open, mergeable PR with no commits attached.
pub fn open_pr(number: u64, author: &str, sha: &str, labels: &[&str]) -> PullRequestSnapshot {
    PullRequestSnapshot {
        number: IssueNumber(number),
        state: PrState::Open,
        title: format!("PR {number}"),
        author: author.to_string(),
        head: Branch {
            ref_name: format!("branch-{number}"),
            sha: Sha::new(sha),
        },
        labels: labels.iter().map(|s| s.to_string()).collect(),
        mergeable: MergeableState::Mergeable,
        commits: Vec::new(),
    }
}

/// A freshly created comment on a PR.
pub fn pr_comment(repo: &RepoId, number: u64, author: &str, body: &str) -> CommentEvent {
    CommentEvent {
        id: number,
        comment_id: Some(1000 + number),
        is_pr: true,
        body: body.to_string(),
        html_url: format!(
            "https://github.com/{repo}/pull/{number}#issuecomment-{}",
            1000 + number
        ),
        number: IssueNumber(number),
        author: author.to_string(),
        action: CommentAction::Created,
        repo: repo.clone(),
        ..CommentEvent::default()
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

type PrKey = (RepoId, IssueNumber);

/// Everything the fake records or serves.
#[derive(Default)]
pub struct FakeState {
    pub prs: HashMap<PrKey, PullRequestSnapshot>,
    pub statuses: HashMap<Sha, Vec<CommitStatus>>,
    pub checks: HashMap<Sha, Vec<CommitCheck>>,
    pub changed_files: HashMap<PrKey, Vec<String>>,
    pub configs: HashMap<RepoId, Configuration>,
    pub comments: Vec<(RepoId, IssueNumber, String)>,
    pub labels_added: Vec<(RepoId, IssueNumber, Vec<String>)>,
    pub labels_removed: Vec<(RepoId, IssueNumber, String)>,
    pub status_writes: Vec<(RepoId, Sha, CommitStatus)>,
    pub merges: Vec<(RepoId, IssueNumber, MergeMethod)>,
    failures: HashMap<&'static str, u32>,
    delays: HashMap<&'static str, Duration>,
    calls: HashMap<&'static str, u32>,
}

/// In-memory stand-in for every capability.
///
/// `get_pr` returns snapshots without commits so callers exercise the
/// `list_statuses`/`list_checks` fallback; `search_open_prs` attaches them.
#[derive(Default)]
pub struct FakeGitHub {
    state: Mutex<FakeState>,
    owners: NearestCache<OwnersConfiguration>,
}

impl FakeGitHub {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeGitHub::default())
    }

    pub fn capabilities(self: &Arc<Self>) -> Capabilities {
        Capabilities {
            issues: self.clone(),
            pulls: self.clone(),
            repos: self.clone(),
            search: self.clone(),
            config: self.clone(),
            owners: self.clone(),
            logger: Arc::new(SpanLogger::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Counts a call to `op`, stalls it if a delay is set, and fails it if
    /// failures were scheduled.
    async fn record(&self, op: &'static str) -> Result<()> {
        let delay = {
            let mut state = self.lock();
            *state.calls.entry(op).or_insert(0) += 1;
            state.delays.get(op).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        match state.failures.get_mut(op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Err(ClientError::Transient(format!("injected {op} failure")))
            }
            _ => Ok(()),
        }
    }

    /// Makes the next `times` calls to `op` fail with a transient error.
    pub fn fail_next(&self, op: &'static str, times: u32) {
        self.lock().failures.insert(op, times);
    }

    /// Makes every later call to `op` take `delay` before answering.
    pub fn delay(&self, op: &'static str, delay: Duration) {
        self.lock().delays.insert(op, delay);
    }

    pub fn calls(&self, op: &str) -> u32 {
        self.lock().calls.get(op).copied().unwrap_or(0)
    }

    pub fn insert_pr(&self, repo: &RepoId, pr: PullRequestSnapshot) {
        self.lock().prs.insert((repo.clone(), pr.number), pr);
    }

    pub fn set_labels(&self, repo: &RepoId, number: IssueNumber, labels: &[&str]) {
        if let Some(pr) = self.lock().prs.get_mut(&(repo.clone(), number)) {
            pr.labels = labels.iter().map(|s| s.to_string()).collect();
        }
    }

    pub fn set_changed_files(&self, repo: &RepoId, number: IssueNumber, files: &[&str]) {
        self.lock().changed_files.insert(
            (repo.clone(), number),
            files.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn set_owners(&self, repo: &RepoId, dir: &str, owners: OwnersConfiguration) {
        self.owners.save(repo, dir, owners);
    }

    pub fn set_config(&self, repo: &RepoId, config: Configuration) {
        self.lock().configs.insert(repo.clone(), config);
    }

    pub fn comments(&self) -> Vec<(RepoId, IssueNumber, String)> {
        self.lock().comments.clone()
    }

    pub fn labels_added(&self) -> Vec<(RepoId, IssueNumber, Vec<String>)> {
        self.lock().labels_added.clone()
    }

    pub fn labels_removed(&self) -> Vec<(RepoId, IssueNumber, String)> {
        self.lock().labels_removed.clone()
    }

    pub fn status_writes(&self) -> Vec<(RepoId, Sha, CommitStatus)> {
        self.lock().status_writes.clone()
    }

    pub fn merges(&self) -> Vec<(RepoId, IssueNumber, MergeMethod)> {
        self.lock().merges.clone()
    }
}

#[async_trait]
impl IssueClient for FakeGitHub {
    async fn create_comment(&self, repo: &RepoId, issue: IssueNumber, body: &str) -> Result<()> {
        self.record("create_comment").await?;
        self.lock()
            .comments
            .push((repo.clone(), issue, body.to_string()));
        Ok(())
    }

    async fn add_labels(
        &self,
        repo: &RepoId,
        issue: IssueNumber,
        labels: &[String],
    ) -> Result<()> {
        self.record("add_labels").await?;
        let mut state = self.lock();
        state
            .labels_added
            .push((repo.clone(), issue, labels.to_vec()));
        if let Some(pr) = state.prs.get_mut(&(repo.clone(), issue)) {
            for label in labels {
                if !pr.labels.contains(label) {
                    pr.labels.push(label.clone());
                }
            }
        }
        Ok(())
    }

    async fn remove_label(&self, repo: &RepoId, issue: IssueNumber, label: &str) -> Result<()> {
        self.record("remove_label").await?;
        let mut state = self.lock();
        state
            .labels_removed
            .push((repo.clone(), issue, label.to_string()));
        if let Some(pr) = state.prs.get_mut(&(repo.clone(), issue)) {
            pr.labels.retain(|l| l != label);
        }
        Ok(())
    }
}

#[async_trait]
impl PrClient for FakeGitHub {
    async fn list_changed_files(&self, repo: &RepoId, pr: IssueNumber) -> Result<Vec<String>> {
        self.record("list_changed_files").await?;
        Ok(self
            .lock()
            .changed_files
            .get(&(repo.clone(), pr))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_pr(&self, repo: &RepoId, pr: IssueNumber) -> Result<PullRequestSnapshot> {
        self.record("get_pr").await?;
        self.lock()
            .prs
            .get(&(repo.clone(), pr))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("{repo}{pr}")))
    }

    async fn merge_pr(&self, repo: &RepoId, pr: IssueNumber, method: MergeMethod) -> Result<()> {
        self.record("merge_pr").await?;
        let mut state = self.lock();
        let Some(snapshot) = state.prs.get_mut(&(repo.clone(), pr)) else {
            return Err(ClientError::NotFound(format!("{repo}{pr}")));
        };
        snapshot.state = PrState::Merged;
        state.merges.push((repo.clone(), pr, method));
        Ok(())
    }
}

#[async_trait]
impl RepoClient for FakeGitHub {
    async fn create_status(&self, repo: &RepoId, sha: &Sha, status: &CommitStatus) -> Result<()> {
        self.record("create_status").await?;
        let mut state = self.lock();
        let statuses = state.statuses.entry(sha.clone()).or_default();
        statuses.retain(|s| s.context != status.context);
        statuses.push(status.clone());
        state
            .status_writes
            .push((repo.clone(), sha.clone(), status.clone()));
        Ok(())
    }

    async fn list_statuses(&self, _repo: &RepoId, sha: &Sha) -> Result<Vec<CommitStatus>> {
        self.record("list_statuses").await?;
        Ok(self.lock().statuses.get(sha).cloned().unwrap_or_default())
    }

    async fn list_checks(&self, _repo: &RepoId, sha: &Sha) -> Result<Vec<CommitCheck>> {
        self.record("list_checks").await?;
        Ok(self.lock().checks.get(sha).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SearchClient for FakeGitHub {
    async fn search_open_prs(&self, repo: &RepoId) -> Result<Vec<PullRequestSnapshot>> {
        self.record("search_open_prs").await?;
        let state = self.lock();
        let mut prs: Vec<PullRequestSnapshot> = state
            .prs
            .iter()
            .filter(|((r, _), pr)| r == repo && pr.state.is_open())
            .map(|(_, pr)| {
                let mut pr = pr.clone();
                pr.commits = vec![Commit {
                    sha: pr.head.sha.clone(),
                    statuses: state.statuses.get(&pr.head.sha).cloned().unwrap_or_default(),
                    checks: state.checks.get(&pr.head.sha).cloned().unwrap_or_default(),
                }];
                pr
            })
            .collect();
        prs.sort_by_key(|pr| pr.number);
        Ok(prs)
    }
}

#[async_trait]
impl ConfigClient for FakeGitHub {
    async fn get_config(&self, repo: &RepoId) -> Result<Configuration> {
        self.record("get_config").await?;
        Ok(self.lock().configs.get(repo).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl OwnersClient for FakeGitHub {
    async fn get_owners(&self, repo: &RepoId, path: &str) -> Result<OwnersConfiguration> {
        self.record("get_owners").await?;
        Ok(self.owners.get(repo, path).unwrap_or_default())
    }
}
