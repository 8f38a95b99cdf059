//! Level-triggered merge controller.
//!
//! Events and the periodic re-list only *enqueue* a [`ReconcileKey`]. Workers
//! pull keys off a deduplicating [`WorkQueue`] and run [`TideController::reconcile`]:
//! fetch the PR, compute the desired `tide` status, publish it if it differs,
//! and merge once the published status already reads `SUCCESS`.
//!
//! Each key carries the latest [`ReconcileContext`] (clients plus label policy)
//! seen for it; a newer enqueue overwrites the older one.
//!
//! # Requeue policy
//!
//! | Outcome                     | Action                               |
//! |-----------------------------|--------------------------------------|
//! | merged                      | forget                               |
//! | not open                    | forget, drop the context if unchanged |
//! | not yet mergeable           | forget, re-add after `requeue_delay` |
//! | error or timeout            | rate-limited re-add (backoff)        |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::queue::WorkQueue;
use super::status::{tide_status, wants_state_and_description};
use crate::backoff::Backoff;
use crate::clients::{Capabilities, ClientError, PrClient, RepoClient, SearchClient, with_deadline};
use crate::types::{Commit, IssueNumber, MergeMethod, PullRequestSnapshot, RepoId};

/// Default time between full re-lists of enrolled repositories (1 minute).
const DEFAULT_RELIST_INTERVAL_SECS: u64 = 60;

/// Default delay before re-checking a PR that is not yet mergeable (30 seconds).
const DEFAULT_REQUEUE_DELAY_SECS: u64 = 30;

/// Default deadline for a single reconcile pass (30 seconds).
const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30;

const DEFAULT_WORKERS: usize = 1;

/// Timing and concurrency for the controller.
#[derive(Debug, Clone)]
pub struct TideConfig {
    pub relist_interval: Duration,
    pub requeue_delay: Duration,
    /// Deadline for one reconcile pass, I/O included.
    pub reconcile_timeout: Duration,
    /// Number of concurrent reconcile workers.
    pub workers: usize,
    pub backoff: Backoff,
}

impl Default for TideConfig {
    fn default() -> Self {
        TideConfig {
            relist_interval: Duration::from_secs(DEFAULT_RELIST_INTERVAL_SECS),
            requeue_delay: Duration::from_secs(DEFAULT_REQUEUE_DELAY_SECS),
            reconcile_timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            workers: DEFAULT_WORKERS,
            backoff: Backoff::DEFAULT,
        }
    }
}

/// Identity of one unit of reconcile work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconcileKey {
    pub repo: RepoId,
    pub number: IssueNumber,
}

impl ReconcileKey {
    pub fn new(repo: RepoId, number: IssueNumber) -> Self {
        ReconcileKey { repo, number }
    }
}

impl fmt::Display for ReconcileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.repo, self.number)
    }
}

/// The clients a reconcile pass needs.
#[derive(Clone)]
pub struct TideClients {
    pub pulls: Arc<dyn PrClient>,
    pub repos: Arc<dyn RepoClient>,
    pub search: Arc<dyn SearchClient>,
}

impl From<&Capabilities> for TideClients {
    fn from(caps: &Capabilities) -> Self {
        TideClients {
            pulls: Arc::clone(&caps.pulls),
            repos: Arc::clone(&caps.repos),
            search: Arc::clone(&caps.search),
        }
    }
}

/// Clients and label policy captured from the most recent trigger.
#[derive(Clone)]
pub struct ReconcileContext {
    pub clients: TideClients,
    pub required_labels: Vec<String>,
    pub forbidden_labels: Vec<String>,
    pub merge_method: MergeMethod,
}

impl fmt::Debug for ReconcileContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcileContext")
            .field("required_labels", &self.required_labels)
            .field("forbidden_labels", &self.forbidden_labels)
            .field("merge_method", &self.merge_method)
            .finish_non_exhaustive()
    }
}

/// What a successful reconcile pass concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No context is known for the key.
    Unknown,
    /// The PR is closed or already merged.
    NotOpen,
    /// The status is current but the PR cannot merge yet.
    Waiting,
    /// The PR was merged in this pass.
    Merged,
}

pub struct TideController {
    config: TideConfig,
    contexts: RwLock<HashMap<ReconcileKey, Arc<ReconcileContext>>>,
    repos: RwLock<HashMap<RepoId, Arc<ReconcileContext>>>,
    queue: WorkQueue<ReconcileKey>,
}

impl TideController {
    pub fn new(config: TideConfig) -> Self {
        let queue = WorkQueue::new(config.backoff);
        TideController {
            config,
            contexts: RwLock::new(HashMap::new()),
            repos: RwLock::new(HashMap::new()),
            queue,
        }
    }

    pub fn config(&self) -> &TideConfig {
        &self.config
    }

    pub fn queue(&self) -> &WorkQueue<ReconcileKey> {
        &self.queue
    }

    /// Records `context` as the latest for `key` and its repository, then
    /// queues the key.
    pub async fn enqueue(&self, key: ReconcileKey, context: ReconcileContext) {
        let context = Arc::new(context);
        self.repos
            .write()
            .await
            .insert(key.repo.clone(), Arc::clone(&context));
        self.contexts.write().await.insert(key.clone(), context);
        debug!(key = %key, "Queued for reconcile");
        self.queue.add(key);
    }

    /// Enrolls a repository for periodic re-listing without queueing a PR.
    pub async fn enroll(&self, repo: RepoId, context: ReconcileContext) {
        debug!(repo = %repo, "Enrolled for re-list");
        self.repos.write().await.insert(repo, Arc::new(context));
    }

    pub async fn context(&self, key: &ReconcileKey) -> Option<Arc<ReconcileContext>> {
        self.contexts.read().await.get(key).cloned()
    }

    pub async fn enrolled(&self) -> Vec<RepoId> {
        let mut repos: Vec<RepoId> = self.repos.read().await.keys().cloned().collect();
        repos.sort();
        repos
    }

    /// Lists open PRs of every enrolled repository and queues each one.
    ///
    /// Keys without a context of their own inherit the repository's.
    /// Returns the number of keys queued.
    pub async fn relist(&self) -> usize {
        let repos: Vec<(RepoId, Arc<ReconcileContext>)> = self
            .repos
            .read()
            .await
            .iter()
            .map(|(r, c)| (r.clone(), Arc::clone(c)))
            .collect();

        let mut queued = 0;
        for (repo, context) in repos {
            let search = context.clients.search.search_open_prs(&repo);
            let prs = match with_deadline(self.config.reconcile_timeout, search).await {
                Ok(prs) => prs,
                Err(e) => {
                    warn!(repo = %repo, error = %e, "Re-list failed");
                    continue;
                }
            };
            let mut contexts = self.contexts.write().await;
            for pr in prs {
                let key = ReconcileKey::new(repo.clone(), pr.number);
                contexts
                    .entry(key.clone())
                    .or_insert_with(|| Arc::clone(&context));
                self.queue.add(key);
                queued += 1;
            }
        }
        queued
    }

    /// Runs one reconcile pass for `key` under the configured deadline.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn reconcile(&self, key: &ReconcileKey) -> Result<ReconcileOutcome, ClientError> {
        with_deadline(self.config.reconcile_timeout, self.reconcile_inner(key)).await
    }

    async fn reconcile_inner(&self, key: &ReconcileKey) -> Result<ReconcileOutcome, ClientError> {
        let Some(context) = self.context(key).await else {
            return Ok(ReconcileOutcome::Unknown);
        };
        let pr = snapshot(&context.clients, key).await?;

        if !pr.state.is_open() {
            // A newer enqueue may have replaced the context while we fetched.
            let mut contexts = self.contexts.write().await;
            if contexts
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, &context))
            {
                contexts.remove(key);
            }
            drop(contexts);
            debug!(state = ?pr.state, "PR no longer open");
            return Ok(ReconcileOutcome::NotOpen);
        }

        let desired =
            wants_state_and_description(&pr, &context.required_labels, &context.forbidden_labels);

        if !desired.is_published(tide_status(&pr)) {
            context
                .clients
                .repos
                .create_status(&key.repo, &pr.head.sha, &desired.to_status())
                .await?;
            info!(
                sha = %pr.head.sha.short(),
                state = %desired.state,
                description = %desired.description,
                "Published status"
            );
        }

        if !desired.mergeable {
            return Ok(ReconcileOutcome::Waiting);
        }

        context
            .clients
            .pulls
            .merge_pr(&key.repo, key.number, context.merge_method)
            .await?;
        info!(method = %context.merge_method, "Merged");
        Ok(ReconcileOutcome::Merged)
    }

    /// Takes one key off the queue and applies the requeue policy.
    pub async fn process_next(&self) {
        let key = self.queue.get().await;
        self.process(&key).await;
    }

    async fn process(&self, key: &ReconcileKey) {
        match self.reconcile(key).await {
            Ok(ReconcileOutcome::Waiting) => {
                self.queue.forget(key);
                self.queue.add_after(key.clone(), self.config.requeue_delay);
            }
            Ok(outcome) => {
                self.queue.forget(key);
                debug!(key = %key, outcome = ?outcome, "Reconcile finished");
            }
            Err(e) => {
                let delay = self.queue.add_rate_limited(key.clone());
                warn!(
                    key = %key,
                    error = %e,
                    retry_in = ?delay,
                    attempts = self.queue.num_requeues(key),
                    "Reconcile failed"
                );
            }
        }
        self.queue.done(key);
    }

    /// Spawns the workers and the re-list loop. All stop on `shutdown`.
    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.config.workers + 1);

        for worker in 0..self.config.workers.max(1) {
            let controller = Arc::clone(self);
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                debug!(worker, "Reconcile worker started");
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        key = controller.queue.get() => controller.process(&key).await,
                    }
                }
                debug!(worker, "Reconcile worker stopping");
            }));
        }

        let controller = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(controller.config.relist_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval = ?controller.config.relist_interval, "Re-list loop started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Re-list loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let queued = controller.relist().await;
                        debug!(queued, "Re-list complete");
                    }
                }
            }
        }));

        handles
    }
}

/// Fetches the PR, filling in head commit statuses and checks when the
/// PR client does not attach them.
async fn snapshot(
    clients: &TideClients,
    key: &ReconcileKey,
) -> Result<PullRequestSnapshot, ClientError> {
    let mut pr = clients.pulls.get_pr(&key.repo, key.number).await?;
    if pr.head_commit().is_none() {
        let sha = pr.head.sha.clone();
        let statuses = clients.repos.list_statuses(&key.repo, &sha).await?;
        let checks = clients.repos.list_checks(&key.repo, &sha).await?;
        pr.commits.push(Commit {
            sha,
            statuses,
            checks,
        });
    }
    Ok(pr)
}
