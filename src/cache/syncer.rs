//! Deduplicated background refresh for cached configuration.
//!
//! Cache clients register one [`SyncTask`] per `(repo, kind)` the first time
//! they miss. A single loop owned by the [`CacheSyncer`] re-runs every
//! registered task on a fixed interval so caches stay eventually consistent
//! with the repository contents.
//!
//! # Failure isolation
//!
//! Tasks run one after another, each under its own deadline. A failing or
//! hanging task is logged and skipped; the rest of the tick still runs.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::{ClientError, with_deadline};
use crate::types::RepoId;

/// Default refresh interval (5 minutes).
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Default deadline for one remote fetch (30 seconds).
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Timing for the refresh loop.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Time between refresh ticks.
    pub interval: Duration,
    /// Deadline applied to each task on each tick.
    pub fetch_timeout: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

/// Identity of a refresh registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncKey {
    pub repo: RepoId,
    /// What is being refreshed, e.g. `"config"` or `"owners"`.
    pub kind: &'static str,
}

impl SyncKey {
    pub fn new(repo: RepoId, kind: &'static str) -> Self {
        SyncKey { repo, kind }
    }
}

/// A refresh function: fetch from the source of truth and save into a cache.
#[async_trait]
pub trait SyncTask: Send + Sync {
    async fn sync(&self) -> Result<(), ClientError>;
}

/// Outcome of one refresh tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Holds every registered refresh task and drives them from one loop.
pub struct CacheSyncer {
    tasks: RwLock<HashMap<SyncKey, Arc<dyn SyncTask>>>,
    config: RefreshConfig,
}

impl CacheSyncer {
    pub fn new(config: RefreshConfig) -> Self {
        CacheSyncer {
            tasks: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Registers `task` under `key` unless something is already registered.
    ///
    /// Returns `true` if the task was inserted.
    pub fn ensure_sync(&self, key: SyncKey, task: Arc<dyn SyncTask>) -> bool {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        if tasks.contains_key(&key) {
            return false;
        }
        debug!(repo = %key.repo, kind = key.kind, "Registered cache refresh");
        tasks.insert(key, task);
        true
    }

    pub fn is_registered(&self, key: &SyncKey) -> bool {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn registered(&self) -> usize {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Runs every registered task once.
    pub async fn sync_all(&self) -> SyncReport {
        let snapshot: Vec<(SyncKey, Arc<dyn SyncTask>)> = self
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, t)| (k.clone(), Arc::clone(t)))
            .collect();

        let mut report = SyncReport::default();
        for (key, task) in snapshot {
            match with_deadline(self.config.fetch_timeout, task.sync()).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        repo = %key.repo,
                        kind = key.kind,
                        error = %e,
                        "Cache refresh failed"
                    );
                }
            }
        }
        report
    }

    /// Spawns the refresh loop. The first tick fires one interval from now.
    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let syncer = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + syncer.config.interval,
                syncer.config.interval,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval = ?syncer.config.interval, "Cache refresh loop started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Cache refresh loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = syncer.sync_all().await;
                        debug!(
                            succeeded = report.succeeded,
                            failed = report.failed,
                            "Cache refresh tick complete"
                        );
                    }
                }
            }
        })
    }
}
