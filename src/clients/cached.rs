//! Cache-backed configuration and owners clients.
//!
//! On a miss these fetch from a remote source, save into the cache and
//! register a refresh task with the [`CacheSyncer`]. Registration only
//! happens after a successful fetch, so a failed first fetch is retried on
//! the next lookup instead of waiting for the refresh loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{ClientError, ConfigClient, OwnersClient, Result, with_deadline};
use crate::cache::path::parent_dir;
use crate::cache::{CacheSyncer, ConfigStore, SyncKey, SyncTask};
use crate::types::{Configuration, OwnersConfiguration, RepoId};

const CONFIG_KIND: &str = "config";
const OWNERS_KIND: &str = "owners";

/// Where repository configuration documents come from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetches the repository's plugin configuration.
    /// Returns [`ClientError::NotFound`] when the repository has none.
    async fn fetch_config(&self, repo: &RepoId) -> Result<Configuration>;
}

/// Where governance files come from.
#[async_trait]
pub trait OwnersSource: Send + Sync {
    /// Every governance file in the repository as `(file path, contents)`.
    async fn fetch_owners(&self, repo: &RepoId) -> Result<Vec<(String, OwnersConfiguration)>>;
}

struct ConfigRefresh {
    repo: RepoId,
    path: String,
    source: Arc<dyn ConfigSource>,
    cache: Arc<dyn ConfigStore<Configuration>>,
}

#[async_trait]
impl SyncTask for ConfigRefresh {
    async fn sync(&self) -> Result<()> {
        let config = match self.source.fetch_config(&self.repo).await {
            Ok(config) => config,
            Err(ClientError::NotFound(_)) => {
                debug!(repo = %self.repo, "No plugin configuration in repository");
                Configuration::default()
            }
            Err(e) => return Err(e),
        };
        let config = Configuration {
            owner: self.repo.owner.clone(),
            repo: self.repo.repo.clone(),
            ..config
        };
        self.cache.save(&self.repo, &self.path, config);
        Ok(())
    }
}

/// [`ConfigClient`] answering from an exact-key cache.
pub struct CachedConfigClient {
    source: Arc<dyn ConfigSource>,
    cache: Arc<dyn ConfigStore<Configuration>>,
    syncer: Arc<CacheSyncer>,
    /// Cache path under which configuration is stored (the config file path).
    path: String,
    timeout: Duration,
}

impl CachedConfigClient {
    pub fn new(
        source: Arc<dyn ConfigSource>,
        cache: Arc<dyn ConfigStore<Configuration>>,
        syncer: Arc<CacheSyncer>,
        path: impl Into<String>,
    ) -> Self {
        let timeout = syncer.config().fetch_timeout;
        CachedConfigClient {
            source,
            cache,
            syncer,
            path: path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ConfigClient for CachedConfigClient {
    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn get_config(&self, repo: &RepoId) -> Result<Configuration> {
        if let Some(config) = self.cache.get(repo, &self.path) {
            return Ok(config);
        }

        let refresh = Arc::new(ConfigRefresh {
            repo: repo.clone(),
            path: self.path.clone(),
            source: Arc::clone(&self.source),
            cache: Arc::clone(&self.cache),
        });
        with_deadline(self.timeout, refresh.sync()).await?;
        self.syncer
            .ensure_sync(SyncKey::new(repo.clone(), CONFIG_KIND), refresh);

        Ok(self.cache.get(repo, &self.path).unwrap_or_default())
    }
}

struct OwnersRefresh {
    repo: RepoId,
    source: Arc<dyn OwnersSource>,
    cache: Arc<dyn ConfigStore<OwnersConfiguration>>,
}

#[async_trait]
impl SyncTask for OwnersRefresh {
    async fn sync(&self) -> Result<()> {
        let files = self.source.fetch_owners(&self.repo).await?;
        debug!(repo = %self.repo, count = files.len(), "Fetched owners files");
        for (file, owners) in files {
            self.cache.save(&self.repo, &parent_dir(&file), owners);
        }
        Ok(())
    }
}

/// [`OwnersClient`] answering from a nearest-ancestor cache.
pub struct CachedOwnersClient {
    source: Arc<dyn OwnersSource>,
    cache: Arc<dyn ConfigStore<OwnersConfiguration>>,
    syncer: Arc<CacheSyncer>,
    timeout: Duration,
}

impl CachedOwnersClient {
    pub fn new(
        source: Arc<dyn OwnersSource>,
        cache: Arc<dyn ConfigStore<OwnersConfiguration>>,
        syncer: Arc<CacheSyncer>,
    ) -> Self {
        let timeout = syncer.config().fetch_timeout;
        CachedOwnersClient {
            source,
            cache,
            syncer,
            timeout,
        }
    }
}

#[async_trait]
impl OwnersClient for CachedOwnersClient {
    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn get_owners(&self, repo: &RepoId, path: &str) -> Result<OwnersConfiguration> {
        if let Some(owners) = self.cache.get(repo, path) {
            return Ok(owners);
        }

        // Already loaded and kept fresh: nothing governs this path.
        let key = SyncKey::new(repo.clone(), OWNERS_KIND);
        if self.syncer.is_registered(&key) {
            return Ok(OwnersConfiguration::default());
        }

        let refresh = Arc::new(OwnersRefresh {
            repo: repo.clone(),
            source: Arc::clone(&self.source),
            cache: Arc::clone(&self.cache),
        });
        with_deadline(self.timeout, refresh.sync()).await?;
        self.syncer.ensure_sync(key, refresh);

        Ok(self.cache.get(repo, path).unwrap_or_default())
    }
}
